//! Kubeconfig builder/writer and local context lookup.
//!
//! [`Kubectl`] delegates the on-disk merge to `kubectl config`, so existing
//! contexts, users and clusters in the file are preserved.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::cluster::Cluster;
use crate::core::kubeconfig::{
    Endpoint, KubeconfigDocument, KubeconfigIdentity, KubeconfigUser, build_document,
};
use crate::io::config::KubectlConfig;
use crate::io::process::run_command;

const OUTPUT_LIMIT_BYTES: usize = 1_000_000;
const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";
/// CA location inside a cluster's state directory.
const CLUSTER_CA_PATH: &str = "pki/ca.crt";

/// Where the document is merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergePolicy {
    /// kubectl's default resolution (`$KUBECONFIG`, then `~/.kube/config`).
    Default,
    /// Merge into this file.
    File(PathBuf),
}

impl MergePolicy {
    pub fn from_config(config: &KubectlConfig) -> Self {
        match &config.kubeconfig {
            Some(path) => MergePolicy::File(path.clone()),
            None => MergePolicy::Default,
        }
    }
}

/// Builds a kubeconfig document for a cluster and merges it on disk.
pub trait KubeconfigBuilder {
    fn build(
        &self,
        cluster: &Cluster,
        identity: &KubeconfigIdentity,
        endpoint: Endpoint,
    ) -> Result<KubeconfigDocument>;

    fn write(&self, doc: &KubeconfigDocument, merge: &MergePolicy) -> Result<()>;
}

/// Lists the contexts already present in the local kubeconfig.
pub trait ContextStore {
    fn list_contexts(&self) -> Result<Vec<String>>;
}

/// `kubectl`-backed builder, writer and context store.
#[derive(Debug, Clone)]
pub struct Kubectl {
    command: String,
    kubeconfig: Option<PathBuf>,
    certificate_authority: Option<PathBuf>,
    timeout: Duration,
    admin_credential_command: Vec<String>,
}

impl Kubectl {
    pub fn new(config: &KubectlConfig) -> Self {
        Self {
            command: config.command.clone(),
            kubeconfig: config.kubeconfig.clone(),
            certificate_authority: config.certificate_authority.clone(),
            timeout: config.timeout(),
            admin_credential_command: config.admin_credential_command.clone(),
        }
    }

    /// Fall back to `<cluster_dir>/pki/ca.crt` when no CA is configured.
    pub fn ca_for_cluster(mut self, cluster_dir: &Path) -> Self {
        if self.certificate_authority.is_none() {
            let candidate = cluster_dir.join(CLUSTER_CA_PATH);
            if candidate.is_file() {
                self.certificate_authority = Some(candidate);
            }
        }
        self
    }

    pub fn certificate_authority(&self) -> Option<&Path> {
        self.certificate_authority.as_deref()
    }

    fn run(&self, kubeconfig: Option<&PathBuf>, args: &[String]) -> Result<String> {
        let mut cmd = Command::new(&self.command);
        if let Some(path) = kubeconfig {
            cmd.arg("--kubeconfig").arg(path);
        }
        cmd.arg("config").args(args);
        debug!(args = ?args, "running kubectl config");

        let output = run_command(cmd, None, self.timeout, OUTPUT_LIMIT_BYTES, None)?;
        if output.timed_out {
            return Err(anyhow!(
                "kubectl config {} timed out after {:?}",
                first_arg(args),
                self.timeout
            ));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "kubectl config {} failed with status {:?}: {}",
                first_arg(args),
                output.status.code(),
                output.stderr_text()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn first_arg(args: &[String]) -> &str {
    args.first().map(String::as_str).unwrap_or_default()
}

impl KubeconfigBuilder for Kubectl {
    fn build(
        &self,
        cluster: &Cluster,
        identity: &KubeconfigIdentity,
        endpoint: Endpoint,
    ) -> Result<KubeconfigDocument> {
        if self.certificate_authority.is_none() {
            warn!(
                cluster = %cluster.name,
                "no cluster CA found; exported kubeconfig will rely on system trust roots"
            );
        }
        Ok(build_document(
            cluster,
            identity,
            endpoint,
            &self.admin_credential_command,
            self.certificate_authority.as_deref(),
        ))
    }

    #[instrument(skip_all, fields(context = %doc.context))]
    fn write(&self, doc: &KubeconfigDocument, merge: &MergePolicy) -> Result<()> {
        let file = match merge {
            MergePolicy::Default => None,
            MergePolicy::File(path) => Some(path),
        };
        for args in write_commands(doc) {
            self.run(file, &args)?;
        }
        info!(server = %doc.server, "kubeconfig written");
        Ok(())
    }
}

impl ContextStore for Kubectl {
    fn list_contexts(&self) -> Result<Vec<String>> {
        let stdout = self.run(
            self.kubeconfig.as_ref(),
            &["get-contexts".to_string(), "-o".to_string(), "name".to_string()],
        )?;
        Ok(parse_context_names(&stdout))
    }
}

/// `kubectl config` argument lists that merge `doc`, in execution order.
pub fn write_commands(doc: &KubeconfigDocument) -> Vec<Vec<String>> {
    let mut set_cluster = vec![
        "set-cluster".to_string(),
        doc.cluster.clone(),
        format!("--server={}", doc.server),
    ];
    if let Some(ca) = &doc.certificate_authority {
        set_cluster.push(format!("--certificate-authority={}", ca.display()));
        set_cluster.push("--embed-certs=true".to_string());
    }
    let mut commands = vec![set_cluster];

    if let Some(KubeconfigUser::AdminExec {
        name,
        command,
        args,
    }) = &doc.user
    {
        let mut set_credentials = vec![
            "set-credentials".to_string(),
            name.clone(),
            format!("--exec-api-version={EXEC_API_VERSION}"),
            format!("--exec-command={command}"),
        ];
        set_credentials.extend(args.iter().map(|arg| format!("--exec-arg={arg}")));
        commands.push(set_credentials);
    }

    let mut set_context = vec![
        "set-context".to_string(),
        doc.context.clone(),
        format!("--cluster={}", doc.cluster),
    ];
    if let Some(user) = &doc.user {
        set_context.push(format!("--user={}", user.name()));
    }
    commands.push(set_context);
    commands.push(vec!["use-context".to_string(), doc.context.clone()]);
    commands
}

/// Parse `kubectl config get-contexts -o name` output.
pub fn parse_context_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
