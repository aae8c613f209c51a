//! Kubeconfig export decision: identity selection and gating.
//!
//! The decision is computed from flags alone. Building and merging the
//! document on disk is delegated to a [`crate::io::kubeconfig::KubeconfigBuilder`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::cluster::Cluster;
use crate::core::duration::format_seconds;
use crate::core::error::InputError;

/// Kubeconfig-related flags of an update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeconfigOptions {
    /// `--create-kube-config` (defaults to true).
    pub create: bool,
    /// `--admin[=TTL]`: embed an admin credential with this lifetime.
    pub admin: Option<Duration>,
    /// `--user`: reuse an existing kubeconfig user.
    pub user: Option<String>,
    /// `--internal`: point at the internal API name.
    pub internal: bool,
}

impl Default for KubeconfigOptions {
    fn default() -> Self {
        Self {
            create: true,
            admin: None,
            user: None,
            internal: false,
        }
    }
}

impl KubeconfigOptions {
    fn admin_ttl(&self) -> Option<Duration> {
        self.admin.filter(|ttl| !ttl.is_zero())
    }

    fn named_user(&self) -> Option<&str> {
        self.user.as_deref().filter(|user| !user.is_empty())
    }

    /// `--admin` and `--user` are mutually exclusive.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.admin_ttl().is_some() && self.named_user().is_some() {
            return Err(InputError::ConflictingIdentity);
        }
        Ok(())
    }
}

/// Credential embedded in (or referenced by) the exported kubeconfig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KubeconfigIdentity {
    /// No usable credential.
    None,
    AdminCertificate { ttl_secs: u64 },
    NamedUser { name: String },
    /// Internal endpoint, no embedded credential.
    InternalDns,
}

impl KubeconfigIdentity {
    pub fn has_credential(&self) -> bool {
        matches!(
            self,
            KubeconfigIdentity::AdminCertificate { .. } | KubeconfigIdentity::NamedUser { .. }
        )
    }
}

/// Which API hostname the kubeconfig points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Public,
    Internal,
}

/// Non-fatal notes produced while deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    /// A flag that only makes sense with export turned it on.
    ImpliesCreate(&'static str),
    /// Export will carry no usable credential.
    MissingCredential,
}

impl Advisory {
    pub fn message(self) -> String {
        match self {
            Advisory::ImpliesCreate(flag) => format!("{flag} implies --create-kube-config"),
            Advisory::MissingCredential => "exported kubeconfig with no user authentication; \
                 use --admin, --user or --internal to add one"
                .to_string(),
        }
    }
}

/// Outcome of the kubeconfig decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeconfigDecision {
    pub export: bool,
    pub identity: KubeconfigIdentity,
    pub endpoint: Endpoint,
    pub advisories: Vec<Advisory>,
}

/// Decide whether and how to export a kubeconfig.
///
/// `--admin`, `--user` and `--internal` each force export on. Exactly one
/// identity is selected, admin certificate first, then named user, then the
/// internal endpoint.
pub fn decide_kubeconfig(options: &KubeconfigOptions) -> Result<KubeconfigDecision, InputError> {
    options.validate()?;

    let mut advisories = Vec::new();
    let mut export = options.create;
    let implied = [
        ("--admin", options.admin_ttl().is_some()),
        ("--user", options.named_user().is_some()),
        ("--internal", options.internal),
    ];
    for (flag, set) in implied {
        if set && !export {
            advisories.push(Advisory::ImpliesCreate(flag));
            export = true;
        }
    }

    let identity = if let Some(ttl) = options.admin_ttl() {
        KubeconfigIdentity::AdminCertificate {
            ttl_secs: ttl.as_secs(),
        }
    } else if let Some(user) = options.named_user() {
        KubeconfigIdentity::NamedUser {
            name: user.to_string(),
        }
    } else if options.internal {
        KubeconfigIdentity::InternalDns
    } else {
        KubeconfigIdentity::None
    };

    if export && !identity.has_credential() {
        advisories.push(Advisory::MissingCredential);
    }

    let endpoint = if options.internal {
        Endpoint::Internal
    } else {
        Endpoint::Public
    };

    Ok(KubeconfigDecision {
        export,
        identity,
        endpoint,
        advisories,
    })
}

/// User entry of an exported kubeconfig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KubeconfigUser {
    /// Reference an existing user entry by name.
    Existing { name: String },
    /// Admin credential obtained through an exec helper.
    AdminExec {
        name: String,
        command: String,
        args: Vec<String>,
    },
}

impl KubeconfigUser {
    pub fn name(&self) -> &str {
        match self {
            KubeconfigUser::Existing { name } | KubeconfigUser::AdminExec { name, .. } => name,
        }
    }
}

/// Kubeconfig entries for one cluster, ready to merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigDocument {
    pub context: String,
    pub cluster: String,
    pub server: String,
    /// CA bundle embedded into the cluster entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<KubeconfigUser>,
}

/// Assemble the kubeconfig entries for `cluster`.
///
/// `admin_command` is the exec helper that issues admin credentials; its
/// first element is the program, the rest are leading arguments.
/// `certificate_authority` is the cluster CA file, when one is known.
pub fn build_document(
    cluster: &Cluster,
    identity: &KubeconfigIdentity,
    endpoint: Endpoint,
    admin_command: &[String],
    certificate_authority: Option<&Path>,
) -> KubeconfigDocument {
    let host = match endpoint {
        Endpoint::Public => cluster.master_public_name(),
        Endpoint::Internal => cluster.master_internal_name(),
    };
    let user = match identity {
        KubeconfigIdentity::AdminCertificate { ttl_secs } => {
            let (command, leading) = admin_command
                .split_first()
                .map(|(cmd, rest)| (cmd.clone(), rest.to_vec()))
                .unwrap_or_default();
            let mut args = leading;
            args.push(format!("--cluster={}", cluster.name));
            let ttl = format_seconds(Duration::from_secs(*ttl_secs));
            args.push(format!("--ttl={ttl}"));
            Some(KubeconfigUser::AdminExec {
                name: format!("{}-admin", cluster.name),
                command,
                args,
            })
        }
        KubeconfigIdentity::NamedUser { name } => Some(KubeconfigUser::Existing {
            name: name.clone(),
        }),
        KubeconfigIdentity::InternalDns | KubeconfigIdentity::None => None,
    };
    KubeconfigDocument {
        context: cluster.name.clone(),
        cluster: cluster.name.clone(),
        server: format!("https://{host}"),
        certificate_authority: certificate_authority.map(Path::to_path_buf),
        user,
    }
}
