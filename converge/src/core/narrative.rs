//! Operator-facing messages.
//!
//! Every line the driver prints to its output stream is produced here, as a
//! pure function of plan/result state. Callers only choose which message to
//! write.

use std::path::{Path, PathBuf};

use crate::core::cluster::Cluster;
use crate::core::target::Backend;

const ADDONS_URL: &str = "https://kubernetes.io/docs/concepts/cluster-administration/addons/";

/// Terminal report of a dry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DryRunReport {
    PendingChanges,
    NoChanges,
}

impl DryRunReport {
    pub fn from_pending(has_pending_changes: bool) -> Self {
        if has_pending_changes {
            DryRunReport::PendingChanges
        } else {
            DryRunReport::NoChanges
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            DryRunReport::PendingChanges => "Must specify --yes to apply changes\n",
            DryRunReport::NoChanges => "No changes need to be applied\n",
        }
    }
}

/// Notice printed when the deprecated `--ssh-public-key` flag is used.
///
/// `cluster_tool` is the cluster-management CLI that owns secrets; without
/// one the notice points at the credential store instead.
pub fn ssh_key_deprecation_notice(cluster_name: &str, cluster_tool: Option<&str>) -> String {
    match cluster_tool {
        Some(tool) => format!(
            "--ssh-public-key on update is deprecated - please use `{tool} create secret --name {cluster_name} sshpublickey admin -i ~/.ssh/id_rsa.pub` instead\n"
        ),
        None => format!(
            "--ssh-public-key on update is deprecated - please add the key to the credential store of {cluster_name} as sshpublickey admin instead\n"
        ),
    }
}

/// Everything the narrator needs, gathered after a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeContext {
    pub first_run: bool,
    pub backend: Backend,
    pub out_dir: PathBuf,
    pub cluster_name: String,
    pub bastion_present: bool,
    pub bastion_public_name: Option<String>,
    pub master_public_name: String,
    /// CLI offering `validate cluster` and `rolling-update cluster`, if any.
    pub cluster_tool: Option<String>,
}

impl NarrativeContext {
    pub fn new(cluster: &Cluster, backend: Backend, out_dir: &Path, first_run: bool) -> Self {
        Self {
            first_run,
            backend,
            out_dir: out_dir.to_path_buf(),
            cluster_name: cluster.name.clone(),
            bastion_present: cluster.uses_bastion(),
            bastion_public_name: cluster.bastion_public_name().map(str::to_string),
            master_public_name: cluster.master_public_name(),
            cluster_tool: None,
        }
    }

    pub fn with_cluster_tool(mut self, cluster_tool: Option<String>) -> Self {
        self.cluster_tool = cluster_tool;
        self
    }
}

/// CloudFormation stack name derived from the cluster name.
pub fn cloudformation_stack_name(cluster_name: &str) -> String {
    format!("kubernetes-{}", cluster_name.replace('.', "-"))
}

/// Guidance text after an apply.
pub fn narrate(ctx: &NarrativeContext) -> String {
    let mut sb = String::new();
    let out_dir = ctx.out_dir.display();

    match ctx.backend {
        Backend::Terraform => {
            sb.push('\n');
            sb.push_str(&format!("Terraform output has been placed into {out_dir}\n"));
            if ctx.first_run {
                sb.push_str("Run these commands to apply the configuration:\n");
                sb.push_str(&format!("   cd {out_dir}\n"));
                sb.push_str("   terraform plan\n");
                sb.push_str("   terraform apply\n");
                sb.push('\n');
            }
        }
        Backend::CloudFormation => {
            sb.push('\n');
            sb.push_str(&format!(
                "CloudFormation output has been placed into {out_dir}\n"
            ));
            if ctx.first_run {
                let stack = cloudformation_stack_name(&ctx.cluster_name);
                let template = ctx.out_dir.join("kubernetes.json");
                sb.push_str("Run this command to apply the configuration:\n");
                sb.push_str(&format!(
                    "   aws cloudformation create-stack --capabilities CAPABILITY_NAMED_IAM --stack-name {stack} --template-body file://{}\n",
                    template.display()
                ));
                sb.push('\n');
            }
        }
        Backend::Direct | Backend::DryRun => {
            sb.push('\n');
            if ctx.first_run {
                sb.push_str("Cluster is starting.  It should be ready in a few minutes.\n");
            } else {
                sb.push_str("Cluster changes have been applied to the cloud.\n");
            }
            sb.push('\n');
        }
    }

    if ctx.first_run {
        push_suggestions(&mut sb, ctx);
    } else {
        sb.push('\n');
        match &ctx.cluster_tool {
            Some(tool) => sb.push_str(&format!(
                "Changes may require instances to restart: {tool} rolling-update cluster\n"
            )),
            None => sb.push_str(
                "Changes may require instances to restart: perform a rolling update of the cluster\n",
            ),
        }
        sb.push('\n');
    }

    sb
}

fn push_suggestions(sb: &mut String, ctx: &NarrativeContext) {
    sb.push_str("Suggestions:\n");
    if let Some(tool) = &ctx.cluster_tool {
        sb.push_str(&format!(
            " * validate cluster: {tool} validate cluster --wait 10m\n"
        ));
    }
    sb.push_str(" * list nodes: kubectl get nodes --show-labels\n");
    if !ctx.bastion_present {
        sb.push_str(&format!(
            " * ssh to the master: ssh -i ~/.ssh/id_rsa ubuntu@{}\n",
            ctx.master_public_name
        ));
    } else if let Some(bastion) = &ctx.bastion_public_name {
        sb.push_str(&format!(
            " * ssh to the bastion: ssh -A -i ~/.ssh/id_rsa ubuntu@{bastion}\n"
        ));
    } else {
        sb.push_str(" * to ssh to the bastion, you probably want to configure a bastionPublicName.\n");
    }
    sb.push_str(
        " * the ubuntu user is specific to Ubuntu. If not using Ubuntu please use the appropriate user based on your OS.\n",
    );
    sb.push_str(&format!(" * read about installing addons at: {ADDONS_URL}\n"));
    sb.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(backend: Backend, first_run: bool) -> NarrativeContext {
        NarrativeContext {
            first_run,
            backend,
            out_dir: PathBuf::from("out/terraform"),
            cluster_name: "k8s.example.com".to_string(),
            bastion_present: false,
            bastion_public_name: None,
            master_public_name: "api.k8s.example.com".to_string(),
            cluster_tool: None,
        }
    }

    #[test]
    fn dry_run_messages_are_fixed() {
        assert_eq!(
            DryRunReport::from_pending(true).message(),
            "Must specify --yes to apply changes\n"
        );
        assert_eq!(
            DryRunReport::from_pending(false).message(),
            "No changes need to be applied\n"
        );
    }

    #[test]
    fn terraform_first_run_lists_commands() {
        let text = narrate(&ctx(Backend::Terraform, true));
        assert!(text.contains("Terraform output has been placed into out/terraform\n"));
        assert!(text.contains("   cd out/terraform\n   terraform plan\n   terraform apply\n"));
        assert!(text.contains("Suggestions:"));
    }

    #[test]
    fn terraform_later_run_only_reports_location() {
        let text = narrate(&ctx(Backend::Terraform, false));
        assert!(text.contains("Terraform output has been placed into out/terraform\n"));
        assert!(!text.contains("terraform apply"));
        assert!(text.contains("rolling update of the cluster"));
    }

    #[test]
    fn cloudformation_first_run_derives_stack_name() {
        let mut c = ctx(Backend::CloudFormation, true);
        c.out_dir = PathBuf::from("out/cloudformation");
        let text = narrate(&c);
        assert!(text.contains("CloudFormation output has been placed into out/cloudformation\n"));
        assert!(text.contains(
            "--stack-name kubernetes-k8s-example-com --template-body file://out/cloudformation/kubernetes.json"
        ));
    }

    #[test]
    fn direct_first_run_without_bastion_suggests_master_ssh() {
        let text = narrate(&ctx(Backend::Direct, true));
        assert!(text.contains("Cluster is starting."));
        assert!(text.contains("ssh to the master: ssh -i ~/.ssh/id_rsa ubuntu@api.k8s.example.com"));
        assert!(!text.contains("bastion"));
        assert!(!text.contains("rolling"));
    }

    #[test]
    fn first_run_suggestions_end_with_addons() {
        let text = narrate(&ctx(Backend::Direct, true));
        assert!(text.ends_with(
            " * read about installing addons at: https://kubernetes.io/docs/concepts/cluster-administration/addons/\n\n"
        ));
    }

    #[test]
    fn validate_suggestion_needs_a_cluster_tool() {
        let text = narrate(&ctx(Backend::Direct, true));
        assert!(!text.contains("validate cluster"));

        let c = ctx(Backend::Direct, true).with_cluster_tool(Some("clusterctl".to_string()));
        let text = narrate(&c);
        assert!(text.contains(" * validate cluster: clusterctl validate cluster --wait 10m\n"));
    }

    #[test]
    fn direct_first_run_with_named_bastion_targets_bastion() {
        let mut c = ctx(Backend::Direct, true);
        c.bastion_present = true;
        c.bastion_public_name = Some("bastion.k8s.example.com".to_string());
        let text = narrate(&c);
        assert!(text.contains("ssh -A -i ~/.ssh/id_rsa ubuntu@bastion.k8s.example.com"));
        assert!(!text.contains("ssh to the master"));
    }

    #[test]
    fn direct_first_run_with_unnamed_bastion_prompts_configuration() {
        let mut c = ctx(Backend::Direct, true);
        c.bastion_present = true;
        let text = narrate(&c);
        assert!(text.contains("configure a bastionPublicName"));
        assert!(!text.contains("ssh to the master"));
    }

    #[test]
    fn direct_later_run_reminds_rolling_update() {
        let text = narrate(&ctx(Backend::Direct, false));
        assert_eq!(
            text,
            "\nCluster changes have been applied to the cloud.\n\n\nChanges may require instances to restart: perform a rolling update of the cluster\n\n"
        );
    }

    #[test]
    fn rolling_update_reminder_names_configured_tool() {
        let c = ctx(Backend::Direct, false).with_cluster_tool(Some("clusterctl".to_string()));
        assert!(narrate(&c).contains(
            "Changes may require instances to restart: clusterctl rolling-update cluster\n"
        ));
    }

    #[test]
    fn narration_is_deterministic() {
        let c = ctx(Backend::Direct, true);
        assert_eq!(narrate(&c), narrate(&c));
    }

    #[test]
    fn deprecation_notice_names_cluster() {
        let notice = ssh_key_deprecation_notice("k8s.example.com", Some("clusterctl"));
        assert!(notice.contains("`clusterctl create secret --name k8s.example.com sshpublickey admin"));

        let notice = ssh_key_deprecation_notice("k8s.example.com", None);
        assert!(notice.contains("credential store of k8s.example.com as sshpublickey admin"));
        assert!(!notice.contains("create secret"));
    }
}
