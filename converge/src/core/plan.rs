//! Resolution of an update request into an execution plan.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::cluster::validate_cluster_name;
use crate::core::error::InputError;
use crate::core::kubeconfig::KubeconfigOptions;
use crate::core::lifecycle::{LifecycleOverrides, parse_lifecycle_overrides};
use crate::core::phase::{Phase, select_phase};
use crate::core::target::{Backend, Mode, Target, resolve_mode, resolve_out_dir};

/// Operator intent for one update invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceRequest {
    pub cluster_name: String,
    /// `--yes`: allow the direct target to mutate live infrastructure.
    pub yes: bool,
    pub target: String,
    pub phase: String,
    pub lifecycle_overrides: Vec<String>,
    /// Deprecated `--ssh-public-key` path.
    pub ssh_public_key: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub kubeconfig: KubeconfigOptions,
    pub get_assets_only: bool,
    pub allow_downgrade: bool,
}

impl ConvergenceRequest {
    /// Request with the command-line defaults for `cluster_name`.
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            yes: false,
            target: Target::Direct.as_str().to_string(),
            phase: String::new(),
            lifecycle_overrides: Vec::new(),
            ssh_public_key: None,
            out_dir: None,
            kubeconfig: KubeconfigOptions::default(),
            get_assets_only: false,
            allow_downgrade: false,
        }
    }
}

/// Fully-resolved plan handed unchanged to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub mode: Mode,
    /// Target as requested, before dry-run substitution.
    pub target: Target,
    pub backend: Backend,
    pub phase: Phase,
    pub out_dir: PathBuf,
    pub lifecycle_overrides: LifecycleOverrides,
}

impl ExecutionPlan {
    pub fn is_dry_run(&self) -> bool {
        self.mode == Mode::DryRun
    }
}

/// Validate every input and derive the plan.
///
/// Pure: performs no I/O, so every input error surfaces before any side
/// effect of the invocation.
pub fn resolve_plan(request: &ConvergenceRequest) -> Result<ExecutionPlan, InputError> {
    validate_cluster_name(&request.cluster_name)?;
    request.kubeconfig.validate()?;

    let target = Target::parse(&request.target)?;
    let phase = select_phase(&request.phase)?;
    let lifecycle_overrides = parse_lifecycle_overrides(request.lifecycle_overrides.as_slice())?;
    let (mode, backend) = resolve_mode(target, request.yes);
    let out_dir = resolve_out_dir(target, request.out_dir.clone());

    Ok(ExecutionPlan {
        mode,
        target,
        backend,
        phase,
        out_dir,
        lifecycle_overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::lifecycle::LifecyclePolicy;

    fn request() -> ConvergenceRequest {
        ConvergenceRequest::new("k8s.example.com")
    }

    #[test]
    fn defaults_resolve_to_dry_run() {
        let plan = resolve_plan(&request()).expect("plan");
        assert_eq!(plan.mode, Mode::DryRun);
        assert_eq!(plan.backend, Backend::DryRun);
        assert_eq!(plan.target, Target::Direct);
        assert_eq!(plan.phase, Phase::All);
        assert_eq!(plan.out_dir, PathBuf::from("out"));
        assert!(plan.lifecycle_overrides.is_empty());
    }

    #[test]
    fn direct_without_yes_is_dry_run_regardless_of_other_flags() {
        let mut req = request();
        req.phase = "network".to_string();
        req.lifecycle_overrides = vec!["Vpc=ExistsAndValidates".to_string()];
        req.out_dir = Some(PathBuf::from("custom"));
        req.kubeconfig.admin = Some(Duration::from_secs(3600));
        req.allow_downgrade = true;
        let plan = resolve_plan(&req).expect("plan");
        assert_eq!(plan.mode, Mode::DryRun);
        assert_eq!(plan.backend, Backend::DryRun);
    }

    #[test]
    fn terraform_applies_without_yes() {
        let mut req = request();
        req.target = "terraform".to_string();
        let plan = resolve_plan(&req).expect("plan");
        assert_eq!(plan.mode, Mode::Apply);
        assert_eq!(plan.backend, Backend::Terraform);
        assert_eq!(plan.out_dir, PathBuf::from("out/terraform"));
    }

    #[test]
    fn carries_phase_and_overrides() {
        let mut req = request();
        req.yes = true;
        req.phase = "iam".to_string();
        req.lifecycle_overrides = vec![
            "SecurityGroup=Ignore".to_string(),
            "SecurityGroup=Sync".to_string(),
        ];
        let plan = resolve_plan(&req).expect("plan");
        assert_eq!(plan.mode, Mode::Apply);
        assert_eq!(plan.phase, Phase::Security);
        assert_eq!(
            plan.lifecycle_overrides.get("SecurityGroup"),
            Some(LifecyclePolicy::Sync)
        );
    }

    #[test]
    fn conflicting_identity_is_rejected() {
        let mut req = request();
        req.yes = true;
        req.kubeconfig.admin = Some(Duration::from_secs(3600));
        req.kubeconfig.user = Some("bob".to_string());
        assert_eq!(
            resolve_plan(&req).unwrap_err(),
            InputError::ConflictingIdentity
        );
    }

    #[test]
    fn invalid_inputs_fail_fast() {
        let mut req = request();
        req.target = "bogus".to_string();
        assert!(matches!(
            resolve_plan(&req).unwrap_err(),
            InputError::UnknownTarget { .. }
        ));

        let mut req = request();
        req.phase = "bogus".to_string();
        assert!(matches!(
            resolve_plan(&req).unwrap_err(),
            InputError::UnknownPhase { .. }
        ));

        let mut req = request();
        req.lifecycle_overrides = vec!["A".to_string()];
        assert!(matches!(
            resolve_plan(&req).unwrap_err(),
            InputError::OverrideSyntax { .. }
        ));

        let req = ConvergenceRequest::new("Not A Name");
        assert!(matches!(
            resolve_plan(&req).unwrap_err(),
            InputError::InvalidClusterName { .. }
        ));
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut req = request();
        req.target = "cloudformation".to_string();
        req.phase = "cluster".to_string();
        req.lifecycle_overrides = vec!["A=Ignore".to_string(), "B=Sync".to_string()];
        let first = resolve_plan(&req).expect("first");
        let second = resolve_plan(&req).expect("second");
        assert_eq!(first, second);
    }
}
