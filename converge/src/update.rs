//! Orchestration for a single `converge update`.
//!
//! Input validation is pure and happens first; every side effect (state
//! store, engine, kubeconfig) is reached through the collaborator traits in
//! [`crate::io`], so the whole flow runs against fakes in tests.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::bootstrap::import_legacy_ssh_key;
use crate::cancel::CancelToken;
use crate::core::cluster::Cluster;
use crate::core::error::ConvergenceCancelled;
use crate::core::kubeconfig::{Advisory, KubeconfigDecision, decide_kubeconfig};
use crate::core::narrative::{DryRunReport, NarrativeContext, narrate};
use crate::core::plan::{ConvergenceRequest, ExecutionPlan, resolve_plan};
use crate::core::types::{ConvergenceResult, EngineRequest, RunTasksOptions};
use crate::io::cluster_store::ClusterStore;
use crate::io::credentials::CredentialStore;
use crate::io::engine::Engine;
use crate::io::kubeconfig::{ContextStore, KubeconfigBuilder, MergePolicy};

/// Everything the update flow talks to.
pub struct Collaborators<'a, C, E, S, K, X> {
    pub clusters: &'a C,
    pub engine: &'a E,
    pub credentials: &'a S,
    pub kubeconfig: &'a K,
    pub contexts: &'a X,
}

/// Settings taken from configuration rather than flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    pub run_tasks: RunTasksOptions,
    pub merge_policy: MergePolicy,
    /// Cluster-management CLI named in operator hints.
    pub cluster_tool: Option<String>,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            run_tasks: RunTasksOptions::default(),
            merge_policy: MergePolicy::Default,
            cluster_tool: None,
        }
    }
}

/// What a completed update did.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub plan: ExecutionPlan,
    pub result: ConvergenceResult,
    /// Set for dry runs that were not asset-only.
    pub report: Option<DryRunReport>,
    pub first_run: bool,
    pub kubeconfig_exported: bool,
}

/// Run one update: validate, bootstrap, converge, then report.
///
/// Operator-facing text goes to `out`. Returns [`ConvergenceCancelled`]
/// (inside `anyhow`) when `cancel` fires during the engine call; nothing is
/// written to the kubeconfig afterwards.
#[instrument(skip_all, fields(cluster = %request.cluster_name, target = %request.target))]
pub fn run_update<C, E, S, K, X>(
    request: &ConvergenceRequest,
    collaborators: &Collaborators<'_, C, E, S, K, X>,
    settings: &UpdateSettings,
    cancel: &CancelToken,
    out: &mut dyn Write,
) -> Result<UpdateOutcome>
where
    C: ClusterStore,
    E: Engine,
    S: CredentialStore,
    K: KubeconfigBuilder,
    X: ContextStore,
{
    let plan = resolve_plan(request)?;
    let decision = decide_kubeconfig(&request.kubeconfig)?;
    for advisory in &decision.advisories {
        if let Advisory::ImpliesCreate(_) = advisory {
            info!("{}", advisory.message());
        }
    }
    debug!(mode = ?plan.mode, backend = ?plan.backend, phase = ?plan.phase, "resolved plan");

    let cluster = collaborators.clusters.load_cluster(&request.cluster_name)?;

    if let Some(path) = &request.ssh_public_key {
        import_legacy_ssh_key(
            path,
            &cluster.name,
            settings.cluster_tool.as_deref(),
            collaborators.credentials,
            out,
        )?;
    }

    let engine_request = EngineRequest::new(
        &plan,
        &cluster,
        request.get_assets_only,
        request.allow_downgrade,
        settings.run_tasks,
    );
    if cancel.is_cancelled() {
        return Err(ConvergenceCancelled.into());
    }
    let result = collaborators.engine.converge(&engine_request, cancel)?;
    if cancel.is_cancelled() {
        return Err(ConvergenceCancelled.into());
    }
    if result.backend != plan.backend {
        warn!(
            planned = ?plan.backend,
            reported = ?result.backend,
            "engine reported a different backend than planned"
        );
    }

    let mut outcome = UpdateOutcome {
        plan,
        result,
        report: None,
        first_run: false,
        kubeconfig_exported: false,
    };

    if outcome.plan.is_dry_run() {
        if !request.get_assets_only {
            let report = DryRunReport::from_pending(outcome.result.has_pending_changes());
            out.write_all(report.message().as_bytes())
                .context("write dry-run report")?;
            outcome.report = Some(report);
        }
        return Ok(outcome);
    }
    if request.get_assets_only {
        return Ok(outcome);
    }

    if decision.export {
        outcome.first_run = detect_first_run(collaborators.contexts, &cluster.name);
        export_kubeconfig(
            collaborators.kubeconfig,
            &cluster,
            &decision,
            &settings.merge_policy,
        )?;
        outcome.kubeconfig_exported = true;
    }

    // The engine may hand back the cluster as it was applied.
    let applied = outcome.result.cluster.as_ref().unwrap_or(&cluster);
    let ctx = NarrativeContext::new(
        applied,
        outcome.plan.backend,
        &outcome.plan.out_dir,
        outcome.first_run,
    )
    .with_cluster_tool(settings.cluster_tool.clone());
    out.write_all(narrate(&ctx).as_bytes())
        .context("write update summary")?;
    Ok(outcome)
}

/// True when no local kubeconfig context is named after the cluster.
///
/// A failed lookup counts as "not first run".
pub fn detect_first_run<X: ContextStore + ?Sized>(contexts: &X, cluster_name: &str) -> bool {
    match contexts.list_contexts() {
        Ok(names) => !names.iter().any(|name| name == cluster_name),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "error reading kubeconfig contexts");
            false
        }
    }
}

fn export_kubeconfig<K: KubeconfigBuilder + ?Sized>(
    builder: &K,
    cluster: &Cluster,
    decision: &KubeconfigDecision,
    merge: &MergePolicy,
) -> Result<()> {
    info!("exporting kubeconfig for cluster");
    let doc = builder
        .build(cluster, &decision.identity, decision.endpoint)
        .context("build kubeconfig")?;
    builder.write(&doc, merge).context("write kubeconfig")?;
    if decision.advisories.contains(&Advisory::MissingCredential) {
        warn!("{}", Advisory::MissingCredential.message());
    }
    Ok(())
}
