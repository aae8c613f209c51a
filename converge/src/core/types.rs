//! Request/response contract with the convergence engine.
//!
//! These types are the wire format of the engine boundary: the process
//! engine serializes [`EngineRequest`] to the child's stdin and reads a
//! [`ConvergenceResult`] back from its stdout.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::cluster::Cluster;
use crate::core::lifecycle::LifecycleOverrides;
use crate::core::phase::Phase;
use crate::core::plan::ExecutionPlan;
use crate::core::target::{Backend, Mode};

/// Identifies the cloud the engine should talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudHandle {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl CloudHandle {
    pub fn for_cluster(cluster: &Cluster) -> Self {
        Self {
            provider: cluster.cloud_provider.clone(),
            region: cluster.region.clone(),
        }
    }
}

/// Task execution tuning forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTasksOptions {
    /// Give up on a single task after this many seconds.
    pub max_task_duration_secs: u64,
    /// Pause between passes when every remaining task failed.
    pub wait_after_all_tasks_failed_secs: u64,
}

impl Default for RunTasksOptions {
    fn default() -> Self {
        Self {
            max_task_duration_secs: 10 * 60,
            wait_after_all_tasks_failed_secs: 10,
        }
    }
}

/// Single request handed to the engine per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRequest {
    pub cloud: CloudHandle,
    pub cluster: Cluster,
    pub mode: Mode,
    pub backend: Backend,
    pub phase: Phase,
    pub lifecycle_overrides: LifecycleOverrides,
    pub out_dir: PathBuf,
    pub get_assets_only: bool,
    pub allow_downgrade: bool,
    pub run_tasks: RunTasksOptions,
}

impl EngineRequest {
    pub fn new(
        plan: &ExecutionPlan,
        cluster: &Cluster,
        get_assets_only: bool,
        allow_downgrade: bool,
        run_tasks: RunTasksOptions,
    ) -> Self {
        Self {
            cloud: CloudHandle::for_cluster(cluster),
            cluster: cluster.clone(),
            mode: plan.mode,
            backend: plan.backend,
            phase: plan.phase,
            lifecycle_overrides: plan.lifecycle_overrides.clone(),
            out_dir: plan.out_dir.clone(),
            get_assets_only,
            allow_downgrade,
            run_tasks,
        }
    }
}

/// Container image the cluster depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub download_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_location: Option<String>,
}

/// File (binary, archive) the cluster depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAsset {
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// What the engine reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceResult {
    pub backend: Backend,
    /// Per-task outcomes; opaque to the driver.
    #[serde(default)]
    pub task_outcomes: BTreeMap<String, Value>,
    #[serde(default)]
    pub image_assets: Vec<ImageAsset>,
    #[serde(default)]
    pub file_assets: Vec<FileAsset>,
    /// Cluster as the engine saw it, when it differs from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<Cluster>,
    #[serde(default)]
    pub has_pending_changes: bool,
}

impl ConvergenceResult {
    pub fn has_pending_changes(&self) -> bool {
        self.has_pending_changes
    }
}
