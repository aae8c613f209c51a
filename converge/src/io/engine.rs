//! Engine abstraction for convergence runs.
//!
//! The [`Engine`] trait decouples the driver from the component that builds
//! and executes the task graph. [`ProcessEngine`] runs an external program
//! that reads an [`EngineRequest`] as JSON on stdin and writes a
//! [`ConvergenceResult`] as JSON on stdout. Tests use scripted engines that
//! return predetermined results without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::error::ConvergenceCancelled;
use crate::core::types::{ConvergenceResult, EngineRequest};
use crate::io::config::EngineConfig;
use crate::io::process::run_command;

const RESULT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/convergence_result.schema.json"
));

/// Abstraction over convergence engines.
pub trait Engine {
    /// Run the engine once. Errors are surfaced to the operator unchanged.
    ///
    /// Implementations should stop early and return [`ConvergenceCancelled`]
    /// when `cancel` fires.
    fn converge(&self, request: &EngineRequest, cancel: &CancelToken) -> Result<ConvergenceResult>;
}

/// Engine that spawns an external program.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ProcessEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: config.timeout(),
            output_limit_bytes: config.output_limit_bytes,
        }
    }
}

impl Engine for ProcessEngine {
    #[instrument(skip_all, fields(backend = ?request.backend, mode = ?request.mode, timeout_secs = self.timeout.as_secs()))]
    fn converge(&self, request: &EngineRequest, cancel: &CancelToken) -> Result<ConvergenceResult> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("engine command is empty"))?;
        info!(program = %program, cluster = %request.cluster.name, "starting engine");

        let payload = serde_json::to_vec(request).context("serialize engine request")?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        let output = run_command(
            cmd,
            Some(payload),
            self.timeout,
            self.output_limit_bytes,
            Some(cancel),
        )
        .with_context(|| format!("run engine {program}"))?;

        if output.cancelled {
            return Err(ConvergenceCancelled.into());
        }
        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "engine timed out");
            return Err(anyhow!("engine timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "engine failed");
            return Err(anyhow!(
                "engine failed with status {:?}: {}",
                output.status.code(),
                output.stderr_text()
            ));
        }
        if output.stdout_truncated > 0 {
            return Err(anyhow!(
                "engine output exceeded {} bytes",
                self.output_limit_bytes
            ));
        }

        let result = parse_result(&output.stdout)?;
        debug!(
            pending = result.has_pending_changes,
            images = result.image_assets.len(),
            files = result.file_assets.len(),
            "engine completed"
        );
        Ok(result)
    }
}

/// Parse engine output, validating it against the result schema first.
pub fn parse_result(raw: &[u8]) -> Result<ConvergenceResult> {
    let value: Value = serde_json::from_slice(raw).context("parse engine output")?;
    validate_result_schema(&value)?;
    serde_json::from_value(value).context("deserialize engine output")
}

fn validate_result_schema(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(RESULT_SCHEMA).context("parse result schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "engine output schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::Backend;

    #[test]
    fn parses_minimal_result() {
        let result = parse_result(br#"{"backend": "dryrun", "has_pending_changes": true}"#)
            .expect("parse");
        assert_eq!(result.backend, Backend::DryRun);
        assert!(result.has_pending_changes());
        assert!(result.task_outcomes.is_empty());
        assert!(result.cluster.is_none());
    }

    #[test]
    fn parses_assets() {
        let raw = br#"{
            "backend": "direct",
            "image_assets": [{"download_location": "registry.k8s.io/kube-apiserver:v1.29.3"}],
            "file_assets": [{
                "download_url": "https://dl.k8s.io/v1.29.3/bin/linux/amd64/kubelet",
                "sha256": "0000000000000000000000000000000000000000000000000000000000000000"
            }],
            "task_outcomes": {"Vpc/main": {"changed": false}}
        }"#;
        let result = parse_result(raw).expect("parse");
        assert_eq!(result.image_assets.len(), 1);
        assert_eq!(result.file_assets.len(), 1);
        assert!(result.task_outcomes.contains_key("Vpc/main"));
        assert!(!result.has_pending_changes());
    }

    #[test]
    fn schema_rejects_unknown_backend() {
        let err = parse_result(br#"{"backend": "pulumi"}"#).unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn rejects_non_json_output() {
        assert!(parse_result(b"converged!").is_err());
    }
}
