//! Driver configuration stored in `config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::lifecycle::parse_lifecycle_overrides;
use crate::core::types::RunTasksOptions;

/// Driver configuration (TOML).
///
/// Edited by humans; missing fields default to values that work with a
/// local state directory and `kubectl` on `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DriverConfig {
    /// Directory holding one sub-directory per cluster. `~` is expanded.
    pub state_dir: PathBuf,

    pub update: UpdateConfig,
    pub engine: EngineConfig,
    pub kubectl: KubectlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct UpdateConfig {
    /// `TaskName=LifecycleName` entries applied when the command line gives none.
    pub lifecycle_overrides: Vec<String>,

    /// Cluster-management CLI named in follow-up hints (`validate cluster`,
    /// `rolling-update cluster`). Unset means the hints stay generic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_tool: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine program and leading arguments (e.g. `["converge-engine", "run"]`).
    pub command: Vec<String>,

    /// Wall-clock budget for a single engine run.
    pub timeout_secs: u64,

    /// Cap on engine stdout/stderr kept in memory.
    pub output_limit_bytes: usize,

    pub max_task_duration_secs: u64,
    pub wait_after_all_tasks_failed_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let run_tasks = RunTasksOptions::default();
        Self {
            command: vec!["converge-engine".to_string()],
            timeout_secs: 60 * 60,
            output_limit_bytes: 16 * 1024 * 1024,
            max_task_duration_secs: run_tasks.max_task_duration_secs,
            wait_after_all_tasks_failed_secs: run_tasks.wait_after_all_tasks_failed_secs,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn run_tasks(&self) -> RunTasksOptions {
        RunTasksOptions {
            max_task_duration_secs: self.max_task_duration_secs,
            wait_after_all_tasks_failed_secs: self.wait_after_all_tasks_failed_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KubectlConfig {
    /// `kubectl` binary used to inspect and merge kubeconfig files.
    pub command: String,

    /// Explicit kubeconfig file; unset means kubectl's own resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Cluster CA embedded into exported kubeconfigs. Unset means
    /// `<state_dir>/<cluster>/pki/ca.crt` when that file exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<PathBuf>,

    pub timeout_secs: u64,

    /// Exec helper that issues admin credentials for `--admin`.
    pub admin_credential_command: Vec<String>,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            command: "kubectl".to_string(),
            kubeconfig: None,
            certificate_authority: None,
            timeout_secs: 30,
            admin_credential_command: vec![
                "converge-credential".to_string(),
                "admin".to_string(),
            ],
        }
    }
}

impl KubectlConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("~/.converge/state"),
            update: UpdateConfig::default(),
            engine: EngineConfig::default(),
            kubectl: KubectlConfig::default(),
        }
    }
}

impl DriverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(anyhow!("state_dir must not be empty"));
        }
        if self.engine.command.is_empty() || self.engine.command[0].trim().is_empty() {
            return Err(anyhow!("engine.command must be a non-empty array"));
        }
        if self.engine.timeout_secs == 0 {
            return Err(anyhow!("engine.timeout_secs must be > 0"));
        }
        if self.engine.output_limit_bytes == 0 {
            return Err(anyhow!("engine.output_limit_bytes must be > 0"));
        }
        if self.kubectl.command.trim().is_empty() {
            return Err(anyhow!("kubectl.command must not be empty"));
        }
        if self
            .update
            .cluster_tool
            .as_deref()
            .is_some_and(|tool| tool.trim().is_empty())
        {
            return Err(anyhow!("update.cluster_tool must not be empty when set"));
        }
        if self.kubectl.timeout_secs == 0 {
            return Err(anyhow!("kubectl.timeout_secs must be > 0"));
        }
        if self.kubectl.admin_credential_command.is_empty()
            || self.kubectl.admin_credential_command[0].trim().is_empty()
        {
            return Err(anyhow!(
                "kubectl.admin_credential_command must be a non-empty array"
            ));
        }
        parse_lifecycle_overrides(self.update.lifecycle_overrides.as_slice())
            .context("update.lifecycle_overrides")?;
        Ok(())
    }
}

/// Default config location: `<config dir>/converge/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("cannot determine config directory"))?;
    Ok(base.join("converge").join("config.toml"))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DriverConfig::default()`.
pub fn load_config(path: &Path) -> Result<DriverConfig> {
    if !path.exists() {
        let cfg = DriverConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DriverConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DriverConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
