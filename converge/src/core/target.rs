//! Mode/target resolution.
//!
//! Decides whether a run may mutate live infrastructure and which backend
//! renders the result. Only the `direct` target touches live resources, so it
//! is the only one gated by `--yes`; the file-rendering targets always apply.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::error::InputError;

/// Target requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Direct,
    DryRun,
    Terraform,
    CloudFormation,
}

impl Target {
    pub const ALL: [Target; 4] = [
        Target::Direct,
        Target::DryRun,
        Target::Terraform,
        Target::CloudFormation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Target::Direct => "direct",
            Target::DryRun => "dryrun",
            Target::Terraform => "terraform",
            Target::CloudFormation => "cloudformation",
        }
    }

    pub fn parse(name: &str) -> Result<Self, InputError> {
        Self::ALL
            .into_iter()
            .find(|target| target.as_str() == name)
            .ok_or_else(|| InputError::UnknownTarget {
                name: name.to_string(),
                available: Self::ALL.iter().map(|t| t.as_str().to_string()).collect(),
            })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the engine may change anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Apply,
    DryRun,
}

/// Backend that renders the convergence output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Direct,
    DryRun,
    Terraform,
    CloudFormation,
}

impl Backend {
    /// True for backends that only write local files.
    pub fn renders_files(self) -> bool {
        matches!(self, Backend::Terraform | Backend::CloudFormation)
    }
}

/// Resolve `(mode, backend)` for a requested target.
pub fn resolve_mode(target: Target, yes: bool) -> (Mode, Backend) {
    match target {
        Target::Direct if yes => (Mode::Apply, Backend::Direct),
        Target::Direct | Target::DryRun => (Mode::DryRun, Backend::DryRun),
        Target::Terraform => (Mode::Apply, Backend::Terraform),
        Target::CloudFormation => (Mode::Apply, Backend::CloudFormation),
    }
}

/// Output directory for a target when the caller supplied none.
pub fn default_out_dir(target: Target) -> PathBuf {
    match target {
        Target::Terraform => PathBuf::from("out/terraform"),
        Target::CloudFormation => PathBuf::from("out/cloudformation"),
        Target::Direct | Target::DryRun => PathBuf::from("out"),
    }
}

/// Use the explicit directory if given, otherwise the target default.
pub fn resolve_out_dir(target: Target, requested: Option<PathBuf>) -> PathBuf {
    match requested {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => default_out_dir(target),
    }
}
