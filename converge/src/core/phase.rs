//! Phase selection for partial convergence runs.

use serde::{Deserialize, Serialize};

use crate::core::error::InputError;

/// Named subset of the task graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No phase requested: run every task.
    #[default]
    All,
    Network,
    Security,
    Cluster,
}

impl Phase {
    /// Selectable phases, in the order they are listed to operators.
    pub const SELECTABLE: [Phase; 3] = [Phase::Network, Phase::Security, Phase::Cluster];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::All => "all",
            Phase::Network => "network",
            Phase::Security => "security",
            Phase::Cluster => "cluster",
        }
    }

    pub fn names() -> Vec<String> {
        Self::SELECTABLE
            .iter()
            .map(|phase| phase.as_str().to_string())
            .collect()
    }
}

/// Resolve the `--phase` value.
///
/// The empty string selects [`Phase::All`]; anything else is matched
/// case-insensitively, with `iam` kept as an alias for `security`.
pub fn select_phase(requested: &str) -> Result<Phase, InputError> {
    if requested.is_empty() {
        return Ok(Phase::All);
    }
    match requested.to_lowercase().as_str() {
        "network" => Ok(Phase::Network),
        "security" | "iam" => Ok(Phase::Security),
        "cluster" => Ok(Phase::Cluster),
        _ => Err(InputError::UnknownPhase {
            name: requested.to_string(),
            available: Phase::names(),
        }),
    }
}
