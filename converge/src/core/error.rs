//! Typed input validation errors.
//!
//! Every variant names the offending value and the accepted set so the
//! operator can fix the invocation without reading help text. These errors
//! are raised before any side effect and travel through `anyhow`; the CLI
//! recovers them with `downcast_ref` to pick the `INVALID` exit code.

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// A lifecycle override entry was not `TaskName=LifecycleName`.
    OverrideSyntax { entry: String },
    /// A lifecycle override named a policy outside the registry.
    UnknownLifecycle { name: String, available: Vec<String> },
    /// `--phase` did not match any known phase.
    UnknownPhase { name: String, available: Vec<String> },
    /// `--target` did not match any known target.
    UnknownTarget { name: String, available: Vec<String> },
    /// `--admin` and `--user` were both supplied.
    ConflictingIdentity,
    /// Cluster name is empty or not a valid DNS name.
    InvalidClusterName { name: String },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::OverrideSyntax { entry } => write!(
                f,
                "incorrect syntax for lifecycle-overrides, correct syntax is TaskName=LifecycleName, override provided: {entry:?}"
            ),
            InputError::UnknownLifecycle { name, available } => write!(
                f,
                "unknown lifecycle {name:?}, available lifecycles: {}",
                available.join(",")
            ),
            InputError::UnknownPhase { name, available } => write!(
                f,
                "unknown phase {name:?}, available phases: {}",
                available.join(",")
            ),
            InputError::UnknownTarget { name, available } => write!(
                f,
                "unknown target {name:?}, available targets: {}",
                available.join(",")
            ),
            InputError::ConflictingIdentity => write!(f, "cannot use both --admin and --user"),
            InputError::InvalidClusterName { name } => {
                write!(f, "cluster name {name:?} must be a valid DNS name")
            }
        }
    }
}

impl Error for InputError {}

/// The engine call was interrupted through a [`crate::cancel::CancelToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceCancelled;

impl fmt::Display for ConvergenceCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "convergence cancelled")
    }
}

impl Error for ConvergenceCancelled {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_lifecycle_lists_available_names() {
        let err = InputError::UnknownLifecycle {
            name: "Bogus".to_string(),
            available: vec!["Ignore".to_string(), "Sync".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "unknown lifecycle \"Bogus\", available lifecycles: Ignore,Sync"
        );
    }

    #[test]
    fn input_error_survives_anyhow_downcast() {
        let err: anyhow::Error = InputError::ConflictingIdentity.into();
        assert_eq!(
            err.downcast_ref::<InputError>(),
            Some(&InputError::ConflictingIdentity)
        );
    }
}
