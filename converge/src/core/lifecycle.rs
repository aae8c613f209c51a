//! Per-task lifecycle policies and the `--lifecycle-overrides` parser.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::InputError;

/// How the engine treats a resource that a task finds already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecyclePolicy {
    /// Create or update the resource to match the spec.
    Sync,
    /// Leave the resource alone entirely.
    Ignore,
    /// Sync, but only warn when the caller lacks permission to do so.
    WarnIfInsufficientAccess,
    /// The resource must exist and match; fail otherwise.
    ExistsAndValidates,
    /// The resource must exist; differences are reported as warnings.
    ExistsAndWarnIfChanges,
}

impl LifecyclePolicy {
    /// Registry of every accepted policy, in declaration order.
    pub const ALL: [LifecyclePolicy; 5] = [
        LifecyclePolicy::Sync,
        LifecyclePolicy::Ignore,
        LifecyclePolicy::WarnIfInsufficientAccess,
        LifecyclePolicy::ExistsAndValidates,
        LifecyclePolicy::ExistsAndWarnIfChanges,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LifecyclePolicy::Sync => "Sync",
            LifecyclePolicy::Ignore => "Ignore",
            LifecyclePolicy::WarnIfInsufficientAccess => "WarnIfInsufficientAccess",
            LifecyclePolicy::ExistsAndValidates => "ExistsAndValidates",
            LifecyclePolicy::ExistsAndWarnIfChanges => "ExistsAndWarnIfChanges",
        }
    }

    /// Case-sensitive registry lookup.
    pub fn parse(name: &str) -> Result<Self, InputError> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == name)
            .ok_or_else(|| InputError::UnknownLifecycle {
                name: name.to_string(),
                available: Self::names(),
            })
    }

    /// Sorted registry names, as listed in error messages.
    pub fn names() -> Vec<String> {
        let mut names: Vec<String> = Self::ALL.iter().map(|p| p.as_str().to_string()).collect();
        names.sort();
        names
    }
}

impl fmt::Display for LifecyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated task → policy map.
///
/// Tasks absent from the map keep their default lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LifecycleOverrides(BTreeMap<String, LifecyclePolicy>);

impl LifecycleOverrides {
    pub fn get(&self, task: &str) -> Option<LifecyclePolicy> {
        self.0.get(task).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, LifecyclePolicy)> {
        self.0.iter().map(|(task, policy)| (task.as_str(), *policy))
    }
}

/// Parse `TaskName=LifecycleName` entries into a validated map.
///
/// Each entry must split on `=` into exactly two non-empty segments. A later
/// entry for the same task replaces an earlier one.
pub fn parse_lifecycle_overrides<S: AsRef<str>>(
    entries: &[S],
) -> Result<LifecycleOverrides, InputError> {
    let mut map = BTreeMap::new();
    for entry in entries {
        let entry = entry.as_ref();
        let segments: Vec<&str> = entry.split('=').collect();
        let [task, policy] = segments.as_slice() else {
            return Err(InputError::OverrideSyntax {
                entry: entry.to_string(),
            });
        };
        if task.is_empty() || policy.is_empty() {
            return Err(InputError::OverrideSyntax {
                entry: entry.to_string(),
            });
        }
        let policy = LifecyclePolicy::parse(policy)?;
        map.insert(task.to_string(), policy);
    }
    Ok(LifecycleOverrides(map))
}
