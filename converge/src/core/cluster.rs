//! Cluster and instance group model as read from the state store.
//!
//! Only the fields the driver consults are modeled; the engine receives the
//! full document through `extra`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::InputError;

static DNS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("valid dns regex")
});

/// Role of an instance group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceGroupRole {
    Master,
    Node,
    Bastion,
    APIServer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub name: String,
    pub role: InstanceGroupRole,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BastionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bastion_public_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bastion: Option<BastionSpec>,
}

/// Declared cluster specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub cloud_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_public_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_internal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<Topology>,
    #[serde(default)]
    pub instance_groups: Vec<InstanceGroup>,
    /// Remaining spec fields, passed through to the engine untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Cluster {
    /// Public API hostname, `api.<name>` unless configured.
    pub fn master_public_name(&self) -> String {
        self.master_public_name
            .clone()
            .unwrap_or_else(|| format!("api.{}", self.name))
    }

    /// Internal API hostname, `api.internal.<name>` unless configured.
    pub fn master_internal_name(&self) -> String {
        self.master_internal_name
            .clone()
            .unwrap_or_else(|| format!("api.internal.{}", self.name))
    }

    /// True when any instance group has the Bastion role.
    pub fn uses_bastion(&self) -> bool {
        self.instance_groups
            .iter()
            .any(|ig| ig.role == InstanceGroupRole::Bastion)
    }

    /// Configured bastion public name, if any.
    pub fn bastion_public_name(&self) -> Option<&str> {
        self.topology
            .as_ref()?
            .bastion
            .as_ref()?
            .bastion_public_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }
}

/// Cluster names double as DNS names and kube-context names.
pub fn validate_cluster_name(name: &str) -> Result<(), InputError> {
    if name.len() > 253 || !DNS_NAME.is_match(name) {
        return Err(InputError::InvalidClusterName {
            name: name.to_string(),
        });
    }
    Ok(())
}
