//! Cluster state retrieval from the state directory.
//!
//! Layout: `<state_dir>/<cluster name>/cluster.json`, plus per-cluster
//! secrets written by [`crate::io::credentials::FsCredentialStore`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::cluster::Cluster;

/// Source of declared cluster specifications.
pub trait ClusterStore {
    fn load_cluster(&self, name: &str) -> Result<Cluster>;
}

#[derive(Debug, Clone)]
pub struct FsClusterStore {
    state_dir: PathBuf,
}

impl FsClusterStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn cluster_dir(&self, name: &str) -> PathBuf {
        self.state_dir.join(name)
    }

    pub fn cluster_path(&self, name: &str) -> PathBuf {
        self.cluster_dir(name).join("cluster.json")
    }
}

impl ClusterStore for FsClusterStore {
    fn load_cluster(&self, name: &str) -> Result<Cluster> {
        let path = self.cluster_path(name);
        debug!(path = %path.display(), "loading cluster");
        if !path.exists() {
            return Err(anyhow!(
                "cluster {name:?} not found in state directory {}",
                self.state_dir.display()
            ));
        }
        let cluster = read_cluster(&path)?;
        if cluster.name != name {
            return Err(anyhow!(
                "{} declares cluster {:?}, expected {name:?}",
                path.display(),
                cluster.name
            ));
        }
        Ok(cluster)
    }
}

fn read_cluster(path: &Path) -> Result<Cluster> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Write a cluster document (pretty JSON, trailing newline).
pub fn write_cluster(store: &FsClusterStore, cluster: &Cluster) -> Result<()> {
    let path = store.cluster_path(&cluster.name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(cluster).context("serialize cluster")?;
    buf.push('\n');
    fs::write(&path, buf).with_context(|| format!("write {}", path.display()))
}
