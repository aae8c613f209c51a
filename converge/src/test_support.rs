//! Test-only helpers: fixture builders and scripted collaborators.

use std::cell::RefCell;
use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use serde_json::Map;

use crate::cancel::CancelToken;
use crate::core::cluster::Cluster;
use crate::core::kubeconfig::{Endpoint, KubeconfigDocument, KubeconfigIdentity, build_document};
use crate::core::target::Backend;
use crate::core::types::{ConvergenceResult, EngineRequest};
use crate::io::cluster_store::ClusterStore;
use crate::io::credentials::CredentialStore;
use crate::io::engine::Engine;
use crate::io::kubeconfig::{ContextStore, KubeconfigBuilder, MergePolicy};

/// Minimal AWS cluster named `name`, no instance groups.
pub fn cluster(name: &str) -> Cluster {
    Cluster {
        name: name.to_string(),
        cloud_provider: "aws".to_string(),
        region: None,
        master_public_name: None,
        master_internal_name: None,
        topology: None,
        instance_groups: Vec::new(),
        extra: Map::new(),
    }
}

/// Engine result with no tasks or assets.
pub fn convergence_result(backend: Backend, has_pending_changes: bool) -> ConvergenceResult {
    ConvergenceResult {
        backend,
        task_outcomes: BTreeMap::new(),
        image_assets: Vec::new(),
        file_assets: Vec::new(),
        cluster: None,
        has_pending_changes,
    }
}

/// Cluster store backed by an in-memory map.
#[derive(Debug, Default)]
pub struct StaticClusters {
    clusters: BTreeMap<String, Cluster>,
}

impl StaticClusters {
    pub fn with(cluster: Cluster) -> Self {
        let mut clusters = BTreeMap::new();
        clusters.insert(cluster.name.clone(), cluster);
        Self { clusters }
    }
}

impl ClusterStore for StaticClusters {
    fn load_cluster(&self, name: &str) -> Result<Cluster> {
        self.clusters
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("cluster {name:?} not found"))
    }
}

enum Scripted {
    Result(ConvergenceResult),
    Error(String),
}

/// Engine returning a predetermined response and recording requests.
pub struct ScriptedEngine {
    response: Scripted,
    cancel_during_call: bool,
    requests: RefCell<Vec<EngineRequest>>,
}

impl ScriptedEngine {
    pub fn returning(result: ConvergenceResult) -> Self {
        Self::new(Scripted::Result(result))
    }

    pub fn failing(message: &str) -> Self {
        Self::new(Scripted::Error(message.to_string()))
    }

    fn new(response: Scripted) -> Self {
        Self {
            response,
            cancel_during_call: false,
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Fire the cancel token while "running", then return normally.
    pub fn cancel_during_call(mut self) -> Self {
        self.cancel_during_call = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.borrow().clone()
    }
}

impl Engine for ScriptedEngine {
    fn converge(&self, request: &EngineRequest, cancel: &CancelToken) -> Result<ConvergenceResult> {
        self.requests.borrow_mut().push(request.clone());
        if self.cancel_during_call {
            cancel.cancel();
        }
        match &self.response {
            Scripted::Result(result) => Ok(result.clone()),
            Scripted::Error(message) => Err(anyhow!("{message}")),
        }
    }
}

/// Credential store that keeps keys in memory.
#[derive(Debug, Default)]
pub struct RecordingCredentialStore {
    keys: RefCell<Vec<(String, Vec<u8>)>>,
}

impl RecordingCredentialStore {
    pub fn keys(&self) -> Vec<(String, Vec<u8>)> {
        self.keys.borrow().clone()
    }
}

impl CredentialStore for RecordingCredentialStore {
    fn add_ssh_public_key(&self, slot: &str, key: &[u8]) -> Result<()> {
        self.keys
            .borrow_mut()
            .push((slot.to_string(), key.to_vec()));
        Ok(())
    }
}

/// Kubeconfig builder that records what it built and wrote.
#[derive(Debug, Default)]
pub struct RecordingKubeconfig {
    built: RefCell<Vec<(KubeconfigIdentity, Endpoint)>>,
    written: RefCell<Vec<(KubeconfigDocument, MergePolicy)>>,
}

impl RecordingKubeconfig {
    pub fn built(&self) -> Vec<(KubeconfigIdentity, Endpoint)> {
        self.built.borrow().clone()
    }

    pub fn written(&self) -> Vec<(KubeconfigDocument, MergePolicy)> {
        self.written.borrow().clone()
    }
}

impl KubeconfigBuilder for RecordingKubeconfig {
    fn build(
        &self,
        cluster: &Cluster,
        identity: &KubeconfigIdentity,
        endpoint: Endpoint,
    ) -> Result<KubeconfigDocument> {
        self.built
            .borrow_mut()
            .push((identity.clone(), endpoint));
        Ok(build_document(
            cluster,
            identity,
            endpoint,
            &["converge-credential".to_string()],
            None,
        ))
    }

    fn write(&self, doc: &KubeconfigDocument, merge: &MergePolicy) -> Result<()> {
        self.written
            .borrow_mut()
            .push((doc.clone(), merge.clone()));
        Ok(())
    }
}

/// Context store listing a fixed set of names.
#[derive(Debug, Default)]
pub struct StaticContexts {
    names: Vec<String>,
}

impl StaticContexts {
    pub fn new<const N: usize>(names: [&str; N]) -> Self {
        Self {
            names: names.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl ContextStore for StaticContexts {
    fn list_contexts(&self) -> Result<Vec<String>> {
        Ok(self.names.clone())
    }
}

/// Context store whose lookup always fails.
#[derive(Debug, Default)]
pub struct FailingContexts;

impl ContextStore for FailingContexts {
    fn list_contexts(&self) -> Result<Vec<String>> {
        Err(anyhow!("kubeconfig is unreadable"))
    }
}
