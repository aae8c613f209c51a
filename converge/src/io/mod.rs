//! Side-effecting adapters: filesystem state, child processes and the
//! collaborators the update flow talks to through traits.

pub mod cluster_store;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod kubeconfig;
pub mod paths;
pub mod process;
