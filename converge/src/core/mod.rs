//! Deterministic, pure logic of the convergence driver.
//!
//! Core modules must be free of I/O side effects. They turn flags and
//! cluster state into plans, decisions and message text, and return
//! deterministic outputs suitable for tests.

pub mod cluster;
pub mod duration;
pub mod error;
pub mod kubeconfig;
pub mod lifecycle;
pub mod narrative;
pub mod phase;
pub mod plan;
pub mod target;
pub mod types;
