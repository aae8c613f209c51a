//! Cluster convergence driver.
//!
//! Turns an operator's `update` invocation into one engine run that brings
//! live infrastructure in line with the declared cluster, then exports a
//! kubeconfig and tells the operator what to do next.
//!
//! - **[`core`]**: Pure, deterministic logic (flag parsing, plan resolution,
//!   kubeconfig decisions, operator text). No I/O.
//! - **[`io`]**: Side-effecting adapters (state directory, engine process,
//!   kubectl). Reached through traits so tests can substitute fakes.
//!
//! [`update`] and [`bootstrap`] orchestrate the two for the CLI.

pub mod bootstrap;
pub mod cancel;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod update;
