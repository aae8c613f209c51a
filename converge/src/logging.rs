//! Diagnostic tracing for the driver.
//!
//! Diagnostics go to stderr and are controlled by `RUST_LOG`. Operator
//! guidance (dry-run reports, next steps) is written to stdout by the
//! commands themselves and is never affected by the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset, so advisories such as a
/// credential-less kubeconfig still reach the operator.
///
/// # Example
/// ```bash
/// RUST_LOG=converge=debug converge update k8s.example.com --yes
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
