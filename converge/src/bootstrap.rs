//! Pre-convergence actions that mutate the state store.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::narrative::ssh_key_deprecation_notice;
use crate::io::credentials::{CredentialStore, SSH_PRIMARY_SLOT};
use crate::io::paths::expand_home;

/// Import a public key passed through the deprecated `--ssh-public-key` flag.
///
/// Writes the deprecation notice to `out` before touching the file. Any
/// failure aborts the update before the engine runs.
pub fn import_legacy_ssh_key<S: CredentialStore + ?Sized>(
    path: &Path,
    cluster_name: &str,
    cluster_tool: Option<&str>,
    store: &S,
    out: &mut dyn Write,
) -> Result<()> {
    out.write_all(ssh_key_deprecation_notice(cluster_name, cluster_tool).as_bytes())
        .context("write deprecation notice")?;

    let expanded = expand_home(path)?;
    let key = fs::read(&expanded)
        .with_context(|| format!("error reading SSH key file {}", expanded.display()))?;
    store
        .add_ssh_public_key(SSH_PRIMARY_SLOT, &key)
        .context("error adding SSH public key")?;
    info!(path = %expanded.display(), slot = SSH_PRIMARY_SLOT, "imported SSH public key");
    Ok(())
}
