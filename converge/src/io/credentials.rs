//! Credential store for SSH public keys.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// Well-known slot of the primary SSH key.
pub const SSH_PRIMARY_SLOT: &str = "admin";

/// Persistence for named SSH public keys.
pub trait CredentialStore {
    fn add_ssh_public_key(&self, slot: &str, key: &[u8]) -> Result<()>;
}

/// Stores keys under `<cluster dir>/secrets/sshpublickey/<slot>`.
#[derive(Debug, Clone)]
pub struct FsCredentialStore {
    dir: PathBuf,
}

impl FsCredentialStore {
    pub fn new(cluster_dir: &Path) -> Self {
        Self {
            dir: cluster_dir.join("secrets").join("sshpublickey"),
        }
    }

    pub fn key_path(&self, slot: &str) -> PathBuf {
        self.dir.join(slot)
    }
}

impl CredentialStore for FsCredentialStore {
    fn add_ssh_public_key(&self, slot: &str, key: &[u8]) -> Result<()> {
        validate_slot(slot)?;
        let text = std::str::from_utf8(key).context("SSH public key is not valid UTF-8")?;
        let line = text.trim();
        if line.is_empty() || line.lines().count() != 1 {
            return Err(anyhow!("SSH public key must be a single non-empty line"));
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create directory {}", self.dir.display()))?;
        let path = self.key_path(slot);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, format!("{line}\n"))
            .with_context(|| format!("write temp key {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("replace key {}", path.display()))?;
        debug!(slot, path = %path.display(), "stored SSH public key");
        Ok(())
    }
}

fn validate_slot(slot: &str) -> Result<()> {
    if slot.is_empty()
        || slot
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
    {
        return Err(anyhow!("invalid credential slot {slot:?}"));
    }
    Ok(())
}
