//! Home-relative path expansion.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Expand a leading `~` or `~/` to the current user's home directory.
///
/// Other paths are returned unchanged; `~user` forms are not supported.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(rest))
}
