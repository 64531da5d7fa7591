//! Sibling backup copies taken before a source file is rewritten.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use localekit_shared::{LocalekitError, Result, content_hash};

/// A verified copy of a file, made before editing it.
#[derive(Debug, Clone)]
pub struct Backup {
    /// The file that was copied.
    pub original: PathBuf,
    /// Where the copy lives.
    pub backup: PathBuf,
    /// SHA-256 of the copied bytes.
    pub hash: String,
}

/// `<file><suffix>`, e.g. `Auth.tsx.backup`.
pub fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Copy `path` to its backup sibling and check the copy is byte-identical.
/// An existing backup is overwritten.
pub fn create_backup(path: &Path, suffix: &str) -> Result<Backup> {
    if suffix.is_empty() {
        return Err(LocalekitError::validation("backup suffix must not be empty"));
    }
    let bytes = std::fs::read(path).map_err(|e| LocalekitError::io(path, e))?;
    let hash = content_hash(&bytes);

    let target = backup_path(path, suffix);
    std::fs::copy(path, &target).map_err(|e| LocalekitError::io(&target, e))?;

    let backup = Backup {
        original: path.to_path_buf(),
        backup: target,
        hash,
    };
    if !backup.verify()? {
        return Err(LocalekitError::validation(format!(
            "backup {} does not match {}",
            backup.backup.display(),
            path.display()
        )));
    }
    info!(backup = %backup.backup.display(), "created backup");
    Ok(backup)
}

impl Backup {
    /// Whether the backup file still hashes to the recorded digest.
    pub fn verify(&self) -> Result<bool> {
        let bytes = std::fs::read(&self.backup).map_err(|e| LocalekitError::io(&self.backup, e))?;
        Ok(content_hash(&bytes) == self.hash)
    }

    /// Replace the original with a copy of the backup.
    ///
    /// The copy is staged beside the original and renamed into place, so
    /// the path ends up a regular file even if it no longer was one.
    pub fn restore(&self) -> Result<()> {
        warn!(path = %self.original.display(), "restoring from backup");
        let staging = backup_path(&self.original, ".restoring");
        std::fs::copy(&self.backup, &staging).map_err(|e| LocalekitError::io(&staging, e))?;
        std::fs::rename(&staging, &self.original)
            .map_err(|e| LocalekitError::io(&self.original, e))?;
        Ok(())
    }
}
