//! Staged manifest writing
//!
//! The compiler writes into a staging file next to the output manifest. The
//! staging file is seeded with the current manifest, so existing pins stay
//! stable. `pip-compile` replaces it by rename, so after compilation it may
//! belong to the environment's user; committing copies the verified content
//! into a fresh host-owned file and renames that over the output. Dropping an
//! uncommitted stage deletes it, which leaves the output manifest untouched
//! on every failure path.

use crate::error::ManifestError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Writer for one output manifest
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    path: PathBuf,
}

/// Outcome of committing a staged manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The output file was replaced
    Written,
    /// The staged content matched the current file; nothing was touched
    Unchanged,
}

impl ManifestWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current manifest content, or None when the file does not exist yet
    pub fn read_current(&self) -> Result<Option<String>, ManifestError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ManifestError::read_error(&self.path, e)),
        }
    }

    /// Create a staging file beside the output, seeded with `seed`
    pub fn stage(&self, seed: Option<&str>) -> Result<StagedManifest, ManifestError> {
        let mut file = sibling_tempfile(&self.path, ".staged")?;
        if let Some(seed) = seed {
            file.write_all(seed.as_bytes())
                .and_then(|()| file.flush())
                .map_err(|e| ManifestError::write_error(file.path(), e))?;
        }
        // The compiler reads the seed as the environment's user
        set_mode(file.path(), 0o644).map_err(|e| ManifestError::write_error(file.path(), e))?;

        tracing::debug!(path = %file.path().display(), "staged manifest");
        Ok(StagedManifest {
            file,
            target: self.path.clone(),
        })
    }
}

/// Temporary file in the directory of `target`, named after it
fn sibling_tempfile(target: &Path, suffix: &str) -> Result<NamedTempFile, ManifestError> {
    let dir = target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = format!(
        ".{}.",
        target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    );

    tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|e| ManifestError::write_error(target, e))
}

/// A staging file waiting to replace the output manifest
#[derive(Debug)]
pub struct StagedManifest {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedManifest {
    /// Location of the staging file on the host
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read what the compiler left in the staging file
    pub fn read(&self) -> Result<String, ManifestError> {
        fs::read_to_string(self.file.path()).map_err(|e| ManifestError::read_error(self.file.path(), e))
    }

    /// Atomically replace the output manifest, unless the content is identical
    pub fn commit(self, current: Option<&str>) -> Result<CommitOutcome, ManifestError> {
        let staged = self.read()?;
        if current == Some(staged.as_str()) {
            return Ok(CommitOutcome::Unchanged);
        }

        let mut output = sibling_tempfile(&self.target, ".tmp")?;
        output
            .write_all(staged.as_bytes())
            .and_then(|()| output.flush())
            .map_err(|e| ManifestError::write_error(output.path(), e))?;
        let mode = existing_mode(&self.target).unwrap_or(0o644);
        set_mode(output.path(), mode).map_err(|e| ManifestError::write_error(output.path(), e))?;
        output
            .persist(&self.target)
            .map_err(|e| ManifestError::write_error(&self.target, e.error))?;
        tracing::info!(path = %self.target.display(), "manifest written");
        Ok(CommitOutcome::Written)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn existing_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).ok().map(|meta| meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn existing_mode(_path: &Path) -> Option<u32> {
    None
}
