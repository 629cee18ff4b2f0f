use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keeps edits inside the add-on root.
#[derive(Debug, Clone)]
pub struct AddonGuard {
    /// Canonical add-on root
    root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside the add-on directory: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl AddonGuard {
    /// Create a guard for `root`, canonicalized so symlinked roots compare correctly.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    /// Resolve a target file and check it is safe to edit.
    ///
    /// Relative paths are taken against the root. Returns the canonical path.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let canonical = absolute.canonicalize()?;
        self.check_canonical(&canonical)?;
        if !canonical.is_file() {
            return Err(SafetyError::NotAFile(canonical));
        }
        Ok(canonical)
    }

    /// Re-check a previously validated path right before writing to it.
    pub fn revalidate(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        let canonical = path.canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: canonical.to_path_buf(),
                root: self.root.clone(),
            });
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
