// Staged upload with guaranteed release

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Import file held by a sync job.
///
/// An owned upload is deleted exactly once: either by an explicit
/// [`UploadedFile::release`] or when the guard is dropped.
#[derive(Debug)]
pub struct UploadedFile {
    path: PathBuf,
    owned: bool,
    released: bool,
}

impl UploadedFile {
    /// Take ownership of a staged file; it is deleted on release
    pub fn owned(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: true,
            released: false,
        }
    }

    /// Reference a file the job must not delete
    pub fn detached(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: false,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the file. Returns true only on the call that actually released it.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        if !self.owned {
            return true;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Released upload");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Upload already gone");
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to delete upload");
            }
        }
        true
    }
}

impl Drop for UploadedFile {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_file_deleted_once() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (_, path) = file.keep().unwrap();

        let mut upload = UploadedFile::owned(&path);
        assert!(path.exists());
        assert!(upload.release());
        assert!(!path.exists());
        assert!(!upload.release());
    }

    #[test]
    fn test_drop_releases_owned_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (_, path) = file.keep().unwrap();

        {
            let _upload = UploadedFile::owned(&path);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_detached_file_is_kept() {
        let file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut upload = UploadedFile::detached(file.path());
            assert!(upload.release());
        }
        assert!(file.path().exists());
    }
}
