// Upload staging: copies user files into the daemon's upload directory

use contactsync_core::domain::UploadedFile;
use contactsync_core::{Result, SyncError};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Replace anything outside `[A-Za-z0-9._-]` and strip leading dots
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.csv".to_string()
    } else {
        cleaned.to_string()
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Copy `source` to `target`, removing whatever was written if the copy fails
async fn copy_or_discard(source: &Path, target: &Path) -> std::io::Result<u64> {
    match tokio::fs::copy(source, target).await {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            match tokio::fs::remove_file(target).await {
                Ok(()) => {}
                Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                Err(cleanup) => {
                    warn!(target = %target.display(), error = %cleanup, "Failed to remove partial upload")
                }
            }
            Err(e)
        }
    }
}

/// Owns the upload directory
#[derive(Debug, Clone)]
pub struct UploadStaging {
    dir: PathBuf,
}

impl UploadStaging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `source` to `<dir>/<uuid>-<sanitized name>`.
    ///
    /// The returned guard deletes the staged copy; the caller's file is
    /// never touched.
    pub async fn stage(&self, source: &Path) -> Result<UploadedFile> {
        if !is_csv(source) {
            return Err(SyncError::Validation(
                "Please upload a CSV file exported from LinkedIn".to_string(),
            ));
        }
        match tokio::fs::metadata(source).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return Err(SyncError::Validation(format!(
                    "File not found: {}",
                    source.display()
                )))
            }
        }

        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(sanitize_file_name)
            .unwrap_or_else(|| "upload.csv".to_string());
        let target = self.dir.join(format!("{}-{}", Uuid::new_v4(), name));

        tokio::fs::create_dir_all(&self.dir).await?;
        copy_or_discard(source, &target).await?;
        info!(source = %source.display(), staged = %target.display(), "Staged upload");

        Ok(UploadedFile::owned(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Connections.csv"), "Connections.csv");
        assert_eq!(sanitize_file_name("my export (1).csv"), "my_export__1_.csv");
        assert_eq!(sanitize_file_name("../../etc.csv"), "_.._etc.csv");
        assert_eq!(sanitize_file_name("..."), "upload.csv");
    }

    #[tokio::test]
    async fn test_failed_copy_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("staged.csv");
        std::fs::write(&target, "First Name,La").unwrap();

        let result = copy_or_discard(&dir.path().join("vanished.csv"), &target).await;
        assert!(result.is_err());
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_stage_copies_and_releases() {
        let src_dir = tempfile::tempdir().unwrap();
        let upload_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("Connections.csv");
        std::fs::write(&source, "First Name,Last Name\n").unwrap();

        let staging = UploadStaging::new(upload_dir.path().join("uploads"));
        let mut upload = staging.stage(&source).await.unwrap();

        let staged = upload.path().to_path_buf();
        assert!(staged.starts_with(staging.dir()));
        assert!(staged
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with("-Connections.csv"));
        assert_eq!(std::fs::read_to_string(&staged).unwrap(), "First Name,Last Name\n");

        assert!(upload.release());
        assert!(!staged.exists());
        assert!(source.exists(), "original is left in place");
    }

    #[tokio::test]
    async fn test_rejects_non_csv() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("contacts.xlsx");
        std::fs::write(&source, "x").unwrap();

        let err = UploadStaging::new(dir.path()).stage(&source).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadStaging::new(dir.path())
            .stage(&dir.path().join("gone.CSV"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }
}
