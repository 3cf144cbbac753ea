//! Document storage on local disk. Files are written under the configured
//! upload directory with a generated name; the original filename only lives
//! in the database.

use std::path::{Path, PathBuf};

use anyhow::Context;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: upload_dir.into(),
        }
    }

    pub async fn ensure_root(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create upload dir {}", self.root.display()))?;
        Ok(())
    }

    /// Pick a storage filename keeping the original extension.
    pub fn generate_filename(original_name: &str) -> String {
        match Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(char::is_alphanumeric))
        {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_lowercase()),
            None => Uuid::new_v4().to_string(),
        }
    }

    fn resolve(&self, filename: &str) -> ApiResult<PathBuf> {
        // storage names are generated; anything with a path separator is hostile
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(ApiError::BadRequest("Invalid filename".into()));
        }
        Ok(self.root.join(filename))
    }

    pub async fn save(&self, filename: &str, bytes: &[u8]) -> ApiResult<()> {
        let path = self.resolve(filename)?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub async fn read(&self, filename: &str) -> ApiResult<Vec<u8>> {
        let path = self.resolve(filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ApiError::NotFound("Stored file not found".into()))
            }
            Err(e) => Err(ApiError::Internal(anyhow::anyhow!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Missing files are fine; the database row is the source of truth and
    /// may outlive the file.
    pub async fn delete(&self, filename: &str) -> ApiResult<()> {
        let path = self.resolve(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::Internal(anyhow::anyhow!(
                "Failed to delete {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_keep_extension() {
        let name = Storage::generate_filename("site plan.PDF");
        assert!(name.ends_with(".pdf"));
        assert_ne!(name, Storage::generate_filename("site plan.PDF"));
    }

    #[test]
    fn generated_names_drop_odd_extensions() {
        let name = Storage::generate_filename("archive.tar.gz/../etc");
        assert!(!name.contains('/'));
        let bare = Storage::generate_filename("no-extension");
        assert_eq!(bare.len(), 36); // bare uuid
    }

    #[test]
    fn traversal_names_rejected() {
        let storage = Storage::new("uploads");
        assert!(storage.resolve("../secrets").is_err());
        assert!(storage.resolve("a/b").is_err());
        assert!(storage.resolve("ok.pdf").is_ok());
    }

    #[test]
    fn save_read_delete_round_trip() {
        let dir = std::env::temp_dir().join(format!("lotworks-storage-{}", Uuid::new_v4()));
        let storage = Storage::new(&dir);
        tokio_test::block_on(async {
            storage.ensure_root().await.unwrap();
            storage.save("doc.pdf", b"%PDF-1.4").await.unwrap();
            assert_eq!(storage.read("doc.pdf").await.unwrap(), b"%PDF-1.4");
            storage.delete("doc.pdf").await.unwrap();
            assert!(matches!(
                storage.read("doc.pdf").await,
                Err(ApiError::NotFound(_))
            ));
            // deleting a missing file is not an error
            storage.delete("doc.pdf").await.unwrap();
        });
        std::fs::remove_dir_all(&dir).ok();
    }
}
