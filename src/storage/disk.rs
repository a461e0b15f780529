/// Disk-based object storage backend
use crate::{
    error::{AppError, AppResult},
    storage::{sanitize_file_name, ObjectStorage, StoredObject},
};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Disk storage backend
///
/// Stores files on the local filesystem with directory sharding based on
/// the generated key prefix, and reports URLs under a public base URL.
#[derive(Clone)]
pub struct DiskObjectStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl DiskObjectStorage {
    pub fn new(base_path: PathBuf, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Relative key for a new object: {first2chars}/{uuid}-{name}
    fn new_key(file_name: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("{}/{}-{}", &id[0..2], id, sanitize_file_name(file_name))
    }

    /// Resolve a relative key, refusing anything that escapes the base directory
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));

        if key.is_empty() || escapes {
            return Err(AppError::Storage(format!("Invalid storage path: {}", key)));
        }

        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for DiskObjectStorage {
    async fn store(&self, data: Vec<u8>, file_name: &str) -> AppResult<StoredObject> {
        let key = Self::new_key(file_name);
        let path = self.resolve(&key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Storage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", key, e)))?;

        tracing::debug!(path = %key, "Stored object");

        Ok(StoredObject {
            url: format!("{}/{}", self.public_base_url, key),
            path: key,
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete {}: {}", key, e))),
        }
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_store_and_delete() {
        let dir = tempdir().unwrap();
        let storage = DiskObjectStorage::new(dir.path().to_path_buf(), "http://files.test/");

        let stored = storage.store(b"lecture".to_vec(), "week 1.pdf").await.unwrap();
        assert!(stored.url.starts_with("http://files.test/"));
        assert!(stored.path.ends_with("-week_1.pdf"));

        let on_disk = dir.path().join(&stored.path);
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"lecture");

        storage.delete(&stored.path).await.unwrap();
        assert!(!on_disk.exists());

        // Deleting twice is fine
        storage.delete(&stored.path).await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_sharding() {
        let dir = tempdir().unwrap();
        let storage = DiskObjectStorage::new(dir.path().to_path_buf(), "http://files.test");

        let stored = storage.store(b"x".to_vec(), "a.txt").await.unwrap();
        let (shard, rest) = stored.path.split_once('/').unwrap();
        assert_eq!(shard.len(), 2);
        assert!(rest.starts_with(shard));
    }

    #[tokio::test]
    async fn test_delete_rejects_traversal() {
        let dir = tempdir().unwrap();
        let storage = DiskObjectStorage::new(dir.path().to_path_buf(), "http://files.test");

        assert!(storage.delete("../outside.txt").await.is_err());
        assert!(storage.delete("/etc/passwd").await.is_err());
    }

    #[test]
    fn test_path_for_url() {
        let storage = DiskObjectStorage::new(PathBuf::from("/tmp"), "http://files.test");

        assert_eq!(
            storage.path_for_url("http://files.test/ab/abc-notes.pdf"),
            Some("ab/abc-notes.pdf".to_string())
        );
        assert_eq!(storage.path_for_url("https://elsewhere.test/x.png"), None);
        assert_eq!(storage.path_for_url("http://files.test/"), None);
    }
}
