/// Object storage for uploaded files
///
/// Resource files and staff images are written through an [`ObjectStorage`]
/// backend which hands back a public URL and a backend-relative path. The
/// path is what gets persisted and later released on rejection or deletion.

pub mod disk;
pub mod uploads;

pub use disk::DiskObjectStorage;
pub use uploads::UploadLedger;

use crate::error::AppResult;
use async_trait::async_trait;
use serde::Serialize;

/// Location of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    /// Publicly reachable URL
    pub url: String,
    /// Backend-relative path, used for deletion
    pub path: String,
}

/// Object storage backend trait
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store bytes under a name derived from `file_name`
    async fn store(&self, data: Vec<u8>, file_name: &str) -> AppResult<StoredObject>;

    /// Delete an object by its backend path. Missing objects are not an error.
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// Map a public URL back to a backend path, if the URL belongs to this store
    fn path_for_url(&self, url: &str) -> Option<String>;
}

/// Reduce an uploaded file name to a safe storage key suffix
pub fn sanitize_file_name(file_name: &str) -> String {
    let name = file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name);

    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory storage double

    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    pub struct MemoryObjectStorage {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        deleted: Mutex<Vec<String>>,
        fail_deletes: bool,
        delete_delay: Option<Duration>,
    }

    impl MemoryObjectStorage {
        pub fn new() -> Self {
            Self::default()
        }

        /// Storage whose deletes always fail
        pub fn failing_deletes() -> Self {
            Self {
                fail_deletes: true,
                ..Self::default()
            }
        }

        /// Storage whose deletes take `delay` to complete
        pub fn slow_deletes(delay: Duration) -> Self {
            Self {
                delete_delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn contains(&self, path: &str) -> bool {
            self.objects.lock().unwrap().contains_key(path)
        }

        pub fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStorage for MemoryObjectStorage {
        async fn store(&self, data: Vec<u8>, file_name: &str) -> AppResult<StoredObject> {
            let path = format!("{}-{}", uuid::Uuid::new_v4(), sanitize_file_name(file_name));
            self.objects.lock().unwrap().insert(path.clone(), data);
            Ok(StoredObject {
                url: format!("memory://{}", path),
                path,
            })
        }

        async fn delete(&self, path: &str) -> AppResult<()> {
            if let Some(delay) = self.delete_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_deletes {
                return Err(AppError::Storage("delete refused".to_string()));
            }
            self.objects.lock().unwrap().remove(path);
            self.deleted.lock().unwrap().push(path.to_string());
            Ok(())
        }

        fn path_for_url(&self, url: &str) -> Option<String> {
            url.strip_prefix("memory://").map(str::to_string)
        }
    }
}
