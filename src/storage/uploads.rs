/// Ownership records for uploaded objects
///
/// Every object stored through `/api/files` is recorded with the account
/// that uploaded it. Resources may only reference objects their submitter
/// owns, so one account can never release another account's file.
use crate::{error::AppResult, storage::StoredObject};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

#[derive(Clone)]
pub struct UploadLedger {
    db: SqlitePool,
}

impl UploadLedger {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record a freshly stored object
    pub async fn record(&self, object: &StoredObject, owner: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO upload (path, url, uploaded_by, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&object.path)
        .bind(&object.url)
        .bind(owner)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Account that uploaded the object at `path`
    pub async fn owner_of(&self, path: &str) -> AppResult<Option<String>> {
        let row = sqlx::query("SELECT uploaded_by FROM upload WHERE path = ?1")
            .bind(path)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|row| row.get("uploaded_by")))
    }

    /// Drop the record once the object itself is gone
    pub async fn forget(&self, path: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM upload WHERE path = ?1")
            .bind(path)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
