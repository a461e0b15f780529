/// Resource moderation workflow
use crate::{
    db::{
        account::Account,
        conflict_on_unique,
        resource::{Resource, ResourceStatus, ResourceType, RESOURCE_COLUMNS},
    },
    error::{AppError, AppResult},
    mailer::{Notification, NotificationDispatcher},
    resource::{
        AdminListing, MyResources, ResourceFilter, ResourceStats, StatusGroups,
        SubmitResourceRequest, YearListing, ALL_FILTER,
    },
    storage::{ObjectStorage, UploadLedger},
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::{collections::BTreeMap, sync::Arc};
use uuid::Uuid;
use validator::Validate;

/// Bound value in a dynamically built filter
enum FilterValue {
    Text(String),
    Int(i64),
}

/// Escape LIKE wildcards in user search input
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// A filter value is active unless missing, blank or `All`
fn active(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != ALL_FILTER)
}

/// Resource manager
pub struct ResourceManager {
    db: SqlitePool,
    storage: Arc<dyn ObjectStorage>,
    uploads: UploadLedger,
    notifier: NotificationDispatcher,
    frontend_url: String,
}

impl ResourceManager {
    pub fn new(
        db: SqlitePool,
        storage: Arc<dyn ObjectStorage>,
        notifier: NotificationDispatcher,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            uploads: UploadLedger::new(db.clone()),
            db,
            storage,
            notifier,
            frontend_url: frontend_url.into(),
        }
    }

    fn parse_rows(rows: Vec<SqliteRow>) -> AppResult<Vec<Resource>> {
        rows.iter().map(Resource::from_row).collect()
    }

    async fn find(&self, id: &str) -> AppResult<Option<Resource>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM resource WHERE id = ?1",
            RESOURCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Resource::from_row).transpose()
    }

    /// Get a resource by id
    pub async fn get(&self, id: &str) -> AppResult<Resource> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Resource not found".to_string()))
    }

    /// Error for a transition that matched no pending row
    async fn transition_miss(&self, id: &str) -> AppError {
        match self.find(id).await {
            Ok(Some(_)) => AppError::InvalidState("Resource has already been reviewed".to_string()),
            Ok(None) => AppError::NotFound("Resource not found".to_string()),
            Err(e) => e,
        }
    }

    /// Release the stored file. Failures are logged and never surface.
    async fn release_file(&self, resource: &Resource) {
        let Some(path) = resource.storage_path.as_deref() else {
            tracing::debug!(resource_id = %resource.id, "No stored file to release");
            return;
        };

        if let Err(e) = self.storage.delete(path).await {
            tracing::warn!(resource_id = %resource.id, path = %path, error = %e, "Failed to delete resource file");
            return;
        }
        if let Err(e) = self.uploads.forget(path).await {
            tracing::warn!(resource_id = %resource.id, path = %path, error = %e, "Failed to clear upload record");
        }
    }

    /// Resolve the stored object behind `file_url`. URLs outside our storage
    /// carry no object; objects inside it must belong to the submitter.
    async fn claim_path(&self, submitter: &Account, file_url: &str) -> AppResult<Option<String>> {
        let Some(path) = self.storage.path_for_url(file_url) else {
            return Ok(None);
        };

        match self.uploads.owner_of(&path).await? {
            Some(owner) if owner == submitter.id => Ok(Some(path)),
            _ => Err(AppError::Unauthorized(
                "Resources can only reference files you uploaded".to_string(),
            )),
        }
    }

    /// Submit a resource. Admin submissions are published immediately,
    /// everything else waits for review and every admin is notified.
    pub async fn submit(
        &self,
        submitter: &Account,
        request: SubmitResourceRequest,
    ) -> AppResult<Resource> {
        if !submitter.is_verified {
            return Err(AppError::Unauthorized(
                "Only verified users can upload resources. Please verify your email first."
                    .to_string(),
            ));
        }

        request.validate()?;
        let resource_type = ResourceType::parse(&request.resource_type)?;

        let now = Utc::now();
        let elevated = submitter.role.is_elevated();
        let (status, reviewed_by, reviewed_at) = if elevated {
            (ResourceStatus::Approved, Some(submitter.id.as_str()), Some(now))
        } else {
            (ResourceStatus::Pending, None, None)
        };

        let storage_path = self.claim_path(submitter, &request.file_url).await?;

        let row = sqlx::query(&format!(
            "INSERT INTO resource (id, course_name, title, description, resource_type, department,
                                   semester, section, batch, year, file_name, file_url, storage_path,
                                   file_size, file_type, pages, thumbnail_url, uploaded_by,
                                   uploader_name, uploader_email, status, reviewed_by, reviewed_at,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                     ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?24)
             RETURNING {}",
            RESOURCE_COLUMNS
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(request.course_name.trim())
        .bind(request.title.trim())
        .bind(request.description.trim())
        .bind(resource_type.as_str())
        .bind(request.department.trim())
        .bind(request.semester.trim())
        .bind(request.section.trim())
        .bind(request.batch.trim())
        .bind(request.year)
        .bind(&request.file_name)
        .bind(&request.file_url)
        .bind(&storage_path)
        .bind(&request.file_size)
        .bind(&request.file_type)
        .bind(request.pages.unwrap_or(0))
        .bind(&request.thumbnail_url)
        .bind(&submitter.id)
        .bind(&submitter.full_name)
        .bind(&submitter.email)
        .bind(status.as_str())
        .bind(reviewed_by)
        .bind(reviewed_at)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "This file is already attached to another resource"))?;

        let resource = Resource::from_row(&row)?;

        tracing::info!(
            resource_id = %resource.id,
            submitter = %submitter.id,
            status = resource.status.as_str(),
            "Resource submitted"
        );

        if !elevated {
            self.notify_admins(&resource).await;
        }

        Ok(resource)
    }

    async fn notify_admins(&self, resource: &Resource) {
        let admins = match sqlx::query("SELECT email, full_name FROM account WHERE role = 'admin'")
            .fetch_all(&self.db)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load admins for submission notice");
                return;
            }
        };

        let review_url = format!("{}/admin/pending-resources", self.frontend_url);
        for admin in admins {
            let email: String = admin.get("email");
            let name: String = admin.get("full_name");
            self.notifier.submit(Notification::resource_submitted(
                &email,
                &name,
                &resource.uploader_name,
                &resource.title,
                &resource.course_name,
                resource.resource_type.as_str(),
                &review_url,
            ));
        }
    }

    /// Approve a pending resource
    pub async fn approve(&self, id: &str, reviewer: &Account) -> AppResult<Resource> {
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "UPDATE resource
             SET status = 'approved', reviewed_by = ?1, reviewed_at = ?2, updated_at = ?2
             WHERE id = ?3 AND status = 'pending'
             RETURNING {}",
            RESOURCE_COLUMNS
        ))
        .bind(&reviewer.id)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Err(self.transition_miss(id).await);
        };
        let resource = Resource::from_row(&row)?;

        tracing::info!(resource_id = %resource.id, reviewer = %reviewer.id, "Resource approved");

        self.notifier.submit(Notification::resource_approved(
            &resource.uploader_email,
            &resource.uploader_name,
            &resource.title,
            &resource.course_name,
        ));

        Ok(resource)
    }

    /// Reject a pending resource with a reason. The stored file is released
    /// only once this call has won the transition.
    pub async fn reject(&self, id: &str, reviewer: &Account, reason: &str) -> AppResult<Resource> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation(
                "Rejection reason is required".to_string(),
            ));
        }

        let now = Utc::now();
        let row = sqlx::query(&format!(
            "UPDATE resource
             SET status = 'rejected', rejection_reason = ?1, reviewed_by = ?2, reviewed_at = ?3,
                 updated_at = ?3
             WHERE id = ?4 AND status = 'pending'
             RETURNING {}",
            RESOURCE_COLUMNS
        ))
        .bind(reason)
        .bind(&reviewer.id)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Err(self.transition_miss(id).await);
        };
        let resource = Resource::from_row(&row)?;

        tracing::info!(resource_id = %resource.id, reviewer = %reviewer.id, "Resource rejected");
        self.release_file(&resource).await;

        self.notifier.submit(Notification::resource_rejected(
            &resource.uploader_email,
            &resource.uploader_name,
            &resource.title,
            &resource.course_name,
            reason,
        ));

        Ok(resource)
    }

    /// Delete a resource and its file. Only the submitter or an admin may.
    pub async fn delete(&self, id: &str, actor: &Account) -> AppResult<()> {
        let resource = self.get(id).await?;

        if resource.uploaded_by != actor.id && !actor.role.is_elevated() {
            return Err(AppError::Unauthorized(
                "Not authorized to delete this resource".to_string(),
            ));
        }

        self.release_file(&resource).await;

        sqlx::query("DELETE FROM resource WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(resource_id = %id, actor = %actor.id, "Resource deleted");
        Ok(())
    }

    async fn increment(&self, id: &str, column: &str) -> AppResult<()> {
        let result = sqlx::query(&format!(
            "UPDATE resource SET {col} = {col} + 1 WHERE id = ?1",
            col = column
        ))
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Resource not found".to_string()));
        }
        Ok(())
    }

    pub async fn increment_download(&self, id: &str) -> AppResult<()> {
        self.increment(id, "download_count").await
    }

    pub async fn increment_view(&self, id: &str) -> AppResult<()> {
        self.increment(id, "view_count").await
    }

    /// Approved resources matching the filter, newest first, grouped by year
    pub async fn list_approved(&self, filter: &ResourceFilter) -> AppResult<YearListing> {
        let mut conditions = vec!["status = 'approved'".to_string()];
        let mut values = Vec::new();

        let exact = [
            ("department", active(&filter.department)),
            ("semester", active(&filter.semester)),
            ("resource_type", active(&filter.resource_type)),
            ("section", active(&filter.section)),
            ("batch", active(&filter.batch)),
        ];
        for (column, value) in exact {
            if let Some(value) = value {
                values.push(FilterValue::Text(value.to_string()));
                conditions.push(format!("{} = ?{}", column, values.len()));
            }
        }

        if let Some(year) = active(&filter.year) {
            let year = year
                .parse::<i64>()
                .map_err(|_| AppError::Validation(format!("Invalid year: {}", year)))?;
            values.push(FilterValue::Int(year));
            conditions.push(format!("year = ?{}", values.len()));
        }

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            values.push(FilterValue::Text(like_pattern(search)));
            let n = values.len();
            conditions.push(format!(
                "(course_name LIKE ?{n} ESCAPE '\\' OR title LIKE ?{n} ESCAPE '\\' \
                 OR description LIKE ?{n} ESCAPE '\\' OR department LIKE ?{n} ESCAPE '\\' \
                 OR semester LIKE ?{n} ESCAPE '\\')"
            ));
        }

        let sql = format!(
            "SELECT {} FROM resource WHERE {} ORDER BY created_at DESC",
            RESOURCE_COLUMNS,
            conditions.join(" AND ")
        );

        let mut query = sqlx::query(&sql);
        for value in values {
            query = match value {
                FilterValue::Text(v) => query.bind(v),
                FilterValue::Int(v) => query.bind(v),
            };
        }

        let resources = Self::parse_rows(query.fetch_all(&self.db).await?)?;
        let count = resources.len();

        let mut grouped: BTreeMap<i64, Vec<Resource>> = BTreeMap::new();
        for resource in resources {
            grouped.entry(resource.year).or_default().push(resource);
        }

        Ok(YearListing {
            count,
            resources: grouped,
        })
    }

    /// A submitter's own resources, grouped by status
    pub async fn list_mine(&self, account_id: &str) -> AppResult<MyResources> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM resource WHERE uploaded_by = ?1 ORDER BY created_at DESC",
            RESOURCE_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        let resources = Self::parse_rows(rows)?;
        let count = resources.len();

        let mut groups = StatusGroups::default();
        for resource in resources {
            match resource.status {
                ResourceStatus::Pending => groups.pending.push(resource),
                ResourceStatus::Approved => groups.approved.push(resource),
                ResourceStatus::Rejected => groups.rejected.push(resource),
            }
        }

        Ok(MyResources {
            count,
            resources: groups,
        })
    }

    /// Review queue, newest first
    pub async fn list_pending(&self) -> AppResult<Vec<Resource>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM resource WHERE status = 'pending' ORDER BY created_at DESC",
            RESOURCE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Self::parse_rows(rows)
    }

    /// Every resource (optionally one status) with overall totals
    pub async fn list_all(&self, status: Option<ResourceStatus>) -> AppResult<AdminListing> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM resource WHERE status = ?1 ORDER BY created_at DESC",
                    RESOURCE_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM resource ORDER BY created_at DESC",
                    RESOURCE_COLUMNS
                ))
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(AdminListing {
            stats: self.stats().await?,
            resources: Self::parse_rows(rows)?,
        })
    }

    /// Totals per status
    pub async fn stats(&self) -> AppResult<ResourceStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(status = 'pending'), 0) AS pending,
                    COALESCE(SUM(status = 'approved'), 0) AS approved,
                    COALESCE(SUM(status = 'rejected'), 0) AS rejected
             FROM resource",
        )
        .fetch_one(&self.db)
        .await?;

        Ok(ResourceStats {
            total: row.get("total"),
            pending: row.get("pending"),
            approved: row.get("approved"),
            rejected: row.get("rejected"),
        })
    }

    /// Approved resource counts per type for one department and semester
    pub async fn counts_by_type(
        &self,
        department: &str,
        semester: &str,
    ) -> AppResult<BTreeMap<String, i64>> {
        if department.trim().is_empty() || semester.trim().is_empty() {
            return Err(AppError::Validation(
                "Department and semester are required".to_string(),
            ));
        }

        let rows = sqlx::query(
            "SELECT resource_type, COUNT(*) AS count
             FROM resource
             WHERE department = ?1 AND semester = ?2 AND status = 'approved'
             GROUP BY resource_type",
        )
        .bind(department)
        .bind(semester)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("resource_type"), row.get("count")))
            .collect())
    }
}
