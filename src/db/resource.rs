/// Resource database models
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

pub const RESOURCE_COLUMNS: &str = "id, course_name, title, description, resource_type, department, \
     semester, section, batch, year, file_name, file_url, storage_path, file_size, file_type, \
     pages, thumbnail_url, uploaded_by, uploader_name, uploader_email, status, rejection_reason, \
     reviewed_by, reviewed_at, download_count, view_count, created_at, updated_at";

/// Moderation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Pending,
    Approved,
    Rejected,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Pending => "pending",
            ResourceStatus::Approved => "approved",
            ResourceStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ResourceStatus::Pending),
            "approved" => Ok(ResourceStatus::Approved),
            "rejected" => Ok(ResourceStatus::Rejected),
            _ => Err(AppError::Validation(format!("Invalid status: {}", s))),
        }
    }
}

/// Kind of course material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Assignments,
    Quizzes,
    Projects,
    Presentations,
    Notes,
    #[serde(rename = "Past Papers")]
    PastPapers,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Assignments,
        ResourceType::Quizzes,
        ResourceType::Projects,
        ResourceType::Presentations,
        ResourceType::Notes,
        ResourceType::PastPapers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Assignments => "Assignments",
            ResourceType::Quizzes => "Quizzes",
            ResourceType::Projects => "Projects",
            ResourceType::Presentations => "Presentations",
            ResourceType::Notes => "Notes",
            ResourceType::PastPapers => "Past Papers",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Validation(format!("Invalid resource type: {}", s)))
    }
}

/// Resource record in the database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub course_name: String,
    pub title: String,
    pub description: String,
    pub resource_type: ResourceType,
    pub department: String,
    pub semester: String,
    pub section: String,
    pub batch: String,
    pub year: i64,
    pub file_name: String,
    pub file_url: String,
    #[serde(skip_serializing)]
    pub storage_path: Option<String>,
    pub file_size: String,
    pub file_type: String,
    pub pages: i64,
    pub thumbnail_url: Option<String>,
    pub uploaded_by: String,
    pub uploader_name: String,
    pub uploader_email: String,
    pub status: ResourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub download_count: i64,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// Decode a row selected with [`RESOURCE_COLUMNS`]
    pub fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let resource_type: String = row.try_get("resource_type")?;
        let status: String = row.try_get("status")?;

        Ok(Resource {
            id: row.try_get("id")?,
            course_name: row.try_get("course_name")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            resource_type: ResourceType::parse(&resource_type)?,
            department: row.try_get("department")?,
            semester: row.try_get("semester")?,
            section: row.try_get("section")?,
            batch: row.try_get("batch")?,
            year: row.try_get("year")?,
            file_name: row.try_get("file_name")?,
            file_url: row.try_get("file_url")?,
            storage_path: row.try_get("storage_path")?,
            file_size: row.try_get("file_size")?,
            file_type: row.try_get("file_type")?,
            pages: row.try_get("pages")?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            uploaded_by: row.try_get("uploaded_by")?,
            uploader_name: row.try_get("uploader_name")?,
            uploader_email: row.try_get("uploader_email")?,
            status: ResourceStatus::parse(&status)?,
            rejection_reason: row.try_get("rejection_reason")?,
            reviewed_by: row.try_get("reviewed_by")?,
            reviewed_at: row.try_get("reviewed_at")?,
            download_count: row.try_get("download_count")?,
            view_count: row.try_get("view_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
