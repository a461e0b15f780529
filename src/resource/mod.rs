/// Shared course resources and their moderation
///
/// Submissions start out pending and are reviewed exactly once by an
/// admin. Review transitions are conditional updates on `status = 'pending'`,
/// so two concurrent reviews cannot both succeed.

mod manager;

pub use manager::ResourceManager;

use crate::db::resource::Resource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Value of a listing filter that disables it
pub const ALL_FILTER: &str = "All";

/// Resource submission request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResourceRequest {
    #[validate(length(min = 1, max = 200, message = "Course name is required"))]
    pub course_name: String,
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "Description is required"))]
    pub description: String,
    pub resource_type: String,
    #[validate(length(min = 1, message = "Department is required"))]
    pub department: String,
    #[validate(length(min = 1, message = "Semester is required"))]
    pub semester: String,
    #[validate(length(min = 1, message = "Section is required"))]
    pub section: String,
    #[validate(length(min = 1, message = "Batch is required"))]
    pub batch: String,
    #[validate(range(min = 2000, max = 2100, message = "Year is out of range"))]
    pub year: i64,
    #[validate(length(min = 1, message = "File name is required"))]
    pub file_name: String,
    #[validate(length(min = 1, message = "File URL is required"))]
    pub file_url: String,
    #[validate(length(min = 1, message = "File size is required"))]
    pub file_size: String,
    #[validate(length(min = 1, message = "File type is required"))]
    pub file_type: String,
    #[validate(range(min = 0))]
    pub pages: Option<i64>,
    pub thumbnail_url: Option<String>,
}

/// Filters for the approved listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFilter {
    pub search: Option<String>,
    pub year: Option<String>,
    pub resource_type: Option<String>,
    pub section: Option<String>,
    pub batch: Option<String>,
    pub department: Option<String>,
    pub semester: Option<String>,
}

/// Approved resources keyed by year
#[derive(Debug, Clone, Serialize)]
pub struct YearListing {
    pub count: usize,
    pub resources: BTreeMap<i64, Vec<Resource>>,
}

/// A submitter's resources split by status
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusGroups {
    pub pending: Vec<Resource>,
    pub approved: Vec<Resource>,
    pub rejected: Vec<Resource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyResources {
    pub count: usize,
    pub resources: StatusGroups,
}

/// Totals across every resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceStats {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

/// Admin dashboard listing
#[derive(Debug, Clone, Serialize)]
pub struct AdminListing {
    pub stats: ResourceStats,
    pub resources: Vec<Resource>,
}

/// Rejection request
#[derive(Debug, Clone, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}
