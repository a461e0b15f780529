/// Staff directory
///
/// Public listing of faculty members with search and pagination. Writes are
/// restricted to admins at the HTTP layer.

mod directory;

pub use directory::StaffDirectory;

use crate::{
    db::staff::StaffMember,
    error::{AppError, AppResult},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Departments a staff member can belong to
pub const DEPARTMENTS: [&str; 10] = [
    "Computer Science",
    "Business Administration",
    "Engineering",
    "Mathematics",
    "Physics",
    "Chemistry",
    "English",
    "Economics",
    "Law",
    "Medicine",
];

pub const DEFAULT_STAFF_IMAGE: &str =
    "https://images.unsplash.com/photo-1472099645785-5658abf4ff4e?w=400&h=400&fit=crop";

pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub fn validate_department(department: &str) -> AppResult<()> {
    if DEPARTMENTS.contains(&department) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid department: {}",
            department
        )))
    }
}

/// New staff member
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub department: String,
    pub image: Option<String>,
    #[serde(default)]
    pub courses: Vec<String>,
    #[validate(length(min = 1, message = "Qualification is required"))]
    pub qualification: String,
    #[validate(length(min = 1, message = "Office location is required"))]
    pub office: String,
    #[validate(length(min = 1, message = "Counselling hours are required"))]
    pub counselling_hours: String,
    pub phone_number: Option<String>,
    #[validate(length(max = 500, message = "Bio cannot exceed 500 characters"))]
    pub bio: Option<String>,
    #[serde(default)]
    pub specialization: Vec<String>,
    #[validate(range(min = 0, message = "Years of experience cannot be negative"))]
    pub years_of_experience: Option<i64>,
    pub is_active: Option<bool>,
}

/// Partial staff update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStaffRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub department: Option<String>,
    pub image: Option<String>,
    pub courses: Option<Vec<String>>,
    #[validate(length(min = 1, message = "Qualification cannot be empty"))]
    pub qualification: Option<String>,
    #[validate(length(min = 1, message = "Office location cannot be empty"))]
    pub office: Option<String>,
    #[validate(length(min = 1, message = "Counselling hours cannot be empty"))]
    pub counselling_hours: Option<String>,
    pub phone_number: Option<String>,
    #[validate(length(max = 500, message = "Bio cannot exceed 500 characters"))]
    pub bio: Option<String>,
    pub specialization: Option<Vec<String>>,
    #[validate(range(min = 0, message = "Years of experience cannot be negative"))]
    pub years_of_experience: Option<i64>,
    pub is_active: Option<bool>,
}

/// Sort order for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffSort {
    Name,
    Department,
    Experience,
}

impl StaffSort {
    /// Unknown keys fall back to name order
    pub fn parse(s: &str) -> Self {
        match s.trim_start_matches('-') {
            "department" => StaffSort::Department,
            "experience" | "yearsOfExperience" => StaffSort::Experience,
            _ => StaffSort::Name,
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            StaffSort::Name => "name COLLATE NOCASE ASC",
            StaffSort::Department => "department ASC, name COLLATE NOCASE ASC",
            StaffSort::Experience => "years_of_experience DESC, name COLLATE NOCASE ASC",
        }
    }
}

/// Listing query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub department: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_staff: i64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, returned: i64, total: i64) -> Self {
        let offset = (page - 1) * limit;
        Pagination {
            current_page: page,
            total_pages: (total + limit - 1) / limit,
            total_staff: total,
            has_more: offset + returned < total,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffPage {
    pub staff: Vec<StaffMember>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(1, 6, 6, 13);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_more);

        let last = Pagination::new(3, 6, 1, 13);
        assert!(!last.has_more);

        let empty = Pagination::new(1, 6, 0, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_more);
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(StaffSort::parse("department"), StaffSort::Department);
        assert_eq!(StaffSort::parse("-yearsOfExperience"), StaffSort::Experience);
        assert_eq!(StaffSort::parse("bogus"), StaffSort::Name);
    }

    #[test]
    fn test_department_list() {
        assert!(validate_department("Physics").is_ok());
        assert!(validate_department("Astrology").is_err());
    }
}
