/// Staff directory database models
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row};

pub const STAFF_COLUMNS: &str = "id, name, email, department, image, courses, qualification, \
     office, counselling_hours, phone_number, bio, specialization, years_of_experience, \
     is_active, created_at, updated_at";

/// Staff member record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub image: String,
    pub courses: Vec<String>,
    pub qualification: String,
    pub office: String,
    pub counselling_hours: String,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub specialization: Vec<String>,
    pub years_of_experience: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn decode_list(raw: &str) -> AppResult<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(format!("Corrupt staff list column: {}", e)))
}

/// Encode a string list for a JSON TEXT column
pub fn encode_list(items: &[String]) -> String {
    serde_json::Value::from(items.to_vec()).to_string()
}

impl StaffMember {
    /// Decode a row selected with [`STAFF_COLUMNS`]
    pub fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let courses: String = row.try_get("courses")?;
        let specialization: String = row.try_get("specialization")?;

        Ok(StaffMember {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            department: row.try_get("department")?,
            image: row.try_get("image")?,
            courses: decode_list(&courses)?,
            qualification: row.try_get("qualification")?,
            office: row.try_get("office")?,
            counselling_hours: row.try_get("counselling_hours")?,
            phone_number: row.try_get("phone_number")?,
            bio: row.try_get("bio")?,
            specialization: decode_list(&specialization)?,
            years_of_experience: row.try_get("years_of_experience")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_encoding() {
        let encoded = encode_list(&["Algorithms".to_string(), "Data \"Mining\"".to_string()]);
        assert_eq!(decode_list(&encoded).unwrap().len(), 2);
        assert_eq!(encode_list(&[]), "[]");
        assert!(decode_list("not json").is_err());
    }
}
