/// Chat message database models
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

pub const CHAT_MESSAGE_COLUMNS: &str = "id, room_id, department, semester, message, user_id, \
     user_name, user_email, message_type, file_url, file_name, reply_to, is_deleted, deleted_at, \
     created_at, updated_at";

/// Text shown in place of a deleted message
pub const DELETED_MESSAGE_TEXT: &str = "This message was deleted";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "file" => Ok(MessageType::File),
            _ => Err(AppError::Validation(format!("Invalid message type: {}", s))),
        }
    }
}

/// Chat message record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub department: String,
    pub semester: String,
    pub message: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub reply_to: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Decode a row selected with [`CHAT_MESSAGE_COLUMNS`]
    pub fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let message_type: String = row.try_get("message_type")?;

        Ok(ChatMessage {
            id: row.try_get("id")?,
            room_id: row.try_get("room_id")?,
            department: row.try_get("department")?,
            semester: row.try_get("semester")?,
            message: row.try_get("message")?,
            user_id: row.try_get("user_id")?,
            user_name: row.try_get("user_name")?,
            user_email: row.try_get("user_email")?,
            message_type: MessageType::parse(&message_type)?,
            file_url: row.try_get("file_url")?,
            file_name: row.try_get("file_name")?,
            reply_to: row.try_get("reply_to")?,
            is_deleted: row.try_get("is_deleted")?,
            deleted_at: row.try_get("deleted_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
