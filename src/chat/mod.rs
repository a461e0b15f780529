/// Department chat rooms
///
/// Each department and semester pair has one room. Messages are persisted
/// through [`ChatService`]; live delivery goes through the process-local
/// [`RoomRegistry`], and [`ChatConnection`] turns client events into both.

pub mod presence;
pub(crate) mod service;
mod session;

pub use presence::{Presence, RoomBroadcast, RoomRegistry};
pub use service::ChatService;
pub use session::ChatConnection;

use crate::db::chat::{ChatMessage, MessageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_MESSAGE_LIMIT: i64 = 50;
pub const MAX_MESSAGE_LIMIT: i64 = 200;
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Window within which an account counts as online
pub const ONLINE_WINDOW_MINUTES: i64 = 5;

/// Room identifier for a department and semester
pub fn room_id(department: &str, semester: &str) -> String {
    format!("{}_{}", department, semester)
}

/// New chat message
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[validate(length(min = 1, message = "Department is required"))]
    pub department: String,
    #[validate(length(min = 1, message = "Semester is required"))]
    pub semester: String,
    #[validate(length(min = 1, max = 2000, message = "Message must be 1 to 2000 characters"))]
    pub message: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub reply_to: Option<String>,
}

/// Message history query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageQuery {
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub count: usize,
    /// Oldest first
    pub messages: Vec<ChatMessage>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: i64,
}

/// Recently active account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub last_active: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnlineUsers {
    pub count: usize,
    pub users: Vec<OnlineUser>,
}

/// Events sent by chat clients
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom {
        department: String,
        semester: String,
    },
    LeaveRoom,
    #[serde(rename_all = "camelCase")]
    SendMessage {
        message: String,
        #[serde(default)]
        reply_to: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteMessage { message_id: String },
    Typing,
    StopTyping,
}

/// Events sent to chat clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    UserJoined {
        user_id: String,
        user_name: String,
        active_count: usize,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    UserLeft {
        user_id: String,
        user_name: String,
        active_count: usize,
        message: String,
    },
    ActiveUsers { count: usize, users: Vec<String> },
    ReceiveMessage(ChatMessage),
    #[serde(rename_all = "camelCase")]
    MessageDeleted {
        message_id: String,
        deleted_message: ChatMessage,
    },
    #[serde(rename_all = "camelCase")]
    UserTyping { user_id: String, user_name: String },
    #[serde(rename_all = "camelCase")]
    UserStopTyping { user_id: String },
    Error { message: String },
}
