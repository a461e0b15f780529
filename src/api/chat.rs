/// Chat history endpoints
///
/// Messages sent or deleted over HTTP are also pushed to the live room.
use crate::{
    api::{created, respond, respond_with, ApiResult, Envelope},
    auth::AuthContext,
    chat::{
        room_id, MessagePage, MessageQuery, OnlineUsers, Presence, SendMessageRequest,
        ServerEvent, UnreadCount,
    },
    context::AppContext,
    db::chat::ChatMessage,
    error::AppResult,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

/// Build chat routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/chat/messages/:room/:semester", get(room_messages))
        .route("/api/chat/messages", post(send_message))
        // Captures at one position must share a name, so the id arrives as `:room`
        .route("/api/chat/messages/:room", delete(delete_message))
        .route("/api/chat/unread/:department/:semester", get(unread_count))
        .route("/api/chat/read/:department/:semester", put(mark_read))
        .route("/api/chat/active/:department/:semester", get(active_users))
}

async fn room_messages(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    Path((department, semester)): Path<(String, String)>,
    Query(query): Query<MessageQuery>,
) -> ApiResult<MessagePage> {
    respond(ctx.chat.list_messages(&department, &semester, &query).await?)
}

async fn send_message(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<Envelope<ChatMessage>>)> {
    let message = ctx.chat.send(&auth.account, req).await?;

    ctx.rooms.publish(
        &message.room_id,
        ServerEvent::ReceiveMessage(message.clone()),
        None,
    );

    created("Message sent", message)
}

async fn delete_message(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(message_id): Path<String>,
) -> ApiResult<ChatMessage> {
    let deleted = ctx.chat.delete(&message_id, &auth.account.id).await?;

    ctx.rooms.publish(
        &deleted.room_id,
        ServerEvent::MessageDeleted {
            message_id,
            deleted_message: deleted.clone(),
        },
        None,
    );

    respond_with("Message deleted", deleted)
}

async fn unread_count(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((department, semester)): Path<(String, String)>,
) -> ApiResult<UnreadCount> {
    let unread_count = ctx
        .chat
        .unread_count(&auth.account, &department, &semester)
        .await?;
    respond(UnreadCount { unread_count })
}

async fn mark_read(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((department, semester)): Path<(String, String)>,
) -> ApiResult<()> {
    ctx.chat.mark_read(&auth.account.id, Utc::now()).await?;
    tracing::debug!(account_id = %auth.account.id, room = %room_id(&department, &semester), "Chat marked read");
    respond_with("Marked as read", ())
}

/// Recently active accounts plus who is connected to the room right now
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActiveUsers {
    #[serde(flatten)]
    online: OnlineUsers,
    in_room: Presence,
}

async fn active_users(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    Path((department, semester)): Path<(String, String)>,
) -> ApiResult<ActiveUsers> {
    let online = ctx.chat.online_users(Utc::now()).await?;
    let in_room = ctx.rooms.presence(&room_id(&department, &semester));
    respond(ActiveUsers { online, in_room })
}
