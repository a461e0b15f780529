/// API routes and handlers
pub mod auth;
pub mod chat;
pub mod chat_socket;
pub mod files;
pub mod health;
pub mod middleware;
pub mod resources;
pub mod staff;
pub mod users;

use crate::{context::AppContext, error::AppResult};
use axum::{http::StatusCode, Json, Router};
use serde::Serialize;

/// Success envelope
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

pub type ApiResult<T> = AppResult<Json<Envelope<T>>>;

/// Wrap a payload in the success envelope
pub fn respond<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope {
        ok: true,
        message: None,
        data,
    }))
}

/// Success envelope carrying a human readable message
pub fn respond_with<T: Serialize>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok(Json(Envelope {
        ok: true,
        message: Some(message.into()),
        data,
    }))
}

/// `201 Created` with the success envelope
pub fn created<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> AppResult<(StatusCode, Json<Envelope<T>>)> {
    let Json(body) = respond_with(message, data)?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(users::routes())
        .merge(resources::routes())
        .merge(staff::routes())
        .merge(chat::routes())
        .merge(chat_socket::routes())
        .merge(files::routes())
}
