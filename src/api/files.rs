/// File upload endpoint
///
/// The request body is the raw file; the original name travels in the
/// `name` query parameter. The returned URL is what a resource submission
/// or staff record then refers to, and the uploader is recorded as its owner.
use crate::{
    api::{created, Envelope},
    auth::AuthContext,
    context::AppContext,
    error::{AppError, AppResult},
    storage::StoredObject,
};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/files", post(upload_file))
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    name: String,
}

async fn upload_file(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Envelope<StoredObject>>)> {
    if body.is_empty() {
        return Err(AppError::Validation("Empty upload".to_string()));
    }
    if body.len() > ctx.config.service.max_upload_bytes {
        return Err(AppError::Validation(format!(
            "File exceeds the {} byte limit",
            ctx.config.service.max_upload_bytes
        )));
    }

    let stored = ctx.storage.store(body.to_vec(), &params.name).await?;
    if let Err(e) = ctx.uploads.record(&stored, &auth.account.id).await {
        if let Err(cleanup) = ctx.storage.delete(&stored.path).await {
            tracing::warn!(path = %stored.path, error = %cleanup, "Failed to remove unrecorded upload");
        }
        return Err(e);
    }
    tracing::info!(
        account_id = %auth.account.id,
        path = %stored.path,
        size = body.len(),
        "File uploaded"
    );

    created("File uploaded successfully", stored)
}
