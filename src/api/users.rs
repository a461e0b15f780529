/// Profile and user administration endpoints
use crate::{
    account::{ChangePasswordRequest, UpdateProfileRequest},
    api::{respond, respond_with, ApiResult},
    auth::{AdminAuthContext, AuthContext},
    context::AppContext,
    db::account::AccountProfile,
};
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/profile", put(update_profile))
        .route("/api/users/change-password", put(change_password))
}

#[derive(Debug, Serialize)]
struct UserList {
    count: usize,
    users: Vec<AccountProfile>,
}

async fn list_users(State(ctx): State<AppContext>, _admin: AdminAuthContext) -> ApiResult<UserList> {
    let users: Vec<AccountProfile> = ctx
        .account_manager
        .list_accounts()
        .await?
        .iter()
        .map(|account| account.profile())
        .collect();

    respond(UserList {
        count: users.len(),
        users,
    })
}

async fn update_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<AccountProfile> {
    let account = ctx
        .account_manager
        .update_profile(&auth.account.id, req)
        .await?;

    respond_with("Profile updated successfully", account.profile())
}

async fn change_password(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    ctx.account_manager
        .change_password(&auth.account.id, &req.current_password, &req.new_password)
        .await?;

    respond_with("Password changed successfully", ())
}
