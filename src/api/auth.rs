/// Authentication endpoints
use crate::{
    account::{
        ForgotPasswordRequest, LoginRequest, RegisterRequest, ResendResponse,
        ResetPasswordRequest, SessionResponse,
    },
    api::{created, middleware::client_address, respond, respond_with, ApiResult, Envelope},
    auth::AuthContext,
    context::AppContext,
    db::account::AccountProfile,
    error::{AppError, AppResult},
};
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use validator::Validate;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/verify-email/:token", get(verify_email))
        .route("/api/auth/resend-verification", post(resend_verification))
        .route("/api/auth/me", get(me))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password/:token", put(reset_password))
        .route("/api/auth/google", get(google_start))
        .route("/api/auth/google/callback", get(google_callback))
}

async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Envelope<SessionResponse>>)> {
    req.validate()?;

    let (account, token) = ctx.account_manager.register(req).await?;
    tracing::info!(account_id = %account.id, "Account registered");

    created(
        "Registration successful. Please check your email to verify your account.",
        SessionResponse {
            token,
            user: account.profile(),
        },
    )
}

async fn login(
    State(ctx): State<AppContext>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> ApiResult<SessionResponse> {
    req.validate()?;

    let addr = client_address(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        ctx.config.service.trust_forwarded_for,
    );
    let (account, token) = ctx
        .account_manager
        .login(&req.email, &req.password, &addr)
        .await?;

    respond_with(
        "Login successful",
        SessionResponse {
            token,
            user: account.profile(),
        },
    )
}

/// Sessions are stateless bearer tokens; the client discards its copy
async fn logout(auth: AuthContext) -> ApiResult<()> {
    tracing::debug!(account_id = %auth.account.id, "Logout");
    respond_with("Logged out successfully", ())
}

async fn verify_email(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> ApiResult<AccountProfile> {
    let account = ctx.account_manager.verify_email(&token).await?;
    respond_with("Email verified successfully", account.profile())
}

async fn resend_verification(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> ApiResult<ResendResponse> {
    let grant = ctx
        .account_manager
        .resend_verification(&auth.account.id)
        .await?;

    respond_with(
        "Verification email sent successfully",
        ResendResponse {
            remaining_attempts: grant.remaining,
        },
    )
}

async fn me(auth: AuthContext) -> ApiResult<AccountProfile> {
    respond(auth.account.profile())
}

async fn forgot_password(
    State(ctx): State<AppContext>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<()> {
    req.validate()?;
    ctx.account_manager.forgot_password(&req.email).await?;
    respond_with("Password reset email sent", ())
}

async fn reset_password(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<()> {
    ctx.account_manager
        .reset_password(&token, &req.password)
        .await?;
    respond_with("Password reset successful", ())
}

async fn google_start(State(ctx): State<AppContext>) -> AppResult<Redirect> {
    let google = ctx
        .google
        .as_ref()
        .ok_or_else(|| AppError::InvalidState("Google sign-in is not configured".to_string()))?;

    Ok(Redirect::to(&google.authorization_url()))
}

#[derive(Debug, Deserialize)]
struct GoogleCallback {
    code: Option<String>,
    error: Option<String>,
}

/// Finishes the OAuth dance; every failure lands on the frontend error page
async fn google_callback(
    State(ctx): State<AppContext>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(params): Query<GoogleCallback>,
) -> Redirect {
    let frontend = ctx.config.service.frontend_url.trim_end_matches('/').to_string();
    let addr = client_address(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        ctx.config.service.trust_forwarded_for,
    );

    match complete_google_sign_in(&ctx, params, &addr).await {
        Ok(token) => Redirect::to(&format!(
            "{}/auth/success?token={}",
            frontend,
            urlencoding::encode(&token)
        )),
        Err(e) => {
            tracing::warn!(error = %e, "Google sign-in failed");
            Redirect::to(&format!("{}/auth/error", frontend))
        }
    }
}

async fn complete_google_sign_in(
    ctx: &AppContext,
    params: GoogleCallback,
    addr: &str,
) -> AppResult<String> {
    if let Some(error) = params.error {
        return Err(AppError::Authentication(format!("Google returned {}", error)));
    }
    let google = ctx
        .google
        .as_ref()
        .ok_or_else(|| AppError::InvalidState("Google sign-in is not configured".to_string()))?;
    let code = params
        .code
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;

    let profile = google.exchange_code(&code).await?;
    let (account, token, created) = ctx.account_manager.google_sign_in(profile, addr).await?;
    tracing::info!(account_id = %account.id, created, "Google sign-in completed");

    Ok(token)
}
