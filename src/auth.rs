/// Authentication extractors
use crate::{
    api::middleware::extract_bearer_token,
    context::AppContext,
    db::account::{Account, Role},
    error::AppError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context - extracts and validates the session from the request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let account = state.account_manager.validate_session(&token).await?;

        Ok(AuthContext { account })
    }
}

/// Admin authentication context - requires the admin role
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let AuthContext { account } = AuthContext::from_request_parts(parts, state).await?;

        if account.role != Role::Admin {
            tracing::warn!(account_id = %account.id, "Admin route refused");
            return Err(AppError::Unauthorized("Admin role required".to_string()));
        }

        Ok(AdminAuthContext { account })
    }
}
