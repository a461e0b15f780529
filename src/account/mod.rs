/// Account management
///
/// Registration, password and Google sign-in, email verification, password
/// reset and profile maintenance. The lockout guard and resend limiter keep
/// their state on the account row and update it with single conditional
/// statements.

pub mod credentials;
pub mod google;
pub mod guard;
mod manager;
pub mod resend;
pub mod tokens;

pub use manager::AccountManager;

use crate::{
    db::account::AccountProfile,
    error::{AppError, AppResult},
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail};

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Full name must be at least 2 characters"))]
    pub full_name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub password: String,
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Forgot password request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

/// Reset password request
#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Profile update request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 100, message = "Full name must be at least 2 characters"))]
    pub full_name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
}

/// Change password request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Session response for register/login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub user: AccountProfile,
}

/// Outcome of an accepted verification resend
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendResponse {
    pub remaining_attempts: i64,
}

/// Trim, lowercase and check an email address
pub fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !email.validate_email() {
        return Err(AppError::Validation("Please provide a valid email".to_string()));
    }
    Ok(email)
}
