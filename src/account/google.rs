/// Google OAuth 2.0 client
use crate::{
    config::GoogleOAuthConfig,
    error::{AppError, AppResult},
};
use serde::Deserialize;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Profile fields used for sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    pub google_id: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl UserInfo {
    fn into_profile(self) -> AppResult<GoogleProfile> {
        let email = self
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::Authentication("No email found in Google profile".to_string()))?;

        Ok(GoogleProfile {
            google_id: self.sub,
            email,
            full_name: self
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Google User".to_string()),
            avatar: self.picture,
        })
    }
}

/// Authorization code flow against Google
#[derive(Clone)]
pub struct GoogleOAuthClient {
    config: GoogleOAuthConfig,
    http_client: reqwest::Client,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleOAuthConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// URL the browser is sent to for consent
    pub fn authorization_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=online&prompt=select_account",
            AUTHORIZE_ENDPOINT,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.callback_url),
            urlencoding::encode("openid email profile"),
        )
    }

    /// Exchange an authorization code and fetch the signed-in profile
    pub async fn exchange_code(&self, code: &str) -> AppResult<GoogleProfile> {
        let body = format!(
            "code={}&client_id={}&client_secret={}&redirect_uri={}&grant_type=authorization_code",
            urlencoding::encode(code),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.client_secret),
            urlencoding::encode(&self.config.callback_url),
        );

        let response = self
            .http_client
            .post(TOKEN_ENDPOINT)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Google token request failed: {}", e)))?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Google rejected authorization code");
            return Err(AppError::Authentication(
                "Google sign-in was not completed".to_string(),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Invalid Google token response: {}", e)))?;

        let info: UserInfo = self
            .http_client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Google profile request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Internal(format!("Google profile request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Invalid Google profile response: {}", e)))?;

        info.into_profile()
    }
}
