/// Configuration management for the Unibro backend
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub google: Option<GoogleOAuthConfig>,
    pub email: Option<EmailConfig>,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL of the web frontend, used for links in emails and OAuth redirects
    pub frontend_url: String,
    pub max_upload_bytes: usize,
    /// Take the client address from `X-Forwarded-For`. Only enable behind a
    /// reverse proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    /// Directory where uploaded resource files are kept
    pub file_location: PathBuf,
    /// Public URL prefix under which stored files are reachable
    pub public_file_url: String,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_days: i64,
}

/// Google OAuth client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
    pub from_name: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env_or("UNIBRO_HOSTNAME", "0.0.0.0");
        let port = env_or("UNIBRO_PORT", "5000")
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let frontend_url = env_or("UNIBRO_FRONTEND_URL", "http://localhost:5173")
            .trim_end_matches('/')
            .to_string();
        let max_upload_bytes = env_parse("UNIBRO_MAX_UPLOAD_BYTES", 25 * 1024 * 1024);
        let trust_forwarded_for = env_parse("UNIBRO_TRUST_FORWARDED_FOR", false);

        let data_directory: PathBuf = env_or("UNIBRO_DATA_DIRECTORY", "./data").into();
        let database = env::var("UNIBRO_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("unibro.sqlite"));
        let file_location = env::var("UNIBRO_FILE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("files"));
        let public_file_url = env::var("UNIBRO_PUBLIC_FILE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}/files", hostname, port))
            .trim_end_matches('/')
            .to_string();

        let jwt_secret = env::var("UNIBRO_JWT_SECRET")
            .map_err(|_| AppError::Validation("JWT secret required".to_string()))?;
        let session_ttl_days = env_parse("UNIBRO_SESSION_TTL_DAYS", 7);

        let google = match (
            env::var("UNIBRO_GOOGLE_CLIENT_ID"),
            env::var("UNIBRO_GOOGLE_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                callback_url: env::var("UNIBRO_GOOGLE_CALLBACK_URL").unwrap_or_else(|_| {
                    format!("http://{}:{}/api/auth/google/callback", hostname, port)
                }),
            }),
            _ => None,
        };

        let email = if let Ok(smtp_url) = env::var("UNIBRO_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env_or("UNIBRO_EMAIL_FROM_ADDRESS", "noreply@unibro.local"),
                from_name: env_or("UNIBRO_EMAIL_FROM_NAME", "Unibro"),
            })
        } else {
            None
        };

        let rate_limit = RateLimitConfig {
            enabled: env_parse("UNIBRO_RATE_LIMITS_ENABLED", true),
            authenticated_rps: env_parse("UNIBRO_RATE_LIMIT_AUTHENTICATED_RPS", 100),
            unauthenticated_rps: env_parse("UNIBRO_RATE_LIMIT_UNAUTHENTICATED_RPS", 20),
            burst_size: env_parse("UNIBRO_RATE_LIMIT_BURST", 50),
        };

        let logging = LoggingConfig {
            level: env_or("RUST_LOG", "unibro=debug,tower_http=debug"),
            json: env_or("UNIBRO_LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                frontend_url,
                max_upload_bytes,
                trust_forwarded_for,
            },
            storage: StorageConfig {
                data_directory,
                database,
                file_location,
                public_file_url,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl_days,
            },
            google,
            email,
            rate_limit,
            logging,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.session_ttl_days <= 0 {
            return Err(AppError::Validation(
                "Session lifetime must be at least one day".to_string(),
            ));
        }

        if !self.service.frontend_url.starts_with("http") {
            return Err(AppError::Validation(
                "Frontend URL must be an http(s) URL".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration used by unit tests
    #[cfg(test)]
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 5000,
                frontend_url: "http://localhost:5173".to_string(),
                max_upload_bytes: 1024 * 1024,
                trust_forwarded_for: false,
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                database: PathBuf::from(":memory:"),
                file_location: PathBuf::from("./data/files"),
                public_file_url: "http://localhost:5000/files".to_string(),
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                session_ttl_days: 7,
            },
            google: None,
            email: None,
            rate_limit: RateLimitConfig {
                enabled: true,
                authenticated_rps: 100,
                unauthenticated_rps: 20,
                burst_size: 50,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = ServerConfig::for_tests();
        assert!(config.validate().is_ok());

        config.authentication.jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_frontend() {
        let mut config = ServerConfig::for_tests();
        config.service.frontend_url = "localhost:5173".to_string();
        assert!(config.validate().is_err());
    }
}
