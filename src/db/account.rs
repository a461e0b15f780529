/// Account database models
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// Column list shared by every account SELECT / RETURNING clause
pub const ACCOUNT_COLUMNS: &str = "id, full_name, email, password_hash, avatar, role, auth_provider, \
     google_id, is_verified, verification_token, verification_token_expires_at, \
     verification_resend_count, last_verification_resend, reset_password_token, \
     reset_password_expires_at, login_attempts, lock_until, last_login, last_active, \
     last_chat_visit, created_at, updated_at";

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            _ => Err(AppError::Validation(format!("Invalid role: {}", s))),
        }
    }

    /// Elevated accounts skip resource moderation
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// How the account authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Local => "local",
            AuthProvider::Google => "google",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "local" => Ok(AuthProvider::Local),
            "google" => Ok(AuthProvider::Google),
            _ => Err(AppError::Validation(format!("Invalid auth provider: {}", s))),
        }
    }
}

/// A single-use token together with its expiry.
///
/// For password resets `token` holds the SHA-256 digest, never the value
/// that was mailed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    fn from_columns(token: Option<String>, expires_at: Option<DateTime<Utc>>) -> Option<Self> {
        match (token, expires_at) {
            (Some(token), Some(expires_at)) => Some(IssuedToken { token, expires_at }),
            _ => None,
        }
    }
}

/// Account record in the database
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub auth_provider: AuthProvider,
    pub google_id: Option<String>,
    pub is_verified: bool,
    pub verification: Option<IssuedToken>,
    pub verification_resend_count: i64,
    pub last_verification_resend: Option<DateTime<Utc>>,
    pub password_reset: Option<IssuedToken>,
    pub login_attempts: i64,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_active: Option<DateTime<Utc>>,
    pub last_chat_visit: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Decode a row selected with [`ACCOUNT_COLUMNS`]
    pub fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let role: String = row.try_get("role")?;
        let auth_provider: String = row.try_get("auth_provider")?;

        Ok(Account {
            id: row.try_get("id")?,
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            avatar: row.try_get("avatar")?,
            role: Role::parse(&role)?,
            auth_provider: AuthProvider::parse(&auth_provider)?,
            google_id: row.try_get("google_id")?,
            is_verified: row.try_get("is_verified")?,
            verification: IssuedToken::from_columns(
                row.try_get("verification_token")?,
                row.try_get("verification_token_expires_at")?,
            ),
            verification_resend_count: row.try_get("verification_resend_count")?,
            last_verification_resend: row.try_get("last_verification_resend")?,
            password_reset: IssuedToken::from_columns(
                row.try_get("reset_password_token")?,
                row.try_get("reset_password_expires_at")?,
            ),
            login_attempts: row.try_get("login_attempts")?,
            lock_until: row.try_get("lock_until")?,
            last_login: row.try_get("last_login")?,
            last_active: row.try_get("last_active")?,
            last_chat_visit: row.try_get("last_chat_visit")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Locked iff `lock_until` is set and strictly in the future
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.map_or(false, |until| until > now)
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Public projection without secrets
    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            role: self.role,
            is_verified: self.is_verified,
            avatar: self.avatar.clone(),
            auth_provider: self.auth_provider,
            last_login: self.last_login,
            created_at: self.created_at,
        }
    }
}

/// Account as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
    pub avatar: Option<String>,
    pub auth_provider: AuthProvider,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account_with_lock(lock_until: Option<DateTime<Utc>>) -> Account {
        let now = Utc::now();
        Account {
            id: "a1".to_string(),
            full_name: "Test User".to_string(),
            email: "test@example.edu".to_string(),
            password_hash: None,
            avatar: None,
            role: Role::Student,
            auth_provider: AuthProvider::Google,
            google_id: Some("g-1".to_string()),
            is_verified: true,
            verification: None,
            verification_resend_count: 0,
            last_verification_resend: None,
            password_reset: None,
            login_attempts: 0,
            lock_until,
            last_login: None,
            last_active: None,
            last_chat_visit: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_is_locked_is_derived_from_lock_until() {
        let now = Utc::now();

        assert!(!account_with_lock(None).is_locked(now));
        assert!(account_with_lock(Some(now + Duration::minutes(1))).is_locked(now));
        assert!(!account_with_lock(Some(now - Duration::minutes(1))).is_locked(now));
        // Strictly greater than now
        assert!(!account_with_lock(Some(now)).is_locked(now));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert_eq!(Role::parse("Instructor").unwrap(), Role::Instructor);
        assert!(Role::parse("root").is_err());
        assert!(Role::Admin.is_elevated());
        assert!(!Role::Instructor.is_elevated());
    }

    #[test]
    fn test_issued_token_requires_both_columns() {
        let now = Utc::now();
        assert!(IssuedToken::from_columns(Some("t".into()), None).is_none());
        assert!(IssuedToken::from_columns(None, Some(now)).is_none());

        let token = IssuedToken::from_columns(Some("t".into()), Some(now)).unwrap();
        assert!(token.is_expired(now));
        assert!(!token.is_expired(now - Duration::seconds(1)));
    }
}
