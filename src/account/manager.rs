/// Account manager implementation using runtime queries
use crate::{
    account::{
        credentials::{hash_for_update, hash_password, validate_password_strength, verify_password},
        google::GoogleProfile,
        guard::LoginGuard,
        normalize_email,
        resend::{ResendGrant, ResendLimiter},
        tokens::{hash_token, issue_reset_token, issue_verification_token, SessionTokens},
        RegisterRequest, UpdateProfileRequest,
    },
    config::ServerConfig,
    db::{
        account::{Account, AuthProvider, Role, ACCOUNT_COLUMNS},
        conflict_on_unique,
    },
    error::{AppError, AppResult},
    mailer::{Notification, NotificationDispatcher},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const INVALID_LOGIN: &str = "Invalid email or password";
const GOOGLE_ONLY: &str = "This account was created with Google. Please use Google Sign-In.";

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    sessions: SessionTokens,
    guard: LoginGuard,
    resend: ResendLimiter,
    notifier: NotificationDispatcher,
}

impl AccountManager {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>, notifier: NotificationDispatcher) -> Self {
        let sessions = SessionTokens::new(
            &config.authentication.jwt_secret,
            config.authentication.session_ttl_days,
        );

        Self {
            guard: LoginGuard::new(db.clone()),
            resend: ResendLimiter::new(db.clone()),
            db,
            config,
            sessions,
            notifier,
        }
    }

    fn frontend_link(&self, path: &str) -> String {
        format!("{}{}", self.config.service.frontend_url, path)
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM account WHERE {} LIMIT 1",
            ACCOUNT_COLUMNS, clause
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Account::from_row).transpose()
    }

    /// Get account by id
    pub async fn get_account(&self, id: &str) -> AppResult<Account> {
        self.fetch_one_where("id = ?1", id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Find account by email (case-insensitive)
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        self.fetch_one_where("email = ?1", &email.trim().to_lowercase())
            .await
    }

    /// All accounts, newest first
    pub async fn list_accounts(&self) -> AppResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM account ORDER BY created_at DESC",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Account::from_row).collect()
    }

    /// Sign a session token for an account
    pub fn issue_session(&self, account_id: &str) -> AppResult<String> {
        self.sessions.issue(account_id)
    }

    /// Resolve a session token to its account
    pub async fn validate_session(&self, token: &str) -> AppResult<Account> {
        let claims = self.sessions.validate(token)?;

        self.fetch_one_where("id = ?1", &claims.sub)
            .await?
            .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))
    }

    /// Create a local account and send the verification mail
    pub async fn register(&self, request: RegisterRequest) -> AppResult<(Account, String)> {
        request.validate()?;
        validate_password_strength(&request.password)?;

        let email = normalize_email(&request.email)?;
        let full_name = request.full_name.trim().to_string();

        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::AlreadyExists(
                "User already exists with this email".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();
        let verification = issue_verification_token(now);
        let id = Uuid::new_v4().to_string();

        let row = sqlx::query(&format!(
            "INSERT INTO account (id, full_name, email, password_hash, role, auth_provider,
                                  is_verified, verification_token, verification_token_expires_at,
                                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?9)
             RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(&id)
        .bind(&full_name)
        .bind(&email)
        .bind(&password_hash)
        .bind(Role::Student.as_str())
        .bind(AuthProvider::Local.as_str())
        .bind(&verification.token)
        .bind(verification.expires_at)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "User already exists with this email"))?;

        let account = Account::from_row(&row)?;

        tracing::info!(account_id = %account.id, "Registered new account");

        self.notifier.submit(Notification::verification(
            &account.email,
            &account.full_name,
            &self.frontend_link(&format!("/verify-email/{}", verification.token)),
        ));

        let token = self.issue_session(&account.id)?;
        Ok((account, token))
    }

    /// Password login guarded by the lockout state machine
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client_addr: &str,
    ) -> AppResult<(Account, String)> {
        let now = Utc::now();

        let mut account = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::invalid_credential(INVALID_LOGIN))?;

        // Locked accounts are refused before any password comparison
        self.guard.check(&account, now)?;

        if !account.has_password() {
            return Err(AppError::invalid_credential(GOOGLE_ONLY));
        }

        if !verify_password(account.password_hash.as_deref(), password) {
            let outcome = self.guard.record_failure(&account.id, now).await?;

            if let (true, Some(until)) = (outcome.newly_locked, outcome.lock_until) {
                self.notifier.submit(Notification::account_locked(
                    &account.email,
                    &account.full_name,
                    until,
                ));
            }

            return Err(outcome.into_error());
        }

        self.guard.record_success(&account.id, now).await?;
        account.login_attempts = 0;
        account.lock_until = None;
        account.last_login = Some(now);

        tracing::info!(account_id = %account.id, "Login succeeded");

        self.notifier.submit(Notification::login_alert(
            &account.email,
            &account.full_name,
            now,
            client_addr,
        ));

        let token = self.issue_session(&account.id)?;
        Ok((account, token))
    }

    /// Consume a verification token
    pub async fn verify_email(&self, token: &str) -> AppResult<Account> {
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "UPDATE account SET
                is_verified = 1,
                verification_token = NULL,
                verification_token_expires_at = NULL,
                verification_resend_count = 0,
                last_verification_resend = NULL,
                updated_at = ?2
             WHERE verification_token = ?1 AND verification_token_expires_at > ?2
             RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::TokenInvalidOrExpired)?;

        let account = Account::from_row(&row)?;

        tracing::info!(account_id = %account.id, "Email verified");

        self.notifier
            .submit(Notification::welcome(&account.email, &account.full_name));

        Ok(account)
    }

    /// Issue a fresh verification token subject to the resend limits
    pub async fn resend_verification(&self, account_id: &str) -> AppResult<ResendGrant> {
        let account = self.get_account(account_id).await?;
        let now = Utc::now();
        let verification = issue_verification_token(now);

        let grant = self.resend.accept(&account, &verification, now).await?;

        self.notifier.submit(Notification::verification(
            &account.email,
            &account.full_name,
            &self.frontend_link(&format!("/verify-email/{}", verification.token)),
        ));

        Ok(grant)
    }

    /// Issue a password reset token and mail it
    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let account = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("No account found with this email".to_string()))?;

        if !account.has_password() {
            return Err(AppError::invalid_credential(GOOGLE_ONLY));
        }

        let now = Utc::now();
        let reset = issue_reset_token(now);

        sqlx::query(
            "UPDATE account
             SET reset_password_token = ?1, reset_password_expires_at = ?2, updated_at = ?3
             WHERE id = ?4",
        )
        .bind(&reset.stored.token)
        .bind(reset.stored.expires_at)
        .bind(now)
        .bind(&account.id)
        .execute(&self.db)
        .await?;

        tracing::info!(account_id = %account.id, "Password reset requested");

        self.notifier.submit(Notification::password_reset(
            &account.email,
            &account.full_name,
            &self.frontend_link(&format!("/reset-password/{}", reset.plaintext)),
        ));

        Ok(())
    }

    /// Consume a reset token and set the new password
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<Account> {
        validate_password_strength(new_password)?;

        let now = Utc::now();
        let password_hash = hash_password(new_password)?;

        let row = sqlx::query(&format!(
            "UPDATE account SET
                password_hash = ?1,
                reset_password_token = NULL,
                reset_password_expires_at = NULL,
                login_attempts = 0,
                lock_until = NULL,
                updated_at = ?3
             WHERE reset_password_token = ?2 AND reset_password_expires_at > ?3
             RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(&password_hash)
        .bind(hash_token(token))
        .bind(now)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::TokenInvalidOrExpired)?;

        let account = Account::from_row(&row)?;

        tracing::info!(account_id = %account.id, "Password reset completed");

        self.notifier
            .submit(Notification::password_changed(&account.email, &account.full_name));

        Ok(account)
    }

    /// Store a new password hash unless `candidate` is already the stored hash.
    /// Returns whether anything was written.
    pub async fn set_password(&self, account_id: &str, candidate: &str) -> AppResult<bool> {
        let account = self.get_account(account_id).await?;

        let Some(password_hash) = hash_for_update(candidate, account.password_hash.as_deref())?
        else {
            return Ok(false);
        };

        sqlx::query("UPDATE account SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(&password_hash)
            .bind(Utc::now())
            .bind(account_id)
            .execute(&self.db)
            .await?;

        Ok(true)
    }

    /// Change password from profile settings
    pub async fn change_password(
        &self,
        account_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let account = self.get_account(account_id).await?;

        if !account.has_password() {
            return Err(AppError::invalid_credential(
                "Password change is not available for Google accounts",
            ));
        }

        if !verify_password(account.password_hash.as_deref(), current_password) {
            return Err(AppError::invalid_credential("Current password is incorrect"));
        }

        validate_password_strength(new_password)?;
        self.set_password(account_id, new_password).await?;

        tracing::info!(account_id = %account_id, "Password changed");

        self.notifier
            .submit(Notification::password_changed(&account.email, &account.full_name));

        Ok(())
    }

    /// Update name and/or email. A new email must be verified again.
    pub async fn update_profile(
        &self,
        account_id: &str,
        request: UpdateProfileRequest,
    ) -> AppResult<Account> {
        request.validate()?;
        let account = self.get_account(account_id).await?;

        let full_name = request
            .full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| account.full_name.clone());

        let mut email = account.email.clone();
        let mut is_verified = account.is_verified;

        if let Some(requested) = request.email.as_deref() {
            let requested = normalize_email(requested)?;
            if requested != account.email {
                if self.find_by_email(&requested).await?.is_some() {
                    return Err(AppError::AlreadyExists("Email already in use".to_string()));
                }
                email = requested;
                is_verified = false;
            }
        }

        let row = sqlx::query(&format!(
            "UPDATE account SET full_name = ?1, email = ?2, is_verified = ?3, updated_at = ?4
             WHERE id = ?5
             RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(&full_name)
        .bind(&email)
        .bind(is_verified)
        .bind(Utc::now())
        .bind(account_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "Email already in use"))?;

        Account::from_row(&row)
    }

    /// Sign in with a Google profile, linking or creating the account.
    /// Returns the account, a session token and whether it was created.
    pub async fn google_sign_in(
        &self,
        profile: GoogleProfile,
        client_addr: &str,
    ) -> AppResult<(Account, String, bool)> {
        let email = normalize_email(&profile.email)?;
        let now = Utc::now();

        let existing = sqlx::query(&format!(
            "SELECT {} FROM account WHERE email = ?1 OR google_id = ?2 LIMIT 1",
            ACCOUNT_COLUMNS
        ))
        .bind(&email)
        .bind(&profile.google_id)
        .fetch_optional(&self.db)
        .await?;

        let (account, created) = match existing {
            Some(row) => {
                let current = Account::from_row(&row)?;
                let row = sqlx::query(&format!(
                    "UPDATE account SET
                        google_id = COALESCE(google_id, ?1),
                        is_verified = 1,
                        auth_provider = CASE WHEN password_hash IS NULL THEN 'google' ELSE auth_provider END,
                        avatar = COALESCE(avatar, ?2),
                        last_login = ?3,
                        updated_at = ?3
                     WHERE id = ?4
                     RETURNING {}",
                    ACCOUNT_COLUMNS
                ))
                .bind(&profile.google_id)
                .bind(&profile.avatar)
                .bind(now)
                .bind(&current.id)
                .fetch_one(&self.db)
                .await?;

                (Account::from_row(&row)?, false)
            }
            None => {
                let row = sqlx::query(&format!(
                    "INSERT INTO account (id, full_name, email, avatar, role, auth_provider, google_id,
                                          is_verified, last_login, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8, ?8)
                     RETURNING {}",
                    ACCOUNT_COLUMNS
                ))
                .bind(Uuid::new_v4().to_string())
                .bind(profile.full_name.trim())
                .bind(&email)
                .bind(&profile.avatar)
                .bind(Role::Student.as_str())
                .bind(AuthProvider::Google.as_str())
                .bind(&profile.google_id)
                .bind(now)
                .fetch_one(&self.db)
                .await
                .map_err(|e| conflict_on_unique(e, "User already exists with this email"))?;

                (Account::from_row(&row)?, true)
            }
        };

        if created {
            tracing::info!(account_id = %account.id, "Created account from Google sign-in");
            self.notifier
                .submit(Notification::welcome(&account.email, &account.full_name));
        } else {
            tracing::info!(account_id = %account.id, "Google sign-in");
            self.notifier.submit(Notification::login_alert(
                &account.email,
                &account.full_name,
                now,
                client_addr,
            ));
        }

        let token = self.issue_session(&account.id)?;
        Ok((account, token, created))
    }

    /// Clear verification and reset pairs that have expired
    pub async fn sweep_expired_tokens(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let verification = sqlx::query(
            "UPDATE account
             SET verification_token = NULL, verification_token_expires_at = NULL
             WHERE verification_token IS NOT NULL AND verification_token_expires_at <= ?1",
        )
        .bind(now)
        .execute(&self.db)
        .await?
        .rows_affected();

        let reset = sqlx::query(
            "UPDATE account
             SET reset_password_token = NULL, reset_password_expires_at = NULL
             WHERE reset_password_token IS NOT NULL AND reset_password_expires_at <= ?1",
        )
        .bind(now)
        .execute(&self.db)
        .await?
        .rows_affected();

        Ok(verification + reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account::tokens::generate_token, db};
    use chrono::Duration;
    use tokio::sync::mpsc::Receiver;

    async fn setup() -> (AccountManager, Receiver<Notification>, SqlitePool) {
        let pool = db::test_pool().await;
        let (notifier, rx) = NotificationDispatcher::detached(64);
        let manager = AccountManager::new(
            pool.clone(),
            Arc::new(ServerConfig::for_tests()),
            notifier,
        );
        (manager, rx, pool)
    }

    fn drain(rx: &mut Receiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            full_name: "Sam Student".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
        }
    }

    async fn stored_verification_token(pool: &SqlitePool, id: &str) -> Option<String> {
        sqlx::query_scalar("SELECT verification_token FROM account WHERE id = ?1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_sends_verification_and_rejects_duplicates() {
        let (manager, mut rx, _pool) = setup().await;

        let (account, token) = manager
            .register(register_request("Sam@Example.edu"))
            .await
            .unwrap();
        assert_eq!(account.email, "sam@example.edu");
        assert!(!account.is_verified);
        assert_eq!(account.role, Role::Student);
        assert!(account.verification.is_some());
        assert_eq!(manager.validate_session(&token).await.unwrap().id, account.id);

        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Verify Your Email - Unibro");
        assert!(sent[0].html.contains("/verify-email/"));

        let err = manager
            .register(register_request("sam@example.edu"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let (manager, _rx, _pool) = setup().await;
        let mut request = register_request("sam@example.edu");
        request.password = "password".to_string();

        assert!(matches!(
            manager.register(request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let (manager, _rx, _pool) = setup().await;
        let err = manager
            .login("nobody@example.edu", "secret123", "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidCredential {
                remaining_attempts: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fifth_failure_locks_and_notifies() {
        let (manager, mut rx, _pool) = setup().await;
        manager.register(register_request("sam@example.edu")).await.unwrap();
        drain(&mut rx);

        for remaining in (1..=4).rev() {
            match manager.login("sam@example.edu", "wrong1", "127.0.0.1").await {
                Err(AppError::InvalidCredential {
                    remaining_attempts, ..
                }) => assert_eq!(remaining_attempts, Some(remaining)),
                other => panic!("unexpected result: {:?}", other.map(|(a, _)| a.id)),
            }
        }

        let before = Utc::now();
        let err = manager
            .login("sam@example.edu", "wrong1", "127.0.0.1")
            .await
            .unwrap_err();
        let until = match err {
            AppError::AccountLocked { until } => until,
            other => panic!("unexpected error: {:?}", other),
        };
        assert!(until >= before + Duration::hours(2));
        assert!(until <= Utc::now() + Duration::hours(2));

        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Account Locked - Unibro");

        // Correct password is refused while locked
        assert!(matches!(
            manager.login("sam@example.edu", "secret123", "127.0.0.1").await,
            Err(AppError::AccountLocked { .. })
        ));
    }

    #[tokio::test]
    async fn test_correct_password_after_four_failures_resets() {
        let (manager, mut rx, pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        sqlx::query("UPDATE account SET login_attempts = 4 WHERE id = ?1")
            .bind(&account.id)
            .execute(&pool)
            .await
            .unwrap();
        drain(&mut rx);

        let (account, _) = manager
            .login("sam@example.edu", "secret123", "10.0.0.7")
            .await
            .unwrap();
        assert_eq!(account.login_attempts, 0);
        assert!(account.lock_until.is_none());

        let stored = manager.get_account(&account.id).await.unwrap();
        assert_eq!(stored.login_attempts, 0);
        assert!(stored.lock_until.is_none());
        assert!(stored.last_login.is_some());

        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html.contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_expired_lock_allows_login() {
        let (manager, _rx, pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        sqlx::query("UPDATE account SET login_attempts = 5, lock_until = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::minutes(1))
            .bind(&account.id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(manager
            .login("sam@example.edu", "secret123", "127.0.0.1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_google_only_account_cannot_use_password() {
        let (manager, _rx, _pool) = setup().await;
        let profile = GoogleProfile {
            google_id: "g-1".to_string(),
            email: "gina@example.edu".to_string(),
            full_name: "Gina".to_string(),
            avatar: None,
        };
        let (account, _, created) = manager.google_sign_in(profile, "127.0.0.1").await.unwrap();
        assert!(created);

        let err = manager
            .login("gina@example.edu", "whatever1", "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential { .. }));

        // Counters untouched
        let stored = manager.get_account(&account.id).await.unwrap();
        assert_eq!(stored.login_attempts, 0);
    }

    #[tokio::test]
    async fn test_verification_token_is_single_use() {
        let (manager, mut rx, pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        let token = stored_verification_token(&pool, &account.id).await.unwrap();
        drain(&mut rx);

        let verified = manager.verify_email(&token).await.unwrap();
        assert!(verified.is_verified);
        assert!(verified.verification.is_none());
        assert_eq!(verified.verification_resend_count, 0);
        assert!(verified.last_verification_resend.is_none());
        assert_eq!(drain(&mut rx)[0].subject, "Welcome to Unibro!");

        assert!(matches!(
            manager.verify_email(&token).await,
            Err(AppError::TokenInvalidOrExpired)
        ));
    }

    #[tokio::test]
    async fn test_expired_verification_token_rejected() {
        let (manager, _rx, pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        let token = stored_verification_token(&pool, &account.id).await.unwrap();
        sqlx::query("UPDATE account SET verification_token_expires_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::seconds(1))
            .bind(&account.id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            manager.verify_email(&token).await,
            Err(AppError::TokenInvalidOrExpired)
        ));
        assert!(matches!(
            manager.verify_email("").await,
            Err(AppError::TokenInvalidOrExpired)
        ));
    }

    #[tokio::test]
    async fn test_resend_replaces_token_and_enforces_cooldown() {
        let (manager, mut rx, pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        let first = stored_verification_token(&pool, &account.id).await.unwrap();
        drain(&mut rx);

        let grant = manager.resend_verification(&account.id).await.unwrap();
        assert_eq!(grant.count, 1);
        assert_eq!(grant.remaining, 4);
        assert_eq!(drain(&mut rx).len(), 1);

        let second = stored_verification_token(&pool, &account.id).await.unwrap();
        assert_ne!(first, second);
        assert!(manager.verify_email(&first).await.is_err());

        assert!(matches!(
            manager.resend_verification(&account.id).await,
            Err(AppError::RateLimited { .. })
        ));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let (manager, mut rx, pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        sqlx::query("UPDATE account SET login_attempts = 5, lock_until = ?1 WHERE id = ?2")
            .bind(Utc::now() + Duration::hours(1))
            .bind(&account.id)
            .execute(&pool)
            .await
            .unwrap();
        drain(&mut rx);

        manager.forgot_password("sam@example.edu").await.unwrap();
        let mail = drain(&mut rx).remove(0);
        let plaintext = mail
            .html
            .split("/reset-password/")
            .nth(1)
            .unwrap()
            .chars()
            .take(64)
            .collect::<String>();

        // Only the digest is stored
        let stored: Option<String> =
            sqlx::query_scalar("SELECT reset_password_token FROM account WHERE id = ?1")
                .bind(&account.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stored, Some(hash_token(&plaintext)));

        let updated = manager.reset_password(&plaintext, "newsecret9").await.unwrap();
        assert_eq!(updated.login_attempts, 0);
        assert!(updated.lock_until.is_none());
        assert!(updated.password_reset.is_none());

        assert!(manager
            .login("sam@example.edu", "newsecret9", "127.0.0.1")
            .await
            .is_ok());
        assert!(matches!(
            manager.reset_password(&plaintext, "another9").await,
            Err(AppError::TokenInvalidOrExpired)
        ));
    }

    #[tokio::test]
    async fn test_expired_reset_token_rejected() {
        let (manager, _rx, pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        let plaintext = generate_token();
        sqlx::query(
            "UPDATE account SET reset_password_token = ?1, reset_password_expires_at = ?2 WHERE id = ?3",
        )
        .bind(hash_token(&plaintext))
        .bind(Utc::now() - Duration::minutes(1))
        .bind(&account.id)
        .execute(&pool)
        .await
        .unwrap();

        assert!(matches!(
            manager.reset_password(&plaintext, "newsecret9").await,
            Err(AppError::TokenInvalidOrExpired)
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_and_google_only() {
        let (manager, _rx, _pool) = setup().await;
        assert!(matches!(
            manager.forgot_password("nobody@example.edu").await,
            Err(AppError::NotFound(_))
        ));

        let profile = GoogleProfile {
            google_id: "g-1".to_string(),
            email: "gina@example.edu".to_string(),
            full_name: "Gina".to_string(),
            avatar: None,
        };
        manager.google_sign_in(profile, "127.0.0.1").await.unwrap();
        assert!(matches!(
            manager.forgot_password("gina@example.edu").await,
            Err(AppError::InvalidCredential { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_password_skips_stored_hash() {
        let (manager, _rx, _pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        let stored_hash = account.password_hash.clone().unwrap();

        assert!(!manager.set_password(&account.id, &stored_hash).await.unwrap());
        assert!(manager
            .login("sam@example.edu", "secret123", "127.0.0.1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let (manager, mut rx, _pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        drain(&mut rx);

        assert!(matches!(
            manager.change_password(&account.id, "wrong1", "newsecret9").await,
            Err(AppError::InvalidCredential { .. })
        ));
        assert!(matches!(
            manager.change_password(&account.id, "secret123", "short").await,
            Err(AppError::Validation(_))
        ));

        manager
            .change_password(&account.id, "secret123", "newsecret9")
            .await
            .unwrap();
        assert_eq!(
            drain(&mut rx)[0].subject,
            "Password Changed Successfully - Unibro"
        );
        assert!(manager
            .login("sam@example.edu", "newsecret9", "127.0.0.1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_email_change_clears_verification() {
        let (manager, _rx, pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        manager.register(register_request("taken@example.edu")).await.unwrap();
        sqlx::query("UPDATE account SET is_verified = 1 WHERE id = ?1")
            .bind(&account.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = manager
            .update_profile(
                &account.id,
                UpdateProfileRequest {
                    full_name: None,
                    email: Some("taken@example.edu".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));

        let updated = manager
            .update_profile(
                &account.id,
                UpdateProfileRequest {
                    full_name: Some("Samuel Student".to_string()),
                    email: Some("samuel@example.edu".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Samuel Student");
        assert_eq!(updated.email, "samuel@example.edu");
        assert!(!updated.is_verified);

        // Same email keeps verification
        sqlx::query("UPDATE account SET is_verified = 1 WHERE id = ?1")
            .bind(&account.id)
            .execute(&pool)
            .await
            .unwrap();
        let updated = manager
            .update_profile(
                &account.id,
                UpdateProfileRequest {
                    full_name: None,
                    email: Some("Samuel@example.edu".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(updated.is_verified);
    }

    #[tokio::test]
    async fn test_google_sign_in_links_existing_account() {
        let (manager, mut rx, _pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        drain(&mut rx);

        let profile = GoogleProfile {
            google_id: "g-42".to_string(),
            email: "SAM@example.edu".to_string(),
            full_name: "Sam From Google".to_string(),
            avatar: Some("https://example.edu/sam.png".to_string()),
        };
        let (linked, _, created) = manager.google_sign_in(profile, "127.0.0.1").await.unwrap();

        assert!(!created);
        assert_eq!(linked.id, account.id);
        assert_eq!(linked.google_id.as_deref(), Some("g-42"));
        assert!(linked.is_verified);
        // Still has a password, provider unchanged
        assert_eq!(linked.auth_provider, AuthProvider::Local);
        assert_eq!(linked.full_name, "Sam Student");
        assert_eq!(linked.avatar.as_deref(), Some("https://example.edu/sam.png"));
        assert!(linked.last_login.is_some());

        assert_eq!(drain(&mut rx)[0].subject, "New Login to Your Account - Unibro");
    }

    #[tokio::test]
    async fn test_sweep_clears_expired_pairs() {
        let (manager, _rx, pool) = setup().await;
        let (account, _) = manager.register(register_request("sam@example.edu")).await.unwrap();
        manager.register(register_request("fresh@example.edu")).await.unwrap();
        sqlx::query("UPDATE account SET verification_token_expires_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::hours(1))
            .bind(&account.id)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(manager.sweep_expired_tokens(Utc::now()).await.unwrap(), 1);
        assert!(stored_verification_token(&pool, &account.id).await.is_none());
    }

    #[tokio::test]
    async fn test_list_accounts() {
        let (manager, _rx, _pool) = setup().await;
        manager.register(register_request("admin@example.edu")).await.unwrap();
        manager.register(register_request("sam@example.edu")).await.unwrap();

        assert_eq!(manager.list_accounts().await.unwrap().len(), 2);
    }
}
