/// Login attempt guard
///
/// Failed password checks accumulate on the account row. The fifth failure
/// locks the account for two hours; a lock that has run out is cleared by
/// the next failure, which then counts as the first of a new series.
use crate::{
    db::account::Account,
    error::{AppError, AppResult},
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};

pub const MAX_LOGIN_ATTEMPTS: i64 = 5;
pub const LOCK_HOURS: i64 = 2;

/// Where an account sits in the lockout cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unlocked,
    Accumulating(i64),
    Locked(DateTime<Utc>),
}

impl GuardState {
    pub fn of(login_attempts: i64, lock_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match lock_until {
            Some(until) if until > now => GuardState::Locked(until),
            _ if login_attempts > 0 => GuardState::Accumulating(login_attempts),
            _ => GuardState::Unlocked,
        }
    }
}

pub fn remaining_attempts(login_attempts: i64) -> u32 {
    (MAX_LOGIN_ATTEMPTS - login_attempts).max(0) as u32
}

/// Outcome of recording a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub login_attempts: i64,
    pub lock_until: Option<DateTime<Utc>>,
    /// This failure is the one that locked the account
    pub newly_locked: bool,
}

impl FailureOutcome {
    /// Error to report for this failure
    pub fn into_error(self) -> AppError {
        match self.lock_until {
            Some(until) => AppError::AccountLocked { until },
            None => AppError::InvalidCredential {
                message: "Invalid email or password".to_string(),
                remaining_attempts: Some(remaining_attempts(self.login_attempts)),
            },
        }
    }
}

/// Persists login attempt state
#[derive(Clone)]
pub struct LoginGuard {
    db: SqlitePool,
}

impl LoginGuard {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Reject the attempt outright while the account is locked
    pub fn check(&self, account: &Account, now: DateTime<Utc>) -> AppResult<()> {
        match GuardState::of(account.login_attempts, account.lock_until, now) {
            GuardState::Locked(until) => Err(AppError::AccountLocked { until }),
            _ => Ok(()),
        }
    }

    /// Record a failed password check in a single statement
    pub async fn record_failure(
        &self,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<FailureOutcome> {
        let lock_at = now + Duration::hours(LOCK_HOURS);

        let row = sqlx::query(
            "UPDATE account SET
                login_attempts = CASE
                    WHEN lock_until IS NOT NULL AND lock_until <= ?1 THEN 1
                    ELSE login_attempts + 1
                END,
                lock_until = CASE
                    WHEN lock_until IS NOT NULL AND lock_until <= ?1 THEN NULL
                    WHEN lock_until IS NULL AND login_attempts + 1 >= ?2 THEN ?3
                    ELSE lock_until
                END,
                updated_at = ?1
             WHERE id = ?4
             RETURNING login_attempts, lock_until",
        )
        .bind(now)
        .bind(MAX_LOGIN_ATTEMPTS)
        .bind(lock_at)
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let login_attempts: i64 = row.get("login_attempts");
        let lock_until: Option<DateTime<Utc>> = row.get("lock_until");
        // Only the attempt that completes the series sets the lock
        let newly_locked = login_attempts == MAX_LOGIN_ATTEMPTS && lock_until == Some(lock_at);

        if newly_locked {
            tracing::warn!(account_id = %account_id, until = %lock_at, "Account locked after repeated login failures");
        } else {
            tracing::debug!(account_id = %account_id, login_attempts, "Recorded failed login");
        }

        Ok(FailureOutcome {
            login_attempts,
            lock_until,
            newly_locked,
        })
    }

    /// Clear the failure series and stamp the login time
    pub async fn record_success(&self, account_id: &str, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "UPDATE account
             SET login_attempts = 0, lock_until = NULL, last_login = ?1, updated_at = ?1
             WHERE id = ?2",
        )
        .bind(now)
        .bind(account_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
