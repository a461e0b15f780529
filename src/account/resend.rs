/// Verification resend limiter
///
/// At most five verification mails per window, at least two minutes apart.
/// The window is anchored at the most recent send: once a full day passes
/// without a resend the count starts over.
use crate::{
    db::account::{Account, IssuedToken},
    error::{AppError, AppResult},
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};

pub const MAX_RESENDS_PER_WINDOW: i64 = 5;
pub const RESEND_WINDOW_HOURS: i64 = 24;
pub const RESEND_COOLDOWN_SECONDS: i64 = 120;

/// Whether a resend may go out right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendDecision {
    /// Allowed; `count` is the window count before this send
    Allowed { count: i64 },
    CapReached { retry_after: DateTime<Utc> },
    CoolingDown {
        retry_after: DateTime<Utc>,
        wait_seconds: i64,
    },
}

impl ResendDecision {
    pub fn evaluate(count: i64, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(last) = last else {
            return ResendDecision::Allowed { count: 0 };
        };

        if now - last > Duration::hours(RESEND_WINDOW_HOURS) {
            return ResendDecision::Allowed { count: 0 };
        }

        if count >= MAX_RESENDS_PER_WINDOW {
            return ResendDecision::CapReached {
                retry_after: last + Duration::hours(RESEND_WINDOW_HOURS),
            };
        }

        let retry_after = last + Duration::seconds(RESEND_COOLDOWN_SECONDS);
        if retry_after > now {
            let remaining_ms = (retry_after - now).num_milliseconds();
            return ResendDecision::CoolingDown {
                retry_after,
                wait_seconds: (remaining_ms + 999) / 1000,
            };
        }

        ResendDecision::Allowed { count }
    }

    /// The rejection for a refused resend, `None` when allowed
    pub fn rejection(self) -> Option<AppError> {
        match self {
            ResendDecision::Allowed { .. } => None,
            ResendDecision::CapReached { retry_after } => Some(AppError::RateLimited {
                message: "Maximum verification emails sent. Please try again after 24 hours."
                    .to_string(),
                retry_after,
                wait_seconds: (retry_after - Utc::now()).num_seconds().max(0),
            }),
            ResendDecision::CoolingDown {
                retry_after,
                wait_seconds,
            } => Some(AppError::RateLimited {
                message: format!(
                    "Please wait {} seconds before requesting another verification email",
                    wait_seconds
                ),
                retry_after,
                wait_seconds,
            }),
        }
    }
}

/// Accepted resend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendGrant {
    pub count: i64,
    pub remaining: i64,
}

/// Persists resend tracking and the replacement token
#[derive(Clone)]
pub struct ResendLimiter {
    db: SqlitePool,
}

impl ResendLimiter {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Accept a resend for `account` and store `token` in place of any
    /// earlier verification token.
    ///
    /// The limits are re-checked inside the UPDATE; if another request got
    /// there first the fresh row is evaluated and the precise reason returned.
    pub async fn accept(
        &self,
        account: &Account,
        token: &IssuedToken,
        now: DateTime<Utc>,
    ) -> AppResult<ResendGrant> {
        if account.is_verified {
            return Err(AppError::Validation("Email is already verified".to_string()));
        }

        if let Some(err) = ResendDecision::evaluate(
            account.verification_resend_count,
            account.last_verification_resend,
            now,
        )
        .rejection()
        {
            return Err(err);
        }

        let window_start = now - Duration::hours(RESEND_WINDOW_HOURS);
        let cooldown_start = now - Duration::seconds(RESEND_COOLDOWN_SECONDS);

        let row = sqlx::query(
            "UPDATE account SET
                verification_resend_count = CASE
                    WHEN last_verification_resend IS NULL OR last_verification_resend < ?1 THEN 1
                    ELSE verification_resend_count + 1
                END,
                last_verification_resend = ?2,
                verification_token = ?3,
                verification_token_expires_at = ?4,
                updated_at = ?2
             WHERE id = ?5
               AND is_verified = 0
               AND (last_verification_resend IS NULL
                    OR last_verification_resend < ?1
                    OR (verification_resend_count < ?6 AND last_verification_resend <= ?7))
             RETURNING verification_resend_count",
        )
        .bind(window_start)
        .bind(now)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(&account.id)
        .bind(MAX_RESENDS_PER_WINDOW)
        .bind(cooldown_start)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let count: i64 = row.get("verification_resend_count");
                tracing::debug!(account_id = %account.id, count, "Verification resend accepted");
                Ok(ResendGrant {
                    count,
                    remaining: (MAX_RESENDS_PER_WINDOW - count).max(0),
                })
            }
            None => Err(self.explain_lost_race(&account.id, now).await?),
        }
    }

    async fn explain_lost_race(&self, account_id: &str, now: DateTime<Utc>) -> AppResult<AppError> {
        let row = sqlx::query(
            "SELECT is_verified, verification_resend_count, last_verification_resend
             FROM account WHERE id = ?1",
        )
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        if row.get::<bool, _>("is_verified") {
            return Ok(AppError::Validation("Email is already verified".to_string()));
        }

        let decision = ResendDecision::evaluate(
            row.get("verification_resend_count"),
            row.get("last_verification_resend"),
            now,
        );

        Ok(decision.rejection().unwrap_or_else(|| {
            AppError::RateLimited {
                message: "Please wait before requesting another verification email".to_string(),
                retry_after: now + Duration::seconds(RESEND_COOLDOWN_SECONDS),
                wait_seconds: RESEND_COOLDOWN_SECONDS,
            }
        }))
    }
}
