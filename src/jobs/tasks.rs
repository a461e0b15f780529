/// Background task implementations
use crate::{context::AppContext, error::AppResult};
use chrono::Utc;

/// Clear verification and password reset pairs past their expiry
pub async fn sweep_expired_tokens(ctx: &AppContext) -> AppResult<u64> {
    ctx.account_manager.sweep_expired_tokens(Utc::now()).await
}

/// Health check - verify the database is reachable
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_sweep_clears_only_expired_pairs() {
        let (ctx, _rx) = AppContext::for_tests().await;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO account (id, full_name, email, password_hash, is_verified,
                 verification_token, verification_token_expires_at,
                 verification_resend_count, login_attempts, created_at, updated_at)
             VALUES (?1, 'Stale', ?2, 'hash', 0, ?3, ?4, 0, 0, ?5, ?5)",
        )
        .bind("stale")
        .bind("stale@example.edu")
        .bind("old-token")
        .bind(now - Duration::hours(1))
        .bind(now)
        .execute(&ctx.db)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO account (id, full_name, email, password_hash, is_verified,
                 verification_token, verification_token_expires_at,
                 verification_resend_count, login_attempts, created_at, updated_at)
             VALUES (?1, 'Fresh', ?2, 'hash', 0, ?3, ?4, 0, 0, ?5, ?5)",
        )
        .bind("fresh")
        .bind("fresh@example.edu")
        .bind("new-token")
        .bind(now + Duration::hours(1))
        .bind(now)
        .execute(&ctx.db)
        .await
        .unwrap();

        assert_eq!(sweep_expired_tokens(&ctx).await.unwrap(), 1);

        let fresh = ctx.account_manager.get_account("fresh").await.unwrap();
        assert!(fresh.verification.is_some());
        let stale = ctx.account_manager.get_account("stale").await.unwrap();
        assert!(stale.verification.is_none());

        health_check(&ctx).await.unwrap();
    }
}
