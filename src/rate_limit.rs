/// Request rate limiting
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

/// Moderation and user administration routes get the admin tier
const ADMIN_PATHS: [&str; 3] = ["/api/resources/admin", "/api/resources/pending", "/api/users"];

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

fn quota(per_second: u32, burst: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN))
}

/// Tiered process-wide limiter
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<DirectLimiter>,
    unauthenticated: Arc<DirectLimiter>,
    admin: Arc<DirectLimiter>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let burst = config.burst_size.max(1);

        Self {
            enabled: config.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(quota(
                config.authenticated_rps,
                burst,
            ))),
            unauthenticated: Arc::new(GovernorLimiter::direct(quota(
                config.unauthenticated_rps,
                (burst / 5).max(1),
            ))),
            admin: Arc::new(GovernorLimiter::direct(quota(
                config.authenticated_rps.saturating_mul(10),
                burst.saturating_mul(2),
            ))),
        }
    }

    fn check(limiter: &DirectLimiter) -> AppResult<()> {
        limiter.check().map_err(|_| AppError::RateLimited {
            message: "Too many requests, please slow down".to_string(),
            retry_after: Utc::now() + Duration::seconds(1),
            wait_seconds: 1,
        })
    }

    pub fn check_authenticated(&self) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }
        Self::check(&self.authenticated)
    }

    pub fn check_unauthenticated(&self) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }
        Self::check(&self.unauthenticated)
    }

    pub fn check_admin(&self) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }
        Self::check(&self.admin)
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    let is_admin = ADMIN_PATHS.iter().any(|prefix| path.starts_with(prefix));
    let has_auth_header = request.headers().get("authorization").is_some();

    if is_admin && has_auth_header {
        ctx.rate_limiter.check_admin()?;
    } else if has_auth_header {
        ctx.rate_limiter.check_authenticated()?;
    } else {
        ctx.rate_limiter.check_unauthenticated()?;
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool) -> RateLimitConfig {
        RateLimitConfig {
            enabled,
            authenticated_rps: 10,
            unauthenticated_rps: 5,
            burst_size: 5,
        }
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(&config(true));

        assert!(limiter.check_authenticated().is_ok());
        assert!(limiter.check_unauthenticated().is_ok());
        assert!(limiter.check_admin().is_ok());
    }

    #[test]
    fn test_burst_limit() {
        let limiter = RateLimiter::new(&config(true));

        for _ in 0..5 {
            assert!(limiter.check_authenticated().is_ok());
        }

        assert!(matches!(
            limiter.check_authenticated(),
            Err(AppError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_disabled_limiter_never_rejects() {
        let limiter = RateLimiter::new(&config(false));
        for _ in 0..100 {
            assert!(limiter.check_unauthenticated().is_ok());
        }
    }
}
