/// Unibro - university resource sharing backend
///
/// Accounts with email verification and login lockout, moderated course
/// resources, a staff directory and per-course chat rooms.

mod account;
mod api;
mod auth;
mod chat;
mod config;
mod context;
mod db;
mod error;
mod jobs;
mod mailer;
mod rate_limit;
mod resource;
mod server;
mod staff;
mod storage;

use config::ServerConfig;
use context::AppContext;
use error::AppResult;
use std::{sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long queued notifications get to go out at shutdown
const NOTIFICATION_DRAIN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    let registry = tracing_subscriber::registry().with(EnvFilter::new(&config.logging.level));
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Unibro backend v{}", env!("CARGO_PKG_VERSION"));

    // Create application context
    let (ctx, notification_worker) = AppContext::new(config).await?;
    let ctx = Arc::new(ctx);

    // Start background jobs
    let running_jobs = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx))).start();

    // Start server, returns once a shutdown signal has been handled
    let result = server::serve((*ctx).clone()).await;

    // Release every dispatcher handle so the worker can drain its queue
    running_jobs.shutdown().await;
    drop(ctx);
    mailer::drain_notifications(notification_worker, NOTIFICATION_DRAIN_GRACE).await;

    result
}
