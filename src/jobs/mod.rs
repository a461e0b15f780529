use std::sync::Arc;
use tokio::{
    task::JoinHandle,
    time::{interval, Duration},
};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) -> RunningJobs {
        info!("Starting background job scheduler");

        let handles = vec![
            tokio::spawn(Self::expired_token_sweep_job(Arc::clone(&self))),
            tokio::spawn(Self::health_check_job(Arc::clone(&self))),
        ];

        info!("Background jobs started");
        RunningJobs { handles }
    }

    /// Clear expired verification and reset tokens (runs every hour)
    async fn expired_token_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            info!("Running expired token sweep");

            match tasks::sweep_expired_tokens(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleared {} expired tokens", count);
                    } else {
                        info!("Token sweep: no expired tokens found");
                    }
                }
                Err(e) => error!("Failed to sweep expired tokens: {}", e),
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&scheduler.context).await {
                error!("Health check failed: {}", e);
            }
        }
    }
}

/// Handles of the spawned job loops
pub struct RunningJobs {
    handles: Vec<JoinHandle<()>>,
}

impl RunningJobs {
    /// Stop every job and wait until each has released its context
    pub async fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Background job ended abnormally: {}", e);
                }
            }
        }
        info!("Background jobs stopped");
    }
}
