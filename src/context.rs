/// Application context and dependency injection
use crate::{
    account::{google::GoogleOAuthClient, AccountManager},
    chat::{ChatService, RoomRegistry},
    config::ServerConfig,
    db,
    error::AppResult,
    mailer::{sender_from_config, NotificationDispatcher, DEFAULT_QUEUE_CAPACITY},
    rate_limit::RateLimiter,
    resource::ResourceManager,
    staff::StaffDirectory,
    storage::{DiskObjectStorage, ObjectStorage, UploadLedger},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub resource_manager: Arc<ResourceManager>,
    pub staff_directory: Arc<StaffDirectory>,
    pub chat: Arc<ChatService>,
    pub rooms: Arc<RoomRegistry>,
    pub storage: Arc<dyn ObjectStorage>,
    pub uploads: UploadLedger,
    pub google: Option<Arc<GoogleOAuthClient>>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration.
    ///
    /// Also returns the handle of the notification worker.
    pub async fn new(config: ServerConfig) -> AppResult<(Self, JoinHandle<()>)> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let sender = sender_from_config(config.email.as_ref())?;
        let (notifier, worker) = NotificationDispatcher::spawn(sender, DEFAULT_QUEUE_CAPACITY);

        let storage: Arc<dyn ObjectStorage> = Arc::new(DiskObjectStorage::new(
            config.storage.file_location.clone(),
            config.storage.public_file_url.clone(),
        ));

        let google = match &config.google {
            Some(google) => {
                tracing::info!("Google sign-in enabled");
                Some(Arc::new(GoogleOAuthClient::new(google.clone())?))
            }
            None => {
                tracing::info!("Google sign-in disabled - no client credentials");
                None
            }
        };

        let config = Arc::new(config);
        let ctx = Self::assemble(db, config, storage, notifier, google);
        Ok((ctx, worker))
    }

    /// Wire the services together around an existing pool
    pub fn assemble(
        db: SqlitePool,
        config: Arc<ServerConfig>,
        storage: Arc<dyn ObjectStorage>,
        notifier: NotificationDispatcher,
        google: Option<Arc<GoogleOAuthClient>>,
    ) -> Self {
        let account_manager = Arc::new(AccountManager::new(
            db.clone(),
            config.clone(),
            notifier.clone(),
        ));
        let resource_manager = Arc::new(ResourceManager::new(
            db.clone(),
            storage.clone(),
            notifier,
            config.service.frontend_url.clone(),
        ));
        let staff_directory = Arc::new(StaffDirectory::new(db.clone(), storage.clone()));
        let chat = Arc::new(ChatService::new(db.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let uploads = UploadLedger::new(db.clone());

        Self {
            config,
            db,
            account_manager,
            resource_manager,
            staff_directory,
            chat,
            rooms: Arc::new(RoomRegistry::new()),
            uploads,
            storage,
            google,
            rate_limiter,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> AppResult<()> {
        let dirs = [
            &config.storage.data_directory,
            &config.storage.file_location,
        ];

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }

    /// Context over an in-memory database with test doubles
    #[cfg(test)]
    pub async fn for_tests() -> (Self, tokio::sync::mpsc::Receiver<crate::mailer::Notification>) {
        let (notifier, rx) = NotificationDispatcher::detached(256);
        let ctx = Self::assemble(
            db::test_pool().await,
            Arc::new(ServerConfig::for_tests()),
            Arc::new(crate::storage::memory::MemoryObjectStorage::new()),
            notifier,
            None,
        );
        (ctx, rx)
    }
}
