pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod sheets;

pub use pool::{create_pool, DbPool};

use std::sync::Arc;

use anyhow::Result;
use config::StorageBackend;
use repositories::{PostgresClientRepository, PostgresOperationLogRepository};
use services::operations::ports::OperationLogRepository;
use services::subscription::memory::InMemoryStore;
use services::subscription::ports::ClientRepository;
use sheets::{SheetsClient, SheetsRepository};

/// PostgreSQL connection pool plus schema management
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database service from a connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new database service from configuration
    pub async fn from_config(config: &config::DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn client_repository(&self) -> Arc<PostgresClientRepository> {
        Arc::new(PostgresClientRepository::new(self.pool.clone()))
    }

    pub fn operation_log_repository(&self) -> Arc<PostgresOperationLogRepository> {
        Arc::new(PostgresOperationLogRepository::new(self.pool.clone()))
    }
}

/// The record store behind the subscription service, whichever backend is selected
pub struct Storage {
    pub backend: StorageBackend,
    pub clients: Arc<dyn ClientRepository>,
    pub operations: Arc<dyn OperationLogRepository>,
}

impl Storage {
    /// Connect to the configured backend and make sure its schema exists
    pub async fn connect(config: &config::Config) -> Result<Self> {
        let backend = config.storage.backend;
        tracing::info!("Connecting to {} storage backend", backend.as_str());

        match backend {
            StorageBackend::Postgres => {
                let db = Database::from_config(&config.database).await?;
                db.run_migrations().await?;
                Ok(Self {
                    backend,
                    clients: db.client_repository(),
                    operations: db.operation_log_repository(),
                })
            }
            StorageBackend::Sheets => {
                if !config.sheets.is_configured() {
                    anyhow::bail!(
                        "STORAGE_BACKEND=sheets requires SHEETS_SPREADSHEET_ID and SHEETS_SERVICE_ACCOUNT_KEY(_FILE) or SHEETS_ACCESS_TOKEN"
                    );
                }
                let client = SheetsClient::new(&config.sheets)?;
                let repo = Arc::new(SheetsRepository::new(client, &config.sheets));
                repo.ensure_schema().await?;
                Ok(Self {
                    backend,
                    clients: repo.clone(),
                    operations: repo,
                })
            }
            StorageBackend::Memory => Ok(Self::in_memory()),
        }
    }

    /// Process-local store; contents are lost on exit
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            backend: StorageBackend::Memory,
            clients: store.clone(),
            operations: store,
        }
    }
}
