/// Application context and dependency injection
use crate::{
    config::LarkmConfig,
    db,
    error::LarkmResult,
    registry::{ArkRegistry, ArkStore, SqliteArkStore},
    search::SearchAdapter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<LarkmConfig>,
    pub db: SqlitePool,
    pub registry: Arc<ArkRegistry>,
    pub search: Arc<SearchAdapter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: LarkmConfig) -> LarkmResult<Self> {
        let db = db::create_pool(&config.storage.db_path, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        tracing::info!("ARK database ready at {}", config.storage.db_path.display());
        match &config.storage.search_index_path {
            Some(path) if path.exists() => tracing::info!("Search index at {}", path.display()),
            Some(path) => tracing::warn!(
                "Search index {} does not exist yet, run larkm-index to build it",
                path.display()
            ),
            None => tracing::info!("No search index configured"),
        }

        Ok(Self::from_pool(config, db))
    }

    /// Wire the services over an already migrated pool
    pub fn from_pool(config: LarkmConfig, db: SqlitePool) -> Self {
        let config = Arc::new(config);
        let store: Arc<dyn ArkStore> = Arc::new(SqliteArkStore::new(db.clone()));
        let registry = Arc::new(ArkRegistry::new(Arc::clone(&store), Arc::clone(&config)));
        let search = Arc::new(SearchAdapter::new(
            config.storage.search_index_path.clone(),
            store,
        ));

        Self {
            config,
            db,
            registry,
            search,
        }
    }
}
