/// larkm-index
///
/// Rebuilds the metadata search index from the ARK database.
///
/// Usage: larkm-index [INDEX_PATH]
/// The index path defaults to the configured `search_index_path`.

use anyhow::{bail, Context, Result};
use larkm::{db, logging, registry::SqliteArkStore, search, LarkmConfig};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = LarkmConfig::from_env().context("Failed to load configuration")?;

    let index_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => match config.storage.search_index_path.clone() {
            Some(path) => path,
            None => bail!("No index path given and search_index_path is not configured"),
        },
    };

    let db_path = &config.storage.db_path;
    if !db_path.exists() {
        bail!("ARK database {} does not exist", db_path.display());
    }

    let pool = db::create_pool(db_path, db::DatabaseOptions::default())
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    db::run_migrations(&pool).await.context("Failed to run migrations")?;

    let store = SqliteArkStore::new(pool);
    let indexed = search::rebuild_index(&store, &index_path)
        .await
        .with_context(|| format!("Failed to rebuild index at {}", index_path.display()))?;

    tracing::info!("Search index {} now holds {} ARKs", index_path.display(), indexed);
    Ok(())
}
