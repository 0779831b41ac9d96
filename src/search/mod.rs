/// Metadata search
///
/// Searches a SQLite FTS5 index kept in its own database file. The index is
/// written only by `rebuild_index` (the `larkm-index` binary); the server
/// opens it read-only and hydrates hits from the ARK store, so a stale index
/// can return fewer ARKs than it counted but never outdated metadata.

pub mod query;

use crate::{
    db::{self, DatabaseOptions},
    error::{LarkmError, LarkmResult},
    registry::{ArkRecord, ArkStore},
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub use query::{DateRange, ParsedQuery};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Records read from the store per batch while rebuilding
const REBUILD_BATCH: i64 = 100;

const CREATE_INDEX: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS ark_index USING fts5(
    identifier, ark_string, shoulder, target,
    erc_who, erc_what, erc_when, erc_where, policy,
    date_created UNINDEXED, date_modified UNINDEXED
)";

/// One page of search results
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub num_results: i64,
    pub page: u32,
    pub page_size: u32,
    pub arks: Vec<ArkRecord>,
}

/// Search adapter over the FTS index and the ARK store
pub struct SearchAdapter {
    index_path: Option<PathBuf>,
    pool: OnceCell<SqlitePool>,
    store: Arc<dyn ArkStore>,
}

impl SearchAdapter {
    pub fn new(index_path: Option<PathBuf>, store: Arc<dyn ArkStore>) -> Self {
        Self {
            index_path,
            pool: OnceCell::new(),
            store,
        }
    }

    /// Read-only pool on the index, or None if no index has been built
    async fn index_pool(&self) -> LarkmResult<Option<&SqlitePool>> {
        let path = match &self.index_path {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        };

        let pool = self
            .pool
            .get_or_try_init(|| async {
                debug!("Opening search index at {}", path.display());
                db::create_pool(
                    path,
                    DatabaseOptions {
                        max_connections: 4,
                        enable_wal: false,
                        read_only: true,
                    },
                )
                .await
            })
            .await?;

        Ok(Some(pool))
    }

    /// Run a search
    ///
    /// Returns `Ok(None)` when there is no index to search.
    pub async fn search(
        &self,
        q: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> LarkmResult<Option<SearchResults>> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(LarkmError::InvalidQuery("page must be 1 or greater.".to_string()));
        }
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(LarkmError::InvalidQuery(format!(
                "page_size must be between 1 and {}.",
                MAX_PAGE_SIZE
            )));
        }

        let parsed = query::parse(q)?;

        let Some(pool) = self.index_pool().await? else {
            return Ok(None);
        };

        let offset = i64::from(page - 1) * i64::from(page_size);
        let (num_results, hits) =
            query_index(pool, &parsed, i64::from(page_size), offset).await?;

        let mut arks = Vec::with_capacity(hits.len());
        for ark_string in hits {
            match self.store.get(&ark_string).await? {
                Some(record) => arks.push(record),
                None => debug!("Dropping stale search hit {}", ark_string),
            }
        }

        Ok(Some(SearchResults {
            num_results,
            page,
            page_size,
            arks,
        }))
    }
}

/// WHERE clause and the values to bind to it, in order
fn where_clause(parsed: &ParsedQuery) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    if let Some(expr) = &parsed.match_expr {
        conditions.push("ark_index MATCH ?".to_string());
        binds.push(expr.clone());
    }
    for range in &parsed.ranges {
        conditions.push(format!("substr({}, 1, 10) BETWEEN ? AND ?", range.column));
        binds.push(range.from.format("%Y-%m-%d").to_string());
        binds.push(range.to.format("%Y-%m-%d").to_string());
    }

    (conditions.join(" AND "), binds)
}

async fn query_index(
    pool: &SqlitePool,
    parsed: &ParsedQuery,
    limit: i64,
    offset: i64,
) -> LarkmResult<(i64, Vec<String>)> {
    let (conditions, binds) = where_clause(parsed);
    let order = if parsed.match_expr.is_some() {
        "rank"
    } else {
        "date_created"
    };

    let count_sql = format!("SELECT COUNT(*) FROM ark_index WHERE {}", conditions);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for value in &binds {
        count_query = count_query.bind(value);
    }
    let num_results = count_query.fetch_one(pool).await.map_err(map_match_error)?;

    let hits_sql = format!(
        "SELECT ark_string FROM ark_index WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        conditions, order
    );
    let mut hits_query = sqlx::query_scalar::<_, String>(&hits_sql);
    for value in &binds {
        hits_query = hits_query.bind(value);
    }
    let hits = hits_query
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(map_match_error)?;

    Ok((num_results, hits))
}

/// FTS5 reports unparseable MATCH expressions as ordinary database errors
fn map_match_error(err: sqlx::Error) -> LarkmError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.message().contains("fts5") => {
            LarkmError::InvalidQuery(db_err.message().to_string())
        }
        _ => LarkmError::Storage(err),
    }
}

/// Rewrite the search index from every stored ARK
///
/// The index is replaced in one transaction, so readers see either the old
/// or the new contents. Returns the number of indexed ARKs.
pub async fn rebuild_index(store: &dyn ArkStore, index_path: &Path) -> LarkmResult<usize> {
    // Rollback journal, so read-only servers never need the -wal/-shm files
    let options = DatabaseOptions {
        max_connections: 1,
        enable_wal: false,
        read_only: false,
    };
    let pool = db::create_pool(index_path, options).await?;
    let total = store.count().await?;
    info!("Indexing {} ARKs into {}", total, index_path.display());

    let mut tx = pool.begin().await?;
    sqlx::query(CREATE_INDEX).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM ark_index").execute(&mut *tx).await?;

    let mut indexed = 0usize;
    let mut offset = 0i64;
    loop {
        let batch = store.page(REBUILD_BATCH, offset).await?;
        if batch.is_empty() {
            break;
        }
        for record in &batch {
            sqlx::query(
                "INSERT INTO ark_index (identifier, ark_string, shoulder, target, erc_who, erc_what, erc_when, erc_where, policy, date_created, date_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )
            .bind(&record.identifier)
            .bind(&record.ark_string)
            .bind(&record.shoulder)
            .bind(&record.target)
            .bind(&record.who)
            .bind(&record.what)
            .bind(&record.when)
            .bind(&record.erc_where)
            .bind(&record.policy)
            .bind(record.date_created.to_rfc3339())
            .bind(record.date_modified.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        indexed += batch.len();
        offset += REBUILD_BATCH;
    }

    tx.commit().await?;
    pool.close().await;

    info!("Indexed {} ARKs", indexed);
    Ok(indexed)
}
