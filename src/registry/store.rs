/// Persistence for ARK records
///
/// The registry only talks to storage through `ArkStore`. The SQLite backend
/// relies on the table's UNIQUE constraints for identifier and target, and
/// reports a constraint violation as the matching `Conflict`.
use super::models::{ArkChanges, ArkRecord};
use crate::error::{ConflictKind, LarkmError, LarkmResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Narrow CRUD interface over stored ARKs
#[async_trait]
pub trait ArkStore: Send + Sync {
    /// Insert a new record; duplicates surface as `LarkmError::Conflict`
    async fn insert(&self, record: &ArkRecord) -> LarkmResult<()>;

    /// Fetch a record by canonical ARK string
    async fn get(&self, ark_string: &str) -> LarkmResult<Option<ArkRecord>>;

    /// Fetch a record by target URL
    async fn get_by_target(&self, target: &str) -> LarkmResult<Option<ArkRecord>>;

    async fn identifier_exists(&self, identifier: &str) -> LarkmResult<bool>;

    async fn target_exists(&self, target: &str) -> LarkmResult<bool>;

    /// Apply the present fields of `changes` to an existing record in one
    /// statement, so concurrent updates of different fields all survive.
    /// Returns the record as stored afterwards, or None if it does not exist.
    async fn update(
        &self,
        ark_string: &str,
        changes: &ArkChanges,
        modified: DateTime<Utc>,
    ) -> LarkmResult<Option<ArkRecord>>;

    /// Remove a record. Returns false if there was nothing to remove.
    async fn delete(&self, ark_string: &str) -> LarkmResult<bool>;

    async fn count(&self) -> LarkmResult<i64>;

    /// Records ordered by creation date, for batch consumers
    async fn page(&self, limit: i64, offset: i64) -> LarkmResult<Vec<ArkRecord>>;
}

/// SQLite-backed ARK store
#[derive(Clone)]
pub struct SqliteArkStore {
    db: SqlitePool,
}

impl SqliteArkStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

const COLUMNS: &str = "ark_string, naan, shoulder, identifier, target, erc_who, erc_what, erc_when, erc_where, policy, date_created, date_modified";

fn select_where(condition: &str) -> String {
    format!("SELECT {} FROM arks WHERE {}", COLUMNS, condition)
}

/// Map a duplicate-key error onto the field that collided
fn translate_write_error(
    err: sqlx::Error,
    ark_string: &str,
    identifier: Option<&str>,
    target: Option<&str>,
) -> LarkmError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            let kind = if message.contains("arks.target") {
                ConflictKind::Target(target.unwrap_or_default().to_string())
            } else if message.contains("arks.identifier") {
                ConflictKind::Identifier(identifier.unwrap_or_default().to_string())
            } else {
                ConflictKind::ArkString(format!("ARK {} already exists.", ark_string))
            };
            return LarkmError::Conflict(kind);
        }
    }
    LarkmError::Storage(err)
}

#[async_trait]
impl ArkStore for SqliteArkStore {
    async fn insert(&self, record: &ArkRecord) -> LarkmResult<()> {
        sqlx::query(
            "INSERT INTO arks (ark_string, naan, shoulder, identifier, target, erc_who, erc_what, erc_when, erc_where, policy, date_created, date_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        )
        .bind(&record.ark_string)
        .bind(&record.naan)
        .bind(&record.shoulder)
        .bind(&record.identifier)
        .bind(&record.target)
        .bind(&record.who)
        .bind(&record.what)
        .bind(&record.when)
        .bind(&record.erc_where)
        .bind(&record.policy)
        .bind(record.date_created)
        .bind(record.date_modified)
        .execute(&self.db)
        .await
        .map_err(|e| {
            translate_write_error(
                e,
                &record.ark_string,
                Some(&record.identifier),
                Some(&record.target),
            )
        })?;

        Ok(())
    }

    async fn get(&self, ark_string: &str) -> LarkmResult<Option<ArkRecord>> {
        let row = sqlx::query(&select_where("ark_string = ?1"))
            .bind(ark_string)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.as_ref().map(ArkRecord::from_row).transpose()?)
    }

    async fn get_by_target(&self, target: &str) -> LarkmResult<Option<ArkRecord>> {
        let row = sqlx::query(&select_where("target = ?1"))
            .bind(target)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.as_ref().map(ArkRecord::from_row).transpose()?)
    }

    async fn identifier_exists(&self, identifier: &str) -> LarkmResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM arks WHERE identifier = ?1")
            .bind(identifier)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn target_exists(&self, target: &str) -> LarkmResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM arks WHERE target = ?1")
            .bind(target)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn update(
        &self,
        ark_string: &str,
        changes: &ArkChanges,
        modified: DateTime<Utc>,
    ) -> LarkmResult<Option<ArkRecord>> {
        // Absent fields bind NULL and keep the current column value
        let row = sqlx::query(&format!(
            "UPDATE arks
             SET target = COALESCE(?1, target),
                 erc_who = COALESCE(?2, erc_who),
                 erc_what = COALESCE(?3, erc_what),
                 erc_when = COALESCE(?4, erc_when),
                 policy = COALESCE(?5, policy),
                 erc_where = ark_string,
                 date_modified = ?6
             WHERE ark_string = ?7
             RETURNING {}",
            COLUMNS
        ))
        .bind(&changes.target)
        .bind(&changes.who)
        .bind(&changes.what)
        .bind(&changes.when)
        .bind(&changes.policy)
        .bind(modified)
        .bind(ark_string)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| translate_write_error(e, ark_string, None, changes.target.as_deref()))?;

        Ok(row.as_ref().map(ArkRecord::from_row).transpose()?)
    }

    async fn delete(&self, ark_string: &str) -> LarkmResult<bool> {
        let result = sqlx::query("DELETE FROM arks WHERE ark_string = ?1")
            .bind(ark_string)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> LarkmResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM arks")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    async fn page(&self, limit: i64, offset: i64) -> LarkmResult<Vec<ArkRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM arks ORDER BY date_created, ark_string LIMIT ?1 OFFSET ?2",
            COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(ArkRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn setup_store() -> SqliteArkStore {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        SqliteArkStore::new(pool)
    }

    fn record(identifier: &str, target: &str) -> ArkRecord {
        let now = Utc::now();
        let ark_string = format!("ark:99999/s1{}", identifier);
        ArkRecord {
            naan: "99999".to_string(),
            shoulder: "s1".to_string(),
            identifier: identifier.to_string(),
            ark_string: ark_string.clone(),
            target: target.to_string(),
            who: ":at".to_string(),
            what: ":at".to_string(),
            when: ":at".to_string(),
            erc_where: ark_string,
            policy: "Default commitment statement.".to_string(),
            date_created: now,
            date_modified: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = setup_store().await;
        let rec = record("14b7f127b358", "https://example.com/a");
        store.insert(&rec).await.unwrap();

        let fetched = store.get(&rec.ark_string).await.unwrap().unwrap();
        assert_eq!(fetched, rec);
        assert!(store.identifier_exists("14b7f127b358").await.unwrap());
        assert!(store.target_exists("https://example.com/a").await.unwrap());
        assert_eq!(
            store.get_by_target("https://example.com/a").await.unwrap().unwrap().ark_string,
            rec.ark_string
        );
        assert!(store.get("ark:99999/s1000000000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_target_translated() {
        let store = setup_store().await;
        store.insert(&record("111111111111", "https://example.com/dup")).await.unwrap();

        let err = store
            .insert(&record("222222222222", "https://example.com/dup"))
            .await
            .unwrap_err();
        assert!(matches!(err, LarkmError::Conflict(ConflictKind::Target(_))));
    }

    #[tokio::test]
    async fn test_duplicate_identifier_translated() {
        let store = setup_store().await;
        store.insert(&record("333333333333", "https://example.com/1")).await.unwrap();

        let mut other = record("333333333333", "https://example.com/2");
        other.shoulder = "x9".to_string();
        other.ark_string = "ark:99999/x9333333333333".to_string();
        other.erc_where = other.ark_string.clone();

        let err = store.insert(&other).await.unwrap_err();
        assert!(matches!(err, LarkmError::Conflict(ConflictKind::Identifier(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = setup_store().await;
        let rec = record("444444444444", "https://example.com/before");
        store.insert(&rec).await.unwrap();

        let changes = ArkChanges {
            target: Some("https://example.com/after".to_string()),
            ..ArkChanges::default()
        };
        let modified = Utc::now();
        let updated = store
            .update(&rec.ark_string, &changes, modified)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.target, "https://example.com/after");
        assert_eq!(updated.who, rec.who);
        assert_eq!(store.get(&rec.ark_string).await.unwrap().unwrap(), updated);

        assert!(store.delete(&rec.ark_string).await.unwrap());
        assert!(!store.delete(&rec.ark_string).await.unwrap());
        assert!(store
            .update(&rec.ark_string, &changes, Utc::now())
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_only_touches_present_fields() {
        let store = setup_store().await;
        let rec = record("555555555555", "https://example.com/keep");
        store.insert(&rec).await.unwrap();

        let who = ArkChanges {
            who: Some("Someone".to_string()),
            ..ArkChanges::default()
        };
        let what = ArkChanges {
            what: Some("A title".to_string()),
            ..ArkChanges::default()
        };
        store.update(&rec.ark_string, &who, Utc::now()).await.unwrap();
        store.update(&rec.ark_string, &what, Utc::now()).await.unwrap();

        let stored = store.get(&rec.ark_string).await.unwrap().unwrap();
        assert_eq!(stored.who, "Someone");
        assert_eq!(stored.what, "A title");
        assert_eq!(stored.target, "https://example.com/keep");
        assert_eq!(stored.erc_where, rec.ark_string);
    }

    #[tokio::test]
    async fn test_update_target_collision_translated() {
        let store = setup_store().await;
        store.insert(&record("666666666666", "https://example.com/a")).await.unwrap();
        let rec = record("777777777777", "https://example.com/b");
        store.insert(&rec).await.unwrap();

        let changes = ArkChanges {
            target: Some("https://example.com/a".to_string()),
            ..ArkChanges::default()
        };
        let err = store
            .update(&rec.ark_string, &changes, Utc::now())
            .await
            .unwrap_err();
        assert!(
            matches!(err, LarkmError::Conflict(ConflictKind::Target(t)) if t == "https://example.com/a")
        );
    }

    #[tokio::test]
    async fn test_paging() {
        let store = setup_store().await;
        for i in 0..5 {
            let id = format!("{:012x}", i);
            store.insert(&record(&id, &format!("https://example.com/{}", i))).await.unwrap();
        }

        assert_eq!(store.page(2, 0).await.unwrap().len(), 2);
        assert_eq!(store.page(2, 4).await.unwrap().len(), 1);
        assert_eq!(store.count().await.unwrap(), 5);
    }
}
