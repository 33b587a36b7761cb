//! # Postgres Store
//!
//! One table per record kind (see `migrations/`). The indexed columns
//! (`id`, `code`, `secondary_key`, `status`, timestamps) live beside the
//! full record as JSONB. Uniqueness is enforced by named constraints and
//! unique violations surface as [`StoreError::Conflict`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use shop_core::EntityKind;
use shop_state::LifecycleError;

use crate::error::StoreError;
use crate::record::StoredRecord;
use crate::store::RecordStore;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed store for all record kinds.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connected pool. Migrations must already have run.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Repair => "repairs",
        EntityKind::Bill => "bills",
        EntityKind::Service => "services",
        EntityKind::License => "licenses",
    }
}

/// Map a unique violation on `record`'s table to a conflict naming the
/// column; other errors pass through.
fn map_insert_error<R: StoredRecord>(err: sqlx::Error, record: &R) -> StoreError {
    let sqlx::Error::Database(db) = &err else {
        return err.into();
    };
    if db.code().as_deref() != Some(UNIQUE_VIOLATION) {
        return err.into();
    }
    let constraint = db.constraint().unwrap_or_default();
    let (field, value) = if constraint.ends_with("_secondary_key_key") {
        (
            R::SECONDARY_KEY.unwrap_or("secondary_key"),
            record.secondary_key().unwrap_or_default().to_string(),
        )
    } else if constraint.ends_with("_code_key") {
        ("code", record.code().to_string())
    } else {
        ("id", record.id().to_string())
    };
    StoreError::Conflict {
        kind: R::KIND,
        field,
        value,
    }
}

// ─── Rows ────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct RecordRow {
    record: serde_json::Value,
}

impl RecordRow {
    fn into_record<R: StoredRecord>(self) -> Result<R, StoreError> {
        Ok(serde_json::from_value(self.record)?)
    }
}

#[derive(sqlx::FromRow)]
struct CodeRow {
    code: String,
}

fn timestamp(t: shop_core::Timestamp) -> DateTime<Utc> {
    *t.as_datetime()
}

// ─── RecordStore ─────────────────────────────────────────────────────

impl<R: StoredRecord> RecordStore<R> for PgStore {
    async fn greatest_code_with_prefix(&self, prefix: &str) -> Result<Option<String>, StoreError> {
        let sql = format!(
            "SELECT code FROM {} WHERE code LIKE $1 ORDER BY code COLLATE \"C\" DESC LIMIT 1",
            table(R::KIND)
        );
        let row = sqlx::query_as::<_, CodeRow>(&sql)
            .bind(format!("{prefix}%"))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.code))
    }

    async fn codes_with_prefix(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        let sql = format!("SELECT code FROM {} WHERE code LIKE $1", table(R::KIND));
        let rows = sqlx::query_as::<_, CodeRow>(&sql)
            .bind(format!("{prefix}%"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.code).collect())
    }

    async fn insert(&self, record: &R) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, code, secondary_key, status, record, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            table(R::KIND)
        );
        let json = serde_json::to_value(record)?;
        sqlx::query(&sql)
            .bind(record.id())
            .bind(record.code().to_string())
            .bind(record.secondary_key())
            .bind(record.status())
            .bind(&json)
            .bind(timestamp(record.created_at()))
            .bind(timestamp(record.updated_at()))
            .execute(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, record))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<R>, StoreError> {
        let sql = format!("SELECT record FROM {} WHERE id = $1", table(R::KIND));
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(RecordRow::into_record).transpose()
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<R>, StoreError> {
        let sql = format!("SELECT record FROM {} WHERE code = $1", table(R::KIND));
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(RecordRow::into_record).transpose()
    }

    async fn find_by_secondary_key(&self, key: &str) -> Result<Option<R>, StoreError> {
        if R::SECONDARY_KEY.is_none() {
            return Ok(None);
        }
        let sql = format!("SELECT record FROM {} WHERE secondary_key = $1", table(R::KIND));
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(RecordRow::into_record).transpose()
    }

    async fn list(&self) -> Result<Vec<R>, StoreError> {
        let sql = format!(
            "SELECT record FROM {} ORDER BY created_at, code COLLATE \"C\"",
            table(R::KIND)
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn update<T, F>(&self, id: Uuid, f: F) -> Result<(R, T), StoreError>
    where
        T: Send,
        F: FnOnce(&mut R) -> Result<T, LifecycleError> + Send,
    {
        let name = table(R::KIND);
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT record FROM {name} WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, RecordRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found(R::KIND, id))?;
        let mut record: R = row.into_record()?;
        let code = record.code().clone();
        // Dropping `tx` on the error path rolls back and releases the lock.
        let out = f(&mut record)?;
        if *record.code() != code {
            return Err(StoreError::Conflict {
                kind: R::KIND,
                field: "code",
                value: record.code().to_string(),
            });
        }

        let update = format!(
            "UPDATE {name} SET secondary_key = $1, status = $2, record = $3, updated_at = $4 WHERE id = $5"
        );
        let json = serde_json::to_value(&record)?;
        sqlx::query(&update)
            .bind(record.secondary_key())
            .bind(record.status())
            .bind(&json)
            .bind(timestamp(record.updated_at()))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_insert_error(e, &record))?;
        tx.commit().await?;
        Ok((record, out))
    }
}
