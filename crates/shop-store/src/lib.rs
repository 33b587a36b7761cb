//! # shop-store: Record Persistence
//!
//! The seam between lifecycle records and durable state.
//!
//! - [`RecordStore`] is the backend contract, implemented per record type
//!   by [`MemoryStore`] (process-local) and [`PgStore`] (PostgreSQL via
//!   sqlx).
//! - [`create_with_code`] allocates `<PREFIX><YYYYMM><NNNN>` codes under
//!   the store's unique constraints, retrying a bounded number of times
//!   when concurrent writers collide.
//! - [`Records`] is the operations layer: creation, patches, license
//!   engine calls and the overdue/expiry sweeps.
//!
//! ## Modes
//!
//! Persistence is optional. When `DATABASE_URL` is unset, [`init_pool`]
//! returns `None` and callers fall back to [`MemoryStore`], which loses
//! its contents on restart.

pub mod config;
pub mod create;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod records;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use create::create_with_code;
pub use error::StoreError;
pub use memory::{MemoryStore, Table, TableFor};
pub use postgres::PgStore;
pub use record::StoredRecord;
pub use records::Records;
pub use store::RecordStore;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect to PostgreSQL and run the embedded migrations.
///
/// Returns `None` when no database URL is configured (in-memory mode).
/// Returns `Err` if the URL is set but the connection or a migration fails.
pub async fn init_pool(config: &StoreConfig) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, running in-memory only. Records will not survive restarts.");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!(max_connections = config.max_connections, "connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Some(pool))
}
