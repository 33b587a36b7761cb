//! # Record Store Contract
//!
//! Backends implement [`RecordStore`] once per record type. Every method
//! is a single atomic operation against the backend; `update` in
//! particular runs its closure under the row lock so read-validate-write
//! cannot interleave with another writer.

use std::collections::BTreeSet;

use uuid::Uuid;

use shop_state::LifecycleError;

use crate::error::StoreError;
use crate::record::StoredRecord;

/// Persistence for one record type.
#[allow(async_fn_in_trait)]
pub trait RecordStore<R: StoredRecord> {
    /// The greatest stored code starting with `prefix`, compared bytewise.
    async fn greatest_code_with_prefix(&self, prefix: &str) -> Result<Option<String>, StoreError>;

    /// Every stored code starting with `prefix`, malformed ones included.
    async fn codes_with_prefix(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::Conflict`] when the id,
    /// code or secondary key is already taken.
    async fn insert(&self, record: &R) -> Result<(), StoreError>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<R>, StoreError>;

    /// Fetch by code.
    async fn get_by_code(&self, code: &str) -> Result<Option<R>, StoreError>;

    /// Fetch by the kind's secondary unique key. Kinds without one always
    /// return `None`.
    async fn find_by_secondary_key(&self, key: &str) -> Result<Option<R>, StoreError>;

    /// All records, oldest first.
    async fn list(&self) -> Result<Vec<R>, StoreError>;

    /// Atomically read, modify and write back a record.
    ///
    /// `f` works on the stored record; if it returns `Err` nothing is
    /// written. Returns the record as stored plus the closure's value.
    async fn update<T, F>(&self, id: Uuid, f: F) -> Result<(R, T), StoreError>
    where
        T: Send,
        F: FnOnce(&mut R) -> Result<T, LifecycleError> + Send;
}
