//! # In-Memory Store
//!
//! Process-local backend used when no database is configured and by the
//! test suites. Each record type gets its own [`Table`]; all index
//! maintenance for a write happens under one `parking_lot` write lock,
//! which is never held across an `.await`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use parking_lot::RwLock;
use uuid::Uuid;

use shop_core::EntityKind;
use shop_state::{Bill, License, LifecycleError, Repair, Service};

use crate::error::StoreError;
use crate::record::StoredRecord;
use crate::store::RecordStore;

// ─── Table ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct TableInner<R> {
    rows: HashMap<Uuid, R>,
    /// Code index. `None` marks a legacy code with no live row.
    codes: BTreeMap<String, Option<Uuid>>,
    secondary: HashMap<String, Uuid>,
}

/// Rows of one record type plus their unique indexes.
#[derive(Debug)]
pub struct Table<R> {
    inner: RwLock<TableInner<R>>,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(TableInner {
                rows: HashMap::new(),
                codes: BTreeMap::new(),
                secondary: HashMap::new(),
            }),
        }
    }
}

impl<R: StoredRecord> Table<R> {
    fn conflict(field: &'static str, value: impl Into<String>) -> StoreError {
        StoreError::Conflict {
            kind: R::KIND,
            field,
            value: value.into(),
        }
    }

    fn codes_from<'a>(
        codes: &'a BTreeMap<String, Option<Uuid>>,
        prefix: &'a str,
    ) -> impl DoubleEndedIterator<Item = &'a String> + 'a {
        codes
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(code, _)| code)
            .filter(move |code| code.starts_with(prefix))
    }

    fn greatest_with_prefix(&self, prefix: &str) -> Option<String> {
        let inner = self.inner.read();
        let greatest = Self::codes_from(&inner.codes, prefix).next_back().cloned();
        greatest
    }

    fn with_prefix(&self, prefix: &str) -> BTreeSet<String> {
        let inner = self.inner.read();
        let codes = Self::codes_from(&inner.codes, prefix).cloned().collect();
        codes
    }

    fn insert(&self, record: &R) -> Result<(), StoreError> {
        let id = record.id();
        let code = record.code().to_string();
        let mut inner = self.inner.write();
        if inner.rows.contains_key(&id) {
            return Err(Self::conflict("id", id.to_string()));
        }
        if inner.codes.contains_key(&code) {
            return Err(Self::conflict("code", code));
        }
        if let (Some(field), Some(key)) = (R::SECONDARY_KEY, record.secondary_key()) {
            if inner.secondary.contains_key(key) {
                return Err(Self::conflict(field, key));
            }
            inner.secondary.insert(key.to_string(), id);
        }
        inner.codes.insert(code, Some(id));
        inner.rows.insert(id, record.clone());
        Ok(())
    }

    fn get(&self, id: Uuid) -> Option<R> {
        self.inner.read().rows.get(&id).cloned()
    }

    fn get_by_code(&self, code: &str) -> Option<R> {
        let inner = self.inner.read();
        let id = inner.codes.get(code).copied().flatten()?;
        inner.rows.get(&id).cloned()
    }

    fn find_by_secondary_key(&self, key: &str) -> Option<R> {
        let inner = self.inner.read();
        let id = inner.secondary.get(key)?;
        inner.rows.get(id).cloned()
    }

    fn list(&self) -> Vec<R> {
        let mut rows: Vec<R> = self.inner.read().rows.values().cloned().collect();
        rows.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.code().to_string().cmp(&b.code().to_string()))
        });
        rows
    }

    fn update<T>(&self, id: Uuid, f: impl FnOnce(&mut R) -> Result<T, LifecycleError>) -> Result<(R, T), StoreError> {
        let mut inner = self.inner.write();
        let current = inner.rows.get(&id).ok_or_else(|| StoreError::not_found(R::KIND, id))?;
        let mut next = current.clone();
        let out = f(&mut next)?;
        if next.code() != current.code() {
            return Err(Self::conflict("code", next.code().to_string()));
        }

        let old_key = current.secondary_key().map(str::to_string);
        let new_key = next.secondary_key().map(str::to_string);
        if old_key != new_key {
            if let (Some(field), Some(key)) = (R::SECONDARY_KEY, new_key.as_deref()) {
                if inner.secondary.contains_key(key) {
                    return Err(Self::conflict(field, key));
                }
                inner.secondary.insert(key.to_string(), id);
            }
            if let Some(old) = old_key {
                inner.secondary.remove(&old);
            }
        }
        inner.rows.insert(id, next.clone());
        Ok((next, out))
    }

    fn seed_code(&self, code: &str) {
        self.inner.write().codes.entry(code.to_string()).or_insert(None);
    }
}

// ─── MemoryStore ─────────────────────────────────────────────────────

/// In-memory backend for all four record types.
#[derive(Debug, Default)]
pub struct MemoryStore {
    repairs: Table<Repair>,
    bills: Table<Bill>,
    services: Table<Service>,
    licenses: Table<License>,
}

/// Selects the [`Table`] holding records of type `R`.
pub trait TableFor<R> {
    /// The table.
    fn table(&self) -> &Table<R>;
}

impl TableFor<Repair> for MemoryStore {
    fn table(&self) -> &Table<Repair> {
        &self.repairs
    }
}

impl TableFor<Bill> for MemoryStore {
    fn table(&self) -> &Table<Bill> {
        &self.bills
    }
}

impl TableFor<Service> for MemoryStore {
    fn table(&self) -> &Table<Service> {
        &self.services
    }
}

impl TableFor<License> for MemoryStore {
    fn table(&self) -> &Table<License> {
        &self.licenses
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupy `code` in the code index of `kind` without a backing row.
    ///
    /// Models codes written by older tooling, including malformed ones, so
    /// allocation has to step around them.
    pub fn seed_legacy_code(&self, kind: EntityKind, code: &str) {
        match kind {
            EntityKind::Repair => self.repairs.seed_code(code),
            EntityKind::Bill => self.bills.seed_code(code),
            EntityKind::Service => self.services.seed_code(code),
            EntityKind::License => self.licenses.seed_code(code),
        }
    }
}

impl<R: StoredRecord> RecordStore<R> for MemoryStore
where
    MemoryStore: TableFor<R>,
{
    async fn greatest_code_with_prefix(&self, prefix: &str) -> Result<Option<String>, StoreError> {
        Ok(self.table().greatest_with_prefix(prefix))
    }

    async fn codes_with_prefix(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.table().with_prefix(prefix))
    }

    async fn insert(&self, record: &R) -> Result<(), StoreError> {
        self.table().insert(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<R>, StoreError> {
        Ok(self.table().get(id))
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<R>, StoreError> {
        Ok(self.table().get_by_code(code))
    }

    async fn find_by_secondary_key(&self, key: &str) -> Result<Option<R>, StoreError> {
        Ok(self.table().find_by_secondary_key(key))
    }

    async fn list(&self) -> Result<Vec<R>, StoreError> {
        Ok(self.table().list())
    }

    async fn update<T, F>(&self, id: Uuid, f: F) -> Result<(R, T), StoreError>
    where
        T: Send,
        F: FnOnce(&mut R) -> Result<T, LifecycleError> + Send,
    {
        self.table().update(id, f)
    }
}
