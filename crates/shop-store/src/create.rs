//! # Code Allocation
//!
//! Creating a record means picking the next code in its month bucket and
//! inserting under the store's unique constraints. Two writers may pick
//! the same code; the loser sees a conflict and tries again with a fresh
//! read of the index.

use shop_core::{CodeProposal, CodeSequencer, RecordCode, Timestamp};
use shop_state::LifecycleError;

use crate::error::StoreError;
use crate::record::StoredRecord;
use crate::store::RecordStore;

/// Allocate the next code for `R` and insert the record `build` makes
/// from it.
///
/// `build` runs once per attempt, so anything it generates (such as a
/// license key) is fresh on every retry. A conflict on any unique column
/// triggers a retry; after `attempts` conflicts the call fails with
/// [`StoreError::CodeGenerationExhausted`].
pub async fn create_with_code<R, S, F>(store: &S, now: Timestamp, attempts: u32, mut build: F) -> Result<R, StoreError>
where
    R: StoredRecord,
    S: RecordStore<R>,
    F: FnMut(RecordCode) -> Result<R, LifecycleError>,
{
    let kind = R::KIND;
    let prefix = CodeSequencer::bucket_prefix(kind, now);

    for attempt in 1..=attempts {
        let greatest = store.greatest_code_with_prefix(&prefix).await?;
        let code = match CodeSequencer::propose(kind, now, greatest.as_deref())? {
            CodeProposal::Next(code) => code,
            CodeProposal::Corrupted { found } => {
                tracing::warn!(%kind, found = %found, "corrupted code suffix, scanning bucket for a free code");
                let taken = store.codes_with_prefix(&prefix).await?;
                CodeSequencer::first_unused(kind, now, |c| taken.contains(c))?
            }
        };

        let record = build(code)?;
        match store.insert(&record).await {
            Ok(()) => {
                tracing::info!(%kind, code = %record.code(), attempt, "record created");
                return Ok(record);
            }
            Err(StoreError::Conflict { field, value, .. }) => {
                tracing::warn!(%kind, field, value = %value, attempt, "unique conflict on create, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    tracing::error!(%kind, attempts, "code allocation exhausted");
    Err(StoreError::CodeGenerationExhausted { kind, attempts })
}
