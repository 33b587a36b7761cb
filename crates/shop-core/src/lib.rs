//! # shop-core: Foundational Types for the Shop Records Core
//!
//! Defines the primitives every lifecycle record is built from. Every
//! other crate in the workspace depends on `shop-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `RepairId`, `BillId`,
//!    `RecordCode`, `LicenseKey`, `Money`, `Rate`, `Rating`: all newtypes
//!    with validated constructors. No bare strings or floats for codes and
//!    amounts.
//!
//! 2. **Single `EntityKind` enum.** One definition, four variants, exhaustive
//!    `match` everywhere. The code prefix of each kind lives here and nowhere
//!    else.
//!
//! 3. **Fixed-point arithmetic.** Money is `i64` cents, rates are `i64`
//!    basis points. Rounding happens once, when a derived amount is stored.
//!
//! 4. **Explicit clock.** Nothing in this crate reads the system clock except
//!    [`Timestamp::now()`]. Derived predicates take `now` as an argument.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `shop-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod code;
pub mod deadline;
pub mod error;
pub mod identity;
pub mod kind;
pub mod license_key;
pub mod money;
pub mod rating;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use code::{CodeProposal, CodeSequencer, RecordCode, MAX_SEQUENCE};
pub use error::{ErrorClass, ValidationError};
pub use identity::{BillId, LicenseId, RepairId, ServiceId};
pub use kind::EntityKind;
pub use license_key::LicenseKey;
pub use money::{BillTotals, Money, Rate};
pub use rating::Rating;
pub use temporal::Timestamp;
