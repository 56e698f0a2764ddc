//! # Ledgerbase Core
//!
//! Entity mapping and temporal versioning over a relational substrate.
//!
//! This crate provides:
//! - Typed schema registry with two-phase registration and startup
//!   validation
//! - Generic record accessors: get/create/update/filter/delete per entity
//!   type, with foreign-key and many-to-many resolution
//! - Versioned attribute groups: designated fields resolve through an
//!   auxiliary version record with exactly one active row per parent,
//!   retired (never deleted) when superseded
//! - Derived relations: versioned pointers to other entities
//! - The ledger entity graph itself (clients, nodes, addresses,
//!   relationships, accounts, exchanges, exchange rates)
//!
//! ## Example
//!
//! ```rust
//! use ledgerbase_core::{ledger_registry, Key, Record, Store};
//!
//! # fn main() -> ledgerbase_core::CoreResult<()> {
//! let store = Store::open_in_memory(ledger_registry()?)?;
//!
//! store.transaction(|txn| {
//!     let clients = store.accessor("client")?;
//!     clients.create(txn, Record::new().set("name", "acme"))?;
//!     Ok(())
//! })?;
//!
//! let client = store.read(|txn| {
//!     store.accessor("client")?.get(txn, &Key::single("acme"))
//! })?;
//! assert_eq!(client.get("name").as_text(), Some("acme"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accessor;
mod clock;
mod error;
mod key;
mod ledger;
mod record;
mod relation;
mod schema;
mod store;
mod version;

pub use accessor::Accessor;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use key::Key;
pub use ledger::ledger_registry;
pub use record::Record;
pub use schema::{
    DerivedRelation, EntitySchema, FieldBinding, FieldPolicy, ManyToMany, SchemaRegistry,
    VersionGroup, ACTIVE_COLUMN, EFFECTIVE_TIME_COLUMN, EXPIRY_TIME_COLUMN,
};
pub use store::Store;
pub use version::VersionRef;

// The substrate types that cross the accessor boundary.
pub use ledgerbase_storage::{
    MemoryBackend, Row, RowId, StoreBackend, Transaction, TxnMode, Value,
};
