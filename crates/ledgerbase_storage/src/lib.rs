//! # Ledgerbase Storage
//!
//! Relational substrate interface for Ledgerbase.
//!
//! This crate defines the lowest-level storage abstraction the mapping core
//! reads and writes through. Backends are **plain row stores**: tables of
//! rows keyed by an opaque [`RowId`], looked up by id or by equality
//! predicate. They do not understand entities, natural keys, version groups,
//! or any other mapping-layer concept - the core owns all of that.
//!
//! ## Design Principles
//!
//! - Backends store typed [`Value`]s in named columns, nothing richer
//! - Queries are equality predicates only; anything fancier belongs to a
//!   real database engine, which is out of scope here
//! - Every operation runs inside a caller-supplied [`Transaction`]
//! - Backends must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - the reference backend, for tests and embedded use
//!
//! ## Example
//!
//! ```rust
//! use ledgerbase_storage::{MemoryBackend, Predicate, StoreBackend, TableSpec, TxnMode, Value};
//!
//! let backend = MemoryBackend::new();
//! backend.create_table(TableSpec::new("clients", ["name"])).unwrap();
//!
//! let mut txn = backend.begin(TxnMode::Write).unwrap();
//! let row = backend
//!     .insert(&mut txn, "clients", [("name".to_string(), Value::from("acme"))].into())
//!     .unwrap();
//! backend.commit(&mut txn).unwrap();
//!
//! let txn = backend.begin(TxnMode::Read).unwrap();
//! let rows = backend
//!     .select(&txn, "clients", &Predicate::new().eq("name", "acme"))
//!     .unwrap();
//! assert_eq!(rows[0].id(), row);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod row;
mod table;
mod txn;
mod value;

pub use backend::StoreBackend;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use row::{Row, RowId};
pub use table::{Predicate, TableSpec};
pub use txn::{PendingWrite, Transaction, TxnId, TxnMode, TxnState};
pub use value::Value;
