//! # Ledgerbase Testkit
//!
//! Test fixtures and scenario helpers for exercising the mapping core.
//!
//! Provides [`TestStore`] - an in-memory store with the full ledger schema
//! installed, a pinned clock, and a typed backend handle for white-box
//! assertions - plus pre-built scenarios for tests that need a populated
//! entity graph.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod fixtures;
pub mod scenarios;

pub use fixtures::{init_tracing, with_test_store, TestStore};
