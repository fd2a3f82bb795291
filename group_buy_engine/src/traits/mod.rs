//! Interface contracts for settlement engine database backends.
//!
//! The engine is storage-agnostic: everything it needs from persistence is expressed by the
//! [`SettlementDatabase`] trait, and any backend that implements it (currently SQLite) can drive the engine.
//! The contracts here are where the real invariants live: join atomicity, ledger append-only-ness and the
//! idempotency guards are requirements on implementors, not incidental properties of one backend.
mod data_objects;
mod settlement_database;

pub use data_objects::{GroupQueryFilter, SweepReport};
pub use settlement_database::{SettlementDatabase, SettlementError};
