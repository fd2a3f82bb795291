//! Group Purchase Settlement Engine
//!
//! BuyForce lets buyers commit to a group purchase with a small deposit; the deal unlocks a discounted price once
//! enough buyers join before a deadline, otherwise every deposit is refunded. This library contains the settlement
//! core of that system: group capacity and membership, the payment ledger, deadline-driven expiration and refund
//! issuance. It is provider-agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@traits`] and the SQLite backend). You should never need to access the
//!    database directly; use the public API instead. The exception is the data types used in the database, which
//!    are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@gbe_api`]). [`GroupFlowApi`] drives joins, leaves, payment recording, the
//!    expiration sweep and order projections over any backend implementing the traits in [`mod@traits`].
//!
//! The engine also emits events when settlements happen: a `GroupCompletedEvent` when a group reaches its target
//! and a `RefundIssuedEvent` for every refund written. A simple pub-sub hook system lets the surrounding system
//! (the notification dispatcher, typically) subscribe to these events.
pub mod db_types;
pub mod events;
pub mod gbe_api;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use gbe_api::{
    projections::{OrderProjection, OrderState},
    GroupFlowApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{GroupQueryFilter, SettlementDatabase, SettlementError, SweepReport};
