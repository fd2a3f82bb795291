//! The settlement engine public API.
//!
//! [`GroupFlowApi`] handles the mutating flows (joins, leaves, payments, the expiration sweep) over any
//! [`crate::traits::SettlementDatabase`] backend, and [`projections`] holds the pure, read-only order
//! classification used by clients.
pub mod group_flow_api;
pub mod projections;

pub use group_flow_api::GroupFlowApi;
