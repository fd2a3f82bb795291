//! Read-only derivation of a buyer's order status.
//!
//! The projection is a pure function over a group snapshot, the product's group price and the buyer's ledger view.
//! It holds no state of its own, must be recomputed whenever the ledger or the group counters change, and must
//! never be used as the source of truth for server-side decisions.
use chrono::{DateTime, Utc};
use gbe_common::Agorot;
use serde::{Deserialize, Serialize};

use crate::db_types::{remaining_to_pay, total_paid, EntryKind, Group, GroupStatus, LedgerEntry, Membership, Product};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    /// The group is still collecting members.
    Active,
    /// The group completed; the buyer still owes part of the group price.
    CompletedAwaitingBalance,
    /// The group completed and the buyer has paid the group price in full.
    CompletedPaid,
    /// The group failed (expired, or the buyer was refunded).
    Failed,
}

/// One classified order, as shown on the buyer's "my groups" screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProjection {
    pub group_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub group_price: Agorot,
    pub state: OrderState,
    pub total_paid: Agorot,
    pub remaining_to_pay: Agorot,
    pub current_members: i64,
    pub target_members: i64,
    pub deadline: DateTime<Utc>,
    pub joined_at: DateTime<Utc>,
}

/// Classifies one order. Failure takes precedence over every other classification.
pub fn classify(group: &Group, group_price: Agorot, entries: &[LedgerEntry]) -> OrderState {
    let refunded = entries.iter().any(|e| e.kind == EntryKind::Refund);
    if group.status == GroupStatus::Expired || refunded {
        return OrderState::Failed;
    }
    if !group.is_completed() {
        return OrderState::Active;
    }
    if remaining_to_pay(group_price, entries) == Agorot::from(0) {
        OrderState::CompletedPaid
    } else {
        OrderState::CompletedAwaitingBalance
    }
}

/// Assembles the full projection for one membership.
pub fn project(membership: &Membership, group: &Group, product: &Product, entries: &[LedgerEntry]) -> OrderProjection {
    OrderProjection {
        group_id: group.id,
        product_id: product.id,
        product_name: product.name.clone(),
        group_price: product.group_price,
        state: classify(group, product.group_price, entries),
        total_paid: total_paid(entries),
        remaining_to_pay: remaining_to_pay(product.group_price, entries),
        current_members: group.current_members,
        target_members: group.target_members,
        deadline: group.deadline,
        joined_at: membership.joined_at,
    }
}
