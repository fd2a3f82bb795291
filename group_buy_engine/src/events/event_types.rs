use serde::{Deserialize, Serialize};

use crate::db_types::{Group, LedgerEntry};

/// Emitted when a group reaches its member target. The notification dispatcher uses this to tell members the
/// balance payment is now due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCompletedEvent {
    pub group: Group,
}

impl GroupCompletedEvent {
    pub fn new(group: Group) -> Self {
        Self { group }
    }
}

/// Emitted once per refunded member when the sweeper expires a group (or when a member leaves with money on the
/// ledger). Message delivery is an external concern; the engine only enqueues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundIssuedEvent {
    pub group_id: i64,
    pub refund: LedgerEntry,
}

impl RefundIssuedEvent {
    pub fn new(group_id: i64, refund: LedgerEntry) -> Self {
        Self { group_id, refund }
    }
}
