use serde::{Deserialize, Serialize};

use crate::db_types::{GroupStatus, LedgerEntry};

/// The outcome of one expiration sweep.
///
/// A sweep never aborts on a single bad group; failures are collected here so the operator can re-invoke the sweep
/// (which is safe, since expiry and refunds are both idempotent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Groups that this sweep transitioned to `Expired`.
    pub expired_groups: Vec<i64>,
    /// Refund entries written during this sweep.
    pub refunds: Vec<LedgerEntry>,
    /// Groups whose refund processing failed and should be retried on the next sweep.
    pub failures: Vec<i64>,
}

impl SweepReport {
    pub fn processed_count(&self) -> usize {
        self.expired_groups.len()
    }

    pub fn refund_count(&self) -> usize {
        self.refunds.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Criteria for group listing queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupQueryFilter {
    pub product_id: Option<i64>,
    pub statuses: Vec<GroupStatus>,
}

impl GroupQueryFilter {
    pub fn with_product_id(mut self, product_id: i64) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_status(mut self, status: GroupStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.product_id.is_none() && self.statuses.is_empty()
    }
}
