use chrono::{DateTime, Utc};
use gbe_common::Agorot;
use thiserror::Error;

use crate::{
    db_types::{Group, LedgerEntry, Membership, NewGroup, NewProduct, Product, UserId},
    traits::GroupQueryFilter,
};

/// This trait defines the behaviour a storage backend must provide to support the settlement engine.
///
/// This behaviour includes:
/// * Managing group lifecycle records and the membership register
/// * Appending to the payment ledger (deposits, balances, refunds)
/// * The atomic join guarantee: the capacity check and the member-counter increment are a single indivisible
///   operation. A backend that reads the counter in application code and writes `counter + 1` back is **not** a
///   valid implementation; two racing joins for the last slot would oversell the group.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Inserts a catalog product. Administrative seeding only; the engine itself never creates products.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, SettlementError>;

    /// Fetches a product by id, or `None` if it does not exist.
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, SettlementError>;

    /// Opens a new group purchase round for a product. The group starts `Open` with zero members.
    async fn create_group(&self, group: NewGroup) -> Result<Group, SettlementError>;

    /// Fetches a group by id, or `None` if it does not exist.
    async fn fetch_group(&self, group_id: i64) -> Result<Option<Group>, SettlementError>;

    /// Fetches groups matching the given filter, ordered by creation time.
    async fn fetch_groups(&self, filter: GroupQueryFilter) -> Result<Vec<Group>, SettlementError>;

    /// Adds a buyer to a group. In a single atomic transaction,
    /// * a membership row is created (a duplicate join fails with [`SettlementError::AlreadyMember`]),
    /// * the member counter is conditionally incremented, with the capacity check (`status = Open AND
    ///   current_members < target_members`) part of the same write,
    /// * if the increment reaches the target, the group transitions to `Completed`.
    ///
    /// Returns the new membership together with the post-join group record, so callers can observe the
    /// completion transition without a second read.
    async fn join_group(&self, group_id: i64, user_id: &UserId) -> Result<(Membership, Group), SettlementError>;

    /// Removes a buyer from a group that is still `Open`, decrementing the member counter atomically.
    ///
    /// If the buyer has already paid anything in, a `Refund` ledger entry for their total is written in the same
    /// transaction and returned; the sweeper only refunds *current* members, so money held by a departed member
    /// would otherwise be stranded.
    async fn leave_group(&self, group_id: i64, user_id: &UserId) -> Result<Option<LedgerEntry>, SettlementError>;

    /// Records the deposit for a member. Call only after the external gateway has confirmed the charge.
    /// Exactly one deposit may exist per (user, group); a second call fails with
    /// [`SettlementError::DuplicateDeposit`], which callers should treat as a benign no-op.
    async fn record_deposit(&self, user_id: &UserId, group_id: i64, amount: Agorot)
        -> Result<LedgerEntry, SettlementError>;

    /// Records a payment toward the remaining balance. The group must be `Completed`, the pair must not hold a
    /// refund, and the amount must not exceed the remaining balance. Partial payments accumulate across calls
    /// until the remainder reaches zero.
    async fn record_balance(&self, user_id: &UserId, group_id: i64, amount: Agorot)
        -> Result<LedgerEntry, SettlementError>;

    /// Lists the open groups whose deadline has passed without reaching their member target, i.e. the sweeper's
    /// work queue as of `now`.
    async fn fetch_lapsed_groups(&self, now: DateTime<Utc>) -> Result<Vec<Group>, SettlementError>;

    /// Expires one lapsed group and refunds its members, in a single transaction:
    /// * the group transitions `Open` → `Expired` (recorded before any refund is written),
    /// * every member holding payments and no refund gets one `Refund` entry equal to their total paid.
    ///
    /// Returns `Some(refunds)` if this call performed the transition, and `None` if the group was skipped
    /// because it is already `Expired`, no longer lapsed, or missing. The `None` case is not an error, so a
    /// sweep can safely be re-run after a partial failure (or race another sweep) without double-counting.
    async fn expire_group(
        &self,
        group_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<LedgerEntry>>, SettlementError>;

    /// Fetches all memberships for a buyer, ordered by join time.
    async fn fetch_memberships_for_user(&self, user_id: &UserId) -> Result<Vec<Membership>, SettlementError>;

    /// Fetches all memberships in a group, ordered by join time.
    async fn fetch_memberships_for_group(&self, group_id: i64) -> Result<Vec<Membership>, SettlementError>;

    /// Fetches the ledger entries for a (user, group) pair, ordered by insertion.
    async fn fetch_ledger(&self, user_id: &UserId, group_id: i64) -> Result<Vec<LedgerEntry>, SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("Group {0} does not exist")]
    GroupNotFound(i64),
    #[error("Group {0} is no longer open")]
    GroupClosed(i64),
    #[error("Group {0} has reached its member target")]
    GroupFull(i64),
    #[error("User {user_id} is already a member of group {group_id}")]
    AlreadyMember { group_id: i64, user_id: UserId },
    #[error("User {user_id} is not a member of group {group_id}")]
    NotAMember { group_id: i64, user_id: UserId },
    #[error("Cannot leave group {0} once it has completed")]
    CannotLeaveCompletedGroup(i64),
    #[error("A deposit already exists for user {user_id} in group {group_id}")]
    DuplicateDeposit { group_id: i64, user_id: UserId },
    #[error("Group {0} has not completed yet; balance payments are not open")]
    GroupNotCompleted(i64),
    #[error("Payment of {amount} exceeds the remaining balance of {remaining}")]
    OverpaymentRejected { amount: Agorot, remaining: Agorot },
    #[error("A refund has already been issued for user {user_id} in group {group_id}")]
    AlreadyRefunded { group_id: i64, user_id: UserId },
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Payment amounts must be positive, got {0}")]
    InvalidAmount(Agorot),
    #[error("Invalid group specification: {0}")]
    InvalidGroupSpec(String),
}

impl SettlementError {
    /// Capacity errors are user-correctable and must never be retried automatically: a retry would either be a
    /// no-op or join past a full group.
    pub fn is_capacity_error(&self) -> bool {
        matches!(self, Self::GroupFull(_) | Self::AlreadyMember { .. })
    }

    /// State errors indicate the client acted on a stale view and should refresh.
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::GroupClosed(_) | Self::GroupNotCompleted(_) | Self::CannotLeaveCompletedGroup(_))
    }

    /// Idempotency guards mean the desired state already holds; callers may treat them as benign no-ops.
    pub fn is_idempotency_guard(&self) -> bool {
        matches!(self, Self::DuplicateDeposit { .. } | Self::AlreadyRefunded { .. })
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}
