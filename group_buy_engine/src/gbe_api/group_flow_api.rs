use std::fmt::Debug;

use chrono::{DateTime, Utc};
use gbe_common::Agorot;
use log::*;

use crate::{
    db_types::{Group, GroupStatus, LedgerEntry, Membership, NewGroup, NewProduct, Product, UserId},
    events::{EventProducers, GroupCompletedEvent, RefundIssuedEvent},
    gbe_api::projections::{self, OrderProjection},
    traits::{SettlementDatabase, SettlementError, SweepReport},
};

/// `GroupFlowApi` is the primary API for the group purchase settlement flows: joining and leaving groups,
/// recording payments, running the expiration sweep and projecting a buyer's orders.
pub struct GroupFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for GroupFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GroupFlowApi")
    }
}

impl<B> GroupFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> GroupFlowApi<B>
where B: SettlementDatabase
{
    /// Registers a catalog product. Administrative seeding; products are otherwise managed outside the engine.
    pub async fn register_product(&self, product: NewProduct) -> Result<Product, SettlementError> {
        self.db.insert_product(product).await
    }

    /// Opens a new group purchase round. The deadline must lie in the future.
    pub async fn open_group(&self, group: NewGroup) -> Result<Group, SettlementError> {
        if group.deadline <= Utc::now() {
            return Err(SettlementError::InvalidGroupSpec(format!(
                "deadline {} is already in the past",
                group.deadline
            )));
        }
        self.db.create_group(group).await
    }

    /// Adds a buyer to a group.
    ///
    /// The capacity check and the member-counter increment happen atomically in the backend; see
    /// [`SettlementDatabase::join_group`]. If this join completes the group, every completion subscriber is
    /// notified before the call returns.
    pub async fn join_group(&self, group_id: i64, user_id: &UserId) -> Result<Membership, SettlementError> {
        let (membership, group) = self.db.join_group(group_id, user_id).await?;
        debug!(
            "🔄️👥️ User {user_id} joined group #{group_id} ({}/{} members)",
            group.current_members, group.target_members
        );
        if group.status == GroupStatus::Completed {
            self.call_group_completed_hook(&group).await;
        }
        Ok(membership)
    }

    /// Removes a buyer from a still-open group. If money had already been paid in, the refund written by the
    /// backend is announced to the refund subscribers.
    pub async fn leave_group(&self, group_id: i64, user_id: &UserId) -> Result<Option<LedgerEntry>, SettlementError> {
        let refund = self.db.leave_group(group_id, user_id).await?;
        if let Some(entry) = &refund {
            self.call_refund_issued_hook(group_id, entry).await;
        }
        Ok(refund)
    }

    /// Records a confirmed deposit. Call only after the external payment gateway has captured the charge; the
    /// engine records the ledger entry, it does not move money.
    pub async fn confirm_deposit(
        &self,
        user_id: &UserId,
        group_id: i64,
        amount: Agorot,
    ) -> Result<LedgerEntry, SettlementError> {
        let entry = self.db.record_deposit(user_id, group_id, amount).await?;
        debug!("🔄️💰️ Deposit of {amount} recorded for user {user_id} in group #{group_id}");
        Ok(entry)
    }

    /// Records a confirmed balance payment toward the remaining group price. Partial payments accumulate until
    /// nothing remains.
    pub async fn confirm_balance(
        &self,
        user_id: &UserId,
        group_id: i64,
        amount: Agorot,
    ) -> Result<LedgerEntry, SettlementError> {
        let entry = self.db.record_balance(user_id, group_id, amount).await?;
        debug!("🔄️💰️ Balance payment of {amount} recorded for user {user_id} in group #{group_id}");
        Ok(entry)
    }

    /// Runs one expiration sweep as of `now`.
    ///
    /// Every open group whose deadline has passed short of its target is expired and its members refunded, one
    /// group at a time. A failure in one group is recorded in the report and does not stop the others; re-running
    /// the sweep is always safe, because expired groups and already-refunded members are skipped.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, SettlementError> {
        let lapsed = self.db.fetch_lapsed_groups(now).await?;
        debug!("🕰️ Sweep starting. {} group(s) past their deadline.", lapsed.len());
        let mut report = SweepReport::default();
        for group in lapsed {
            match self.db.expire_group(group.id, now).await {
                Ok(Some(refunds)) => {
                    report.expired_groups.push(group.id);
                    for refund in &refunds {
                        self.call_refund_issued_hook(group.id, refund).await;
                    }
                    report.refunds.extend(refunds);
                },
                // Another sweep got there first (the background worker racing a manual trigger, typically).
                Ok(None) => {
                    debug!("🕰️ Group #{} was already expired by the time we reached it. Skipping.", group.id);
                },
                Err(e) => {
                    error!("🕰️ Failed to expire group #{}: {e}. Continuing with the next group.", group.id);
                    report.failures.push(group.id);
                },
            }
        }
        info!(
            "🕰️ Sweep complete. {} group(s) expired, {} refund(s) issued, {} failure(s).",
            report.processed_count(),
            report.refund_count(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Projects a buyer's orders for display. Read-only; never a source of truth for server-side decisions.
    pub async fn project_orders(&self, user_id: &UserId) -> Result<Vec<OrderProjection>, SettlementError> {
        let memberships = self.db.fetch_memberships_for_user(user_id).await?;
        let mut orders = Vec::with_capacity(memberships.len());
        for membership in &memberships {
            let group = self
                .db
                .fetch_group(membership.group_id)
                .await?
                .ok_or(SettlementError::GroupNotFound(membership.group_id))?;
            let product = self
                .db
                .fetch_product(group.product_id)
                .await?
                .ok_or(SettlementError::ProductNotFound(group.product_id))?;
            let entries = self.db.fetch_ledger(user_id, membership.group_id).await?;
            orders.push(projections::project(membership, &group, &product, &entries));
        }
        Ok(orders)
    }

    async fn call_group_completed_hook(&self, group: &Group) {
        for emitter in &self.producers.group_completed_producer {
            debug!("🔄️📦️ Notifying group completed hook subscribers");
            let event = GroupCompletedEvent::new(group.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_refund_issued_hook(&self, group_id: i64, refund: &LedgerEntry) {
        for emitter in &self.producers.refund_issued_producer {
            debug!("🔄️📦️ Notifying refund hook subscribers");
            let event = RefundIssuedEvent::new(group_id, refund.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{
        db_types::{EntryKind, GroupStatus},
        traits::GroupQueryFilter,
    };

    /// A storage stand-in for sweep behaviour tests. It serves a fixed set of lapsed groups and lets a test
    /// script one group that fails its first expiry attempt and one that another sweep has already taken.
    #[derive(Clone, Default)]
    struct ScriptedBackend {
        lapsed: Vec<i64>,
        fail_first_attempt: Option<i64>,
        taken_by_other_sweep: Option<i64>,
        state: Arc<Mutex<ScriptedState>>,
    }

    #[derive(Default)]
    struct ScriptedState {
        expired: HashSet<i64>,
        failed_once: bool,
    }

    fn lapsed_group(id: i64) -> Group {
        let now = Utc::now();
        Group {
            id,
            product_id: 1,
            target_members: 10,
            current_members: 1,
            deadline: now - chrono::Duration::hours(1),
            status: GroupStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    fn refund_for(group_id: i64) -> LedgerEntry {
        LedgerEntry {
            id: group_id,
            user_id: UserId::from(format!("buyer-{group_id}")),
            group_id,
            amount: Agorot::from_shekels(5),
            kind: EntryKind::Refund,
            created_at: Utc::now(),
        }
    }

    impl SettlementDatabase for ScriptedBackend {
        fn url(&self) -> &str {
            "scripted://sweep"
        }

        async fn insert_product(&self, _product: NewProduct) -> Result<Product, SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn fetch_product(&self, _product_id: i64) -> Result<Option<Product>, SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn create_group(&self, _group: NewGroup) -> Result<Group, SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn fetch_group(&self, _group_id: i64) -> Result<Option<Group>, SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn fetch_groups(&self, _filter: GroupQueryFilter) -> Result<Vec<Group>, SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn join_group(&self, _group_id: i64, _user_id: &UserId) -> Result<(Membership, Group), SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn leave_group(
            &self,
            _group_id: i64,
            _user_id: &UserId,
        ) -> Result<Option<LedgerEntry>, SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn record_deposit(
            &self,
            _user_id: &UserId,
            _group_id: i64,
            _amount: Agorot,
        ) -> Result<LedgerEntry, SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn record_balance(
            &self,
            _user_id: &UserId,
            _group_id: i64,
            _amount: Agorot,
        ) -> Result<LedgerEntry, SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn fetch_lapsed_groups(&self, _now: DateTime<Utc>) -> Result<Vec<Group>, SettlementError> {
            let state = self.state.lock().unwrap();
            Ok(self.lapsed.iter().filter(|id| !state.expired.contains(id)).map(|id| lapsed_group(*id)).collect())
        }

        async fn expire_group(
            &self,
            group_id: i64,
            _now: DateTime<Utc>,
        ) -> Result<Option<Vec<LedgerEntry>>, SettlementError> {
            let mut state = self.state.lock().unwrap();
            if self.fail_first_attempt == Some(group_id) && !state.failed_once {
                state.failed_once = true;
                return Err(SettlementError::DatabaseError("simulated write failure".to_string()));
            }
            state.expired.insert(group_id);
            if self.taken_by_other_sweep == Some(group_id) {
                return Ok(None);
            }
            Ok(Some(vec![refund_for(group_id)]))
        }

        async fn fetch_memberships_for_user(&self, _user_id: &UserId) -> Result<Vec<Membership>, SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn fetch_memberships_for_group(&self, _group_id: i64) -> Result<Vec<Membership>, SettlementError> {
            unimplemented!("not used in sweep tests")
        }

        async fn fetch_ledger(&self, _user_id: &UserId, _group_id: i64) -> Result<Vec<LedgerEntry>, SettlementError> {
            unimplemented!("not used in sweep tests")
        }
    }

    #[tokio::test]
    async fn a_failing_group_does_not_abort_the_sweep() {
        let db = ScriptedBackend {
            lapsed: vec![1, 2, 3],
            fail_first_attempt: Some(2),
            ..Default::default()
        };
        let api = GroupFlowApi::new(db, EventProducers::default());

        // Group 2 fails; groups 1 and 3 must still be expired and refunded, with 2 in the failure list.
        let report = api.sweep(Utc::now()).await.unwrap();
        assert_eq!(report.expired_groups, vec![1, 3]);
        assert_eq!(report.failures, vec![2]);
        assert!(!report.is_clean());
        assert_eq!(report.refund_count(), 2);

        // Re-invoking the sweep picks up only the failed group and completes it.
        let report = api.sweep(Utc::now()).await.unwrap();
        assert_eq!(report.expired_groups, vec![2]);
        assert!(report.is_clean());
        assert_eq!(report.refund_count(), 1);

        // A third pass finds nothing left to do.
        let report = api.sweep(Utc::now()).await.unwrap();
        assert_eq!(report.processed_count(), 0);
        assert_eq!(report.refund_count(), 0);
    }

    #[tokio::test]
    async fn groups_expired_by_a_racing_sweep_are_not_counted() {
        // Group 2 is enumerated as lapsed, but by the time we process it another sweep has expired it.
        let db = ScriptedBackend {
            lapsed: vec![1, 2],
            taken_by_other_sweep: Some(2),
            ..Default::default()
        };
        let api = GroupFlowApi::new(db, EventProducers::default());

        let report = api.sweep(Utc::now()).await.unwrap();
        assert_eq!(report.expired_groups, vec![1]);
        assert!(report.is_clean());
        assert_eq!(report.refund_count(), 1);
    }
}
