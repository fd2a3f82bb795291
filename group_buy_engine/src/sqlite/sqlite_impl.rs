use std::fmt::Debug;

use chrono::{DateTime, Utc};
use gbe_common::Agorot;
use log::*;
use sqlx::SqlitePool;

use crate::{
    db_types::{EntryKind, Group, GroupStatus, LedgerEntry, Membership, NewGroup, NewProduct, Product, UserId},
    sqlite::{
        db::{groups, ledger, memberships, products},
        db_url, new_pool,
    },
    traits::{GroupQueryFilter, SettlementDatabase, SettlementError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment (`GBE_DATABASE_URL`).
    pub async fn new(max_connections: u32) -> Result<Self, SettlementError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SettlementError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(product_id, &mut conn).await
    }

    async fn create_group(&self, group: NewGroup) -> Result<Group, SettlementError> {
        let mut tx = self.pool.begin().await?;
        if products::fetch_product(group.product_id, &mut tx).await?.is_none() {
            return Err(SettlementError::ProductNotFound(group.product_id));
        }
        let group = groups::insert_group(group, &mut tx).await?;
        tx.commit().await?;
        debug!("🛒️ Opened group #{} for product #{} (target {})", group.id, group.product_id, group.target_members);
        Ok(group)
    }

    async fn fetch_group(&self, group_id: i64) -> Result<Option<Group>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        groups::fetch_group(group_id, &mut conn).await
    }

    async fn fetch_groups(&self, filter: GroupQueryFilter) -> Result<Vec<Group>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        groups::fetch_groups(filter, &mut conn).await
    }

    async fn join_group(&self, group_id: i64, user_id: &UserId) -> Result<(Membership, Group), SettlementError> {
        let mut tx = self.pool.begin().await?;
        // The slot is taken (or refused) by a single conditional UPDATE; this is the only mutual exclusion the
        // join path needs. It is also deliberately the first statement in the transaction, so the write lock is
        // acquired up front. On any error below the transaction rolls back and the slot is released with it.
        if !groups::try_take_slot(group_id, &mut tx).await? {
            if memberships::membership_exists(group_id, user_id, &mut tx).await? {
                return Err(SettlementError::AlreadyMember { group_id, user_id: user_id.clone() });
            }
            // An Open group that refused the update can only have been full, and a Completed group is full by
            // definition; GroupClosed is reserved for groups that are past saving (Expired).
            let err = match groups::fetch_group(group_id, &mut tx).await? {
                None => SettlementError::GroupNotFound(group_id),
                Some(g) if g.status == GroupStatus::Expired => SettlementError::GroupClosed(group_id),
                Some(_) => SettlementError::GroupFull(group_id),
            };
            return Err(err);
        }
        let membership = memberships::insert_membership(group_id, user_id, &mut tx).await?;
        let group = groups::fetch_group(group_id, &mut tx)
            .await?
            .ok_or(SettlementError::GroupNotFound(group_id))?;
        tx.commit().await?;
        if group.status == GroupStatus::Completed {
            info!("🛒️ Group #{group_id} reached its target of {} members and is now complete", group.target_members);
        }
        Ok((membership, group))
    }

    async fn leave_group(&self, group_id: i64, user_id: &UserId) -> Result<Option<LedgerEntry>, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let group = groups::fetch_group(group_id, &mut tx)
            .await?
            .ok_or(SettlementError::GroupNotFound(group_id))?;
        if group.status != GroupStatus::Open {
            return Err(SettlementError::CannotLeaveCompletedGroup(group_id));
        }
        if !memberships::delete_membership(group_id, user_id, &mut tx).await? {
            return Err(SettlementError::NotAMember { group_id, user_id: user_id.clone() });
        }
        if !groups::release_slot(group_id, &mut tx).await? {
            return Err(SettlementError::DatabaseError(format!(
                "Group {group_id} had a membership row but no slot to release"
            )));
        }
        // Return whatever the leaver has paid in. The sweeper only sees current members, so money held by a
        // departed member would otherwise be stranded on the ledger.
        let paid = ledger::total_paid(user_id, group_id, &mut tx).await?;
        let refund = if paid.is_positive() && !ledger::has_refund(user_id, group_id, &mut tx).await? {
            Some(ledger::insert_entry(user_id, group_id, paid, EntryKind::Refund, &mut tx).await?)
        } else {
            None
        };
        tx.commit().await?;
        debug!("👥️ User {user_id} left group #{group_id}. Refund issued: {}", refund.is_some());
        Ok(refund)
    }

    async fn record_deposit(
        &self,
        user_id: &UserId,
        group_id: i64,
        amount: Agorot,
    ) -> Result<LedgerEntry, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let group = groups::fetch_group(group_id, &mut tx)
            .await?
            .ok_or(SettlementError::GroupNotFound(group_id))?;
        // A deposit may land after the group completes (payment capture is asynchronous), but recording one
        // against an expired group would strand it: the sweep for that group has already run.
        if group.status == GroupStatus::Expired {
            return Err(SettlementError::GroupClosed(group_id));
        }
        if !memberships::membership_exists(group_id, user_id, &mut tx).await? {
            return Err(SettlementError::NotAMember { group_id, user_id: user_id.clone() });
        }
        let entry = ledger::insert_entry(user_id, group_id, amount, EntryKind::Deposit, &mut tx).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn record_balance(
        &self,
        user_id: &UserId,
        group_id: i64,
        amount: Agorot,
    ) -> Result<LedgerEntry, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let group = groups::fetch_group(group_id, &mut tx)
            .await?
            .ok_or(SettlementError::GroupNotFound(group_id))?;
        if group.status != GroupStatus::Completed {
            return Err(SettlementError::GroupNotCompleted(group_id));
        }
        if !memberships::membership_exists(group_id, user_id, &mut tx).await? {
            return Err(SettlementError::NotAMember { group_id, user_id: user_id.clone() });
        }
        // Refund exclusivity: once a pair has been refunded it can never also complete the purchase.
        if ledger::has_refund(user_id, group_id, &mut tx).await? {
            return Err(SettlementError::AlreadyRefunded { group_id, user_id: user_id.clone() });
        }
        let product = products::fetch_product(group.product_id, &mut tx)
            .await?
            .ok_or(SettlementError::ProductNotFound(group.product_id))?;
        let paid = ledger::total_paid(user_id, group_id, &mut tx).await?;
        let remaining = product.group_price.saturating_sub(paid);
        if amount > remaining {
            return Err(SettlementError::OverpaymentRejected { amount, remaining });
        }
        let entry = ledger::insert_entry(user_id, group_id, amount, EntryKind::Balance, &mut tx).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn fetch_lapsed_groups(&self, now: DateTime<Utc>) -> Result<Vec<Group>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        groups::fetch_lapsed_groups(now, &mut conn).await
    }

    async fn expire_group(
        &self,
        group_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<LedgerEntry>>, SettlementError> {
        let mut tx = self.pool.begin().await?;
        // The expiry transition is written first; the refunds below join it in the same transaction, so either
        // the group is durably Expired with every refund on the books, or nothing happened and the next sweep
        // picks the group up again.
        if !groups::try_mark_expired(group_id, now, &mut tx).await? {
            trace!("🕰️ Group #{group_id} no longer qualifies for expiry. Skipping.");
            return Ok(None);
        }
        let members = memberships::memberships_for_group(group_id, &mut tx).await?;
        let mut refunds = Vec::new();
        for member in &members {
            let paid = ledger::total_paid(&member.user_id, group_id, &mut tx).await?;
            if !paid.is_positive() {
                continue;
            }
            if ledger::has_refund(&member.user_id, group_id, &mut tx).await? {
                continue;
            }
            let entry = ledger::insert_entry(&member.user_id, group_id, paid, EntryKind::Refund, &mut tx).await?;
            refunds.push(entry);
        }
        tx.commit().await?;
        info!("🕰️ Group #{group_id} expired. {} of {} members refunded.", refunds.len(), members.len());
        Ok(Some(refunds))
    }

    async fn fetch_memberships_for_user(&self, user_id: &UserId) -> Result<Vec<Membership>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        memberships::memberships_for_user(user_id, &mut conn).await
    }

    async fn fetch_memberships_for_group(&self, group_id: i64) -> Result<Vec<Membership>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        memberships::memberships_for_group(group_id, &mut conn).await
    }

    async fn fetch_ledger(&self, user_id: &UserId, group_id: i64) -> Result<Vec<LedgerEntry>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_entries(user_id, group_id, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}
