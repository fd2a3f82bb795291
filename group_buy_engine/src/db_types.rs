//! Data types for the settlement engine database.
//!
//! These are the records the engine owns (groups, memberships, ledger entries) plus the product catalog records it
//! reads. All of them are explicit, tagged types with exhaustive status enums; there are no optional
//! "maybe-this-kind-of-row" fields.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use gbe_common::Agorot;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------       UserId        ---------------------------------------------------------
/// An opaque authenticated-user identifier, issued by the external identity provider. The engine trusts it and never
/// inspects its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct UserId(pub String);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for UserId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     GroupStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum GroupStatus {
    /// The group is collecting members. This is the initial state.
    Open,
    /// The member target was reached before the deadline. Terminal for membership; balance payments continue.
    Completed,
    /// The deadline lapsed before the target was reached. Terminal.
    Expired,
}

impl Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupStatus::Open => write!(f, "Open"),
            GroupStatus::Completed => write!(f, "Completed"),
            GroupStatus::Expired => write!(f, "Expired"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

impl FromStr for GroupStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Self::Open),
            "Completed" => Ok(Self::Completed),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid group status: {s}"))),
        }
    }
}

impl From<String> for GroupStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid group status: {value}. But this conversion cannot fail. Defaulting to Open");
            GroupStatus::Open
        })
    }
}

//--------------------------------------      EntryKind      ---------------------------------------------------------
/// The kind of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EntryKind {
    /// The small upfront payment that secures a membership slot. Exactly one per (user, group).
    Deposit,
    /// A payment toward the remaining balance after the group completed. Any number per (user, group).
    Balance,
    /// A full return of everything paid, issued when a group expires. At most one per (user, group).
    Refund,
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Deposit => write!(f, "Deposit"),
            EntryKind::Balance => write!(f, "Balance"),
            EntryKind::Refund => write!(f, "Refund"),
        }
    }
}

impl FromStr for EntryKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(Self::Deposit),
            "Balance" => Ok(Self::Balance),
            "Refund" => Ok(Self::Refund),
            s => Err(ConversionError(format!("Invalid ledger entry kind: {s}"))),
        }
    }
}

//--------------------------------------       Product       ---------------------------------------------------------
/// A catalog item. The engine does not own products; it reads them to price groups.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub regular_price: Agorot,
    pub group_price: Agorot,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub regular_price: Agorot,
    /// The discounted price unlocked when a group completes.
    pub group_price: Agorot,
    pub image_url: Option<String>,
}

//--------------------------------------        Group        ---------------------------------------------------------
/// One running instance of a group purchase for a product.
///
/// Groups are never deleted. They transition `Open` → `Completed` or `Open` → `Expired` and then stand as the
/// permanent historical record of that purchase round.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub product_id: i64,
    pub target_members: i64,
    pub current_members: i64,
    pub deadline: DateTime<Utc>,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn is_completed(&self) -> bool {
        self.current_members >= self.target_members
    }

    pub fn has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == GroupStatus::Open && now > self.deadline && !self.is_completed()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
    pub product_id: i64,
    pub target_members: i64,
    pub deadline: DateTime<Utc>,
}

impl NewGroup {
    pub fn new(product_id: i64, target_members: i64, deadline: DateTime<Utc>) -> Self {
        Self { product_id, target_members, deadline }
    }
}

//--------------------------------------     Membership      ---------------------------------------------------------
/// A buyer's commitment record within a group. Created at join time and never mutated; deleted only when a buyer
/// voluntarily leaves a still-open group.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Membership {
    pub id: i64,
    pub group_id: i64,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
}

//--------------------------------------     LedgerEntry     ---------------------------------------------------------
/// One payment record. The ledger is append-only; entries are never mutated or deleted. It is the audit trail.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: UserId,
    pub group_id: i64,
    pub amount: Agorot,
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
}

/// Sums everything a buyer has paid in (deposit plus balances), net of nothing: refunds are not payments *toward*
/// the purchase and are excluded.
pub fn total_paid(entries: &[LedgerEntry]) -> Agorot {
    entries
        .iter()
        .filter(|e| matches!(e.kind, EntryKind::Deposit | EntryKind::Balance))
        .map(|e| e.amount)
        .sum()
}

/// `max(0, group_price - total_paid)`. Pure; safe to call repeatedly.
pub fn remaining_to_pay(group_price: Agorot, entries: &[LedgerEntry]) -> Agorot {
    group_price.saturating_sub(total_paid(entries))
}
