use gbe_common::Agorot;
use log::debug;
use sqlx::{Row, SqliteConnection};

use crate::{
    db_types::{EntryKind, LedgerEntry, UserId},
    traits::SettlementError,
};

const LEDGER_COLUMNS: &str = "id, user_id, group_id, amount, kind, created_at";

/// Appends one ledger entry. The partial unique indexes on the table turn a second deposit or refund for the same
/// (user, group) pair into the corresponding idempotency-guard error.
pub async fn insert_entry(
    user_id: &UserId,
    group_id: i64,
    amount: Agorot,
    kind: EntryKind,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, SettlementError> {
    if !amount.is_positive() {
        return Err(SettlementError::InvalidAmount(amount));
    }
    let result = sqlx::query("INSERT INTO ledger_entries (user_id, group_id, amount, kind) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(group_id)
        .bind(amount)
        .bind(kind.to_string())
        .execute(&mut *conn)
        .await;
    let id = match result {
        Ok(r) => r.last_insert_rowid(),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let user_id = user_id.clone();
            return Err(match kind {
                EntryKind::Deposit => SettlementError::DuplicateDeposit { group_id, user_id },
                EntryKind::Refund => SettlementError::AlreadyRefunded { group_id, user_id },
                EntryKind::Balance => SettlementError::DatabaseError(
                    "Unexpected uniqueness violation inserting a balance entry".to_string(),
                ),
            });
        },
        Err(e) => return Err(e.into()),
    };
    debug!("🧾️ Ledger entry #{id}: {kind} of {amount} for user {user_id} in group #{group_id}");
    fetch_entry_by_id(id, conn).await?.ok_or_else(|| {
        SettlementError::DatabaseError(format!("Ledger entry {id} was not found straight after inserting it"))
    })
}

async fn fetch_entry_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<LedgerEntry>, SettlementError> {
    let entry =
        sqlx::query_as::<_, LedgerEntry>(&format!("SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(entry)
}

pub async fn fetch_entries(
    user_id: &UserId,
    group_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, SettlementError> {
    let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
        "SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE user_id = $1 AND group_id = $2 ORDER BY id ASC"
    ))
    .bind(user_id)
    .bind(group_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}

/// Total paid in by the pair: deposit plus balances. Refund entries are not payments and are excluded.
pub async fn total_paid(
    user_id: &UserId,
    group_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Agorot, SettlementError> {
    let row = sqlx::query(
        r#"
            SELECT COALESCE(SUM(amount), 0) AS total
            FROM ledger_entries
            WHERE user_id = $1 AND group_id = $2 AND kind IN ('Deposit', 'Balance')
        "#,
    )
    .bind(user_id)
    .bind(group_id)
    .fetch_one(conn)
    .await?;
    Ok(Agorot::from(row.get::<i64, _>("total")))
}

pub async fn has_refund(
    user_id: &UserId,
    group_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, SettlementError> {
    let row = sqlx::query(
        "SELECT id FROM ledger_entries WHERE user_id = $1 AND group_id = $2 AND kind = 'Refund' LIMIT 1",
    )
    .bind(user_id)
    .bind(group_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.is_some())
}
