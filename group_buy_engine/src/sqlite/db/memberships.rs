use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Membership, UserId},
    traits::SettlementError,
};

const MEMBERSHIP_COLUMNS: &str = "id, group_id, user_id, joined_at";

/// Inserts a membership row. The UNIQUE(group_id, user_id) index turns a duplicate join into
/// [`SettlementError::AlreadyMember`].
pub async fn insert_membership(
    group_id: i64,
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Membership, SettlementError> {
    let result = sqlx::query("INSERT INTO memberships (group_id, user_id) VALUES ($1, $2)")
        .bind(group_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await;
    let id = match result {
        Ok(r) => r.last_insert_rowid(),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(SettlementError::AlreadyMember { group_id, user_id: user_id.clone() })
        },
        Err(e) => return Err(e.into()),
    };
    debug!("👥️ User {user_id} joined group #{group_id} (membership #{id})");
    fetch_membership_by_id(id, conn).await?.ok_or_else(|| {
        SettlementError::DatabaseError(format!("Membership {id} was not found straight after inserting it"))
    })
}

async fn fetch_membership_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Membership>, SettlementError> {
    let membership =
        sqlx::query_as::<_, Membership>(&format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(membership)
}

/// Deletes a membership row. Returns `true` if a row was deleted.
pub async fn delete_membership(
    group_id: i64,
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<bool, SettlementError> {
    let rows = sqlx::query("DELETE FROM memberships WHERE group_id = $1 AND user_id = $2")
        .bind(group_id)
        .bind(user_id)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(rows == 1)
}

pub async fn membership_exists(
    group_id: i64,
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<bool, SettlementError> {
    let row = sqlx::query("SELECT id FROM memberships WHERE group_id = $1 AND user_id = $2 LIMIT 1")
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn memberships_for_user(
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Membership>, SettlementError> {
    let memberships = sqlx::query_as::<_, Membership>(&format!(
        "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = $1 ORDER BY joined_at ASC"
    ))
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(memberships)
}

pub async fn memberships_for_group(
    group_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Membership>, SettlementError> {
    let memberships = sqlx::query_as::<_, Membership>(&format!(
        "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE group_id = $1 ORDER BY joined_at ASC"
    ))
    .bind(group_id)
    .fetch_all(conn)
    .await?;
    Ok(memberships)
}
