use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Group, NewGroup},
    traits::{GroupQueryFilter, SettlementError},
};

const GROUP_COLUMNS: &str =
    "id, product_id, target_members, current_members, deadline, status, created_at, updated_at";

pub async fn insert_group(group: NewGroup, conn: &mut SqliteConnection) -> Result<Group, SettlementError> {
    if group.target_members <= 0 {
        return Err(SettlementError::InvalidGroupSpec(format!(
            "target_members must be positive, got {}",
            group.target_members
        )));
    }
    let id = sqlx::query(
        r#"
            INSERT INTO groups (product_id, target_members, deadline)
            VALUES ($1, $2, $3)
        "#,
    )
    .bind(group.product_id)
    .bind(group.target_members)
    .bind(group.deadline)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    fetch_group(id, conn)
        .await?
        .ok_or_else(|| SettlementError::DatabaseError(format!("Group {id} was not found straight after inserting it")))
}

pub async fn fetch_group(group_id: i64, conn: &mut SqliteConnection) -> Result<Option<Group>, SettlementError> {
    let group = sqlx::query_as::<_, Group>(&format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = $1"))
        .bind(group_id)
        .fetch_optional(conn)
        .await?;
    Ok(group)
}

/// Fetches groups according to criteria specified in the `GroupQueryFilter`.
///
/// Resulting groups are ordered by `created_at` in ascending order
pub async fn fetch_groups(filter: GroupQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Group>, SettlementError> {
    let mut builder = QueryBuilder::new(format!("SELECT {GROUP_COLUMNS} FROM groups "));
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(product_id) = filter.product_id {
        where_clause.push("product_id = ");
        where_clause.push_bind_unseparated(product_id);
    }
    if !filter.statuses.is_empty() {
        let statuses = filter.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("📋️ Executing query: {}", builder.sql());
    let groups = builder.build_query_as::<Group>().fetch_all(conn).await?;
    Ok(groups)
}

/// The atomic capacity-check-and-increment.
///
/// The capacity predicate lives in the WHERE clause of the UPDATE, so the check and the increment are one
/// indivisible write; two joins racing for the last slot can never both succeed. When the increment reaches the
/// target, the same statement flips the group to `Completed`.
///
/// Returns `true` if a slot was taken, `false` if the group was missing, closed, or full (callers diagnose which).
pub async fn try_take_slot(group_id: i64, conn: &mut SqliteConnection) -> Result<bool, SettlementError> {
    let rows = sqlx::query(
        r#"
            UPDATE groups SET
                current_members = current_members + 1,
                status = CASE WHEN current_members + 1 >= target_members THEN 'Completed' ELSE status END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Open' AND current_members < target_members
        "#,
    )
    .bind(group_id)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(rows == 1)
}

/// Releases a slot for a leaving member. Only valid while the group is still `Open`.
pub async fn release_slot(group_id: i64, conn: &mut SqliteConnection) -> Result<bool, SettlementError> {
    let rows = sqlx::query(
        r#"
            UPDATE groups SET
                current_members = current_members - 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Open' AND current_members > 0
        "#,
    )
    .bind(group_id)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(rows == 1)
}

/// Lists the open groups whose deadline passed without the member target being reached.
pub async fn fetch_lapsed_groups(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Group>, SettlementError> {
    let groups = sqlx::query_as::<_, Group>(&format!(
        r#"
            SELECT {GROUP_COLUMNS} FROM groups
            WHERE status = 'Open' AND deadline < $1 AND current_members < target_members
            ORDER BY deadline ASC
        "#
    ))
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(groups)
}

/// Transitions a lapsed group to `Expired`. The lapse predicate is re-checked in the WHERE clause, so a group that
/// completed, or was already expired by an earlier sweep, is left alone.
///
/// Returns `true` if this call performed the transition.
pub async fn try_mark_expired(
    group_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, SettlementError> {
    let rows = sqlx::query(
        r#"
            UPDATE groups SET
                status = 'Expired',
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Open' AND deadline < $2 AND current_members < target_members
        "#,
    )
    .bind(group_id)
    .bind(now)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(rows == 1)
}
