use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use shared::models::CartItem;

use super::rows::{CartItemRow, map_rows};
use crate::db::StoreResult;

const CART_COLUMNS: &str = "id, user_id, product_id, quantity, record_state, created_at, updated_at";

pub async fn find(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<CartItem>> {
    let row: Option<CartItemRow> =
        sqlx::query_as(&format!("SELECT {CART_COLUMNS} FROM cart_items WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(CartItem::try_from).transpose()
}

pub async fn list_for_user(conn: &mut PgConnection, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
    let rows: Vec<CartItemRow> = sqlx::query_as(&format!(
        "SELECT {CART_COLUMNS} FROM cart_items
         WHERE user_id = $1 AND record_state = 'active'
         ORDER BY created_at, id"
    ))
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    map_rows(rows)
}

pub async fn insert(conn: &mut PgConnection, item: &CartItem) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO cart_items (id, user_id, product_id, quantity, record_state, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(item.id)
    .bind(item.user_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.record_state.as_db())
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Checkout claims a cart line exactly once
pub async fn consume(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> StoreResult<bool> {
    let result = sqlx::query(
        "UPDATE cart_items SET record_state = 'deleted', updated_at = $3
         WHERE id = $1 AND user_id = $2 AND record_state = 'active'",
    )
    .bind(id)
    .bind(user_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update(conn: &mut PgConnection, item: &CartItem) -> StoreResult<()> {
    sqlx::query(
        "UPDATE cart_items SET quantity = $2, record_state = $3, updated_at = $4 WHERE id = $1",
    )
    .bind(item.id)
    .bind(item.quantity)
    .bind(item.record_state.as_db())
    .bind(item.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}
