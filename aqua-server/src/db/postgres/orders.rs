use sqlx::PgConnection;
use uuid::Uuid;

use shared::models::{Order, OrderDetail, OrderFilter, PaginatedResponse};

use super::page_bounds;
use super::rows::{OrderDetailRow, OrderRow, map_rows};
use crate::db::StoreResult;

const ORDER_COLUMNS: &str = "id, user_id, voucher_id, setup_package_id, address, subtotal, discount, total_price, ship_cost, status, cancel_reason, created_at, updated_at";

const ORDER_FILTER: &str = "
    WHERE ($1::TEXT IS NULL OR status = $1)
        AND ($2::UUID IS NULL OR user_id = $2)
        AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)
        AND ($4::TIMESTAMPTZ IS NULL OR created_at < $4)";

pub async fn find(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Order>> {
    let row: Option<OrderRow> =
        sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(Order::try_from).transpose()
}

pub async fn list(
    conn: &mut PgConnection,
    filter: &OrderFilter,
) -> StoreResult<PaginatedResponse<Order>> {
    let page = filter.page_query();
    let (limit, offset) = page_bounds(&page);
    let status = filter.status.map(|s| s.as_db());

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM orders {ORDER_FILTER}"))
        .bind(status)
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&mut *conn)
        .await?;

    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders {ORDER_FILTER}
         ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
    ))
    .bind(status)
    .bind(filter.user_id)
    .bind(filter.from)
    .bind(filter.to)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok(PaginatedResponse::new(map_rows(rows)?, total as u64, &page))
}

pub async fn insert(conn: &mut PgConnection, o: &Order) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO orders (id, user_id, voucher_id, setup_package_id, address, subtotal, discount,
            total_price, ship_cost, status, cancel_reason, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(o.id)
    .bind(o.user_id)
    .bind(o.voucher_id)
    .bind(o.setup_package_id)
    .bind(&o.address)
    .bind(o.subtotal)
    .bind(o.discount)
    .bind(o.total_price)
    .bind(o.ship_cost)
    .bind(o.status.as_db())
    .bind(&o.cancel_reason)
    .bind(o.created_at)
    .bind(o.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update(conn: &mut PgConnection, o: &Order) -> StoreResult<()> {
    sqlx::query(
        "UPDATE orders SET address = $2, status = $3, cancel_reason = $4, updated_at = $5
         WHERE id = $1",
    )
    .bind(o.id)
    .bind(&o.address)
    .bind(o.status.as_db())
    .bind(&o.cancel_reason)
    .bind(o.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_detail(conn: &mut PgConnection, d: &OrderDetail) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO order_details (id, order_id, product_id, product_name, price, quantity)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(d.id)
    .bind(d.order_id)
    .bind(d.product_id)
    .bind(&d.product_name)
    .bind(d.price)
    .bind(d.quantity)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_details(conn: &mut PgConnection, order_id: Uuid) -> StoreResult<Vec<OrderDetail>> {
    let rows: Vec<OrderDetailRow> = sqlx::query_as(
        "SELECT id, order_id, product_id, product_name, price, quantity
         FROM order_details WHERE order_id = $1 ORDER BY product_name, id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}
