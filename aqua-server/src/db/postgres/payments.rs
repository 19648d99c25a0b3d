use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use sqlx::types::Json;
use uuid::Uuid;

use shared::models::{PaginatedResponse, Payment, PaymentFilter, PaymentTarget};

use super::rows::{PaymentRow, map_rows};
use super::{on_unique, page_bounds};
use crate::db::StoreResult;

const PAYMENT_COLUMNS: &str = "id, order_id, booking_id, user_id, method, amount, status, gateway_reference, checkout_url, bank_info, created_at, updated_at";

const PAYMENT_FILTER: &str = "
    WHERE ($1::TEXT IS NULL OR status = $1)
        AND ($2::TEXT IS NULL OR method = $2)
        AND ($3::UUID IS NULL OR order_id = $3)
        AND ($4::UUID IS NULL OR booking_id = $4)";

pub async fn find(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Payment>> {
    let row: Option<PaymentRow> =
        sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(Payment::try_from).transpose()
}

pub async fn find_by_reference(
    conn: &mut PgConnection,
    reference: &str,
) -> StoreResult<Option<Payment>> {
    let row: Option<PaymentRow> = sqlx::query_as(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_reference = $1"
    ))
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    row.map(Payment::try_from).transpose()
}

pub async fn list(
    conn: &mut PgConnection,
    filter: &PaymentFilter,
) -> StoreResult<PaginatedResponse<Payment>> {
    let page = filter.page_query();
    let (limit, offset) = page_bounds(&page);
    let status = filter.status.map(|s| s.as_db());
    let method = filter.method.map(|m| m.as_db());

    let (total,): (i64,) =
        sqlx::query_as(&format!("SELECT COUNT(*) FROM payments {PAYMENT_FILTER}"))
            .bind(status)
            .bind(method)
            .bind(filter.order_id)
            .bind(filter.booking_id)
            .fetch_one(&mut *conn)
            .await?;

    let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments {PAYMENT_FILTER}
         ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
    ))
    .bind(status)
    .bind(method)
    .bind(filter.order_id)
    .bind(filter.booking_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok(PaginatedResponse::new(map_rows(rows)?, total as u64, &page))
}

pub async fn list_for(conn: &mut PgConnection, target: PaymentTarget) -> StoreResult<Vec<Payment>> {
    let column = match target {
        PaymentTarget::Order(_) => "order_id",
        PaymentTarget::Booking(_) => "booking_id",
    };
    let id = match target {
        PaymentTarget::Order(id) | PaymentTarget::Booking(id) => id,
    };
    let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {column} = $1
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(id)
    .fetch_all(conn)
    .await?;
    map_rows(rows)
}

pub async fn list_stale(conn: &mut PgConnection, cutoff: DateTime<Utc>) -> StoreResult<Vec<Payment>> {
    let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments
         WHERE status IN ('pending', 'processing') AND created_at < $1
         ORDER BY created_at"
    ))
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    map_rows(rows)
}

pub async fn insert(conn: &mut PgConnection, p: &Payment) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO payments (id, order_id, booking_id, user_id, method, amount, status,
            gateway_reference, checkout_url, bank_info, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(p.id)
    .bind(p.order_id)
    .bind(p.booking_id)
    .bind(p.user_id)
    .bind(p.method.as_db())
    .bind(p.amount)
    .bind(p.status.as_db())
    .bind(&p.gateway_reference)
    .bind(&p.checkout_url)
    .bind(p.bank_info.as_ref().map(Json))
    .bind(p.created_at)
    .bind(p.updated_at)
    .execute(conn)
    .await
    .map_err(on_unique(format!("payment reference {}", p.gateway_reference)))?;
    Ok(())
}

pub async fn update(conn: &mut PgConnection, p: &Payment) -> StoreResult<()> {
    sqlx::query(
        "UPDATE payments SET status = $2, checkout_url = $3, bank_info = $4, updated_at = $5
         WHERE id = $1",
    )
    .bind(p.id)
    .bind(p.status.as_db())
    .bind(&p.checkout_url)
    .bind(p.bank_info.as_ref().map(Json))
    .bind(p.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// 写入 webhook 事件账本；已存在时返回 false
pub async fn record_webhook_event(
    conn: &mut PgConnection,
    event_id: &str,
    source: &str,
    now: DateTime<Utc>,
) -> StoreResult<bool> {
    let result = sqlx::query(
        "INSERT INTO processed_webhook_events (event_id, source, processed_at)
         VALUES ($1, $2, $3) ON CONFLICT (event_id) DO NOTHING",
    )
    .bind(event_id)
    .bind(source)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
