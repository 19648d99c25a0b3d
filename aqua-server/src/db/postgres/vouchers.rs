use sqlx::PgConnection;
use uuid::Uuid;

use shared::models::{PaginatedResponse, Voucher, VoucherFilter};

use super::rows::{VoucherRow, map_rows};
use super::{on_unique, page_bounds};
use crate::db::StoreResult;

const VOUCHER_COLUMNS: &str = "id, code, discount_type, discount_value, quantity, expiry_date, minimum_order_value, maximum_order_value, status, record_state, created_at, updated_at";

const VOUCHER_FILTER: &str = "
    WHERE ($1 OR record_state = 'active')
        AND ($2::TEXT IS NULL OR status = $2)
        AND ($3::TEXT IS NULL OR code ILIKE '%' || $3 || '%')";

pub async fn find(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Voucher>> {
    let row: Option<VoucherRow> =
        sqlx::query_as(&format!("SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(Voucher::try_from).transpose()
}

pub async fn find_by_code(conn: &mut PgConnection, code: &str) -> StoreResult<Option<Voucher>> {
    let row: Option<VoucherRow> = sqlx::query_as(&format!(
        "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE LOWER(code) = LOWER($1)"
    ))
    .bind(code)
    .fetch_optional(conn)
    .await?;
    row.map(Voucher::try_from).transpose()
}

pub async fn list(
    conn: &mut PgConnection,
    filter: &VoucherFilter,
) -> StoreResult<PaginatedResponse<Voucher>> {
    let page = filter.page_query();
    let (limit, offset) = page_bounds(&page);
    let status = filter.status.map(|s| s.as_db());
    let code = filter.code.as_deref().filter(|c| !c.is_empty());

    let (total,): (i64,) =
        sqlx::query_as(&format!("SELECT COUNT(*) FROM vouchers {VOUCHER_FILTER}"))
            .bind(filter.include_deleted)
            .bind(status)
            .bind(code)
            .fetch_one(&mut *conn)
            .await?;

    let rows: Vec<VoucherRow> = sqlx::query_as(&format!(
        "SELECT {VOUCHER_COLUMNS} FROM vouchers {VOUCHER_FILTER}
         ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
    ))
    .bind(filter.include_deleted)
    .bind(status)
    .bind(code)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok(PaginatedResponse::new(map_rows(rows)?, total as u64, &page))
}

pub async fn insert(conn: &mut PgConnection, v: &Voucher) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO vouchers (id, code, discount_type, discount_value, quantity, expiry_date,
            minimum_order_value, maximum_order_value, status, record_state, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(v.id)
    .bind(&v.code)
    .bind(v.discount_type.as_db())
    .bind(v.discount_value)
    .bind(v.quantity)
    .bind(v.expiry_date)
    .bind(v.minimum_order_value)
    .bind(v.maximum_order_value)
    .bind(v.status.as_db())
    .bind(v.record_state.as_db())
    .bind(v.created_at)
    .bind(v.updated_at)
    .execute(conn)
    .await
    .map_err(on_unique(format!("voucher code {}", v.code)))?;
    Ok(())
}

pub async fn update(conn: &mut PgConnection, v: &Voucher) -> StoreResult<()> {
    sqlx::query(
        "UPDATE vouchers SET code = $2, discount_type = $3, discount_value = $4, quantity = $5,
            expiry_date = $6, minimum_order_value = $7, maximum_order_value = $8, status = $9,
            record_state = $10, updated_at = $11
         WHERE id = $1",
    )
    .bind(v.id)
    .bind(&v.code)
    .bind(v.discount_type.as_db())
    .bind(v.discount_value)
    .bind(v.quantity)
    .bind(v.expiry_date)
    .bind(v.minimum_order_value)
    .bind(v.maximum_order_value)
    .bind(v.status.as_db())
    .bind(v.record_state.as_db())
    .bind(v.updated_at)
    .execute(conn)
    .await
    .map_err(on_unique(format!("voucher code {}", v.code)))?;
    Ok(())
}

pub async fn consume(conn: &mut PgConnection, id: Uuid) -> StoreResult<bool> {
    let result =
        sqlx::query("UPDATE vouchers SET quantity = quantity - 1 WHERE id = $1 AND quantity > 0")
            .bind(id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() == 1)
}
