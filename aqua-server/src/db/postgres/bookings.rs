use std::collections::HashMap;

use sqlx::PgConnection;
use uuid::Uuid;

use shared::models::{
    Booking, BookingFilter, Mission, MissionFilter, PaginatedResponse, ServicePackage,
};

use super::page_bounds;
use super::rows::{BookingRow, MissionRow, ServicePackageRow, map_rows};
use crate::db::StoreResult;

// ---- service packages ----

pub async fn find_service_package(
    conn: &mut PgConnection,
    id: Uuid,
) -> StoreResult<Option<ServicePackage>> {
    let row: Option<ServicePackageRow> = sqlx::query_as(
        "SELECT id, name, description, price, record_state, created_at
         FROM service_packages WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    row.map(ServicePackage::try_from).transpose()
}

pub async fn list_service_packages(
    conn: &mut PgConnection,
    include_deleted: bool,
) -> StoreResult<Vec<ServicePackage>> {
    let rows: Vec<ServicePackageRow> = sqlx::query_as(
        "SELECT id, name, description, price, record_state, created_at
         FROM service_packages WHERE ($1 OR record_state = 'active') ORDER BY name",
    )
    .bind(include_deleted)
    .fetch_all(conn)
    .await?;
    map_rows(rows)
}

pub async fn insert_service_package(conn: &mut PgConnection, p: &ServicePackage) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO service_packages (id, name, description, price, record_state, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(p.id)
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.price)
    .bind(p.record_state.as_db())
    .bind(p.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_service_package(conn: &mut PgConnection, p: &ServicePackage) -> StoreResult<()> {
    sqlx::query(
        "UPDATE service_packages SET name = $2, description = $3, price = $4, record_state = $5
         WHERE id = $1",
    )
    .bind(p.id)
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.price)
    .bind(p.record_state.as_db())
    .execute(conn)
    .await?;
    Ok(())
}

// ---- bookings ----

const BOOKING_COLUMNS: &str = "id, order_id, user_id, schedule_date, address, service_ids, total_price, status, is_paid, cancel_reason, created_at, updated_at";

const BOOKING_FILTER: &str = "
    WHERE ($1::TEXT IS NULL OR status = $1)
        AND ($2::UUID IS NULL OR user_id = $2)
        AND ($3::TIMESTAMPTZ IS NULL OR schedule_date >= $3)
        AND ($4::TIMESTAMPTZ IS NULL OR schedule_date < $4)";

pub async fn find_booking(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Booking>> {
    let row: Option<BookingRow> =
        sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(Booking::try_from).transpose()
}

pub async fn list_bookings(
    conn: &mut PgConnection,
    filter: &BookingFilter,
) -> StoreResult<PaginatedResponse<Booking>> {
    let page = filter.page_query();
    let (limit, offset) = page_bounds(&page);
    let status = filter.status.map(|s| s.as_db());

    let (total,): (i64,) =
        sqlx::query_as(&format!("SELECT COUNT(*) FROM bookings {BOOKING_FILTER}"))
            .bind(status)
            .bind(filter.user_id)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_one(&mut *conn)
            .await?;

    let rows: Vec<BookingRow> = sqlx::query_as(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings {BOOKING_FILTER}
         ORDER BY schedule_date DESC, id DESC LIMIT $5 OFFSET $6"
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

pub async fn insert_booking(conn: &mut PgConnection, b: &Booking) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO bookings (id, order_id, user_id, schedule_date, address, service_ids,
            total_price, status, is_paid, cancel_reason, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(b.id)
    .bind(b.order_id)
    .bind(b.user_id)
    .bind(b.schedule_date)
    .bind(&b.address)
    .bind(&b.service_ids)
    .bind(b.total_price)
    .bind(b.status.as_db())
    .bind(b.is_paid)
    .bind(&b.cancel_reason)
    .bind(b.created_at)
    .bind(b.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_booking(conn: &mut PgConnection, b: &Booking) -> StoreResult<()> {
    sqlx::query(
        "UPDATE bookings SET schedule_date = $2, address = $3, status = $4, is_paid = $5,
            cancel_reason = $6, updated_at = $7
         WHERE id = $1",
    )
    .bind(b.id)
    .bind(b.schedule_date)
    .bind(&b.address)
    .bind(b.status.as_db())
    .bind(b.is_paid)
    .bind(&b.cancel_reason)
    .bind(b.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

// ---- missions ----

const MISSION_COLUMNS: &str = "id, booking_id, technician_id, description, status, reason, evidence_images, created_at, updated_at";

const MISSION_FILTER: &str = "
    WHERE ($1::TEXT IS NULL OR status = $1)
        AND ($2::UUID IS NULL OR technician_id = $2)
        AND ($3::UUID IS NULL OR booking_id = $3)";

pub async fn find_mission(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Mission>> {
    let row: Option<MissionRow> =
        sqlx::query_as(&format!("SELECT {MISSION_COLUMNS} FROM missions WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(Mission::try_from).transpose()
}

pub async fn list_missions(
    conn: &mut PgConnection,
    filter: &MissionFilter,
) -> StoreResult<PaginatedResponse<Mission>> {
    let page = filter.page_query();
    let (limit, offset) = page_bounds(&page);
    let status = filter.status.map(|s| s.as_db());

    let (total,): (i64,) =
        sqlx::query_as(&format!("SELECT COUNT(*) FROM missions {MISSION_FILTER}"))
            .bind(status)
            .bind(filter.technician_id)
            .bind(filter.booking_id)
            .fetch_one(&mut *conn)
            .await?;

    let rows: Vec<MissionRow> = sqlx::query_as(&format!(
        "SELECT {MISSION_COLUMNS} FROM missions {MISSION_FILTER}
         ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
    ))
    .bind(status)
    .bind(filter.technician_id)
    .bind(filter.booking_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok(PaginatedResponse::new(map_rows(rows)?, total as u64, &page))
}

pub async fn list_missions_for_booking(
    conn: &mut PgConnection,
    booking_id: Uuid,
) -> StoreResult<Vec<Mission>> {
    let rows: Vec<MissionRow> = sqlx::query_as(&format!(
        "SELECT {MISSION_COLUMNS} FROM missions WHERE booking_id = $1 ORDER BY created_at, id"
    ))
    .bind(booking_id)
    .fetch_all(conn)
    .await?;
    map_rows(rows)
}

/// 技术员进行中的任务及其预约（用于同日冲突检查）
pub async fn list_active_missions_for_technician(
    conn: &mut PgConnection,
    technician_id: Uuid,
) -> StoreResult<Vec<(Mission, Booking)>> {
    let rows: Vec<MissionRow> = sqlx::query_as(&format!(
        "SELECT {MISSION_COLUMNS} FROM missions
         WHERE technician_id = $1 AND status IN ('assigned', 'processing')
         ORDER BY created_at, id"
    ))
    .bind(technician_id)
    .fetch_all(&mut *conn)
    .await?;
    let missions: Vec<Mission> = map_rows(rows)?;
    if missions.is_empty() {
        return Ok(Vec::new());
    }

    let booking_ids: Vec<Uuid> = missions.iter().map(|m| m.booking_id).collect();
    let rows: Vec<BookingRow> = sqlx::query_as(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ANY($1)"
    ))
    .bind(&booking_ids)
    .fetch_all(&mut *conn)
    .await?;
    let bookings: HashMap<Uuid, Booking> = map_rows::<_, Booking>(rows)?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();

    Ok(missions
        .into_iter()
        .filter_map(|m| bookings.get(&m.booking_id).cloned().map(|b| (m, b)))
        .collect())
}

pub async fn insert_mission(conn: &mut PgConnection, m: &Mission) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO missions (id, booking_id, technician_id, description, status, reason,
            evidence_images, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(m.id)
    .bind(m.booking_id)
    .bind(m.technician_id)
    .bind(&m.description)
    .bind(m.status.as_db())
    .bind(&m.reason)
    .bind(&m.evidence_images)
    .bind(m.created_at)
    .bind(m.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_mission(conn: &mut PgConnection, m: &Mission) -> StoreResult<()> {
    sqlx::query(
        "UPDATE missions SET technician_id = $2, description = $3, status = $4, reason = $5,
            evidence_images = $6, updated_at = $7
         WHERE id = $1",
    )
    .bind(m.id)
    .bind(m.technician_id)
    .bind(&m.description)
    .bind(m.status.as_db())
    .bind(&m.reason)
    .bind(&m.evidence_images)
    .bind(m.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}
