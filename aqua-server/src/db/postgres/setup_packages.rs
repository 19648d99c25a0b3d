use sqlx::PgConnection;
use uuid::Uuid;

use shared::models::{PaginatedResponse, SetupPackage, SetupPackageDetail, SetupPackageFilter};

use super::page_bounds;
use super::rows::{SetupPackageDetailRow, SetupPackageRow, map_rows};
use crate::db::StoreResult;

const PACKAGE_COLUMNS: &str = "id, owner_id, name, description, image_url, is_template, record_state, created_at, updated_at";

// $4 = viewer: own packages plus templates
const PACKAGE_FILTER: &str = "
    WHERE ($1 OR record_state = 'active')
        AND ($2::UUID IS NULL OR owner_id = $2)
        AND ($3::TEXT IS NULL OR name ILIKE '%' || $3 || '%')
        AND ($4::UUID IS NULL OR owner_id = $4 OR is_template)";

pub async fn find(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<SetupPackage>> {
    let row: Option<SetupPackageRow> =
        sqlx::query_as(&format!("SELECT {PACKAGE_COLUMNS} FROM setup_packages WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(SetupPackage::try_from).transpose()
}

pub async fn list(
    conn: &mut PgConnection,
    filter: &SetupPackageFilter,
    visible_to: Option<Uuid>,
) -> StoreResult<PaginatedResponse<SetupPackage>> {
    let page = filter.page_query();
    let (limit, offset) = page_bounds(&page);
    let search = filter.search.as_deref().filter(|s| !s.is_empty());

    let (total,): (i64,) =
        sqlx::query_as(&format!("SELECT COUNT(*) FROM setup_packages {PACKAGE_FILTER}"))
            .bind(filter.include_deleted)
            .bind(filter.owner_id)
            .bind(search)
            .bind(visible_to)
            .fetch_one(&mut *conn)
            .await?;

    let rows: Vec<SetupPackageRow> = sqlx::query_as(&format!(
        "SELECT {PACKAGE_COLUMNS} FROM setup_packages {PACKAGE_FILTER}
         ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
    ))
    .bind(filter.include_deleted)
    .bind(filter.owner_id)
    .bind(search)
    .bind(visible_to)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok(PaginatedResponse::new(map_rows(rows)?, total as u64, &page))
}

pub async fn insert(conn: &mut PgConnection, p: &SetupPackage) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO setup_packages (id, owner_id, name, description, image_url, is_template,
            record_state, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(p.id)
    .bind(p.owner_id)
    .bind(&p.name)
    .bind(&p.description)
    .bind(&p.image_url)
    .bind(p.is_template)
    .bind(p.record_state.as_db())
    .bind(p.created_at)
    .bind(p.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update(conn: &mut PgConnection, p: &SetupPackage) -> StoreResult<()> {
    sqlx::query(
        "UPDATE setup_packages SET name = $2, description = $3, image_url = $4,
            record_state = $5, updated_at = $6
         WHERE id = $1",
    )
    .bind(p.id)
    .bind(&p.name)
    .bind(&p.description)
    .bind(&p.image_url)
    .bind(p.record_state.as_db())
    .bind(p.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_details(
    conn: &mut PgConnection,
    package_id: Uuid,
) -> StoreResult<Vec<SetupPackageDetail>> {
    let rows: Vec<SetupPackageDetailRow> = sqlx::query_as(
        "SELECT id, package_id, product_id, quantity FROM setup_package_details
         WHERE package_id = $1 ORDER BY id",
    )
    .bind(package_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn replace_details(
    conn: &mut PgConnection,
    package_id: Uuid,
    details: &[SetupPackageDetail],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM setup_package_details WHERE package_id = $1")
        .bind(package_id)
        .execute(&mut *conn)
        .await?;
    for d in details {
        sqlx::query(
            "INSERT INTO setup_package_details (id, package_id, product_id, quantity)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(d.id)
        .bind(package_id)
        .bind(d.product_id)
        .bind(d.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
