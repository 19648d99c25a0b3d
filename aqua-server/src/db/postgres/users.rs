use sqlx::PgConnection;
use uuid::Uuid;

use shared::models::{PaginatedResponse, User, UserFilter};

use super::rows::{UserRow, map_rows};
use super::{on_unique, page_bounds};
use crate::db::StoreResult;

const USER_COLUMNS: &str = "id, email, password_hash, full_name, phone, address, role, status, created_at, updated_at";

pub async fn find(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<User>> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(User::try_from).transpose()
}

pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    row.map(User::try_from).transpose()
}

pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> StoreResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
    ))
    .bind(email)
    .fetch_optional(conn)
    .await?;
    row.map(User::try_from).transpose()
}

const USER_FILTER: &str = "
    WHERE ($1 OR status = 'available')
        AND ($2::TEXT IS NULL OR role = $2)
        AND ($3::TEXT IS NULL OR status = $3)
        AND ($4::TEXT IS NULL OR email ILIKE '%' || $4 || '%' OR full_name ILIKE '%' || $4 || '%')";

pub async fn list(
    conn: &mut PgConnection,
    filter: &UserFilter,
) -> StoreResult<PaginatedResponse<User>> {
    let page = filter.page_query();
    let (limit, offset) = page_bounds(&page);
    let role = filter.role.map(|r| r.as_db());
    let status = filter.status.map(|s| s.as_db());

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM users {USER_FILTER}"))
        .bind(filter.include_deleted)
        .bind(role)
        .bind(status)
        .bind(filter.search.as_deref())
        .fetch_one(&mut *conn)
        .await?;

    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users {USER_FILTER}
         ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
    ))
    .bind(filter.include_deleted)
    .bind(role)
    .bind(status)
    .bind(filter.search.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok(PaginatedResponse::new(map_rows(rows)?, total as u64, &page))
}

pub async fn insert(conn: &mut PgConnection, user: &User) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, full_name, phone, address, role, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(&user.phone)
    .bind(&user.address)
    .bind(user.role.as_db())
    .bind(user.status.as_db())
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(conn)
    .await
    .map_err(on_unique(format!("email {}", user.email)))?;
    Ok(())
}

pub async fn update(conn: &mut PgConnection, user: &User) -> StoreResult<()> {
    sqlx::query(
        "UPDATE users SET password_hash = $2, full_name = $3, phone = $4, address = $5,
            role = $6, status = $7, updated_at = $8
         WHERE id = $1",
    )
    .bind(user.id)
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(&user.phone)
    .bind(&user.address)
    .bind(user.role.as_db())
    .bind(user.status.as_db())
    .bind(user.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}
