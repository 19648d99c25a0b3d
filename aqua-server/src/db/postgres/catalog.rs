use sqlx::PgConnection;
use uuid::Uuid;

use shared::models::{Category, PaginatedResponse, Product, ProductFilter};

use super::page_bounds;
use super::rows::{CategoryRow, ProductRow, map_rows};
use crate::db::StoreResult;

// ---- categories ----

pub async fn find_category(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Category>> {
    let row: Option<CategoryRow> = sqlx::query_as(
        "SELECT id, name, parent_id, record_state, created_at FROM categories WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    row.map(Category::try_from).transpose()
}

pub async fn list_categories(
    conn: &mut PgConnection,
    include_deleted: bool,
) -> StoreResult<Vec<Category>> {
    let rows: Vec<CategoryRow> = sqlx::query_as(
        "SELECT id, name, parent_id, record_state, created_at FROM categories
         WHERE ($1 OR record_state = 'active')
         ORDER BY name",
    )
    .bind(include_deleted)
    .fetch_all(conn)
    .await?;
    map_rows(rows)
}

pub async fn insert_category(conn: &mut PgConnection, category: &Category) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO categories (id, name, parent_id, record_state, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(category.parent_id)
    .bind(category.record_state.as_db())
    .bind(category.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_category(conn: &mut PgConnection, category: &Category) -> StoreResult<()> {
    sqlx::query("UPDATE categories SET name = $2, parent_id = $3, record_state = $4 WHERE id = $1")
        .bind(category.id)
        .bind(&category.name)
        .bind(category.parent_id)
        .bind(category.record_state.as_db())
        .execute(conn)
        .await?;
    Ok(())
}

// ---- products ----

const PRODUCT_COLUMNS: &str = "id, category_id, name, description, price, quantity, image_url, status, record_state, created_at, updated_at";

const PRODUCT_FILTER: &str = "
    WHERE ($1 OR record_state = 'active')
        AND ($2::UUID IS NULL OR category_id = $2)
        AND ($3::TEXT IS NULL OR status = $3)
        AND ($4::TEXT IS NULL OR name ILIKE '%' || $4 || '%')";

pub async fn find_product(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Product>> {
    let row: Option<ProductRow> =
        sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(Product::try_from).transpose()
}

pub async fn list_products(
    conn: &mut PgConnection,
    filter: &ProductFilter,
) -> StoreResult<PaginatedResponse<Product>> {
    let page = filter.page_query();
    let (limit, offset) = page_bounds(&page);
    let status = filter.status.map(|s| s.as_db());
    let search = filter.search.as_deref().filter(|s| !s.is_empty());

    let (total,): (i64,) =
        sqlx::query_as(&format!("SELECT COUNT(*) FROM products {PRODUCT_FILTER}"))
            .bind(filter.include_deleted)
            .bind(filter.category_id)
            .bind(status)
            .bind(search)
            .fetch_one(&mut *conn)
            .await?;

    let rows: Vec<ProductRow> = sqlx::query_as(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products {PRODUCT_FILTER}
         ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
    ))
    .bind(filter.include_deleted)
    .bind(filter.category_id)
    .bind(status)
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    Ok(PaginatedResponse::new(map_rows(rows)?, total as u64, &page))
}

pub async fn insert_product(conn: &mut PgConnection, p: &Product) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO products (id, category_id, name, description, price, quantity, image_url,
            status, record_state, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(p.id)
    .bind(p.category_id)
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.price)
    .bind(p.quantity)
    .bind(&p.image_url)
    .bind(p.status.as_db())
    .bind(p.record_state.as_db())
    .bind(p.created_at)
    .bind(p.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_product(conn: &mut PgConnection, p: &Product) -> StoreResult<()> {
    sqlx::query(
        "UPDATE products SET category_id = $2, name = $3, description = $4, price = $5,
            quantity = $6, image_url = $7, status = $8, record_state = $9, updated_at = $10
         WHERE id = $1",
    )
    .bind(p.id)
    .bind(p.category_id)
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.price)
    .bind(p.quantity)
    .bind(&p.image_url)
    .bind(p.status.as_db())
    .bind(p.record_state.as_db())
    .bind(p.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn reserve_stock(conn: &mut PgConnection, product_id: Uuid, qty: i32) -> StoreResult<bool> {
    let result = sqlx::query(
        "UPDATE products SET quantity = quantity - $2 WHERE id = $1 AND quantity >= $2",
    )
    .bind(product_id)
    .bind(qty)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn release_stock(conn: &mut PgConnection, product_id: Uuid, qty: i32) -> StoreResult<()> {
    sqlx::query("UPDATE products SET quantity = quantity + $2 WHERE id = $1")
        .bind(product_id)
        .bind(qty)
        .execute(conn)
        .await?;
    Ok(())
}
