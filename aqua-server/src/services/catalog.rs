//! Categories and products

use rust_decimal::Decimal;
use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    Category, CategoryCreate, CategoryUpdate, PaginatedResponse, Product, ProductCreate,
    ProductFilter, ProductStatus, ProductUpdate, RecordState,
};
use shared::util::now;

use super::{found, validate};
use crate::auth::Identity;
use crate::db::UnitOfWork;
use crate::error::ServiceResult;
use crate::state::AppState;

fn check_price(price: Decimal) -> ServiceResult<()> {
    if price < Decimal::ZERO {
        return Err(AppError::new(ErrorCode::ProductInvalidPrice).into());
    }
    Ok(())
}

async fn active_category(uow: &mut dyn UnitOfWork, id: Uuid) -> ServiceResult<Category> {
    let category = uow
        .find_category(id)
        .await?
        .filter(|c| c.record_state.is_active());
    found(category, ErrorCode::CategoryNotFound)
}

// ---- categories ----

/// Soft-deleted categories are only listed for staff
pub async fn list_categories(
    state: &AppState,
    caller: Option<&Identity>,
    include_deleted: bool,
) -> ServiceResult<Vec<Category>> {
    let include_deleted = include_deleted && caller.is_some_and(Identity::is_staff);
    let mut uow = state.store.begin().await?;
    Ok(uow.list_categories(include_deleted).await?)
}

pub async fn create_category(
    state: &AppState,
    caller: &Identity,
    req: CategoryCreate,
) -> ServiceResult<Category> {
    caller.require_staff()?;
    validate(&req)?;
    let mut uow = state.store.begin().await?;
    if let Some(parent_id) = req.parent_id {
        active_category(uow.as_mut(), parent_id).await?;
    }
    let category = Category {
        id: Uuid::new_v4(),
        name: req.name,
        parent_id: req.parent_id,
        record_state: RecordState::Active,
        created_at: now(),
    };
    uow.insert_category(&category).await?;
    uow.commit().await?;
    Ok(category)
}

pub async fn update_category(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
    req: CategoryUpdate,
) -> ServiceResult<Category> {
    caller.require_staff()?;
    validate(&req)?;
    let mut uow = state.store.begin().await?;
    let mut category = active_category(uow.as_mut(), id).await?;
    if let Some(parent_id) = req.parent_id {
        if parent_id == id {
            return Err(AppError::validation("category cannot be its own parent").into());
        }
        active_category(uow.as_mut(), parent_id).await?;
        category.parent_id = Some(parent_id);
    }
    if let Some(name) = req.name {
        category.name = name;
    }
    uow.update_category(&category).await?;
    uow.commit().await?;
    Ok(category)
}

pub async fn delete_category(state: &AppState, caller: &Identity, id: Uuid) -> ServiceResult<()> {
    caller.require_staff()?;
    let mut uow = state.store.begin().await?;
    let mut category = active_category(uow.as_mut(), id).await?;
    category.record_state = RecordState::Deleted;
    uow.update_category(&category).await?;
    uow.commit().await?;
    Ok(())
}

// ---- products ----

pub async fn list_products(
    state: &AppState,
    caller: Option<&Identity>,
    mut filter: ProductFilter,
) -> ServiceResult<PaginatedResponse<Product>> {
    if !caller.is_some_and(Identity::is_staff) {
        filter.include_deleted = false;
    }
    let mut uow = state.store.begin().await?;
    Ok(uow.list_products(&filter).await?)
}

pub async fn get_product(
    state: &AppState,
    caller: Option<&Identity>,
    id: Uuid,
) -> ServiceResult<Product> {
    let staff = caller.is_some_and(Identity::is_staff);
    let mut uow = state.store.begin().await?;
    let product = uow
        .find_product(id)
        .await?
        .filter(|p| staff || p.record_state.is_active());
    found(product, ErrorCode::ProductNotFound)
}

pub async fn create_product(
    state: &AppState,
    caller: &Identity,
    req: ProductCreate,
) -> ServiceResult<Product> {
    caller.require_staff()?;
    validate(&req)?;
    check_price(req.price)?;

    let mut uow = state.store.begin().await?;
    active_category(uow.as_mut(), req.category_id).await?;

    let now = now();
    let product = Product {
        id: Uuid::new_v4(),
        category_id: req.category_id,
        name: req.name,
        description: req.description,
        price: req.price,
        quantity: req.quantity,
        image_url: req.image_url,
        status: req.status.unwrap_or(ProductStatus::Available),
        record_state: RecordState::Active,
        created_at: now,
        updated_at: now,
    };
    uow.insert_product(&product).await?;
    uow.commit().await?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok(product)
}

pub async fn update_product(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
    req: ProductUpdate,
) -> ServiceResult<Product> {
    caller.require_staff()?;
    validate(&req)?;

    let mut uow = state.store.begin().await?;
    let mut product = found(
        uow.find_product(id).await?.filter(|p| p.record_state.is_active()),
        ErrorCode::ProductNotFound,
    )?;

    if let Some(category_id) = req.category_id {
        active_category(uow.as_mut(), category_id).await?;
        product.category_id = category_id;
    }
    if let Some(name) = req.name {
        product.name = name;
    }
    if req.description.is_some() {
        product.description = req.description;
    }
    if let Some(price) = req.price {
        check_price(price)?;
        product.price = price;
    }
    if let Some(quantity) = req.quantity {
        product.quantity = quantity;
    }
    if req.image_url.is_some() {
        product.image_url = req.image_url;
    }
    if let Some(status) = req.status {
        product.status = status;
    }
    product.updated_at = now();

    uow.update_product(&product).await?;
    uow.commit().await?;
    Ok(product)
}

pub async fn delete_product(state: &AppState, caller: &Identity, id: Uuid) -> ServiceResult<()> {
    caller.require_staff()?;
    let mut uow = state.store.begin().await?;
    let mut product = found(
        uow.find_product(id).await?.filter(|p| p.record_state.is_active()),
        ErrorCode::ProductNotFound,
    )?;
    product.record_state = RecordState::Deleted;
    product.updated_at = now();
    uow.update_product(&product).await?;
    uow.commit().await?;

    tracing::info!(product_id = %id, "Product deleted");
    Ok(())
}

/// Attach an uploaded image URL to a product
pub async fn set_product_image(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
    image_url: String,
) -> ServiceResult<Product> {
    update_product(
        state,
        caller,
        id,
        ProductUpdate {
            image_url: Some(image_url),
            ..Default::default()
        },
    )
    .await
}
