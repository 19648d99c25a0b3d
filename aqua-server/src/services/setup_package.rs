//! Setup packages
//!
//! Staff publish template packages; customers keep their own packages,
//! copy templates and expand a package into cart items.

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    CartItem, PaginatedResponse, RecordState, SetupPackage, SetupPackageCreate,
    SetupPackageDetail, SetupPackageFilter, SetupPackageItem, SetupPackageLine,
    SetupPackageUpdate, SetupPackageView,
};
use shared::util::now;

use super::cart::add_line;
use super::{found, validate};
use crate::auth::Identity;
use crate::db::UnitOfWork;
use crate::error::ServiceResult;
use crate::state::AppState;

/// Active package the caller may see: own, template, or any for staff
pub(crate) async fn visible_package(
    uow: &mut dyn UnitOfWork,
    caller: &Identity,
    id: Uuid,
) -> ServiceResult<SetupPackage> {
    found(
        uow.find_setup_package(id).await?.filter(|p| {
            p.record_state.is_active()
                && (p.owner_id == caller.user_id || p.is_template || caller.is_staff())
        }),
        ErrorCode::SetupPackageNotFound,
    )
}

/// Active package the caller may change
async fn editable_package(
    uow: &mut dyn UnitOfWork,
    caller: &Identity,
    id: Uuid,
) -> ServiceResult<SetupPackage> {
    let package = visible_package(uow, caller, id).await?;
    caller.require_access(package.owner_id)?;
    Ok(package)
}

/// Merge duplicate products and check every product exists
async fn build_details(
    uow: &mut dyn UnitOfWork,
    package_id: Uuid,
    items: &[SetupPackageItem],
) -> ServiceResult<Vec<SetupPackageDetail>> {
    let mut merged: Vec<SetupPackageDetail> = Vec::with_capacity(items.len());
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for item in items {
        if let Some(&at) = index.get(&item.product_id) {
            merged[at].quantity += item.quantity;
            continue;
        }
        found(
            uow.find_product(item.product_id)
                .await?
                .filter(|p| p.record_state.is_active()),
            ErrorCode::ProductNotFound,
        )?;
        index.insert(item.product_id, merged.len());
        merged.push(SetupPackageDetail {
            id: Uuid::new_v4(),
            package_id,
            product_id: item.product_id,
            quantity: item.quantity,
        });
    }
    Ok(merged)
}

async fn view_of(
    uow: &mut dyn UnitOfWork,
    package: SetupPackage,
) -> ServiceResult<SetupPackageView> {
    let details = uow.list_setup_package_details(package.id).await?;
    let mut items = Vec::with_capacity(details.len());
    for detail in details {
        let Some(product) = uow.find_product(detail.product_id).await? else {
            continue;
        };
        items.push(SetupPackageLine {
            product_id: product.id,
            product_name: product.name,
            unit_price: product.price,
            quantity: detail.quantity,
            line_total: product.price * Decimal::from(detail.quantity),
        });
    }
    let total_price = items.iter().map(|l| l.line_total).sum();
    Ok(SetupPackageView {
        package,
        items,
        total_price,
    })
}

pub async fn list_setup_packages(
    state: &AppState,
    caller: &Identity,
    mut filter: SetupPackageFilter,
) -> ServiceResult<PaginatedResponse<SetupPackage>> {
    let visible_to = if caller.is_staff() {
        None
    } else {
        filter.include_deleted = false;
        Some(caller.user_id)
    };
    let mut uow = state.store.begin().await?;
    Ok(uow.list_setup_packages(&filter, visible_to).await?)
}

pub async fn get_setup_package(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
) -> ServiceResult<SetupPackageView> {
    let mut uow = state.store.begin().await?;
    let package = visible_package(uow.as_mut(), caller, id).await?;
    view_of(uow.as_mut(), package).await
}

/// Packages created by staff are published as templates
pub async fn create_setup_package(
    state: &AppState,
    caller: &Identity,
    req: SetupPackageCreate,
) -> ServiceResult<SetupPackageView> {
    validate(&req)?;
    let now = now();
    let package = SetupPackage {
        id: Uuid::new_v4(),
        owner_id: caller.user_id,
        name: req.name,
        description: req.description,
        image_url: req.image_url,
        is_template: caller.is_staff(),
        record_state: RecordState::Active,
        created_at: now,
        updated_at: now,
    };

    let mut uow = state.store.begin().await?;
    let details = build_details(uow.as_mut(), package.id, &req.items).await?;
    uow.insert_setup_package(&package).await?;
    uow.replace_setup_package_details(package.id, &details)
        .await?;
    let view = view_of(uow.as_mut(), package).await?;
    uow.commit().await?;

    tracing::info!(
        package_id = %view.package.id,
        template = view.package.is_template,
        "Setup package created"
    );
    Ok(view)
}

pub async fn update_setup_package(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
    req: SetupPackageUpdate,
) -> ServiceResult<SetupPackageView> {
    validate(&req)?;
    let mut uow = state.store.begin().await?;
    let mut package = editable_package(uow.as_mut(), caller, id).await?;
    if let Some(name) = req.name {
        package.name = name;
    }
    if req.description.is_some() {
        package.description = req.description;
    }
    if req.image_url.is_some() {
        package.image_url = req.image_url;
    }
    if let Some(items) = req.items {
        let details = build_details(uow.as_mut(), id, &items).await?;
        uow.replace_setup_package_details(id, &details).await?;
    }
    package.updated_at = now();
    uow.update_setup_package(&package).await?;
    let view = view_of(uow.as_mut(), package).await?;
    uow.commit().await?;
    Ok(view)
}

pub async fn delete_setup_package(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
) -> ServiceResult<()> {
    let mut uow = state.store.begin().await?;
    let mut package = editable_package(uow.as_mut(), caller, id).await?;
    package.record_state = RecordState::Deleted;
    package.updated_at = now();
    uow.update_setup_package(&package).await?;
    uow.commit().await?;
    tracing::info!(package_id = %id, "Setup package deleted");
    Ok(())
}

/// 复制套餐到当前用户名下
pub async fn copy_setup_package(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
) -> ServiceResult<SetupPackageView> {
    let now = now();
    let mut uow = state.store.begin().await?;
    let source = visible_package(uow.as_mut(), caller, id).await?;
    let copy = SetupPackage {
        id: Uuid::new_v4(),
        owner_id: caller.user_id,
        name: source.name,
        description: source.description,
        image_url: source.image_url,
        is_template: false,
        record_state: RecordState::Active,
        created_at: now,
        updated_at: now,
    };
    let details: Vec<SetupPackageDetail> = uow
        .list_setup_package_details(id)
        .await?
        .into_iter()
        .map(|d| SetupPackageDetail {
            id: Uuid::new_v4(),
            package_id: copy.id,
            ..d
        })
        .collect();
    uow.insert_setup_package(&copy).await?;
    uow.replace_setup_package_details(copy.id, &details).await?;
    let view = view_of(uow.as_mut(), copy).await?;
    uow.commit().await?;

    tracing::info!(source_id = %id, package_id = %view.package.id, "Setup package copied");
    Ok(view)
}

/// Expand every package line into the caller's cart
pub async fn add_to_cart(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
) -> ServiceResult<Vec<CartItem>> {
    let mut uow = state.store.begin().await?;
    visible_package(uow.as_mut(), caller, id).await?;
    let details = uow.list_setup_package_details(id).await?;
    if details.is_empty() {
        return Err(AppError::with_message(
            ErrorCode::InvalidState,
            "Setup package has no products",
        )
        .into());
    }
    let mut items = Vec::with_capacity(details.len());
    for detail in details {
        let item = add_line(uow.as_mut(), caller.user_id, detail.product_id, detail.quantity)
            .await?;
        items.push(item);
    }
    uow.commit().await?;
    Ok(items)
}
