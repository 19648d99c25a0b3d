//! Shopping cart
//!
//! A cart is the set of active cart items owned by a user. Adding a product
//! that is already in the cart bumps the existing line instead of creating a
//! second one.

use rust_decimal::Decimal;
use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    CartItem, CartItemAdd, CartItemUpdate, CartLine, CartView, Product, RecordState,
};
use shared::util::now;

use super::{found, validate};
use crate::auth::Identity;
use crate::db::UnitOfWork;
use crate::error::ServiceResult;
use crate::state::AppState;

/// Upper bound for a single cart line
pub const MAX_LINE_QUANTITY: i32 = 999;

async fn purchasable_product(uow: &mut dyn UnitOfWork, id: Uuid) -> ServiceResult<Product> {
    let product = found(uow.find_product(id).await?, ErrorCode::ProductNotFound)?;
    if !product.is_purchasable() {
        return Err(AppError::new(ErrorCode::ProductUnavailable).into());
    }
    Ok(product)
}

/// Add `quantity` of a product to the user's cart, merging with an existing line
pub(crate) async fn add_line(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> ServiceResult<CartItem> {
    purchasable_product(uow, product_id).await?;
    let now = now();

    let existing = uow
        .list_cart_items(user_id)
        .await?
        .into_iter()
        .find(|item| item.product_id == product_id);

    let item = match existing {
        Some(mut item) => {
            item.quantity = (item.quantity + quantity).min(MAX_LINE_QUANTITY);
            item.updated_at = now;
            uow.update_cart_item(&item).await?;
            item
        }
        None => {
            let item = CartItem {
                id: Uuid::new_v4(),
                user_id,
                product_id,
                quantity: quantity.min(MAX_LINE_QUANTITY),
                record_state: RecordState::Active,
                created_at: now,
                updated_at: now,
            };
            uow.insert_cart_item(&item).await?;
            item
        }
    };
    Ok(item)
}

async fn owned_item(
    uow: &mut dyn UnitOfWork,
    caller: &Identity,
    id: Uuid,
) -> ServiceResult<CartItem> {
    let item = found(
        uow.find_cart_item(id)
            .await?
            .filter(|i| i.record_state.is_active()),
        ErrorCode::CartItemNotFound,
    )?;
    if item.user_id != caller.user_id {
        return Err(AppError::new(ErrorCode::NotOwner).into());
    }
    Ok(item)
}

pub async fn view_cart(state: &AppState, caller: &Identity) -> ServiceResult<CartView> {
    let mut uow = state.store.begin().await?;
    let items = uow.list_cart_items(caller.user_id).await?;

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let Some(product) = uow.find_product(item.product_id).await? else {
            continue;
        };
        let line_total = product.price * Decimal::from(item.quantity);
        lines.push(CartLine {
            id: item.id,
            product_id: product.id,
            available: product.is_purchasable() && product.quantity >= item.quantity,
            product_name: product.name,
            image_url: product.image_url,
            unit_price: product.price,
            quantity: item.quantity,
            line_total,
        });
    }
    let subtotal = lines
        .iter()
        .filter(|l| l.available)
        .map(|l| l.line_total)
        .sum();
    Ok(CartView {
        items: lines,
        subtotal,
    })
}

pub async fn add_item(
    state: &AppState,
    caller: &Identity,
    req: CartItemAdd,
) -> ServiceResult<CartItem> {
    validate(&req)?;
    let mut uow = state.store.begin().await?;
    let item = add_line(uow.as_mut(), caller.user_id, req.product_id, req.quantity).await?;
    uow.commit().await?;
    Ok(item)
}

pub async fn update_item(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
    req: CartItemUpdate,
) -> ServiceResult<CartItem> {
    validate(&req)?;
    let mut uow = state.store.begin().await?;
    let mut item = owned_item(uow.as_mut(), caller, id).await?;
    let product = purchasable_product(uow.as_mut(), item.product_id).await?;
    if req.quantity > product.quantity {
        return Err(AppError::new(ErrorCode::ProductOutOfStock)
            .with_detail("available", product.quantity)
            .into());
    }
    item.quantity = req.quantity;
    item.updated_at = now();
    uow.update_cart_item(&item).await?;
    uow.commit().await?;
    Ok(item)
}

pub async fn remove_item(state: &AppState, caller: &Identity, id: Uuid) -> ServiceResult<()> {
    let mut uow = state.store.begin().await?;
    let mut item = owned_item(uow.as_mut(), caller, id).await?;
    item.record_state = RecordState::Deleted;
    item.updated_at = now();
    uow.update_cart_item(&item).await?;
    uow.commit().await?;
    Ok(())
}

pub async fn clear_cart(state: &AppState, caller: &Identity) -> ServiceResult<()> {
    let mut uow = state.store.begin().await?;
    let now = now();
    for mut item in uow.list_cart_items(caller.user_id).await? {
        item.record_state = RecordState::Deleted;
        item.updated_at = now;
        uow.update_cart_item(&item).await?;
    }
    uow.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{money, test_app};
    use shared::models::UserRole;

    #[tokio::test]
    async fn test_add_merges_same_product() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let product = app.product("12.50", 10).await;

        let add = |quantity| CartItemAdd {
            product_id: product.id,
            quantity,
        };
        let first = add_item(&app.state, &customer, add(1)).await.unwrap();
        let second = add_item(&app.state, &customer, add(2)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 3);

        let cart = view_cart(&app.state, &customer).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.subtotal, money("37.50"));
    }

    #[tokio::test]
    async fn test_other_users_item_is_rejected() {
        let app = test_app();
        let alice = app.user(UserRole::Customer).await;
        let bob = app.user(UserRole::Customer).await;
        let product = app.product("5.00", 10).await;
        let item = app.cart_item(&alice, &product, 1).await;

        let err: AppError = remove_item(&app.state, &bob, item.id)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::NotOwner);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let a = app.product("1.00", 10).await;
        let b = app.product("2.00", 10).await;
        let item = app.cart_item(&customer, &a, 1).await;
        app.cart_item(&customer, &b, 1).await;

        remove_item(&app.state, &customer, item.id).await.unwrap();
        assert_eq!(view_cart(&app.state, &customer).await.unwrap().items.len(), 1);

        clear_cart(&app.state, &customer).await.unwrap();
        let cart = view_cart(&app.state, &customer).await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.subtotal, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_sold_out_line_flagged_unavailable() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let product = app.product("9.00", 1).await;
        app.cart_item(&customer, &product, 3).await;

        let cart = view_cart(&app.state, &customer).await.unwrap();
        assert!(!cart.items[0].available);
        assert_eq!(cart.subtotal, Decimal::ZERO);
    }
}
