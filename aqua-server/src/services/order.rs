//! Order lifecycle: checkout, cancellation and fulfillment
//!
//! Checkout runs in one unit of work: stock reservation, voucher consumption,
//! order rows and cart cleanup either all commit or none do.

use std::collections::HashSet;

use rust_decimal::Decimal;
use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    CancelOrderRequest, CheckoutPayload, CreateOrderRequest, Order, OrderDetail, OrderFilter,
    OrderStatus, OrderView, PaginatedResponse, PaymentTarget, UpdateOrderStatusRequest,
    Voucher,
};
use shared::util::now;

use super::payment::close_payments;
use super::setup_package::visible_package;
use super::{email_of, found, validate};
use crate::auth::Identity;
use crate::db::UnitOfWork;
use crate::email::templates;
use crate::error::ServiceResult;
use crate::state::AppState;

async fn resolve_voucher(
    uow: &mut dyn UnitOfWork,
    req: &CreateOrderRequest,
) -> ServiceResult<Option<Voucher>> {
    let voucher = match (req.voucher_id, req.voucher_code.as_deref()) {
        (Some(id), _) => uow.find_voucher(id).await?,
        (None, Some(code)) if !code.trim().is_empty() => {
            uow.find_voucher_by_code(code.trim()).await?
        }
        _ => return Ok(None),
    };
    found(voucher, ErrorCode::VoucherNotFound).map(Some)
}

/// 下单：锁定价格、扣减库存、核销优惠券
pub async fn create_order(
    state: &AppState,
    caller: &Identity,
    req: CreateOrderRequest,
) -> ServiceResult<CheckoutPayload> {
    validate(&req)?;
    if req.ship_cost < Decimal::ZERO {
        return Err(AppError::new(ErrorCode::ValueOutOfRange)
            .with_detail("field", "ship_cost")
            .into());
    }

    let mut seen = HashSet::new();
    let cart_item_ids: Vec<Uuid> = req
        .cart_item_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let now = now();
    let order_id = Uuid::new_v4();
    let mut uow = state.store.begin().await?;

    let mut details = Vec::with_capacity(cart_item_ids.len());
    for item_id in cart_item_ids {
        let item = found(
            uow.find_cart_item(item_id)
                .await?
                .filter(|i| i.record_state.is_active()),
            ErrorCode::CartItemNotFound,
        )?;
        if item.user_id != caller.user_id {
            return Err(AppError::new(ErrorCode::NotOwner).into());
        }
        // A concurrent checkout of the same line claims it first
        if !uow.consume_cart_item(item.id, caller.user_id, now).await? {
            return Err(AppError::new(ErrorCode::CartItemNotFound).into());
        }

        let product = found(
            uow.find_product(item.product_id).await?,
            ErrorCode::ProductNotFound,
        )?;
        if !product.is_purchasable() {
            return Err(AppError::new(ErrorCode::ProductUnavailable)
                .with_detail("product_id", product.id.to_string())
                .into());
        }
        if !uow.reserve_stock(product.id, item.quantity).await? {
            return Err(AppError::new(ErrorCode::ProductOutOfStock)
                .with_detail("product_id", product.id.to_string())
                .into());
        }

        details.push(OrderDetail {
            id: Uuid::new_v4(),
            order_id,
            product_id: product.id,
            product_name: product.name,
            price: product.price,
            quantity: item.quantity,
        });
    }

    let subtotal: Decimal = details.iter().map(OrderDetail::line_total).sum();

    let voucher = resolve_voucher(uow.as_mut(), &req).await?;
    let discount = match &voucher {
        Some(voucher) => {
            voucher.check_applicable(subtotal, now)?;
            let discount = voucher.discount_for(subtotal);
            if !uow.consume_voucher(voucher.id).await? {
                return Err(AppError::new(ErrorCode::VoucherExhausted).into());
            }
            discount
        }
        None => Decimal::ZERO,
    };

    if let Some(package_id) = req.setup_package_id {
        visible_package(uow.as_mut(), caller, package_id).await?;
    }

    let order = Order {
        id: order_id,
        user_id: caller.user_id,
        voucher_id: voucher.as_ref().map(|v| v.id),
        setup_package_id: req.setup_package_id,
        address: req.address,
        subtotal,
        discount,
        total_price: subtotal - discount,
        ship_cost: req.ship_cost,
        status: OrderStatus::PendingPayment,
        cancel_reason: None,
        created_at: now,
        updated_at: now,
    };
    uow.insert_order(&order).await?;
    for detail in &details {
        uow.insert_order_detail(detail).await?;
    }
    uow.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %order.user_id,
        total = %order.total_price,
        "Order created"
    );
    state
        .notifier
        .notify(caller.email.clone(), templates::order_confirmation(&order, &details));

    Ok(CheckoutPayload {
        amount_due: order.amount_due(),
        order,
        details,
    })
}

/// Cancel an order, returning stock and closing its payments
pub async fn cancel_order(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
    req: CancelOrderRequest,
) -> ServiceResult<Order> {
    validate(&req)?;
    let now = now();
    let mut uow = state.store.begin().await?;
    let mut order = found(uow.find_order(id).await?, ErrorCode::OrderNotFound)?;
    caller.require_access(order.user_id)?;

    if !order.status.is_cancellable()
        || !uow
            .transition_order(
                id,
                &OrderStatus::sources_of(OrderStatus::Cancelled),
                OrderStatus::Cancelled,
                now,
            )
            .await?
    {
        return Err(AppError::new(ErrorCode::OrderNotCancellable)
            .with_detail("status", order.status.as_db())
            .into());
    }
    order.status = OrderStatus::Cancelled;
    order.cancel_reason = req.reason;
    order.updated_at = now;
    uow.update_order(&order).await?;

    for detail in uow.list_order_details(id).await? {
        uow.release_stock(detail.product_id, detail.quantity).await?;
    }

    let closed = close_payments(uow.as_mut(), PaymentTarget::Order(id), now).await?;
    let owner_email = email_of(uow.as_mut(), order.user_id).await?;
    uow.commit().await?;

    tracing::info!(order_id = %id, by = %caller.user_id, "Order cancelled");
    if let Some(to) = owner_email {
        for payment in &closed.refunding {
            state.notifier.notify(to.clone(), templates::refund_started(payment));
        }
    }
    Ok(order)
}

/// Staff fulfillment: Processing, Shipped, Delivered
pub async fn update_order_status(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
    req: UpdateOrderStatusRequest,
) -> ServiceResult<Order> {
    caller.require_staff()?;
    let target = req.status;
    if !matches!(
        target,
        OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
    ) {
        return Err(AppError::new(ErrorCode::OrderInvalidTransition)
            .with_detail("to", target.as_db())
            .into());
    }

    let now = now();
    let mut uow = state.store.begin().await?;
    let mut order = found(uow.find_order(id).await?, ErrorCode::OrderNotFound)?;
    if !order.status.can_transition_to(target)
        || !uow
            .transition_order(id, &[order.status], target, now)
            .await?
    {
        return Err(AppError::new(ErrorCode::OrderInvalidTransition)
            .with_detail("from", order.status.as_db())
            .with_detail("to", target.as_db())
            .into());
    }
    uow.commit().await?;

    tracing::info!(order_id = %id, from = %order.status, to = %target, "Order status updated");
    order.status = target;
    order.updated_at = now;
    Ok(order)
}

pub async fn get_order(state: &AppState, caller: &Identity, id: Uuid) -> ServiceResult<OrderView> {
    let mut uow = state.store.begin().await?;
    let order = found(uow.find_order(id).await?, ErrorCode::OrderNotFound)?;
    caller.require_access(order.user_id)?;
    let details = uow.list_order_details(id).await?;
    let payments = uow.list_payments_for(PaymentTarget::Order(id)).await?;
    Ok(OrderView {
        amount_due: order.amount_due(),
        order,
        details,
        payments,
    })
}

/// Customers only ever see their own orders
pub async fn list_orders(
    state: &AppState,
    caller: &Identity,
    mut filter: OrderFilter,
) -> ServiceResult<PaginatedResponse<Order>> {
    if !caller.is_staff() {
        filter.user_id = Some(caller.user_id);
    }
    let mut uow = state.store.begin().await?;
    Ok(uow.list_orders(&filter).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{money, test_app, TestApp};
    use shared::models::{DiscountType, Product, UserRole};

    fn checkout(cart_item_ids: Vec<Uuid>) -> CreateOrderRequest {
        CreateOrderRequest {
            cart_item_ids,
            voucher_id: None,
            voucher_code: None,
            address: "12 Le Loi, District 1".into(),
            ship_cost: Decimal::ZERO,
            setup_package_id: None,
        }
    }

    async fn stock_of(app: &TestApp, product: &Product) -> i32 {
        let mut uow = app.state.store.begin().await.unwrap();
        uow.find_product(product.id).await.unwrap().unwrap().quantity
    }

    async fn force_status(app: &TestApp, id: Uuid, status: OrderStatus) {
        let mut uow = app.state.store.begin().await.unwrap();
        let mut order = uow.find_order(id).await.unwrap().unwrap();
        order.status = status;
        uow.update_order(&order).await.unwrap();
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_checkout_with_percent_voucher() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let tank = app.product("10.00", 5).await;
        let food = app.product("5.00", 5).await;
        let a = app.cart_item(&customer, &tank, 2).await;
        let b = app.cart_item(&customer, &food, 1).await;
        let voucher = app.voucher("TEN", DiscountType::Percent, "10", 3).await;

        let mut req = checkout(vec![a.id, b.id]);
        req.voucher_code = Some("ten".into());
        let payload = create_order(&app.state, &customer, req).await.unwrap();

        let order = &payload.order;
        assert_eq!(order.subtotal, money("25.00"));
        assert_eq!(order.discount, money("2.50"));
        assert_eq!(order.total_price, money("22.50"));
        assert_eq!(order.status, OrderStatus::PendingPayment);
        let lines: Decimal = payload.details.iter().map(OrderDetail::line_total).sum();
        assert_eq!(lines - order.discount, order.total_price);

        let mut uow = app.state.store.begin().await.unwrap();
        let voucher = uow.find_voucher(voucher.id).await.unwrap().unwrap();
        assert_eq!(voucher.quantity, 2);
        assert!(uow.list_cart_items(customer.user_id).await.unwrap().is_empty());
        drop(uow);

        assert_eq!(stock_of(&app, &tank).await, 3);
        let mail = app.mailer.wait_for(1).await;
        assert_eq!(mail[0].to, customer.email);
    }

    #[tokio::test]
    async fn test_out_of_stock_rolls_back() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let plenty = app.product("3.00", 10).await;
        let scarce = app.product("4.00", 1).await;
        let a = app.cart_item(&customer, &plenty, 2).await;
        let b = app.cart_item(&customer, &scarce, 2).await;

        let err: AppError = create_order(&app.state, &customer, checkout(vec![a.id, b.id]))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::ProductOutOfStock);
        assert_eq!(stock_of(&app, &plenty).await, 10);
        let page = list_orders(&app.state, &customer, OrderFilter::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_last_voucher_used_once_under_concurrency() {
        let app = test_app();
        let product = app.product("20.00", 10).await;
        app.voucher("ONCE", DiscountType::Fixed, "5", 1).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let customer = app.user(UserRole::Customer).await;
            let item = app.cart_item(&customer, &product, 1).await;
            let state = app.state.clone();
            handles.push(tokio::spawn(async move {
                let mut req = checkout(vec![item.id]);
                req.voucher_code = Some("ONCE".into());
                create_order(&state, &customer, req).await
            }));
        }

        let mut ok = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => {
                    let err: AppError = e.into();
                    assert_eq!(err.code, ErrorCode::VoucherExhausted);
                    rejected += 1;
                }
            }
        }
        assert_eq!((ok, rejected), (1, 1));
    }

    #[tokio::test]
    async fn test_cart_line_checks_out_once() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let product = app.product("4.00", 10).await;
        let item_id = app.cart_item(&customer, &product, 2).await.id;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let state = app.state.clone();
            let customer = customer.clone();
            handles.push(tokio::spawn(async move {
                create_order(&state, &customer, checkout(vec![item_id])).await
            }));
        }
        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => {
                    let err: AppError = e.into();
                    assert_eq!(err.code, ErrorCode::CartItemNotFound);
                }
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(stock_of(&app, &product).await, 8);

        let mut uow = app.state.store.begin().await.unwrap();
        assert!(
            !uow.consume_cart_item(item_id, customer.user_id, now())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_cannot_checkout_someone_elses_cart() {
        let app = test_app();
        let alice = app.user(UserRole::Customer).await;
        let bob = app.user(UserRole::Customer).await;
        let product = app.product("1.00", 10).await;
        let item = app.cart_item(&alice, &product, 1).await;

        let err: AppError = create_order(&app.state, &bob, checkout(vec![item.id]))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::NotOwner);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let product = app.product("7.00", 4).await;
        let item = app.cart_item(&customer, &product, 3).await;
        let payload = create_order(&app.state, &customer, checkout(vec![item.id]))
            .await
            .unwrap();
        assert_eq!(stock_of(&app, &product).await, 1);

        let order = cancel_order(
            &app.state,
            &customer,
            payload.order.id,
            CancelOrderRequest {
                reason: Some("changed my mind".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&app, &product).await, 4);
    }

    #[tokio::test]
    async fn test_cancel_shipped_or_delivered_is_rejected() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let product = app.product("7.00", 10).await;

        for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
            let item = app.cart_item(&customer, &product, 1).await;
            let payload = create_order(&app.state, &customer, checkout(vec![item.id]))
                .await
                .unwrap();
            force_status(&app, payload.order.id, status).await;

            let err: AppError = cancel_order(
                &app.state,
                &customer,
                payload.order.id,
                CancelOrderRequest::default(),
            )
            .await
            .unwrap_err()
            .into();
            assert_eq!(err.code, ErrorCode::OrderNotCancellable);
            assert_eq!(err.http_status().as_u16(), 409);

            let view = get_order(&app.state, &customer, payload.order.id).await.unwrap();
            assert_eq!(view.order.status, status);
            assert!(view.order.cancel_reason.is_none());
        }
        assert_eq!(stock_of(&app, &product).await, 8);
    }

    #[tokio::test]
    async fn test_fulfillment_path() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let product = app.product("7.00", 10).await;
        let item = app.cart_item(&customer, &product, 1).await;
        let payload = create_order(&app.state, &customer, checkout(vec![item.id]))
            .await
            .unwrap();
        let id = payload.order.id;

        let update = |status| UpdateOrderStatusRequest { status };
        // unpaid orders cannot be shipped
        assert!(
            update_order_status(&app.state, &manager, id, update(OrderStatus::Shipped))
                .await
                .is_err()
        );

        force_status(&app, id, OrderStatus::Paid).await;
        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let order = update_order_status(&app.state, &manager, id, update(status))
                .await
                .unwrap();
            assert_eq!(order.status, status);
        }

        assert!(
            update_order_status(&app.state, &customer, id, update(OrderStatus::Delivered))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_customers_list_only_their_orders() {
        let app = test_app();
        let alice = app.user(UserRole::Customer).await;
        let bob = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let product = app.product("2.00", 10).await;
        for who in [&alice, &bob] {
            let item = app.cart_item(who, &product, 1).await;
            create_order(&app.state, who, checkout(vec![item.id]))
                .await
                .unwrap();
        }

        let filter = OrderFilter {
            user_id: Some(bob.user_id),
            ..Default::default()
        };
        let page = list_orders(&app.state, &alice, filter).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].user_id, alice.user_id);

        let all = list_orders(&app.state, &manager, OrderFilter::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);
    }
}
