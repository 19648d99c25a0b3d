//! Payment orchestration
//!
//! Gateway results (redirect callbacks, webhooks, manual bank confirmation)
//! all funnel through [`apply_event`]: the event id goes into the processed
//! ledger first, then the payment moves with a conditional transition. A
//! replayed event or one that loses the race to the sweep leaves every row as
//! the first writer left it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    BankInfo, BookingStatus, CreatePaymentRequest, OrderStatus, PaginatedResponse, Payment,
    PaymentFilter, PaymentMethod, PaymentOutcome, PaymentStatus, PaymentTarget, WebhookAck,
};
use shared::util::now;

use super::{email_of, found};
use crate::auth::Identity;
use crate::db::UnitOfWork;
use crate::email::templates;
use crate::error::{ServiceError, ServiceResult};
use crate::payment::{CheckoutRequest, GatewayEvent};
use crate::state::AppState;
use crate::util::generate_reference;

const OPEN: [PaymentStatus; 2] = [PaymentStatus::Pending, PaymentStatus::Processing];

/// Payments touched when an order or booking is cancelled
#[derive(Debug, Default)]
pub(crate) struct ClosedPayments {
    pub canceled: Vec<Payment>,
    /// Completed payments moved onto the refund path
    pub refunding: Vec<Payment>,
}

/// Cancel the open payments of a target and start refunds for completed ones
pub(crate) async fn close_payments(
    uow: &mut dyn UnitOfWork,
    target: PaymentTarget,
    now: DateTime<Utc>,
) -> ServiceResult<ClosedPayments> {
    let mut closed = ClosedPayments::default();
    for mut payment in uow.list_payments_for(target).await? {
        let to = match payment.status {
            PaymentStatus::Pending | PaymentStatus::Processing => PaymentStatus::Canceled,
            PaymentStatus::Completed => PaymentStatus::Refunding,
            _ => continue,
        };
        if !uow
            .transition_payment(payment.id, &[payment.status], to, now)
            .await?
        {
            continue;
        }
        payment.status = to;
        payment.updated_at = now;
        match to {
            PaymentStatus::Refunding => {
                tracing::info!(payment_id = %payment.id, "Refund started");
                closed.refunding.push(payment);
            }
            _ => closed.canceled.push(payment),
        }
    }
    Ok(closed)
}

/// Start (or resume) paying an order or a booking
pub async fn create_payment(
    state: &AppState,
    caller: &Identity,
    req: CreatePaymentRequest,
    client_ip: &str,
) -> ServiceResult<Payment> {
    let target = req.target().ok_or_else(|| {
        AppError::validation("exactly one of order_id or booking_id is required")
    })?;

    let now = now();
    let mut uow = state.store.begin().await?;
    let (owner, due, description) = match target {
        PaymentTarget::Order(id) => {
            let order = found(uow.find_order(id).await?, ErrorCode::OrderNotFound)?;
            caller.require_access(order.user_id)?;
            if order.status != OrderStatus::PendingPayment {
                return Err(AppError::new(ErrorCode::OrderNotPayable)
                    .with_detail("status", order.status.as_db())
                    .into());
            }
            (order.user_id, order.amount_due(), "Thanh toan don hang")
        }
        PaymentTarget::Booking(id) => {
            let booking = found(uow.find_booking(id).await?, ErrorCode::BookingNotFound)?;
            caller.require_access(booking.user_id)?;
            if booking.is_paid {
                return Err(AppError::new(ErrorCode::OrderAlreadyPaid).into());
            }
            if booking.status == BookingStatus::Cancelled {
                return Err(AppError::invalid_state("booking is cancelled").into());
            }
            (booking.user_id, booking.total_price, "Thanh toan dich vu")
        }
    };
    if req.amount != due {
        return Err(AppError::new(ErrorCode::PaymentAmountMismatch)
            .with_detail("expected", due.to_string())
            .into());
    }

    let reusable = uow
        .list_payments_for(target)
        .await?
        .into_iter()
        .find(|p| {
            p.status == PaymentStatus::Pending && p.method == req.method && p.amount == due
        });

    let payment = match reusable {
        Some(payment) => {
            drop(uow);
            payment
        }
        None => {
            let reference = generate_reference();
            let bank_info = (req.method == PaymentMethod::BankTransfer).then(|| BankInfo {
                bank_name: state.config.bank.bank_name.clone(),
                account_no: state.config.bank.account_no.clone(),
                account_name: state.config.bank.account_name.clone(),
                transfer_content: format!("AQUA {reference}"),
            });
            let (order_id, booking_id) = match target {
                PaymentTarget::Order(id) => (Some(id), None),
                PaymentTarget::Booking(id) => (None, Some(id)),
            };
            let payment = Payment {
                id: Uuid::new_v4(),
                order_id,
                booking_id,
                user_id: owner,
                method: req.method,
                amount: due,
                status: PaymentStatus::Pending,
                gateway_reference: reference,
                checkout_url: None,
                bank_info,
                created_at: now,
                updated_at: now,
            };
            uow.insert_payment(&payment).await?;
            uow.commit().await?;
            tracing::info!(
                payment_id = %payment.id,
                method = %payment.method,
                amount = %payment.amount,
                "Payment created"
            );
            payment
        }
    };

    match state.gateways.get(payment.method) {
        Some(gateway) if payment.checkout_url.is_none() => {
            let request = CheckoutRequest {
                reference: payment.gateway_reference.clone(),
                amount: payment.amount,
                description: format!("{description} {}", payment.gateway_reference),
                return_url: state.config.payment_return_url.clone(),
                cancel_url: state.config.payment_cancel_url.clone(),
                client_ip: client_ip.to_string(),
            };
            match gateway.create_checkout(&request).await {
                Ok(session) => attach_checkout_url(state, payment, session.url).await,
                Err(e) => {
                    // The payment stays Pending; the customer may retry and reuse it
                    tracing::error!(
                        payment_id = %payment.id,
                        method = %payment.method,
                        error = %e,
                        "Checkout creation failed"
                    );
                    Ok(payment)
                }
            }
        }
        _ => Ok(payment),
    }
}

async fn attach_checkout_url(
    state: &AppState,
    mut payment: Payment,
    url: String,
) -> ServiceResult<Payment> {
    let mut uow = state.store.begin().await?;
    let current = found(uow.find_payment(payment.id).await?, ErrorCode::PaymentNotFound)?;
    if current.status != PaymentStatus::Pending {
        return Ok(current);
    }
    payment.checkout_url = Some(url);
    payment.updated_at = now();
    uow.update_payment(&payment).await?;
    uow.commit().await?;
    Ok(payment)
}

/// What completing a payment did to its order or booking
enum Settlement {
    /// Target is now paid; its other open payments were cancelled
    Settled(Vec<Payment>),
    /// Target was cancelled or already paid by another payment
    Refund,
}

/// Cancel the open payments of `target` other than `keep`
async fn cancel_siblings(
    uow: &mut dyn UnitOfWork,
    target: PaymentTarget,
    keep: Uuid,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<Payment>> {
    let mut canceled = Vec::new();
    for mut other in uow.list_payments_for(target).await? {
        if other.id == keep || !other.status.is_open() {
            continue;
        }
        if uow
            .transition_payment(other.id, &OPEN, PaymentStatus::Canceled, now)
            .await?
        {
            other.status = PaymentStatus::Canceled;
            other.updated_at = now;
            canceled.push(other);
        }
    }
    Ok(canceled)
}

/// Mark the order or booking of a just-completed payment as paid
async fn settle_target(
    uow: &mut dyn UnitOfWork,
    payment: &Payment,
    now: DateTime<Utc>,
) -> ServiceResult<Settlement> {
    let Some(target) = payment.target() else {
        return Ok(Settlement::Settled(Vec::new()));
    };
    let settled = match target {
        PaymentTarget::Order(id) => {
            uow.transition_order(id, &[OrderStatus::PendingPayment], OrderStatus::Paid, now)
                .await?
        }
        PaymentTarget::Booking(id) => match uow.find_booking(id).await? {
            Some(mut booking) if !booking.is_paid && booking.status != BookingStatus::Cancelled => {
                booking.is_paid = true;
                booking.updated_at = now;
                uow.update_booking(&booking).await?;
                true
            }
            _ => false,
        },
    };
    if !settled {
        return Ok(Settlement::Refund);
    }
    let canceled = cancel_siblings(uow, target, payment.id, now).await?;
    Ok(Settlement::Settled(canceled))
}

/// Apply a verified gateway result exactly once
pub async fn apply_event(
    state: &AppState,
    event: GatewayEvent,
    source: &str,
) -> ServiceResult<PaymentOutcome> {
    let now = now();
    let mut uow = state.store.begin().await?;
    let mut payment = found(
        uow.find_payment_by_reference(&event.reference).await?,
        ErrorCode::PaymentNotFound,
    )?;

    if event.outcome == PaymentStatus::Completed
        && event.amount.is_some_and(|paid| paid != payment.amount)
    {
        tracing::error!(
            payment_id = %payment.id,
            expected = %payment.amount,
            paid = ?event.amount,
            "Gateway amount does not match payment"
        );
        return Err(AppError::new(ErrorCode::PaymentAmountMismatch).into());
    }

    if !uow
        .record_webhook_event(&event.event_id(source), source, now)
        .await?
    {
        tracing::info!(
            payment_id = %payment.id,
            code = %event.code,
            "Duplicate gateway event ignored"
        );
        return Ok(PaymentOutcome {
            payment_id: payment.id,
            status: payment.status,
            applied: false,
        });
    }

    let applied = uow
        .transition_payment(payment.id, &OPEN, event.outcome, now)
        .await?;
    let mut refund_started = false;
    let mut siblings = Vec::new();
    if applied {
        payment.status = event.outcome;
        payment.updated_at = now;
        if event.outcome == PaymentStatus::Completed {
            match settle_target(uow.as_mut(), &payment, now).await? {
                Settlement::Settled(canceled) => siblings = canceled,
                Settlement::Refund => {
                    tracing::warn!(
                        payment_id = %payment.id,
                        reference = %payment.gateway_reference,
                        "Payment completed for a cancelled or already paid target"
                    );
                    if uow
                        .transition_payment(
                            payment.id,
                            &[PaymentStatus::Completed],
                            PaymentStatus::Refunding,
                            now,
                        )
                        .await?
                    {
                        payment.status = PaymentStatus::Refunding;
                        refund_started = true;
                    }
                }
            }
        }
    } else if let Some(current) = uow.find_payment(payment.id).await? {
        payment.status = current.status;
        if event.outcome == PaymentStatus::Completed && current.status != PaymentStatus::Completed
        {
            // Money was taken for a payment that is already closed
            tracing::error!(
                payment_id = %payment.id,
                reference = %payment.gateway_reference,
                status = %current.status,
                source,
                "Completed gateway event for a closed payment, reconcile manually"
            );
        }
    }
    let payer = email_of(uow.as_mut(), payment.user_id).await?;
    uow.commit().await?;

    tracing::info!(
        payment_id = %payment.id,
        source,
        code = %event.code,
        status = %payment.status,
        applied,
        "Gateway event processed"
    );

    if applied && let Some(to) = payer {
        let email = match payment.status {
            PaymentStatus::Completed => Some(templates::payment_receipt(&payment)),
            PaymentStatus::Canceled => Some(templates::payment_cancelled(&payment)),
            PaymentStatus::Refunding if refund_started => {
                Some(templates::refund_started(&payment))
            }
            _ => None,
        };
        if let Some(email) = email {
            state.notifier.notify(to.clone(), email);
        }
        for other in &siblings {
            state.notifier.notify(to.clone(), templates::payment_cancelled(other));
        }
    }

    Ok(PaymentOutcome {
        payment_id: payment.id,
        status: payment.status,
        applied,
    })
}

/// Browser redirect back from VNPay
pub async fn handle_return(
    state: &AppState,
    params: &HashMap<String, String>,
) -> ServiceResult<PaymentOutcome> {
    let Some(event) = state.gateways.vnpay.verify_return(params) else {
        tracing::warn!("VNPay return with invalid signature");
        return Err(AppError::new(ErrorCode::WebhookSignatureInvalid).into());
    };
    apply_event(state, event, "vnpay").await
}

/// PayOS server-to-server webhook
///
/// Signature and payload problems are acknowledged with a failure body;
/// storage errors propagate so the gateway retries.
pub async fn handle_webhook(
    state: &AppState,
    body: &[u8],
    signature: &str,
) -> ServiceResult<WebhookAck> {
    let gateway = &state.gateways.payos;
    if !gateway.verify_webhook(body, signature) {
        tracing::warn!(len = body.len(), "Webhook signature mismatch");
        return Ok(WebhookAck::rejected("invalid signature"));
    }
    let event = match gateway.parse_webhook(body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed webhook payload");
            return Ok(WebhookAck::rejected("invalid payload"));
        }
    };
    match apply_event(state, event, "payos").await {
        Ok(_) => Ok(WebhookAck::ok()),
        Err(ServiceError::App(e)) => {
            tracing::warn!(code = ?e.code, "Webhook not applied");
            Ok(WebhookAck::rejected(e.message))
        }
        Err(e) => Err(e),
    }
}

/// Staff confirms a manual bank transfer was received
pub async fn confirm_bank_transfer(
    state: &AppState,
    caller: &Identity,
    payment_id: Uuid,
) -> ServiceResult<PaymentOutcome> {
    caller.require_staff()?;
    let mut uow = state.store.begin().await?;
    let payment = found(uow.find_payment(payment_id).await?, ErrorCode::PaymentNotFound)?;
    drop(uow);

    if payment.method != PaymentMethod::BankTransfer {
        return Err(AppError::new(ErrorCode::PaymentInvalidMethod).into());
    }
    if !payment.status.is_open() {
        return Err(AppError::new(ErrorCode::PaymentInvalidTransition)
            .with_detail("status", payment.status.as_db())
            .into());
    }

    tracing::info!(payment_id = %payment.id, by = %caller.user_id, "Bank transfer confirmed");
    let event = GatewayEvent {
        reference: payment.gateway_reference,
        code: "MANUAL".into(),
        amount: Some(payment.amount),
        outcome: PaymentStatus::Completed,
    };
    apply_event(state, event, "manual").await
}

/// Finish a refund that was started by a cancellation
pub async fn refund(
    state: &AppState,
    caller: &Identity,
    payment_id: Uuid,
) -> ServiceResult<Payment> {
    caller.require_staff()?;
    let now = now();
    let mut uow = state.store.begin().await?;
    let mut payment = found(uow.find_payment(payment_id).await?, ErrorCode::PaymentNotFound)?;

    if !uow
        .transition_payment(
            payment.id,
            &[PaymentStatus::Refunding],
            PaymentStatus::Refunded,
            now,
        )
        .await?
    {
        let code = if payment.status == PaymentStatus::Refunded {
            ErrorCode::PaymentAlreadyRefunded
        } else {
            ErrorCode::PaymentInvalidTransition
        };
        return Err(AppError::new(code)
            .with_detail("status", payment.status.as_db())
            .into());
    }
    payment.status = PaymentStatus::Refunded;
    payment.updated_at = now;

    if let Some(order_id) = payment.order_id {
        uow.transition_order(
            order_id,
            &[OrderStatus::Cancelled],
            OrderStatus::Refunded,
            now,
        )
        .await?;
    }
    let payer = email_of(uow.as_mut(), payment.user_id).await?;
    uow.commit().await?;

    tracing::info!(payment_id = %payment.id, by = %caller.user_id, "Refund completed");
    if let Some(to) = payer {
        state.notifier.notify(to, templates::refund_completed(&payment));
    }
    Ok(payment)
}

/// Cancel every open payment created more than `timeout` before `now`
///
/// Returns how many payments were cancelled. A payment completed by a
/// concurrent webhook is left alone.
pub async fn cancel_pending_transactions(
    state: &AppState,
    timeout: Duration,
    now: DateTime<Utc>,
) -> ServiceResult<usize> {
    let mut uow = state.store.begin().await?;
    let mut cancelled = Vec::new();
    for mut payment in uow.list_stale_payments(now - timeout).await? {
        if uow
            .transition_payment(payment.id, &OPEN, PaymentStatus::Canceled, now)
            .await?
        {
            payment.status = PaymentStatus::Canceled;
            payment.updated_at = now;
            let payer = email_of(uow.as_mut(), payment.user_id).await?;
            cancelled.push((payment, payer));
        }
    }
    uow.commit().await?;

    if !cancelled.is_empty() {
        tracing::info!(count = cancelled.len(), "Cancelled stale payments");
    }
    let count = cancelled.len();
    for (payment, payer) in cancelled {
        if let Some(to) = payer {
            state.notifier.notify(to, templates::payment_cancelled(&payment));
        }
    }
    Ok(count)
}

/// Spawn the periodic stale-payment sweep
pub fn spawn_payment_sweep(state: AppState) -> tokio::task::JoinHandle<()> {
    let timeout = Duration::from_std(state.config.payment_timeout)
        .unwrap_or_else(|_| Duration::minutes(15));
    let every = state.config.payment_sweep_interval;
    tokio::spawn(async move {
        tracing::info!(
            timeout_minutes = timeout.num_minutes(),
            interval_secs = every.as_secs(),
            "Payment sweep started"
        );
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = cancel_pending_transactions(&state, timeout, now()).await {
                let err: AppError = e.into();
                tracing::error!(code = ?err.code, "Payment sweep failed");
            }
        }
    })
}

pub async fn get_payment(state: &AppState, caller: &Identity, id: Uuid) -> ServiceResult<Payment> {
    let mut uow = state.store.begin().await?;
    let payment = found(uow.find_payment(id).await?, ErrorCode::PaymentNotFound)?;
    caller.require_access(payment.user_id)?;
    Ok(payment)
}

pub async fn list_payments(
    state: &AppState,
    caller: &Identity,
    filter: PaymentFilter,
) -> ServiceResult<PaginatedResponse<Payment>> {
    caller.require_staff()?;
    let mut uow = state.store.begin().await?;
    Ok(uow.list_payments(&filter).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{PaymentGateway, VnPayGateway, sign_sha256};
    use crate::services::order::{cancel_order, create_order, get_order};
    use crate::services::testing::{money, test_app, TestApp};
    use rust_decimal::Decimal;
    use shared::models::{CancelOrderRequest, CreateOrderRequest, Order, UserRole};

    async fn pending_order(app: &TestApp, customer: &Identity) -> Order {
        let product = app.product("10.00", 10).await;
        let item = app.cart_item(customer, &product, 2).await;
        let req = CreateOrderRequest {
            cart_item_ids: vec![item.id],
            voucher_id: None,
            voucher_code: None,
            address: "5 Hai Ba Trung".into(),
            ship_cost: money("3.00"),
            setup_package_id: None,
        };
        create_order(&app.state, customer, req).await.unwrap().order
    }

    fn pay(order: &Order, method: PaymentMethod) -> CreatePaymentRequest {
        CreatePaymentRequest {
            order_id: Some(order.id),
            booking_id: None,
            method,
            amount: order.amount_due(),
        }
    }

    async fn start(app: &TestApp, who: &Identity, req: CreatePaymentRequest) -> Payment {
        create_payment(&app.state, who, req, "127.0.0.1").await.unwrap()
    }

    fn webhook(app: &TestApp, reference: &str, code: &str) -> (Vec<u8>, String) {
        let body = serde_json::json!({
            "reference": reference,
            "code": code,
            "amount": "23.00",
        })
        .to_string()
        .into_bytes();
        let signature = sign_sha256(&app.state.config.payos.checksum_key, &body);
        (body, signature)
    }

    async fn backdate(app: &TestApp, id: Uuid, age: Duration) {
        let mut uow = app.state.store.begin().await.unwrap();
        let mut payment = uow.find_payment(id).await.unwrap().unwrap();
        payment.created_at = Utc::now() - age;
        uow.update_payment(&payment).await.unwrap();
        uow.commit().await.unwrap();
    }

    async fn payment_status(app: &TestApp, id: Uuid) -> PaymentStatus {
        let mut uow = app.state.store.begin().await.unwrap();
        uow.find_payment(id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_bank_transfer_gets_instructions() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let order = pending_order(&app, &customer).await;

        let payment = start(&app, &customer, pay(&order, PaymentMethod::BankTransfer)).await;
        let info = payment.bank_info.unwrap();
        assert_eq!(
            info.transfer_content,
            format!("AQUA {}", payment.gateway_reference)
        );
        assert!(payment.checkout_url.is_none());
        assert_eq!(payment.amount, money("23.00"));
    }

    #[tokio::test]
    async fn test_amount_must_match() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let order = pending_order(&app, &customer).await;
        let mut req = pay(&order, PaymentMethod::VnPay);
        req.amount = money("20.00");

        let err: AppError = create_payment(&app.state, &customer, req, "127.0.0.1")
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::PaymentAmountMismatch);
    }

    #[tokio::test]
    async fn test_vnpay_url_and_pending_reuse() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let order = pending_order(&app, &customer).await;

        let first = start(&app, &customer, pay(&order, PaymentMethod::VnPay)).await;
        let url = first.checkout_url.as_deref().unwrap();
        assert!(url.contains("vnp_SecureHash="));

        let again = start(&app, &customer, pay(&order, PaymentMethod::VnPay)).await;
        assert_eq!(again.id, first.id);

        let other = start(&app, &customer, pay(&order, PaymentMethod::BankTransfer)).await;
        assert_ne!(other.id, first.id);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_payment_pending() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let order = pending_order(&app, &customer).await;

        let payment = start(&app, &customer, pay(&order, PaymentMethod::PayOs)).await;
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.checkout_url.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_webhook_is_idempotent() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let order = pending_order(&app, &customer).await;
        let payment = start(&app, &customer, pay(&order, PaymentMethod::PayOs)).await;

        let (body, signature) = webhook(&app, &payment.gateway_reference, "00");
        let ack = handle_webhook(&app.state, &body, &signature).await.unwrap();
        assert!(ack.success);
        let after_first = get_order(&app.state, &customer, order.id).await.unwrap();
        assert_eq!(after_first.order.status, OrderStatus::Paid);
        assert_eq!(after_first.payments[0].status, PaymentStatus::Completed);

        let ack = handle_webhook(&app.state, &body, &signature).await.unwrap();
        assert!(ack.success);
        let after_second = get_order(&app.state, &customer, order.id).await.unwrap();
        assert_eq!(after_second.order.status, after_first.order.status);
        assert_eq!(after_second.payments[0].status, after_first.payments[0].status);

        // order confirmation + one receipt
        let mail = app.mailer.wait_for(2).await;
        assert_eq!(mail.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_webhook_signature_is_rejected() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let order = pending_order(&app, &customer).await;
        let payment = start(&app, &customer, pay(&order, PaymentMethod::PayOs)).await;

        let (body, _) = webhook(&app, &payment.gateway_reference, "00");
        let ack = handle_webhook(&app.state, &body, "deadbeef").await.unwrap();
        assert!(!ack.success);
        assert_eq!(payment_status(&app, payment.id).await, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_late_failure_does_not_overwrite_completion() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let order = pending_order(&app, &customer).await;
        let payment = start(&app, &customer, pay(&order, PaymentMethod::PayOs)).await;

        let (body, signature) = webhook(&app, &payment.gateway_reference, "00");
        handle_webhook(&app.state, &body, &signature).await.unwrap();
        let (body, signature) = webhook(&app, &payment.gateway_reference, "CANCELLED");
        handle_webhook(&app.state, &body, &signature).await.unwrap();

        assert_eq!(payment_status(&app, payment.id).await, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_sweep_respects_timeout() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let timeout = Duration::minutes(15);

        let old_order = pending_order(&app, &customer).await;
        let old = start(&app, &customer, pay(&old_order, PaymentMethod::BankTransfer)).await;
        backdate(&app, old.id, timeout + Duration::minutes(1)).await;

        let fresh_order = pending_order(&app, &customer).await;
        let fresh = start(&app, &customer, pay(&fresh_order, PaymentMethod::BankTransfer)).await;
        backdate(&app, fresh.id, timeout - Duration::minutes(1)).await;

        let count = cancel_pending_transactions(&app.state, timeout, Utc::now())
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(payment_status(&app, old.id).await, PaymentStatus::Canceled);
        assert_eq!(payment_status(&app, fresh.id).await, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_confirm_transfer_then_refund_after_cancel() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let order = pending_order(&app, &customer).await;
        let payment = start(&app, &customer, pay(&order, PaymentMethod::BankTransfer)).await;

        let outcome = confirm_bank_transfer(&app.state, &manager, payment.id)
            .await
            .unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.status, PaymentStatus::Completed);

        cancel_order(&app.state, &customer, order.id, CancelOrderRequest::default())
            .await
            .unwrap();
        assert_eq!(payment_status(&app, payment.id).await, PaymentStatus::Refunding);

        let refunded = refund(&app.state, &manager, payment.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        let view = get_order(&app.state, &customer, order.id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Refunded);

        let err: AppError = refund(&app.state, &manager, payment.id)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::PaymentAlreadyRefunded);
    }

    #[tokio::test]
    async fn test_confirm_rejects_gateway_payment() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let order = pending_order(&app, &customer).await;
        let payment = start(&app, &customer, pay(&order, PaymentMethod::VnPay)).await;

        let err: AppError = confirm_bank_transfer(&app.state, &manager, payment.id)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::PaymentInvalidMethod);
        assert_eq!(payment.amount, order.amount_due());
        assert!(payment.amount > Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_completion_cancels_other_open_payments() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let order = pending_order(&app, &customer).await;
        let payos = start(&app, &customer, pay(&order, PaymentMethod::PayOs)).await;
        let bank = start(&app, &customer, pay(&order, PaymentMethod::BankTransfer)).await;

        let (body, signature) = webhook(&app, &payos.gateway_reference, "00");
        assert!(handle_webhook(&app.state, &body, &signature).await.unwrap().success);
        assert_eq!(payment_status(&app, payos.id).await, PaymentStatus::Completed);
        assert_eq!(payment_status(&app, bank.id).await, PaymentStatus::Canceled);

        let err: AppError = confirm_bank_transfer(&app.state, &manager, bank.id)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::PaymentInvalidTransition);
        let view = get_order(&app.state, &customer, order.id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Paid);
        let captured = view
            .payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Completed)
            .count();
        assert_eq!(captured, 1);
    }

    #[tokio::test]
    async fn test_completion_for_already_paid_order_starts_refund() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let order = pending_order(&app, &customer).await;
        let bank = start(&app, &customer, pay(&order, PaymentMethod::BankTransfer)).await;

        // settled by another payment in the meantime
        let mut uow = app.state.store.begin().await.unwrap();
        assert!(
            uow.transition_order(
                order.id,
                &[OrderStatus::PendingPayment],
                OrderStatus::Paid,
                Utc::now()
            )
            .await
            .unwrap()
        );
        uow.commit().await.unwrap();

        let outcome = confirm_bank_transfer(&app.state, &manager, bank.id)
            .await
            .unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.status, PaymentStatus::Refunding);

        // order confirmation + refund notice
        let mail = app.mailer.wait_for(2).await;
        assert!(mail.iter().any(|m| m.subject == templates::refund_started(&bank).subject));
    }

    #[tokio::test]
    async fn test_webhook_after_sweep_keeps_cancellation() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let timeout = Duration::minutes(15);
        let order = pending_order(&app, &customer).await;
        let payment = start(&app, &customer, pay(&order, PaymentMethod::PayOs)).await;
        backdate(&app, payment.id, timeout + Duration::minutes(5)).await;

        let swept = cancel_pending_transactions(&app.state, timeout, Utc::now())
            .await
            .unwrap();
        assert_eq!(swept, 1);

        let (body, signature) = webhook(&app, &payment.gateway_reference, "00");
        let gateway = &app.state.gateways.payos;
        assert!(gateway.verify_webhook(&body, &signature));
        let event = gateway.parse_webhook(&body).unwrap();
        let outcome = apply_event(&app.state, event, "payos").await.unwrap();

        assert!(!outcome.applied);
        assert_eq!(outcome.status, PaymentStatus::Canceled);
        assert_eq!(payment_status(&app, payment.id).await, PaymentStatus::Canceled);
        let view = get_order(&app.state, &customer, order.id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_vnpay_return_settles_order() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let order = pending_order(&app, &customer).await;
        let payment = start(&app, &customer, pay(&order, PaymentMethod::VnPay)).await;
        let vnpay = VnPayGateway::new(app.state.config.vnpay.clone());

        let mut tampered = vnpay.signed_return(&payment.gateway_reference, 2300, "00");
        tampered.insert("vnp_ResponseCode".into(), "24".into());
        let err: AppError = handle_return(&app.state, &tampered)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::WebhookSignatureInvalid);
        assert_eq!(payment_status(&app, payment.id).await, PaymentStatus::Pending);

        let params = vnpay.signed_return(&payment.gateway_reference, 2300, "00");
        let outcome = handle_return(&app.state, &params).await.unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.status, PaymentStatus::Completed);
        let view = get_order(&app.state, &customer, order.id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Paid);

        // browser refresh replays the redirect
        let again = handle_return(&app.state, &params).await.unwrap();
        assert!(!again.applied);
        assert_eq!(again.status, PaymentStatus::Completed);
    }
}
