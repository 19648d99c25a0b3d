//! Order Model
//!
//! `total_price` is the post-discount merchandise amount; shipping is kept
//! separately in `ship_cost` and only added when computing what is owed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::common::PageQuery;
use super::payment::Payment;

/// Order lifecycle status
///
/// ```text
/// PendingPayment ──► Paid ──► Processing ──► Shipped ──► Delivered
///       │             │           │
///       └─────────────┴───────────┴──► Cancelled ──► Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

db_enum!(OrderStatus, "order_status" {
    PendingPayment => "pending_payment",
    Paid => "paid",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

impl OrderStatus {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (PendingPayment, Paid | Cancelled)
                | (Paid, Processing | Cancelled)
                | (Processing, Shipped | Cancelled)
                | (Shipped, Delivered)
                | (Cancelled, Refunded)
        )
    }

    /// States from which the customer or staff may still cancel
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::PendingPayment | Self::Paid | Self::Processing)
    }

    /// States against which a service visit may be booked
    pub fn is_booking_eligible(&self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Refunded)
    }

    /// Every state that may legally move to `target`
    pub fn sources_of(target: OrderStatus) -> Vec<OrderStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub voucher_id: Option<Uuid>,
    pub setup_package_id: Option<Uuid>,
    pub address: String,
    /// Σ detail price × quantity
    pub subtotal: Decimal,
    pub discount: Decimal,
    /// subtotal − discount
    pub total_price: Decimal,
    pub ship_cost: Decimal,
    pub status: OrderStatus,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Amount a payment must carry to settle this order
    pub fn amount_due(&self) -> Decimal {
        self.total_price + self.ship_cost
    }
}

/// Order line with the unit price locked at checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    /// Product name snapshot
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl OrderDetail {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Checkout request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "cart is empty"))]
    pub cart_item_ids: Vec<Uuid>,
    pub voucher_id: Option<Uuid>,
    /// Alternative to `voucher_id`
    pub voucher_code: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[serde(default)]
    pub ship_cost: Decimal,
    pub setup_package_id: Option<Uuid>,
}

/// Result of a successful checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutPayload {
    pub order: Order,
    pub details: Vec<OrderDetail>,
    pub amount_due: Decimal,
}

/// Order with its lines and payments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub details: Vec<OrderDetail>,
    pub payments: Vec<Payment>,
    pub amount_due: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CancelOrderRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Fulfillment update by staff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Order list query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Ignored for customers (always their own id)
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl OrderFilter {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|s| s == order.status)
            && self.user_id.is_none_or(|u| u == order.user_id)
            && self.from.is_none_or(|from| order.created_at >= from)
            && self.to.is_none_or(|to| order.created_at < to)
    }
}
