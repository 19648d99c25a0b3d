//! Payment Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::PageQuery;

/// How the customer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Manual bank transfer, confirmed by staff
    BankTransfer,
    /// Signed redirect to the VNPay portal
    #[serde(rename = "VNPAY")]
    VnPay,
    /// PayOS hosted checkout page
    #[serde(rename = "PAYOS")]
    PayOs,
}

db_enum!(PaymentMethod, "payment_method" {
    BankTransfer => "bank_transfer",
    VnPay => "vnpay",
    PayOs => "payos",
});

/// Payment status
///
/// `Pending → Processing → {Completed | Failed | Canceled | Declined}`, with
/// `Completed → Refunding → Refunded` as the refund path. A payment in a
/// terminal state is never moved again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Canceled,
    Declined,
    Refunding,
    Refunded,
}

db_enum!(PaymentStatus, "payment_status" {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Canceled => "canceled",
    Declined => "declined",
    Refunding => "refunding",
    Refunded => "refunded",
});

impl PaymentStatus {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing | Completed | Failed | Canceled | Declined)
                | (Processing, Completed | Failed | Canceled | Declined)
                | (Completed, Refunding)
                | (Refunding, Refunded)
        )
    }

    /// Awaiting a gateway result
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Canceled | Self::Declined | Self::Refunded
        )
    }

    /// Every state that may legally move to `target`
    pub fn sources_of(target: PaymentStatus) -> Vec<PaymentStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }
}

/// Bank account details shown for manual transfers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankInfo {
    pub bank_name: String,
    pub account_no: String,
    pub account_name: String,
    /// Text the customer must put in the transfer memo
    pub transfer_content: String,
}

/// What a payment settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Order(Uuid),
    Booking(Uuid),
}

/// Payment entity
///
/// Exactly one of `order_id` / `booking_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    /// Payer, used for notifications
    pub user_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub status: PaymentStatus,
    /// Numeric order code sent to the gateway (unique)
    pub gateway_reference: String,
    pub checkout_url: Option<String>,
    pub bank_info: Option<BankInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn target(&self) -> Option<PaymentTarget> {
        match (self.order_id, self.booking_id) {
            (Some(order_id), None) => Some(PaymentTarget::Order(order_id)),
            (None, Some(booking_id)) => Some(PaymentTarget::Booking(booking_id)),
            _ => None,
        }
    }
}

/// Create payment request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub method: PaymentMethod,
    pub amount: Decimal,
}

impl CreatePaymentRequest {
    pub fn target(&self) -> Option<PaymentTarget> {
        match (self.order_id, self.booking_id) {
            (Some(order_id), None) => Some(PaymentTarget::Order(order_id)),
            (None, Some(booking_id)) => Some(PaymentTarget::Booking(booking_id)),
            _ => None,
        }
    }
}

/// Outcome of a redirect callback or webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
    /// False when the event was a replay or lost the race to another writer
    pub applied: bool,
}

/// Acknowledgement returned to gateway webhooks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: "ok".into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Payment list query (staff)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub method: Option<PaymentMethod>,
    pub order_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaymentFilter {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn matches(&self, payment: &Payment) -> bool {
        self.status.is_none_or(|s| s == payment.status)
            && self.method.is_none_or(|m| m == payment.method)
            && self.order_id.is_none_or(|o| Some(o) == payment.order_id)
            && self.booking_id.is_none_or(|b| Some(b) == payment.booking_id)
    }
}
