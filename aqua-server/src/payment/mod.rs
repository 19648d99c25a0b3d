//! Payment gateway adapters
//!
//! Gateways only produce checkout URLs and turn callbacks into
//! [`GatewayEvent`]s; applying an event to payments, orders and bookings is
//! done by `services::payment`.

mod payos;
mod vnpay;

pub use payos::PayOsGateway;
pub use vnpay::VnPayGateway;

use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;
use thiserror::Error;

use shared::models::{PaymentMethod, PaymentStatus};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected request: {0}")]
    Rejected(String),

    #[error("invalid gateway payload: {0}")]
    InvalidPayload(String),

    #[error("operation not supported by {0} gateway")]
    Unsupported(&'static str),
}

/// What the customer is asked to pay
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Numeric gateway reference stored on the payment
    pub reference: String,
    pub amount: Decimal,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
    pub client_ip: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub url: String,
}

/// A verified gateway result for one payment
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    pub reference: String,
    /// Raw gateway result code
    pub code: String,
    pub amount: Option<Decimal>,
    /// Terminal payment status the code maps to
    pub outcome: PaymentStatus,
}

impl GatewayEvent {
    /// Ledger key: one entry per (source, reference, code)
    pub fn event_id(&self, source: &str) -> String {
        format!("{source}:{}:{}", self.reference, self.code)
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// Create a hosted checkout and return its URL
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Verify a server-to-server callback signature over the raw body
    fn verify_webhook(&self, _payload: &[u8], _signature: &str) -> bool {
        false
    }

    fn parse_webhook(&self, _payload: &[u8]) -> Result<GatewayEvent, GatewayError> {
        Err(GatewayError::Unsupported(self.method().as_db()))
    }

    /// Verify a browser redirect; `None` when the signature does not match
    fn verify_return(&self, _params: &HashMap<String, String>) -> Option<GatewayEvent> {
        None
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256
pub(crate) fn sign_sha256(key: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex HMAC-SHA256 signature
pub(crate) fn verify_sha256(key: &str, data: &[u8], signature_hex: &str) -> bool {
    let Ok(sig_bytes) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_signature() {
        let sig = sign_sha256("key", b"payload");
        assert_eq!(sig.len(), 64);
        assert!(verify_sha256("key", b"payload", &sig));
        assert!(verify_sha256("key", b"payload", &sig.to_uppercase()));
        assert!(!verify_sha256("key", b"payload!", &sig));
        assert!(!verify_sha256("other", b"payload", &sig));
        assert!(!verify_sha256("key", b"payload", "zz"));
    }

    #[test]
    fn test_event_id() {
        let event = GatewayEvent {
            reference: "1700000000000123".into(),
            code: "00".into(),
            amount: None,
            outcome: PaymentStatus::Completed,
        };
        assert_eq!(event.event_id("payos"), "payos:1700000000000123:00");
    }
}
