//! VNPay signed redirect (API v2.1.0)
//!
//! Parameters are sorted by name, URL-encoded and signed with HMAC-SHA512;
//! the same canonical string is rebuilt to verify the return redirect.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sha2::Sha512;

use shared::models::{PaymentMethod, PaymentStatus};

use super::{CheckoutRequest, CheckoutSession, GatewayError, GatewayEvent, PaymentGateway};
use crate::config::VnPayConfig;

type HmacSha512 = Hmac<Sha512>;

const VERSION: &str = "2.1.0";
const EXPIRE_MINUTES: i64 = 15;
/// VNPay timestamps are Vietnam local time
const GMT7_SECS: i32 = 7 * 3600;

pub struct VnPayGateway {
    config: VnPayConfig,
}

impl VnPayGateway {
    pub fn new(config: VnPayConfig) -> Self {
        Self { config }
    }

    fn canonical(params: &BTreeMap<String, String>) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn sign(&self, data: &str) -> String {
        let Ok(mut mac) = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes()) else {
            return String::new();
        };
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, data: &str, signature_hex: &str) -> bool {
        let Ok(sig) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(mut mac) = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes()) else {
            return false;
        };
        mac.update(data.as_bytes());
        mac.verify_slice(&sig).is_ok()
    }

    /// Build the signed payment URL
    pub fn payment_url(&self, request: &CheckoutRequest) -> Result<String, GatewayError> {
        let minor_units = (request.amount * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or_else(|| GatewayError::InvalidPayload("amount out of range".into()))?;
        let tz = FixedOffset::east_opt(GMT7_SECS)
            .ok_or_else(|| GatewayError::InvalidPayload("invalid timezone".into()))?;
        let created = Utc::now().with_timezone(&tz);
        let expires = created + Duration::minutes(EXPIRE_MINUTES);

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), VERSION.to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        params.insert("vnp_Amount".to_string(), minor_units.to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert("vnp_TxnRef".to_string(), request.reference.clone());
        params.insert("vnp_OrderInfo".to_string(), request.description.clone());
        params.insert("vnp_OrderType".to_string(), "other".to_string());
        params.insert("vnp_Locale".to_string(), "vn".to_string());
        params.insert("vnp_ReturnUrl".to_string(), request.return_url.clone());
        params.insert("vnp_IpAddr".to_string(), request.client_ip.clone());
        params.insert(
            "vnp_CreateDate".to_string(),
            created.format("%Y%m%d%H%M%S").to_string(),
        );
        params.insert(
            "vnp_ExpireDate".to_string(),
            expires.format("%Y%m%d%H%M%S").to_string(),
        );

        let query = Self::canonical(&params);
        let hash = self.sign(&query);
        Ok(format!("{}?{query}&vnp_SecureHash={hash}", self.config.pay_url))
    }
}

#[cfg(test)]
impl VnPayGateway {
    /// Query parameters as VNPay sends them back on the return redirect
    pub(crate) fn signed_return(
        &self,
        reference: &str,
        minor_units: i64,
        code: &str,
    ) -> HashMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("vnp_TxnRef".to_string(), reference.to_string());
        params.insert("vnp_Amount".to_string(), minor_units.to_string());
        params.insert("vnp_ResponseCode".to_string(), code.to_string());
        params.insert("vnp_OrderInfo".to_string(), "Thanh toan don hang".to_string());
        let hash = self.sign(&Self::canonical(&params));
        let mut out: HashMap<String, String> = params.into_iter().collect();
        out.insert("vnp_SecureHash".into(), hash);
        out.insert("vnp_SecureHashType".into(), "HmacSHA512".into());
        out
    }
}

fn outcome_for(code: &str) -> PaymentStatus {
    match code {
        "00" => PaymentStatus::Completed,
        "24" => PaymentStatus::Canceled,
        _ => PaymentStatus::Failed,
    }
}

#[async_trait]
impl PaymentGateway for VnPayGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::VnPay
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        Ok(CheckoutSession {
            url: self.payment_url(request)?,
        })
    }

    fn verify_return(&self, params: &HashMap<String, String>) -> Option<GatewayEvent> {
        let signature = params.get("vnp_SecureHash")?;
        let signed: BTreeMap<String, String> = params
            .iter()
            .filter(|(k, _)| {
                k.starts_with("vnp_") && *k != "vnp_SecureHash" && *k != "vnp_SecureHashType"
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if !self.verify(&Self::canonical(&signed), signature) {
            tracing::warn!("VNPay return signature mismatch");
            return None;
        }

        let reference = signed.get("vnp_TxnRef")?.clone();
        let code = signed.get("vnp_ResponseCode")?.clone();
        let amount = signed
            .get("vnp_Amount")
            .and_then(|a| a.parse::<i64>().ok())
            .map(|minor| Decimal::new(minor, 2));

        Some(GatewayEvent {
            outcome: outcome_for(&code),
            reference,
            code,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> VnPayGateway {
        VnPayGateway::new(VnPayConfig {
            tmn_code: "TMN01".into(),
            hash_secret: "vnpay-secret".into(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
        })
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            reference: "1700000000000042".into(),
            amount: Decimal::new(25050, 2),
            description: "Thanh toan don hang".into(),
            return_url: "http://localhost:3000/payment/result".into(),
            cancel_url: "http://localhost:3000/payment/cancel".into(),
            client_ip: "127.0.0.1".into(),
        }
    }

    fn signed_return(gw: &VnPayGateway, code: &str) -> HashMap<String, String> {
        gw.signed_return("1700000000000042", 25050, code)
    }

    #[test]
    fn test_payment_url_is_signed() {
        let gw = gateway();
        let url = gw.payment_url(&request()).unwrap();
        assert!(url.contains("vnp_Amount=25050"));
        assert!(url.contains("vnp_TxnRef=1700000000000042"));

        let (base, hash) = url
            .split_once("?")
            .and_then(|(_, q)| q.rsplit_once("&vnp_SecureHash="))
            .unwrap();
        assert_eq!(hash.len(), 128);
        assert!(gw.verify(base, hash));
    }

    #[test]
    fn test_return_success() {
        let gw = gateway();
        let event = gw.verify_return(&signed_return(&gw, "00")).unwrap();
        assert_eq!(event.outcome, PaymentStatus::Completed);
        assert_eq!(event.amount, Some(Decimal::new(25050, 2)));
    }

    #[test]
    fn test_return_cancelled_and_failed() {
        let gw = gateway();
        assert_eq!(
            gw.verify_return(&signed_return(&gw, "24")).unwrap().outcome,
            PaymentStatus::Canceled
        );
        assert_eq!(
            gw.verify_return(&signed_return(&gw, "51")).unwrap().outcome,
            PaymentStatus::Failed
        );
    }

    #[test]
    fn test_tampered_return_rejected() {
        let gw = gateway();
        let mut params = signed_return(&gw, "00");
        params.insert("vnp_Amount".into(), "1".into());
        assert!(gw.verify_return(&params).is_none());

        params.remove("vnp_SecureHash");
        assert!(gw.verify_return(&params).is_none());
    }
}
