//! PayOS hosted checkout (REST, no SDK)

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;

use shared::models::{PaymentMethod, PaymentStatus};

use super::{
    CheckoutRequest, CheckoutSession, GatewayError, GatewayEvent, PaymentGateway, sign_sha256,
    verify_sha256,
};
use crate::config::PayOsConfig;

/// PayOS limits the description to 25 characters
const MAX_DESCRIPTION_LEN: usize = 25;

pub struct PayOsGateway {
    config: PayOsConfig,
    client: reqwest::Client,
}

impl PayOsGateway {
    pub fn new(config: PayOsConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { config, client })
    }

    /// Request signature over the alphabetically ordered fields
    fn request_signature(
        &self,
        amount: i64,
        order_code: i64,
        req: &CheckoutRequest,
        description: &str,
    ) -> String {
        let data = format!(
            "amount={amount}&cancelUrl={}&description={description}&orderCode={order_code}&returnUrl={}",
            req.cancel_url, req.return_url
        );
        sign_sha256(&self.config.checksum_key, data.as_bytes())
    }
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    code: String,
    #[serde(default)]
    desc: String,
    data: Option<CreateResponseData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponseData {
    checkout_url: String,
}

/// Webhook body: `{reference, code, amount}`
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    reference: String,
    code: String,
    amount: Option<Decimal>,
}

fn outcome_for(code: &str) -> PaymentStatus {
    match code {
        "00" => PaymentStatus::Completed,
        "CANCELLED" => PaymentStatus::Canceled,
        _ => PaymentStatus::Failed,
    }
}

#[async_trait]
impl PaymentGateway for PayOsGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::PayOs
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let order_code: i64 = request
            .reference
            .parse()
            .map_err(|_| GatewayError::InvalidPayload("reference must be numeric".into()))?;
        let amount = request
            .amount
            .round()
            .to_i64()
            .ok_or_else(|| GatewayError::InvalidPayload("amount out of range".into()))?;
        let description: String = request.description.chars().take(MAX_DESCRIPTION_LEN).collect();
        let signature = self.request_signature(amount, order_code, request, &description);

        let body = serde_json::json!({
            "orderCode": order_code,
            "amount": amount,
            "description": description,
            "returnUrl": request.return_url,
            "cancelUrl": request.cancel_url,
            "signature": signature,
        });

        let resp: CreateResponse = self
            .client
            .post(format!("{}/v2/payment-requests", self.config.api_url))
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        match resp.data {
            Some(data) if resp.code == "00" => Ok(CheckoutSession {
                url: data.checkout_url,
            }),
            _ => Err(GatewayError::Rejected(format!("{} {}", resp.code, resp.desc))),
        }
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool {
        verify_sha256(&self.config.checksum_key, payload, signature)
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<GatewayEvent, GatewayError> {
        let body: WebhookPayload = serde_json::from_slice(payload)
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        Ok(GatewayEvent {
            outcome: outcome_for(&body.code),
            reference: body.reference,
            code: body.code,
            amount: body.amount,
        })
    }
}
