//! Server configuration

use std::time::Duration;

use crate::error::BoxError;

/// Persistence backend selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Outbound mail backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailBackend {
    Ses,
    Log,
}

/// PayOS hosted-checkout credentials
#[derive(Debug, Clone)]
pub struct PayOsConfig {
    pub client_id: String,
    pub api_key: String,
    /// HMAC key for request signatures and webhook verification
    pub checksum_key: String,
    pub api_url: String,
}

/// VNPay redirect credentials
#[derive(Debug, Clone)]
pub struct VnPayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
}

/// Account shown to customers paying by bank transfer
#[derive(Debug, Clone)]
pub struct BankAccount {
    pub bank_name: String,
    pub account_no: String,
    pub account_name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    pub http_port: u16,
    /// PostgreSQL connection URL (required for the postgres backend)
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub jwt_secret: String,
    pub payos: PayOsConfig,
    pub vnpay: VnPayConfig,
    /// Where gateways send the customer after paying
    pub payment_return_url: String,
    pub payment_cancel_url: String,
    pub bank: BankAccount,
    /// S3 bucket for uploads; uploads stay in memory when unset
    pub s3_bucket: Option<String>,
    pub s3_public_base_url: String,
    pub ses_from_email: String,
    pub mail_backend: MailBackend,
    /// Pending payments older than this are cancelled by the sweep
    pub payment_timeout: Duration,
    pub payment_sweep_interval: Duration,
    /// Upper bound for outbound gateway calls
    pub gateway_timeout: Duration,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn env_or(name: &str, default: &str) -> String {
        std::env::var(name).unwrap_or_else(|_| default.into())
    }

    fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = Self::env_or("ENVIRONMENT", "development");

        let store_backend = match Self::env_or("STORE_BACKEND", "postgres").as_str() {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => return Err(format!("Unknown STORE_BACKEND: {other}").into()),
        };
        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err("DATABASE_URL must be set".into());
        }

        let mail_backend = match Self::env_or("MAIL_BACKEND", "log").as_str() {
            "ses" => MailBackend::Ses,
            "log" => MailBackend::Log,
            other => return Err(format!("Unknown MAIL_BACKEND: {other}").into()),
        };

        Ok(Self {
            http_port: Self::env_parse("HTTP_PORT", 8080),
            database_url,
            store_backend,
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            payos: PayOsConfig {
                client_id: Self::env_or("PAYOS_CLIENT_ID", ""),
                api_key: Self::require_secret("PAYOS_API_KEY", &environment)?,
                checksum_key: Self::require_secret("PAYOS_CHECKSUM_KEY", &environment)?,
                api_url: Self::env_or("PAYOS_API_URL", "https://api-merchant.payos.vn"),
            },
            vnpay: VnPayConfig {
                tmn_code: Self::env_or("VNPAY_TMN_CODE", ""),
                hash_secret: Self::require_secret("VNPAY_HASH_SECRET", &environment)?,
                pay_url: Self::env_or(
                    "VNPAY_PAY_URL",
                    "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html",
                ),
            },
            payment_return_url: Self::env_or(
                "PAYMENT_RETURN_URL",
                "http://localhost:3000/payment/result",
            ),
            payment_cancel_url: Self::env_or(
                "PAYMENT_CANCEL_URL",
                "http://localhost:3000/payment/cancel",
            ),
            bank: BankAccount {
                bank_name: Self::env_or("BANK_NAME", "Vietcombank"),
                account_no: Self::env_or("BANK_ACCOUNT_NO", ""),
                account_name: Self::env_or("BANK_ACCOUNT_NAME", ""),
            },
            s3_bucket: std::env::var("S3_BUCKET").ok().filter(|s| !s.is_empty()),
            s3_public_base_url: Self::env_or("S3_PUBLIC_BASE_URL", ""),
            ses_from_email: Self::env_or("SES_FROM_EMAIL", "noreply@aqua.local"),
            mail_backend,
            payment_timeout: Duration::from_secs(
                Self::env_parse("PAYMENT_TIMEOUT_MINUTES", 15u64) * 60,
            ),
            payment_sweep_interval: Duration::from_secs(Self::env_parse(
                "PAYMENT_SWEEP_INTERVAL_SECS",
                60u64,
            )),
            gateway_timeout: Duration::from_secs(Self::env_parse("GATEWAY_TIMEOUT_SECS", 15u64)),
            environment,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    /// Development configuration: in-memory store, log mailer, sandbox gateways
    fn default() -> Self {
        Self {
            environment: "development".into(),
            http_port: 8080,
            database_url: None,
            store_backend: StoreBackend::Memory,
            jwt_secret: "dev-JWT_SECRET-not-for-production".into(),
            payos: PayOsConfig {
                client_id: "dev-client".into(),
                api_key: "dev-api-key".into(),
                checksum_key: "dev-checksum-key".into(),
                api_url: "http://127.0.0.1:9".into(),
            },
            vnpay: VnPayConfig {
                tmn_code: "DEVTMN01".into(),
                hash_secret: "dev-vnpay-secret".into(),
                pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            },
            payment_return_url: "http://localhost:3000/payment/result".into(),
            payment_cancel_url: "http://localhost:3000/payment/cancel".into(),
            bank: BankAccount {
                bank_name: "Vietcombank".into(),
                account_no: "0123456789".into(),
                account_name: "AQUA SHOP".into(),
            },
            s3_bucket: None,
            s3_public_base_url: String::new(),
            ses_from_email: "noreply@aqua.local".into(),
            mail_backend: MailBackend::Log,
            payment_timeout: Duration::from_secs(15 * 60),
            payment_sweep_interval: Duration::from_secs(60),
            gateway_timeout: Duration::from_secs(15),
        }
    }
}
