//! Application state

use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use aws_sdk_sesv2::Client as SesClient;

use shared::models::PaymentMethod;

use crate::auth::RateLimiter;
use crate::config::{Config, MailBackend, StoreBackend};
use crate::db::{MemoryStore, PgStore, Store};
use crate::email::{LogMailer, Mailer, Notifier, SesMailer};
use crate::error::BoxError;
use crate::payment::{PayOsGateway, PaymentGateway, VnPayGateway};
use crate::storage::{MemoryStorage, ObjectStorage, S3Storage};

/// Online payment gateways by method
#[derive(Clone)]
pub struct Gateways {
    pub payos: Arc<dyn PaymentGateway>,
    pub vnpay: Arc<dyn PaymentGateway>,
}

impl Gateways {
    /// `None` for bank transfer (no gateway involved)
    pub fn get(&self, method: PaymentMethod) -> Option<&Arc<dyn PaymentGateway>> {
        match method {
            PaymentMethod::PayOs => Some(&self.payos),
            PaymentMethod::VnPay => Some(&self.vnpay),
            PaymentMethod::BankTransfer => None,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gateways: Gateways,
    pub storage: Arc<dyn ObjectStorage>,
    pub notifier: Notifier,
    pub config: Arc<Config>,
    /// JWT secret for bearer tokens
    pub jwt_secret: String,
    /// Rate limiter for login/registration routes
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wire the real backends selected by `config`
    pub async fn new(config: Config) -> Result<Self, BoxError> {
        let store: Arc<dyn Store> = match config.store_backend {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or("DATABASE_URL must be set")?;
                Arc::new(PgStore::connect(url).await?)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let needs_aws = config.s3_bucket.is_some() || config.mail_backend == MailBackend::Ses;
        let aws_config = if needs_aws {
            Some(aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await)
        } else {
            None
        };

        let storage: Arc<dyn ObjectStorage> = match (&config.s3_bucket, &aws_config) {
            (Some(bucket), Some(aws)) => Arc::new(S3Storage::new(
                S3Client::new(aws),
                bucket.clone(),
                config.s3_public_base_url.clone(),
            )),
            _ => Arc::new(MemoryStorage::new()),
        };

        let mailer: Arc<dyn Mailer> = match (config.mail_backend, &aws_config) {
            (MailBackend::Ses, Some(aws)) => {
                let ses = if let Ok(ses_region) = std::env::var("SES_REGION") {
                    let ses_config = aws
                        .to_builder()
                        .region(aws_config::Region::new(ses_region))
                        .build();
                    SesClient::new(&ses_config)
                } else {
                    SesClient::new(aws)
                };
                Arc::new(SesMailer::new(ses, config.ses_from_email.clone()))
            }
            _ => Arc::new(LogMailer::new()),
        };

        let gateways = Gateways {
            payos: Arc::new(PayOsGateway::new(
                config.payos.clone(),
                config.gateway_timeout,
            )?),
            vnpay: Arc::new(VnPayGateway::new(config.vnpay.clone())),
        };

        Ok(Self::from_parts(config, store, gateways, storage, mailer))
    }

    /// Assemble state from already-built backends
    pub fn from_parts(
        config: Config,
        store: Arc<dyn Store>,
        gateways: Gateways,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            store,
            gateways,
            storage,
            notifier: Notifier::new(mailer),
            jwt_secret: config.jwt_secret.clone(),
            config: Arc::new(config),
            rate_limiter: RateLimiter::new(),
        }
    }
}
