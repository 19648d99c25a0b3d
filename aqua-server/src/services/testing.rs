//! Fixtures for workflow tests

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::models::{
    CartItem, Category, DiscountType, Product, ProductStatus, RecordState, ServicePackage, User,
    UserRole, UserStatus, Voucher, VoucherStatus,
};

use crate::auth::Identity;
use crate::config::Config;
use crate::db::MemoryStore;
use crate::email::LogMailer;
use crate::payment::{PayOsGateway, VnPayGateway};
use crate::state::{AppState, Gateways};
use crate::storage::MemoryStorage;

pub struct TestApp {
    pub state: AppState,
    pub mailer: LogMailer,
}

pub fn test_app() -> TestApp {
    let config = Config::default();
    let mailer = LogMailer::new();
    let gateways = Gateways {
        payos: Arc::new(
            PayOsGateway::new(config.payos.clone(), std::time::Duration::from_millis(500))
                .unwrap(),
        ),
        vnpay: Arc::new(VnPayGateway::new(config.vnpay.clone())),
    };
    let state = AppState::from_parts(
        config,
        Arc::new(MemoryStore::new()),
        gateways,
        Arc::new(MemoryStorage::new()),
        Arc::new(mailer.clone()),
    );
    TestApp { state, mailer }
}

pub fn money(value: &str) -> Decimal {
    value.parse().unwrap()
}

impl TestApp {
    pub async fn user(&self, role: UserRole) -> Identity {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let user = User {
            id,
            email: format!("{}@aqua.test", id.simple()),
            password_hash: String::new(),
            full_name: format!("{role:?} user"),
            phone: None,
            address: Some("1 Nguyen Hue, HCMC".into()),
            role,
            status: UserStatus::Available,
            created_at: now,
            updated_at: now,
        };
        let mut uow = self.state.store.begin().await.unwrap();
        uow.insert_user(&user).await.unwrap();
        uow.commit().await.unwrap();
        Identity {
            user_id: id,
            email: user.email,
            role,
        }
    }

    pub async fn product(&self, price: &str, quantity: i32) -> Product {
        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: "Tanks".into(),
            parent_id: None,
            record_state: RecordState::Active,
            created_at: now,
        };
        let product = Product {
            id: Uuid::new_v4(),
            category_id: category.id,
            name: format!("Tank {price}"),
            description: None,
            price: money(price),
            quantity,
            image_url: None,
            status: ProductStatus::Available,
            record_state: RecordState::Active,
            created_at: now,
            updated_at: now,
        };
        let mut uow = self.state.store.begin().await.unwrap();
        uow.insert_category(&category).await.unwrap();
        uow.insert_product(&product).await.unwrap();
        uow.commit().await.unwrap();
        product
    }

    pub async fn cart_item(&self, owner: &Identity, product: &Product, quantity: i32) -> CartItem {
        let now = Utc::now();
        let item = CartItem {
            id: Uuid::new_v4(),
            user_id: owner.user_id,
            product_id: product.id,
            quantity,
            record_state: RecordState::Active,
            created_at: now,
            updated_at: now,
        };
        let mut uow = self.state.store.begin().await.unwrap();
        uow.insert_cart_item(&item).await.unwrap();
        uow.commit().await.unwrap();
        item
    }

    pub async fn voucher(
        &self,
        code: &str,
        kind: DiscountType,
        value: &str,
        quantity: i32,
    ) -> Voucher {
        let now = Utc::now();
        let voucher = Voucher {
            id: Uuid::new_v4(),
            code: code.into(),
            discount_type: kind,
            discount_value: money(value),
            quantity,
            expiry_date: now + Duration::days(30),
            minimum_order_value: None,
            maximum_order_value: None,
            status: VoucherStatus::Active,
            record_state: RecordState::Active,
            created_at: now,
            updated_at: now,
        };
        let mut uow = self.state.store.begin().await.unwrap();
        uow.insert_voucher(&voucher).await.unwrap();
        uow.commit().await.unwrap();
        voucher
    }

    pub async fn service_package(&self, price: &str) -> ServicePackage {
        let package = ServicePackage {
            id: Uuid::new_v4(),
            name: format!("Service {price}"),
            description: None,
            price: money(price),
            record_state: RecordState::Active,
            created_at: Utc::now(),
        };
        let mut uow = self.state.store.begin().await.unwrap();
        uow.insert_service_package(&package).await.unwrap();
        uow.commit().await.unwrap();
        package
    }
}
