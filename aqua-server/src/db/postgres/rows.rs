//! Database rows and their mapping into domain models
//!
//! Status columns are stored as lowercase text; each row is converted with an
//! explicit `TryFrom` so an unknown value surfaces as `StoreError::Corrupt`
//! instead of being silently defaulted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use uuid::Uuid;

use shared::models::{
    BankInfo, Booking, BookingStatus, CartItem, Category, DiscountType, Mission, MissionStatus,
    Order, OrderDetail, OrderStatus, Payment, PaymentMethod, PaymentStatus, Product,
    ProductStatus, RecordState, ServicePackage, SetupPackage, SetupPackageDetail, User, UserRole,
    UserStatus, Voucher, VoucherStatus,
};

use crate::db::StoreError;

#[derive(sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            phone: row.phone,
            address: row.address,
            role: UserRole::try_from(row.role)?,
            status: UserStatus::try_from(row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct CategoryRow {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub record_state: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = StoreError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Category {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
            record_state: RecordState::try_from(row.record_state)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub image_url: Option<String>,
    pub status: String,
    pub record_state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            description: row.description,
            price: row.price,
            quantity: row.quantity,
            image_url: row.image_url,
            status: ProductStatus::try_from(row.status)?,
            record_state: RecordState::try_from(row.record_state)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct CartItemRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub record_state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = StoreError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(CartItem {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            quantity: row.quantity,
            record_state: RecordState::try_from(row.record_state)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub voucher_id: Option<Uuid>,
    pub setup_package_id: Option<Uuid>,
    pub address: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_price: Decimal,
    pub ship_cost: Decimal,
    pub status: String,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            voucher_id: row.voucher_id,
            setup_package_id: row.setup_package_id,
            address: row.address,
            subtotal: row.subtotal,
            discount: row.discount,
            total_price: row.total_price,
            ship_cost: row.ship_cost,
            status: OrderStatus::try_from(row.status)?,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct OrderDetailRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl From<OrderDetailRow> for OrderDetail {
    fn from(row: OrderDetailRow) -> Self {
        OrderDetail {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            price: row.price,
            quantity: row.quantity,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub user_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub status: String,
    pub gateway_reference: String,
    pub checkout_url: Option<String>,
    pub bank_info: Option<Json<BankInfo>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            booking_id: row.booking_id,
            user_id: row.user_id,
            method: PaymentMethod::try_from(row.method)?,
            amount: row.amount,
            status: PaymentStatus::try_from(row.status)?,
            gateway_reference: row.gateway_reference,
            checkout_url: row.checkout_url,
            bank_info: row.bank_info.map(|Json(info)| info),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct VoucherRow {
    pub id: Uuid,
    pub code: String,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub quantity: i32,
    pub expiry_date: DateTime<Utc>,
    pub minimum_order_value: Option<Decimal>,
    pub maximum_order_value: Option<Decimal>,
    pub status: String,
    pub record_state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<VoucherRow> for Voucher {
    type Error = StoreError;

    fn try_from(row: VoucherRow) -> Result<Self, Self::Error> {
        Ok(Voucher {
            id: row.id,
            code: row.code,
            discount_type: DiscountType::try_from(row.discount_type)?,
            discount_value: row.discount_value,
            quantity: row.quantity,
            expiry_date: row.expiry_date,
            minimum_order_value: row.minimum_order_value,
            maximum_order_value: row.maximum_order_value,
            status: VoucherStatus::try_from(row.status)?,
            record_state: RecordState::try_from(row.record_state)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct ServicePackageRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub record_state: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ServicePackageRow> for ServicePackage {
    type Error = StoreError;

    fn try_from(row: ServicePackageRow) -> Result<Self, Self::Error> {
        Ok(ServicePackage {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            record_state: RecordState::try_from(row.record_state)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub schedule_date: DateTime<Utc>,
    pub address: String,
    pub service_ids: Vec<Uuid>,
    pub total_price: Decimal,
    pub status: String,
    pub is_paid: bool,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            schedule_date: row.schedule_date,
            address: row.address,
            service_ids: row.service_ids,
            total_price: row.total_price,
            status: BookingStatus::try_from(row.status)?,
            is_paid: row.is_paid,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct MissionRow {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub technician_id: Uuid,
    pub description: String,
    pub status: String,
    pub reason: Option<String>,
    pub evidence_images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MissionRow> for Mission {
    type Error = StoreError;

    fn try_from(row: MissionRow) -> Result<Self, Self::Error> {
        Ok(Mission {
            id: row.id,
            booking_id: row.booking_id,
            technician_id: row.technician_id,
            description: row.description,
            status: MissionStatus::try_from(row.status)?,
            reason: row.reason,
            evidence_images: row.evidence_images,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct SetupPackageRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_template: bool,
    pub record_state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SetupPackageRow> for SetupPackage {
    type Error = StoreError;

    fn try_from(row: SetupPackageRow) -> Result<Self, Self::Error> {
        Ok(SetupPackage {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            image_url: row.image_url,
            is_template: row.is_template,
            record_state: RecordState::try_from(row.record_state)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct SetupPackageDetailRow {
    pub id: Uuid,
    pub package_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

impl From<SetupPackageDetailRow> for SetupPackageDetail {
    fn from(row: SetupPackageDetailRow) -> Self {
        SetupPackageDetail {
            id: row.id,
            package_id: row.package_id,
            product_id: row.product_id,
            quantity: row.quantity,
        }
    }
}

/// Convert a batch of rows, failing on the first corrupt one
pub fn map_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
