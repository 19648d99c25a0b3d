//! Persistence gateway
//!
//! Every workflow call opens one [`UnitOfWork`] via [`Store::begin`], performs
//! its reads and writes through it and finishes with [`UnitOfWork::commit`].
//! A unit of work dropped without commit rolls back.
//!
//! Shared counters (stock, voucher quantity) are only ever changed through the
//! guarded operations (`reserve_stock`, `consume_voucher`) and statuses that
//! can be raced (orders, payments, bookings) through the conditional
//! `transition_*` operations, which only touch the row when it is still in one
//! of the expected source states.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared::models::{
    Booking, BookingFilter, BookingStatus, CartItem, Category, Mission, MissionFilter, Order,
    OrderDetail, OrderFilter, OrderStatus, PaginatedResponse, Payment, PaymentFilter,
    PaymentStatus, PaymentTarget, Product, ProductFilter, ServicePackage, SetupPackage,
    SetupPackageDetail, SetupPackageFilter, UnknownVariant, User, UserFilter, Voucher,
    VoucherFilter,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(#[from] UnknownVariant),
}

/// Result type for persistence operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Entry point of the persistence gateway
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction-scoped unit of work
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

/// One transaction against the store
#[async_trait]
pub trait UnitOfWork: Send {
    // ---- users ----
    async fn find_user(&mut self, id: Uuid) -> StoreResult<Option<User>>;
    /// Like `find_user`, holding a row lock until commit or rollback
    async fn lock_user(&mut self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&mut self, filter: &UserFilter) -> StoreResult<PaginatedResponse<User>>;
    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;
    async fn update_user(&mut self, user: &User) -> StoreResult<()>;

    // ---- catalog ----
    async fn find_category(&mut self, id: Uuid) -> StoreResult<Option<Category>>;
    async fn list_categories(&mut self, include_deleted: bool) -> StoreResult<Vec<Category>>;
    async fn insert_category(&mut self, category: &Category) -> StoreResult<()>;
    async fn update_category(&mut self, category: &Category) -> StoreResult<()>;

    async fn find_product(&mut self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn list_products(
        &mut self,
        filter: &ProductFilter,
    ) -> StoreResult<PaginatedResponse<Product>>;
    async fn insert_product(&mut self, product: &Product) -> StoreResult<()>;
    async fn update_product(&mut self, product: &Product) -> StoreResult<()>;
    /// Decrement stock by `qty` only if at least `qty` units remain
    async fn reserve_stock(&mut self, product_id: Uuid, qty: i32) -> StoreResult<bool>;
    /// Put `qty` units back into stock
    async fn release_stock(&mut self, product_id: Uuid, qty: i32) -> StoreResult<()>;

    // ---- cart ----
    async fn find_cart_item(&mut self, id: Uuid) -> StoreResult<Option<CartItem>>;
    /// Active cart items of a user, oldest first
    async fn list_cart_items(&mut self, user_id: Uuid) -> StoreResult<Vec<CartItem>>;
    async fn insert_cart_item(&mut self, item: &CartItem) -> StoreResult<()>;
    async fn update_cart_item(&mut self, item: &CartItem) -> StoreResult<()>;
    /// Soft-delete an active item owned by `user_id`; false if already gone
    async fn consume_cart_item(
        &mut self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    // ---- orders ----
    async fn find_order(&mut self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn list_orders(&mut self, filter: &OrderFilter)
    -> StoreResult<PaginatedResponse<Order>>;
    async fn insert_order(&mut self, order: &Order) -> StoreResult<()>;
    async fn update_order(&mut self, order: &Order) -> StoreResult<()>;
    /// `UPDATE orders SET status = to WHERE id = $1 AND status = ANY(from)`
    async fn transition_order(
        &mut self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;
    async fn insert_order_detail(&mut self, detail: &OrderDetail) -> StoreResult<()>;
    async fn list_order_details(&mut self, order_id: Uuid) -> StoreResult<Vec<OrderDetail>>;

    // ---- payments ----
    async fn find_payment(&mut self, id: Uuid) -> StoreResult<Option<Payment>>;
    async fn find_payment_by_reference(&mut self, reference: &str)
    -> StoreResult<Option<Payment>>;
    async fn list_payments(
        &mut self,
        filter: &PaymentFilter,
    ) -> StoreResult<PaginatedResponse<Payment>>;
    /// All payments of one order or booking, newest first
    async fn list_payments_for(&mut self, target: PaymentTarget) -> StoreResult<Vec<Payment>>;
    /// Open (pending / processing) payments created before `cutoff`
    async fn list_stale_payments(&mut self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Payment>>;
    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()>;
    async fn update_payment(&mut self, payment: &Payment) -> StoreResult<()>;
    async fn transition_payment(
        &mut self,
        id: Uuid,
        from: &[PaymentStatus],
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;
    /// Insert into the processed-event ledger; false if already present
    async fn record_webhook_event(
        &mut self,
        event_id: &str,
        source: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    // ---- vouchers ----
    async fn find_voucher(&mut self, id: Uuid) -> StoreResult<Option<Voucher>>;
    async fn find_voucher_by_code(&mut self, code: &str) -> StoreResult<Option<Voucher>>;
    async fn list_vouchers(
        &mut self,
        filter: &VoucherFilter,
    ) -> StoreResult<PaginatedResponse<Voucher>>;
    async fn insert_voucher(&mut self, voucher: &Voucher) -> StoreResult<()>;
    async fn update_voucher(&mut self, voucher: &Voucher) -> StoreResult<()>;
    /// Decrement remaining quantity by one only if it is still positive
    async fn consume_voucher(&mut self, id: Uuid) -> StoreResult<bool>;

    // ---- service packages ----
    async fn find_service_package(&mut self, id: Uuid) -> StoreResult<Option<ServicePackage>>;
    async fn list_service_packages(
        &mut self,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServicePackage>>;
    async fn insert_service_package(&mut self, package: &ServicePackage) -> StoreResult<()>;
    async fn update_service_package(&mut self, package: &ServicePackage) -> StoreResult<()>;

    // ---- bookings & missions ----
    async fn find_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>>;
    async fn list_bookings(
        &mut self,
        filter: &BookingFilter,
    ) -> StoreResult<PaginatedResponse<Booking>>;
    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;
    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()>;
    async fn transition_booking(
        &mut self,
        id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn find_mission(&mut self, id: Uuid) -> StoreResult<Option<Mission>>;
    async fn list_missions(
        &mut self,
        filter: &MissionFilter,
    ) -> StoreResult<PaginatedResponse<Mission>>;
    async fn list_missions_for_booking(&mut self, booking_id: Uuid) -> StoreResult<Vec<Mission>>;
    /// Assigned / processing missions of a technician together with their bookings
    async fn list_active_missions_for_technician(
        &mut self,
        technician_id: Uuid,
    ) -> StoreResult<Vec<(Mission, Booking)>>;
    async fn insert_mission(&mut self, mission: &Mission) -> StoreResult<()>;
    async fn update_mission(&mut self, mission: &Mission) -> StoreResult<()>;

    // ---- setup packages ----
    async fn find_setup_package(&mut self, id: Uuid) -> StoreResult<Option<SetupPackage>>;
    /// `visible_to = Some(user)` restricts to the user's own packages plus templates
    async fn list_setup_packages(
        &mut self,
        filter: &SetupPackageFilter,
        visible_to: Option<Uuid>,
    ) -> StoreResult<PaginatedResponse<SetupPackage>>;
    async fn insert_setup_package(&mut self, package: &SetupPackage) -> StoreResult<()>;
    async fn update_setup_package(&mut self, package: &SetupPackage) -> StoreResult<()>;
    async fn list_setup_package_details(
        &mut self,
        package_id: Uuid,
    ) -> StoreResult<Vec<SetupPackageDetail>>;
    /// Replace every detail row of a package
    async fn replace_setup_package_details(
        &mut self,
        package_id: Uuid,
        details: &[SetupPackageDetail],
    ) -> StoreResult<()>;

    /// Make every write of this unit of work durable
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
