//! PostgreSQL persistence
//!
//! One [`PgUnitOfWork`] wraps one sqlx transaction; the per-table query
//! modules take a plain `&mut PgConnection` so they compose inside it.

mod bookings;
mod cart;
mod catalog;
mod orders;
mod payments;
pub mod rows;
mod setup_packages;
mod users;
mod vouchers;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::models::{
    Booking, BookingFilter, BookingStatus, CartItem, Category, Mission, MissionFilter, Order,
    OrderDetail, OrderFilter, OrderStatus, PageQuery, PaginatedResponse, Payment, PaymentFilter,
    PaymentStatus, PaymentTarget, Product, ProductFilter, ServicePackage, SetupPackage,
    SetupPackageDetail, SetupPackageFilter, User, UserFilter, Voucher, VoucherFilter,
};

use super::{Store, StoreError, StoreResult, UnitOfWork};

/// Map a unique-constraint violation to [`StoreError::Duplicate`]
pub(crate) fn on_unique(what: String) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        let unique = e
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            StoreError::Duplicate(what)
        } else {
            StoreError::Database(e)
        }
    }
}

/// (LIMIT, OFFSET) for a page request
pub(crate) fn page_bounds(page: &PageQuery) -> (i64, i64) {
    (i64::from(page.limit()), page.offset() as i64)
}

/// Conditional status change: only rows still in one of `from` are touched
async fn transition(
    conn: &mut PgConnection,
    table: &'static str,
    id: Uuid,
    from: Vec<&'static str>,
    to: &'static str,
    now: DateTime<Utc>,
) -> StoreResult<bool> {
    let result = sqlx::query(&format!(
        "UPDATE {table} SET status = $3, updated_at = $4 WHERE id = $1 AND status = ANY($2)"
    ))
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run pending migrations
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        tracing::info!("Database migrations applied");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        users::find(self.conn(), id).await
    }

    async fn lock_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        users::find_for_update(self.conn(), id).await
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        users::find_by_email(self.conn(), email).await
    }

    async fn list_users(&mut self, filter: &UserFilter) -> StoreResult<PaginatedResponse<User>> {
        users::list(self.conn(), filter).await
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        users::insert(self.conn(), user).await
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<()> {
        users::update(self.conn(), user).await
    }

    async fn find_category(&mut self, id: Uuid) -> StoreResult<Option<Category>> {
        catalog::find_category(self.conn(), id).await
    }

    async fn list_categories(&mut self, include_deleted: bool) -> StoreResult<Vec<Category>> {
        catalog::list_categories(self.conn(), include_deleted).await
    }

    async fn insert_category(&mut self, category: &Category) -> StoreResult<()> {
        catalog::insert_category(self.conn(), category).await
    }

    async fn update_category(&mut self, category: &Category) -> StoreResult<()> {
        catalog::update_category(self.conn(), category).await
    }

    async fn find_product(&mut self, id: Uuid) -> StoreResult<Option<Product>> {
        catalog::find_product(self.conn(), id).await
    }

    async fn list_products(
        &mut self,
        filter: &ProductFilter,
    ) -> StoreResult<PaginatedResponse<Product>> {
        catalog::list_products(self.conn(), filter).await
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        catalog::insert_product(self.conn(), product).await
    }

    async fn update_product(&mut self, product: &Product) -> StoreResult<()> {
        catalog::update_product(self.conn(), product).await
    }

    async fn reserve_stock(&mut self, product_id: Uuid, qty: i32) -> StoreResult<bool> {
        catalog::reserve_stock(self.conn(), product_id, qty).await
    }

    async fn release_stock(&mut self, product_id: Uuid, qty: i32) -> StoreResult<()> {
        catalog::release_stock(self.conn(), product_id, qty).await
    }

    async fn find_cart_item(&mut self, id: Uuid) -> StoreResult<Option<CartItem>> {
        cart::find(self.conn(), id).await
    }

    async fn list_cart_items(&mut self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
        cart::list_for_user(self.conn(), user_id).await
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> StoreResult<()> {
        cart::insert(self.conn(), item).await
    }

    async fn update_cart_item(&mut self, item: &CartItem) -> StoreResult<()> {
        cart::update(self.conn(), item).await
    }

    async fn consume_cart_item(
        &mut self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        cart::consume(self.conn(), id, user_id, now).await
    }

    async fn find_order(&mut self, id: Uuid) -> StoreResult<Option<Order>> {
        orders::find(self.conn(), id).await
    }

    async fn list_orders(
        &mut self,
        filter: &OrderFilter,
    ) -> StoreResult<PaginatedResponse<Order>> {
        orders::list(self.conn(), filter).await
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        orders::insert(self.conn(), order).await
    }

    async fn update_order(&mut self, order: &Order) -> StoreResult<()> {
        orders::update(self.conn(), order).await
    }

    async fn transition_order(
        &mut self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let from = from.iter().map(|s| s.as_db()).collect();
        transition(self.conn(), "orders", id, from, to.as_db(), now).await
    }

    async fn insert_order_detail(&mut self, detail: &OrderDetail) -> StoreResult<()> {
        orders::insert_detail(self.conn(), detail).await
    }

    async fn list_order_details(&mut self, order_id: Uuid) -> StoreResult<Vec<OrderDetail>> {
        orders::list_details(self.conn(), order_id).await
    }

    async fn find_payment(&mut self, id: Uuid) -> StoreResult<Option<Payment>> {
        payments::find(self.conn(), id).await
    }

    async fn find_payment_by_reference(
        &mut self,
        reference: &str,
    ) -> StoreResult<Option<Payment>> {
        payments::find_by_reference(self.conn(), reference).await
    }

    async fn list_payments(
        &mut self,
        filter: &PaymentFilter,
    ) -> StoreResult<PaginatedResponse<Payment>> {
        payments::list(self.conn(), filter).await
    }

    async fn list_payments_for(&mut self, target: PaymentTarget) -> StoreResult<Vec<Payment>> {
        payments::list_for(self.conn(), target).await
    }

    async fn list_stale_payments(&mut self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Payment>> {
        payments::list_stale(self.conn(), cutoff).await
    }

    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        payments::insert(self.conn(), payment).await
    }

    async fn update_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        payments::update(self.conn(), payment).await
    }

    async fn transition_payment(
        &mut self,
        id: Uuid,
        from: &[PaymentStatus],
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let from = from.iter().map(|s| s.as_db()).collect();
        transition(self.conn(), "payments", id, from, to.as_db(), now).await
    }

    async fn record_webhook_event(
        &mut self,
        event_id: &str,
        source: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        payments::record_webhook_event(self.conn(), event_id, source, now).await
    }

    async fn find_voucher(&mut self, id: Uuid) -> StoreResult<Option<Voucher>> {
        vouchers::find(self.conn(), id).await
    }

    async fn find_voucher_by_code(&mut self, code: &str) -> StoreResult<Option<Voucher>> {
        vouchers::find_by_code(self.conn(), code).await
    }

    async fn list_vouchers(
        &mut self,
        filter: &VoucherFilter,
    ) -> StoreResult<PaginatedResponse<Voucher>> {
        vouchers::list(self.conn(), filter).await
    }

    async fn insert_voucher(&mut self, voucher: &Voucher) -> StoreResult<()> {
        vouchers::insert(self.conn(), voucher).await
    }

    async fn update_voucher(&mut self, voucher: &Voucher) -> StoreResult<()> {
        vouchers::update(self.conn(), voucher).await
    }

    async fn consume_voucher(&mut self, id: Uuid) -> StoreResult<bool> {
        vouchers::consume(self.conn(), id).await
    }

    async fn find_service_package(&mut self, id: Uuid) -> StoreResult<Option<ServicePackage>> {
        bookings::find_service_package(self.conn(), id).await
    }

    async fn list_service_packages(
        &mut self,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServicePackage>> {
        bookings::list_service_packages(self.conn(), include_deleted).await
    }

    async fn insert_service_package(&mut self, package: &ServicePackage) -> StoreResult<()> {
        bookings::insert_service_package(self.conn(), package).await
    }

    async fn update_service_package(&mut self, package: &ServicePackage) -> StoreResult<()> {
        bookings::update_service_package(self.conn(), package).await
    }

    async fn find_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>> {
        bookings::find_booking(self.conn(), id).await
    }

    async fn list_bookings(
        &mut self,
        filter: &BookingFilter,
    ) -> StoreResult<PaginatedResponse<Booking>> {
        bookings::list_bookings(self.conn(), filter).await
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        bookings::insert_booking(self.conn(), booking).await
    }

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        bookings::update_booking(self.conn(), booking).await
    }

    async fn transition_booking(
        &mut self,
        id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let from = from.iter().map(|s| s.as_db()).collect();
        transition(self.conn(), "bookings", id, from, to.as_db(), now).await
    }

    async fn find_mission(&mut self, id: Uuid) -> StoreResult<Option<Mission>> {
        bookings::find_mission(self.conn(), id).await
    }

    async fn list_missions(
        &mut self,
        filter: &MissionFilter,
    ) -> StoreResult<PaginatedResponse<Mission>> {
        bookings::list_missions(self.conn(), filter).await
    }

    async fn list_missions_for_booking(&mut self, booking_id: Uuid) -> StoreResult<Vec<Mission>> {
        bookings::list_missions_for_booking(self.conn(), booking_id).await
    }

    async fn list_active_missions_for_technician(
        &mut self,
        technician_id: Uuid,
    ) -> StoreResult<Vec<(Mission, Booking)>> {
        bookings::list_active_missions_for_technician(self.conn(), technician_id).await
    }

    async fn insert_mission(&mut self, mission: &Mission) -> StoreResult<()> {
        bookings::insert_mission(self.conn(), mission).await
    }

    async fn update_mission(&mut self, mission: &Mission) -> StoreResult<()> {
        bookings::update_mission(self.conn(), mission).await
    }

    async fn find_setup_package(&mut self, id: Uuid) -> StoreResult<Option<SetupPackage>> {
        setup_packages::find(self.conn(), id).await
    }

    async fn list_setup_packages(
        &mut self,
        filter: &SetupPackageFilter,
        visible_to: Option<Uuid>,
    ) -> StoreResult<PaginatedResponse<SetupPackage>> {
        setup_packages::list(self.conn(), filter, visible_to).await
    }

    async fn insert_setup_package(&mut self, package: &SetupPackage) -> StoreResult<()> {
        setup_packages::insert(self.conn(), package).await
    }

    async fn update_setup_package(&mut self, package: &SetupPackage) -> StoreResult<()> {
        setup_packages::update(self.conn(), package).await
    }

    async fn list_setup_package_details(
        &mut self,
        package_id: Uuid,
    ) -> StoreResult<Vec<SetupPackageDetail>> {
        setup_packages::list_details(self.conn(), package_id).await
    }

    async fn replace_setup_package_details(
        &mut self,
        package_id: Uuid,
        details: &[SetupPackageDetail],
    ) -> StoreResult<()> {
        setup_packages::replace_details(self.conn(), package_id, details).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
