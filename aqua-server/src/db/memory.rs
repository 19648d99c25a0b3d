//! In-memory store
//!
//! All tables sit behind one async mutex. A unit of work holds the owned guard
//! for its whole lifetime and mutates a private copy that replaces the tables
//! on commit, so units of work are fully serialized and an uncommitted one
//! leaves no trace. Used by the test suite and `STORE_BACKEND=memory`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use shared::models::{
    Booking, BookingFilter, BookingStatus, CartItem, Category, Mission, MissionFilter, Order,
    OrderDetail, OrderFilter, OrderStatus, PaginatedResponse, Payment, PaymentFilter,
    PaymentStatus, PaymentTarget, Product, ProductFilter, RecordState, ServicePackage,
    SetupPackage, SetupPackageDetail, SetupPackageFilter, User, UserFilter, Voucher,
    VoucherFilter,
};

use super::{Store, StoreError, StoreResult, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, Product>,
    cart_items: HashMap<Uuid, CartItem>,
    orders: HashMap<Uuid, Order>,
    order_details: HashMap<Uuid, OrderDetail>,
    payments: HashMap<Uuid, Payment>,
    vouchers: HashMap<Uuid, Voucher>,
    service_packages: HashMap<Uuid, ServicePackage>,
    bookings: HashMap<Uuid, Booking>,
    missions: HashMap<Uuid, Mission>,
    setup_packages: HashMap<Uuid, SetupPackage>,
    setup_package_details: HashMap<Uuid, SetupPackageDetail>,
    webhook_events: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, work }))
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

/// Newest first, id as tie-breaker so pages are stable
fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn update_existing<T: Clone>(
    table: &mut HashMap<Uuid, T>,
    id: Uuid,
    value: &T,
) -> StoreResult<()> {
    match table.get_mut(&id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(StoreError::Database(sqlx::Error::RowNotFound)),
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    // ---- users ----

    async fn find_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    // The unit of work already holds the store-wide guard
    async fn lock_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        self.find_user(id).await
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .work
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&mut self, filter: &UserFilter) -> StoreResult<PaginatedResponse<User>> {
        let search = filter.search.as_deref().map(str::to_lowercase);
        let mut users: Vec<User> = self
            .work
            .users
            .values()
            .filter(|u| filter.include_deleted || u.is_available())
            .filter(|u| filter.role.is_none_or(|r| r == u.role))
            .filter(|u| filter.status.is_none_or(|s| s == u.status))
            .filter(|u| {
                search.as_deref().is_none_or(|term| {
                    u.email.to_lowercase().contains(term)
                        || u.full_name.to_lowercase().contains(term)
                })
            })
            .cloned()
            .collect();
        newest_first(&mut users, |u| (u.created_at, u.id));
        Ok(PaginatedResponse::from_vec(users, &filter.page_query()))
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        if self.find_user_by_email(&user.email).await?.is_some() {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        self.work.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<()> {
        update_existing(&mut self.work.users, user.id, user)
    }

    // ---- catalog ----

    async fn find_category(&mut self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.work.categories.get(&id).cloned())
    }

    async fn list_categories(&mut self, include_deleted: bool) -> StoreResult<Vec<Category>> {
        let mut categories: Vec<Category> = self
            .work
            .categories
            .values()
            .filter(|c| include_deleted || c.record_state.is_active())
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_category(&mut self, category: &Category) -> StoreResult<()> {
        self.work.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category(&mut self, category: &Category) -> StoreResult<()> {
        update_existing(&mut self.work.categories, category.id, category)
    }

    async fn find_product(&mut self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.work.products.get(&id).cloned())
    }

    async fn list_products(
        &mut self,
        filter: &ProductFilter,
    ) -> StoreResult<PaginatedResponse<Product>> {
        let mut products: Vec<Product> = self
            .work
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        newest_first(&mut products, |p| (p.created_at, p.id));
        Ok(PaginatedResponse::from_vec(products, &filter.page_query()))
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        self.work.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> StoreResult<()> {
        update_existing(&mut self.work.products, product.id, product)
    }

    async fn reserve_stock(&mut self, product_id: Uuid, qty: i32) -> StoreResult<bool> {
        match self.work.products.get_mut(&product_id) {
            Some(p) if p.quantity >= qty => {
                p.quantity -= qty;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_stock(&mut self, product_id: Uuid, qty: i32) -> StoreResult<()> {
        if let Some(p) = self.work.products.get_mut(&product_id) {
            p.quantity += qty;
        }
        Ok(())
    }

    // ---- cart ----

    async fn find_cart_item(&mut self, id: Uuid) -> StoreResult<Option<CartItem>> {
        Ok(self.work.cart_items.get(&id).cloned())
    }

    async fn list_cart_items(&mut self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
        let mut items: Vec<CartItem> = self
            .work
            .cart_items
            .values()
            .filter(|i| i.user_id == user_id && i.record_state.is_active())
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.created_at, i.id));
        Ok(items)
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> StoreResult<()> {
        self.work.cart_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_cart_item(&mut self, item: &CartItem) -> StoreResult<()> {
        update_existing(&mut self.work.cart_items, item.id, item)
    }

    async fn consume_cart_item(
        &mut self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.work.cart_items.get_mut(&id) {
            Some(item) if item.user_id == user_id && item.record_state.is_active() => {
                item.record_state = RecordState::Deleted;
                item.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ---- orders ----

    async fn find_order(&mut self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.work.orders.get(&id).cloned())
    }

    async fn list_orders(
        &mut self,
        filter: &OrderFilter,
    ) -> StoreResult<PaginatedResponse<Order>> {
        let mut orders: Vec<Order> = self
            .work
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        newest_first(&mut orders, |o| (o.created_at, o.id));
        Ok(PaginatedResponse::from_vec(orders, &filter.page_query()))
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        self.work.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> StoreResult<()> {
        update_existing(&mut self.work.orders, order.id, order)
    }

    async fn transition_order(
        &mut self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.work.orders.get_mut(&id) {
            Some(o) if from.contains(&o.status) => {
                o.status = to;
                o.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_order_detail(&mut self, detail: &OrderDetail) -> StoreResult<()> {
        self.work.order_details.insert(detail.id, detail.clone());
        Ok(())
    }

    async fn list_order_details(&mut self, order_id: Uuid) -> StoreResult<Vec<OrderDetail>> {
        let mut details: Vec<OrderDetail> = self
            .work
            .order_details
            .values()
            .filter(|d| d.order_id == order_id)
            .cloned()
            .collect();
        details.sort_by(|a, b| a.product_name.cmp(&b.product_name).then(a.id.cmp(&b.id)));
        Ok(details)
    }

    // ---- payments ----

    async fn find_payment(&mut self, id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.work.payments.get(&id).cloned())
    }

    async fn find_payment_by_reference(
        &mut self,
        reference: &str,
    ) -> StoreResult<Option<Payment>> {
        Ok(self
            .work
            .payments
            .values()
            .find(|p| p.gateway_reference == reference)
            .cloned())
    }

    async fn list_payments(
        &mut self,
        filter: &PaymentFilter,
    ) -> StoreResult<PaginatedResponse<Payment>> {
        let mut payments: Vec<Payment> = self
            .work
            .payments
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        newest_first(&mut payments, |p| (p.created_at, p.id));
        Ok(PaginatedResponse::from_vec(payments, &filter.page_query()))
    }

    async fn list_payments_for(&mut self, target: PaymentTarget) -> StoreResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .work
            .payments
            .values()
            .filter(|p| p.target() == Some(target))
            .cloned()
            .collect();
        newest_first(&mut payments, |p| (p.created_at, p.id));
        Ok(payments)
    }

    async fn list_stale_payments(&mut self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .work
            .payments
            .values()
            .filter(|p| p.status.is_open() && p.created_at < cutoff)
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.created_at, p.id));
        Ok(payments)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        if self
            .find_payment_by_reference(&payment.gateway_reference)
            .await?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!(
                "gateway reference {}",
                payment.gateway_reference
            )));
        }
        self.work.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        update_existing(&mut self.work.payments, payment.id, payment)
    }

    async fn transition_payment(
        &mut self,
        id: Uuid,
        from: &[PaymentStatus],
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.work.payments.get_mut(&id) {
            Some(p) if from.contains(&p.status) => {
                p.status = to;
                p.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_webhook_event(
        &mut self,
        event_id: &str,
        _source: &str,
        _now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self.work.webhook_events.insert(event_id.to_string()))
    }

    // ---- vouchers ----

    async fn find_voucher(&mut self, id: Uuid) -> StoreResult<Option<Voucher>> {
        Ok(self.work.vouchers.get(&id).cloned())
    }

    async fn find_voucher_by_code(&mut self, code: &str) -> StoreResult<Option<Voucher>> {
        Ok(self
            .work
            .vouchers
            .values()
            .find(|v| v.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn list_vouchers(
        &mut self,
        filter: &VoucherFilter,
    ) -> StoreResult<PaginatedResponse<Voucher>> {
        let mut vouchers: Vec<Voucher> = self
            .work
            .vouchers
            .values()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect();
        newest_first(&mut vouchers, |v| (v.created_at, v.id));
        Ok(PaginatedResponse::from_vec(vouchers, &filter.page_query()))
    }

    async fn insert_voucher(&mut self, voucher: &Voucher) -> StoreResult<()> {
        if self.find_voucher_by_code(&voucher.code).await?.is_some() {
            return Err(StoreError::Duplicate(format!("voucher code {}", voucher.code)));
        }
        self.work.vouchers.insert(voucher.id, voucher.clone());
        Ok(())
    }

    async fn update_voucher(&mut self, voucher: &Voucher) -> StoreResult<()> {
        update_existing(&mut self.work.vouchers, voucher.id, voucher)
    }

    async fn consume_voucher(&mut self, id: Uuid) -> StoreResult<bool> {
        match self.work.vouchers.get_mut(&id) {
            Some(v) if v.quantity > 0 => {
                v.quantity -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ---- service packages ----

    async fn find_service_package(&mut self, id: Uuid) -> StoreResult<Option<ServicePackage>> {
        Ok(self.work.service_packages.get(&id).cloned())
    }

    async fn list_service_packages(
        &mut self,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServicePackage>> {
        let mut packages: Vec<ServicePackage> = self
            .work
            .service_packages
            .values()
            .filter(|p| include_deleted || p.record_state.is_active())
            .cloned()
            .collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(packages)
    }

    async fn insert_service_package(&mut self, package: &ServicePackage) -> StoreResult<()> {
        self.work.service_packages.insert(package.id, package.clone());
        Ok(())
    }

    async fn update_service_package(&mut self, package: &ServicePackage) -> StoreResult<()> {
        update_existing(&mut self.work.service_packages, package.id, package)
    }

    // ---- bookings & missions ----

    async fn find_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.work.bookings.get(&id).cloned())
    }

    async fn list_bookings(
        &mut self,
        filter: &BookingFilter,
    ) -> StoreResult<PaginatedResponse<Booking>> {
        let mut bookings: Vec<Booking> = self
            .work
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        newest_first(&mut bookings, |b| (b.created_at, b.id));
        Ok(PaginatedResponse::from_vec(bookings, &filter.page_query()))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        self.work.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        update_existing(&mut self.work.bookings, booking.id, booking)
    }

    async fn transition_booking(
        &mut self,
        id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.work.bookings.get_mut(&id) {
            Some(b) if from.contains(&b.status) => {
                b.status = to;
                b.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_mission(&mut self, id: Uuid) -> StoreResult<Option<Mission>> {
        Ok(self.work.missions.get(&id).cloned())
    }

    async fn list_missions(
        &mut self,
        filter: &MissionFilter,
    ) -> StoreResult<PaginatedResponse<Mission>> {
        let mut missions: Vec<Mission> = self
            .work
            .missions
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        newest_first(&mut missions, |m| (m.created_at, m.id));
        Ok(PaginatedResponse::from_vec(missions, &filter.page_query()))
    }

    async fn list_missions_for_booking(&mut self, booking_id: Uuid) -> StoreResult<Vec<Mission>> {
        let mut missions: Vec<Mission> = self
            .work
            .missions
            .values()
            .filter(|m| m.booking_id == booking_id)
            .cloned()
            .collect();
        newest_first(&mut missions, |m| (m.created_at, m.id));
        Ok(missions)
    }

    async fn list_active_missions_for_technician(
        &mut self,
        technician_id: Uuid,
    ) -> StoreResult<Vec<(Mission, Booking)>> {
        let bookings = &self.work.bookings;
        Ok(self
            .work
            .missions
            .values()
            .filter(|m| m.technician_id == technician_id && m.status.is_active())
            .filter_map(|m| bookings.get(&m.booking_id).map(|b| (m.clone(), b.clone())))
            .collect())
    }

    async fn insert_mission(&mut self, mission: &Mission) -> StoreResult<()> {
        self.work.missions.insert(mission.id, mission.clone());
        Ok(())
    }

    async fn update_mission(&mut self, mission: &Mission) -> StoreResult<()> {
        update_existing(&mut self.work.missions, mission.id, mission)
    }

    // ---- setup packages ----

    async fn find_setup_package(&mut self, id: Uuid) -> StoreResult<Option<SetupPackage>> {
        Ok(self.work.setup_packages.get(&id).cloned())
    }

    async fn list_setup_packages(
        &mut self,
        filter: &SetupPackageFilter,
        visible_to: Option<Uuid>,
    ) -> StoreResult<PaginatedResponse<SetupPackage>> {
        let search = filter.search.as_deref().map(str::to_lowercase);
        let mut packages: Vec<SetupPackage> = self
            .work
            .setup_packages
            .values()
            .filter(|p| filter.include_deleted || p.record_state.is_active())
            .filter(|p| visible_to.is_none_or(|u| p.owner_id == u || p.is_template))
            .filter(|p| filter.owner_id.is_none_or(|o| p.owner_id == o))
            .filter(|p| {
                search
                    .as_deref()
                    .is_none_or(|term| p.name.to_lowercase().contains(term))
            })
            .cloned()
            .collect();
        newest_first(&mut packages, |p| (p.created_at, p.id));
        Ok(PaginatedResponse::from_vec(packages, &filter.page_query()))
    }

    async fn insert_setup_package(&mut self, package: &SetupPackage) -> StoreResult<()> {
        self.work.setup_packages.insert(package.id, package.clone());
        Ok(())
    }

    async fn update_setup_package(&mut self, package: &SetupPackage) -> StoreResult<()> {
        update_existing(&mut self.work.setup_packages, package.id, package)
    }

    async fn list_setup_package_details(
        &mut self,
        package_id: Uuid,
    ) -> StoreResult<Vec<SetupPackageDetail>> {
        let mut details: Vec<SetupPackageDetail> = self
            .work
            .setup_package_details
            .values()
            .filter(|d| d.package_id == package_id)
            .cloned()
            .collect();
        details.sort_by_key(|d| d.id);
        Ok(details)
    }

    async fn replace_setup_package_details(
        &mut self,
        package_id: Uuid,
        details: &[SetupPackageDetail],
    ) -> StoreResult<()> {
        self.work
            .setup_package_details
            .retain(|_, d| d.package_id != package_id);
        for detail in details {
            self.work
                .setup_package_details
                .insert(detail.id, detail.clone());
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryUnitOfWork { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
