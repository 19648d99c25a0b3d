//! Catalog Model: categories and products

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::common::{PageQuery, RecordState};

/// Product category (optionally nested under a parent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    /// Parent category for subcategories
    pub parent_id: Option<Uuid>,
    pub record_state: RecordState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CategoryCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CategoryUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub parent_id: Option<Uuid>,
}

/// Sale status of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Available,
    Unavailable,
}

db_enum!(ProductStatus, "product_status" {
    Available => "available",
    Unavailable => "unavailable",
});

/// Product entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    /// Units in stock
    pub quantity: i32,
    pub image_url: Option<String>,
    pub status: ProductStatus,
    pub record_state: RecordState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Listed and not soft-deleted
    pub fn is_purchasable(&self) -> bool {
        self.record_state.is_active() && self.status == ProductStatus::Available
    }
}

/// Create product payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductCreate {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub quantity: i32,
    pub image_url: Option<String>,
    pub status: Option<ProductStatus>,
}

/// Update product payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProductUpdate {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub image_url: Option<String>,
    pub status: Option<ProductStatus>,
}

/// Product list query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    /// Case-insensitive name match
    pub search: Option<String>,
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub include_deleted: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductFilter {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    /// Whether a product passes this filter (search, category, status, record state)
    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_deleted && !product.record_state.is_active() {
            return false;
        }
        if self.category_id.is_some_and(|c| c != product.category_id) {
            return false;
        }
        if self.status.is_some_and(|s| s != product.status) {
            return false;
        }
        match &self.search {
            Some(term) if !term.is_empty() => product
                .name
                .to_lowercase()
                .contains(&term.to_lowercase()),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            price: Decimal::new(1000, 2),
            quantity: 5,
            image_url: None,
            status: ProductStatus::Available,
            record_state: RecordState::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_purchasable() {
        let mut p = product("Canister filter");
        assert!(p.is_purchasable());
        p.status = ProductStatus::Unavailable;
        assert!(!p.is_purchasable());
        p.status = ProductStatus::Available;
        p.record_state = RecordState::Deleted;
        assert!(!p.is_purchasable());
    }

    #[test]
    fn test_filter_hides_deleted_by_default() {
        let mut p = product("LED light");
        p.record_state = RecordState::Deleted;
        assert!(!ProductFilter::default().matches(&p));
        let filter = ProductFilter {
            include_deleted: true,
            ..Default::default()
        };
        assert!(filter.matches(&p));
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let p = product("Canister Filter 1200");
        let filter = ProductFilter {
            search: Some("canister".into()),
            ..Default::default()
        };
        assert!(filter.matches(&p));
        let filter = ProductFilter {
            search: Some("heater".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&p));
    }
}
