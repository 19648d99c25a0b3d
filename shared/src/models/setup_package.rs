//! Setup Package Model
//!
//! A named bundle of products (tank, filter, lighting...) that a user can
//! save, copy from a staff template, and expand into cart items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::common::{PageQuery, RecordState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupPackage {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Created by staff; visible to every customer as a starting point
    pub is_template: bool,
    pub record_state: RecordState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupPackageDetail {
    pub id: Uuid,
    pub package_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetupPackageItem {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetupPackageCreate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Vec<SetupPackageItem>,
}

/// Update payload; `items`, when present, replaces all details
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SetupPackageUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Option<Vec<SetupPackageItem>>,
}

/// Package line joined with its product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupPackageLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupPackageView {
    #[serde(flatten)]
    pub package: SetupPackage,
    pub items: Vec<SetupPackageLine>,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupPackageFilter {
    pub owner_id: Option<Uuid>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SetupPackageFilter {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}
