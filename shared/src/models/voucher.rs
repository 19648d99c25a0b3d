//! Voucher Model
//!
//! Eligibility checks and discount arithmetic live here so the checkout
//! path and the preview endpoint compute identical amounts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::common::{PageQuery, RecordState};
use crate::error::{AppError, AppResult, ErrorCode};
use crate::util::round_money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// `discount_value` is a percentage (0..=100)
    Percent,
    /// `discount_value` is a money amount
    Fixed,
}

db_enum!(DiscountType, "discount_type" {
    Percent => "percent",
    Fixed => "fixed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherStatus {
    #[default]
    Active,
    Inactive,
}

db_enum!(VoucherStatus, "voucher_status" {
    Active => "active",
    Inactive => "inactive",
});

/// Voucher entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// Remaining uses
    pub quantity: i32,
    pub expiry_date: DateTime<Utc>,
    /// Subtotal the order must reach
    pub minimum_order_value: Option<Decimal>,
    /// Cap on the amount a percentage discount is computed from
    pub maximum_order_value: Option<Decimal>,
    pub status: VoucherStatus,
    pub record_state: RecordState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Voucher {
    /// Check whether the voucher can be applied to an order of `subtotal` at `now`
    ///
    /// Checks run in a fixed order and the first failure wins: record state,
    /// status, expiry, remaining quantity, minimum order value.
    pub fn check_applicable(&self, subtotal: Decimal, now: DateTime<Utc>) -> AppResult<()> {
        if !self.record_state.is_active() {
            return Err(AppError::new(ErrorCode::VoucherNotFound));
        }
        if self.status != VoucherStatus::Active {
            return Err(AppError::new(ErrorCode::VoucherInactive));
        }
        if self.expiry_date <= now {
            return Err(AppError::new(ErrorCode::VoucherExpired)
                .with_detail("expiry_date", self.expiry_date.to_rfc3339()));
        }
        if self.quantity <= 0 {
            return Err(AppError::new(ErrorCode::VoucherExhausted));
        }
        if let Some(minimum) = self.minimum_order_value.filter(|m| subtotal < *m) {
            return Err(AppError::new(ErrorCode::VoucherMinimumNotMet)
                .with_detail("minimum_order_value", minimum.to_string()));
        }
        Ok(())
    }

    /// Discount for an order of `subtotal`, never more than the subtotal
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percent => {
                let base = match self.maximum_order_value {
                    Some(cap) => subtotal.min(cap),
                    None => subtotal,
                };
                base * self.discount_value / Decimal::ONE_HUNDRED
            }
            DiscountType::Fixed => self.discount_value,
        };
        round_money(raw.max(Decimal::ZERO).min(subtotal))
    }
}

/// Create voucher payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VoucherCreate {
    #[validate(length(min = 3, max = 50))]
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[validate(range(min = 0))]
    pub quantity: i32,
    pub expiry_date: DateTime<Utc>,
    pub minimum_order_value: Option<Decimal>,
    pub maximum_order_value: Option<Decimal>,
    pub status: Option<VoucherStatus>,
}

impl VoucherCreate {
    /// Checks the validator derive cannot express on decimals
    pub fn check_amounts(&self) -> AppResult<()> {
        check_discount_value(self.discount_type, self.discount_value)?;
        check_non_negative("minimum_order_value", self.minimum_order_value)?;
        check_non_negative("maximum_order_value", self.maximum_order_value)
    }
}

/// Update voucher payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct VoucherUpdate {
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub minimum_order_value: Option<Decimal>,
    pub maximum_order_value: Option<Decimal>,
    pub status: Option<VoucherStatus>,
}

pub(crate) fn check_discount_value(kind: DiscountType, value: Decimal) -> AppResult<()> {
    let valid = match kind {
        DiscountType::Percent => value > Decimal::ZERO && value <= Decimal::ONE_HUNDRED,
        DiscountType::Fixed => value > Decimal::ZERO,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::ValueOutOfRange).with_detail("field", "discount_value"))
    }
}

fn check_non_negative(field: &str, value: Option<Decimal>) -> AppResult<()> {
    match value {
        Some(v) if v < Decimal::ZERO => {
            Err(AppError::new(ErrorCode::ValueOutOfRange).with_detail("field", field))
        }
        _ => Ok(()),
    }
}

impl VoucherUpdate {
    /// Apply onto an existing voucher, validating the merged result
    pub fn apply_to(&self, voucher: &mut Voucher) -> AppResult<()> {
        if let Some(kind) = self.discount_type {
            voucher.discount_type = kind;
        }
        if let Some(value) = self.discount_value {
            voucher.discount_value = value;
        }
        check_discount_value(voucher.discount_type, voucher.discount_value)?;
        check_non_negative("minimum_order_value", self.minimum_order_value)?;
        check_non_negative("maximum_order_value", self.maximum_order_value)?;
        if let Some(quantity) = self.quantity {
            voucher.quantity = quantity;
        }
        if let Some(expiry) = self.expiry_date {
            voucher.expiry_date = expiry;
        }
        if self.minimum_order_value.is_some() {
            voucher.minimum_order_value = self.minimum_order_value;
        }
        if self.maximum_order_value.is_some() {
            voucher.maximum_order_value = self.maximum_order_value;
        }
        if let Some(status) = self.status {
            voucher.status = status;
        }
        Ok(())
    }
}

/// Preview the discount a code would give
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherPreviewRequest {
    pub code: String,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherPreview {
    pub voucher_id: Uuid,
    pub code: String,
    pub discount: Decimal,
    pub total_after_discount: Decimal,
}

/// Voucher list query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoucherFilter {
    pub status: Option<VoucherStatus>,
    pub code: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl VoucherFilter {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn matches(&self, voucher: &Voucher) -> bool {
        (self.include_deleted || voucher.record_state.is_active())
            && self.status.is_none_or(|s| s == voucher.status)
            && self
                .code
                .as_deref()
                .is_none_or(|c| voucher.code.eq_ignore_ascii_case(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn voucher(kind: DiscountType, value: Decimal) -> Voucher {
        let now = Utc::now();
        Voucher {
            id: Uuid::new_v4(),
            code: "REEF10".into(),
            discount_type: kind,
            discount_value: value,
            quantity: 1,
            expiry_date: now + Duration::days(7),
            minimum_order_value: None,
            maximum_order_value: None,
            status: VoucherStatus::Active,
            record_state: RecordState::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_percent_discount_example() {
        // (20 + 5) at 10% off
        let v = voucher(DiscountType::Percent, Decimal::from(10));
        let subtotal = Decimal::from(25);
        let discount = v.discount_for(subtotal);
        assert_eq!(discount, Decimal::new(250, 2));
        assert_eq!(subtotal - discount, Decimal::new(2250, 2));
    }

    #[test]
    fn test_percent_base_capped_by_maximum_order_value() {
        let mut v = voucher(DiscountType::Percent, Decimal::from(10));
        v.maximum_order_value = Some(Decimal::from(100));
        assert_eq!(v.discount_for(Decimal::from(500)), Decimal::from(10));
        assert_eq!(v.discount_for(Decimal::from(50)), Decimal::from(5));
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let v = voucher(DiscountType::Fixed, Decimal::from(30));
        assert_eq!(v.discount_for(Decimal::from(100)), Decimal::from(30));
        assert_eq!(v.discount_for(Decimal::from(12)), Decimal::from(12));
    }

    #[test]
    fn test_discount_rounds_half_away_from_zero() {
        let v = voucher(DiscountType::Percent, Decimal::new(125, 1));
        // 0.30 * 12.5% = 0.0375 -> 0.04
        assert_eq!(v.discount_for(Decimal::new(30, 2)), Decimal::new(4, 2));
    }

    #[test]
    fn test_check_order() {
        let now = Utc::now();
        let mut v = voucher(DiscountType::Fixed, Decimal::from(5));
        v.quantity = 0;
        v.expiry_date = now - Duration::days(1);
        v.status = VoucherStatus::Inactive;
        let err = v.check_applicable(Decimal::from(50), now).unwrap_err();
        assert_eq!(err.code, ErrorCode::VoucherInactive);

        v.status = VoucherStatus::Active;
        let err = v.check_applicable(Decimal::from(50), now).unwrap_err();
        assert_eq!(err.code, ErrorCode::VoucherExpired);

        v.expiry_date = now + Duration::days(1);
        let err = v.check_applicable(Decimal::from(50), now).unwrap_err();
        assert_eq!(err.code, ErrorCode::VoucherExhausted);

        v.quantity = 3;
        v.minimum_order_value = Some(Decimal::from(100));
        let err = v.check_applicable(Decimal::from(50), now).unwrap_err();
        assert_eq!(err.code, ErrorCode::VoucherMinimumNotMet);

        assert!(v.check_applicable(Decimal::from(100), now).is_ok());
    }

    #[test]
    fn test_deleted_voucher_is_not_found() {
        let mut v = voucher(DiscountType::Fixed, Decimal::from(5));
        v.record_state = RecordState::Deleted;
        let err = v.check_applicable(Decimal::from(50), Utc::now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::VoucherNotFound);
    }

    #[test]
    fn test_discount_value_bounds() {
        assert!(check_discount_value(DiscountType::Percent, Decimal::from(100)).is_ok());
        assert!(check_discount_value(DiscountType::Percent, Decimal::from(101)).is_err());
        assert!(check_discount_value(DiscountType::Fixed, Decimal::ZERO).is_err());
    }

    #[test]
    fn test_update_rejects_invalid_merge() {
        let mut v = voucher(DiscountType::Fixed, Decimal::from(500));
        let update = VoucherUpdate {
            discount_type: Some(DiscountType::Percent),
            ..Default::default()
        };
        assert!(update.apply_to(&mut v).is_err());
    }
}
