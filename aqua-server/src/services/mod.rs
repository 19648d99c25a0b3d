//! Workflow services
//!
//! Each public function is one workflow: it opens a single unit of work,
//! applies the business rules and commits. Email goes out through the
//! notifier only after commit.

pub mod booking;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod payment;
pub mod setup_package;
pub mod user;
pub mod voucher;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use shared::error::{AppError, ErrorCode};
use validator::Validate;

use crate::db::UnitOfWork;
use crate::error::{ServiceError, ServiceResult};

/// Unwrap a lookup or fail with `code`
pub(crate) fn found<T>(value: Option<T>, code: ErrorCode) -> ServiceResult<T> {
    value.ok_or_else(|| ServiceError::App(AppError::new(code)))
}

pub(crate) fn validate<T: Validate>(payload: &T) -> ServiceResult<()> {
    payload.validate().map_err(ServiceError::from)
}

/// Email address of an account, for notifications
pub(crate) async fn email_of(
    uow: &mut dyn UnitOfWork,
    user_id: uuid::Uuid,
) -> ServiceResult<Option<String>> {
    Ok(uow.find_user(user_id).await?.map(|u| u.email))
}

/// Calendar day in shop-local time (GMT+7)
pub(crate) fn local_day(at: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::east_opt(7 * 3600) {
        Some(tz) => at.with_timezone(&tz).date_naive(),
        None => at.date_naive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_day_crosses_midnight() {
        // 18:00 UTC is 01:00 next day in Vietnam
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap();
        assert_eq!(local_day(at), NaiveDate::from_ymd_opt(2026, 5, 2).unwrap());
    }
}
