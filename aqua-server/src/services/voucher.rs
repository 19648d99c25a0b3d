//! Voucher administration and discount preview

use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    PaginatedResponse, RecordState, Voucher, VoucherCreate, VoucherFilter, VoucherPreview,
    VoucherPreviewRequest, VoucherStatus, VoucherUpdate,
};
use shared::util::now;

use super::{found, validate};
use crate::auth::Identity;
use crate::error::ServiceResult;
use crate::state::AppState;

pub async fn list_vouchers(
    state: &AppState,
    caller: &Identity,
    filter: VoucherFilter,
) -> ServiceResult<PaginatedResponse<Voucher>> {
    caller.require_staff()?;
    let mut uow = state.store.begin().await?;
    Ok(uow.list_vouchers(&filter).await?)
}

pub async fn get_voucher(state: &AppState, caller: &Identity, id: Uuid) -> ServiceResult<Voucher> {
    caller.require_staff()?;
    let mut uow = state.store.begin().await?;
    found(uow.find_voucher(id).await?, ErrorCode::VoucherNotFound)
}

pub async fn create_voucher(
    state: &AppState,
    caller: &Identity,
    req: VoucherCreate,
) -> ServiceResult<Voucher> {
    caller.require_staff()?;
    validate(&req)?;
    req.check_amounts()?;

    let code = req.code.trim().to_uppercase();
    let mut uow = state.store.begin().await?;
    if uow.find_voucher_by_code(&code).await?.is_some() {
        return Err(AppError::new(ErrorCode::VoucherCodeExists)
            .with_detail("code", code)
            .into());
    }

    let now = now();
    let voucher = Voucher {
        id: Uuid::new_v4(),
        code,
        discount_type: req.discount_type,
        discount_value: req.discount_value,
        quantity: req.quantity,
        expiry_date: req.expiry_date,
        minimum_order_value: req.minimum_order_value,
        maximum_order_value: req.maximum_order_value,
        status: req.status.unwrap_or(VoucherStatus::Active),
        record_state: RecordState::Active,
        created_at: now,
        updated_at: now,
    };
    uow.insert_voucher(&voucher).await?;
    uow.commit().await?;

    tracing::info!(voucher_id = %voucher.id, code = %voucher.code, "Voucher created");
    Ok(voucher)
}

pub async fn update_voucher(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
    req: VoucherUpdate,
) -> ServiceResult<Voucher> {
    caller.require_staff()?;
    validate(&req)?;
    let mut uow = state.store.begin().await?;
    let mut voucher = found(
        uow.find_voucher(id).await?.filter(|v| v.record_state.is_active()),
        ErrorCode::VoucherNotFound,
    )?;
    req.apply_to(&mut voucher)?;
    voucher.updated_at = now();
    uow.update_voucher(&voucher).await?;
    uow.commit().await?;
    Ok(voucher)
}

pub async fn delete_voucher(state: &AppState, caller: &Identity, id: Uuid) -> ServiceResult<()> {
    caller.require_staff()?;
    let mut uow = state.store.begin().await?;
    let mut voucher = found(
        uow.find_voucher(id).await?.filter(|v| v.record_state.is_active()),
        ErrorCode::VoucherNotFound,
    )?;
    voucher.record_state = RecordState::Deleted;
    voucher.updated_at = now();
    uow.update_voucher(&voucher).await?;
    uow.commit().await?;
    Ok(())
}

/// Discount a code would give on `subtotal`, without consuming it
pub async fn preview(
    state: &AppState,
    req: VoucherPreviewRequest,
) -> ServiceResult<VoucherPreview> {
    if req.subtotal < rust_decimal::Decimal::ZERO {
        return Err(AppError::new(ErrorCode::ValueOutOfRange)
            .with_detail("field", "subtotal")
            .into());
    }
    let mut uow = state.store.begin().await?;
    let voucher = found(
        uow.find_voucher_by_code(req.code.trim()).await?,
        ErrorCode::VoucherNotFound,
    )?;
    voucher.check_applicable(req.subtotal, now())?;
    let discount = voucher.discount_for(req.subtotal);
    Ok(VoucherPreview {
        voucher_id: voucher.id,
        code: voucher.code,
        discount,
        total_after_discount: req.subtotal - discount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{money, test_app};
    use chrono::{Duration, Utc};
    use shared::models::{DiscountType, UserRole};

    fn create_req(code: &str) -> VoucherCreate {
        VoucherCreate {
            code: code.into(),
            discount_type: DiscountType::Percent,
            discount_value: money("10"),
            quantity: 5,
            expiry_date: Utc::now() + Duration::days(10),
            minimum_order_value: None,
            maximum_order_value: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn test_code_is_unique_case_insensitive() {
        let app = test_app();
        let manager = app.user(UserRole::Manager).await;
        let created = create_voucher(&app.state, &manager, create_req("reef10"))
            .await
            .unwrap();
        assert_eq!(created.code, "REEF10");

        let err: AppError = create_voucher(&app.state, &manager, create_req("Reef10"))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::VoucherCodeExists);
    }

    #[tokio::test]
    async fn test_preview_does_not_consume() {
        let app = test_app();
        let voucher = app.voucher("SAVE10", DiscountType::Percent, "10", 1).await;
        let req = || VoucherPreviewRequest {
            code: "save10".into(),
            subtotal: money("25.00"),
        };

        let first = preview(&app.state, req()).await.unwrap();
        assert_eq!(first.discount, money("2.50"));
        assert_eq!(first.total_after_discount, money("22.50"));
        let second = preview(&app.state, req()).await.unwrap();
        assert_eq!(second.voucher_id, voucher.id);
    }

    #[tokio::test]
    async fn test_deleted_voucher_not_previewable() {
        let app = test_app();
        let manager = app.user(UserRole::Manager).await;
        let voucher = app.voucher("GONE", DiscountType::Fixed, "5", 3).await;
        delete_voucher(&app.state, &manager, voucher.id).await.unwrap();

        let err: AppError = preview(
            &app.state,
            VoucherPreviewRequest {
                code: "GONE".into(),
                subtotal: money("50"),
            },
        )
        .await
        .unwrap_err()
        .into();
        assert_eq!(err.code, ErrorCode::VoucherNotFound);
    }

    #[tokio::test]
    async fn test_customer_cannot_list() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        assert!(list_vouchers(&app.state, &customer, VoucherFilter::default())
            .await
            .is_err());
    }
}
