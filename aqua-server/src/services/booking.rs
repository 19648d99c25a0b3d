//! Service packages, bookings and technician missions

use std::collections::HashSet;

use rust_decimal::Decimal;
use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    AssignTechnicianRequest, BookScheduleRequest, Booking, BookingFilter, BookingStatus,
    BookingView, CancelBookingRequest, Mission, MissionFilter, MissionStatus,
    MissionStatusUpdate, PaginatedResponse, PaymentTarget, RecordState, ReviewReportRequest,
    ServicePackage, ServicePackageCreate, ServicePackageUpdate, UserRole,
};
use shared::util::now;

use super::payment::close_payments;
use super::{email_of, found, local_day, validate};
use crate::auth::Identity;
use crate::db::UnitOfWork;
use crate::email::templates;
use crate::error::ServiceResult;
use crate::state::AppState;

fn check_price(price: Decimal) -> ServiceResult<()> {
    if price < Decimal::ZERO {
        return Err(AppError::new(ErrorCode::ValueOutOfRange)
            .with_detail("field", "price")
            .into());
    }
    Ok(())
}

async fn active_service(uow: &mut dyn UnitOfWork, id: Uuid) -> ServiceResult<ServicePackage> {
    found(
        uow.find_service_package(id)
            .await?
            .filter(|p| p.record_state.is_active()),
        ErrorCode::ServicePackageNotFound,
    )
}

// ---- service packages ----

pub async fn list_service_packages(
    state: &AppState,
    caller: Option<&Identity>,
    include_deleted: bool,
) -> ServiceResult<Vec<ServicePackage>> {
    let include_deleted = include_deleted && caller.is_some_and(Identity::is_staff);
    let mut uow = state.store.begin().await?;
    Ok(uow.list_service_packages(include_deleted).await?)
}

pub async fn create_service_package(
    state: &AppState,
    caller: &Identity,
    req: ServicePackageCreate,
) -> ServiceResult<ServicePackage> {
    caller.require_staff()?;
    validate(&req)?;
    check_price(req.price)?;
    let package = ServicePackage {
        id: Uuid::new_v4(),
        name: req.name,
        description: req.description,
        price: req.price,
        record_state: RecordState::Active,
        created_at: now(),
    };
    let mut uow = state.store.begin().await?;
    uow.insert_service_package(&package).await?;
    uow.commit().await?;
    Ok(package)
}

pub async fn update_service_package(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
    req: ServicePackageUpdate,
) -> ServiceResult<ServicePackage> {
    caller.require_staff()?;
    validate(&req)?;
    let mut uow = state.store.begin().await?;
    let mut package = active_service(uow.as_mut(), id).await?;
    if let Some(name) = req.name {
        package.name = name;
    }
    if req.description.is_some() {
        package.description = req.description;
    }
    if let Some(price) = req.price {
        check_price(price)?;
        package.price = price;
    }
    uow.update_service_package(&package).await?;
    uow.commit().await?;
    Ok(package)
}

pub async fn delete_service_package(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
) -> ServiceResult<()> {
    caller.require_staff()?;
    let mut uow = state.store.begin().await?;
    let mut package = active_service(uow.as_mut(), id).await?;
    package.record_state = RecordState::Deleted;
    uow.update_service_package(&package).await?;
    uow.commit().await?;
    Ok(())
}

// ---- bookings ----

/// 预约上门服务
pub async fn book_schedule(
    state: &AppState,
    caller: &Identity,
    req: BookScheduleRequest,
) -> ServiceResult<Booking> {
    validate(&req)?;
    let now = now();
    if req.schedule_date <= now {
        return Err(AppError::new(ErrorCode::ScheduleDateInvalid).into());
    }

    let mut uow = state.store.begin().await?;
    let order = found(uow.find_order(req.order_id).await?, ErrorCode::OrderNotFound)?;
    if order.user_id != caller.user_id {
        return Err(AppError::new(ErrorCode::NotOwner).into());
    }
    if !order.status.is_booking_eligible() {
        return Err(AppError::new(ErrorCode::BookingNotEligible)
            .with_detail("order_status", order.status.as_db())
            .into());
    }

    let mut seen = HashSet::new();
    let mut service_ids = Vec::new();
    let mut total_price = Decimal::ZERO;
    for id in req.service_ids {
        if !seen.insert(id) {
            continue;
        }
        let service = active_service(uow.as_mut(), id).await?;
        total_price += service.price;
        service_ids.push(id);
    }

    let booking = Booking {
        id: Uuid::new_v4(),
        order_id: order.id,
        user_id: caller.user_id,
        schedule_date: req.schedule_date,
        address: req.address,
        service_ids,
        total_price,
        status: BookingStatus::NotAssigned,
        is_paid: false,
        cancel_reason: None,
        created_at: now,
        updated_at: now,
    };
    uow.insert_booking(&booking).await?;
    uow.commit().await?;

    tracing::info!(booking_id = %booking.id, order_id = %order.id, "Booking created");
    Ok(booking)
}

/// Assign a technician to an unassigned booking
pub async fn assign_technician(
    state: &AppState,
    caller: &Identity,
    booking_id: Uuid,
    req: AssignTechnicianRequest,
) -> ServiceResult<Mission> {
    caller.require_staff()?;
    validate(&req)?;
    let now = now();
    let mut uow = state.store.begin().await?;

    // Serializes assignments of one technician so the same-day check holds
    let technician = found(
        uow.lock_user(req.technician_id).await?,
        ErrorCode::UserNotFound,
    )?;
    if technician.role != UserRole::Technician || !technician.is_available() {
        return Err(AppError::new(ErrorCode::TechnicianUnavailable).into());
    }

    let mut booking = found(uow.find_booking(booking_id).await?, ErrorCode::BookingNotFound)?;
    if booking.status != BookingStatus::NotAssigned {
        return Err(AppError::new(ErrorCode::BookingAlreadyAssigned)
            .with_detail("status", booking.status.as_db())
            .into());
    }

    let day = local_day(booking.schedule_date);
    let busy = uow
        .list_active_missions_for_technician(technician.id)
        .await?
        .into_iter()
        .any(|(_, other)| other.id != booking.id && local_day(other.schedule_date) == day);
    if busy {
        return Err(AppError::new(ErrorCode::TechnicianScheduleConflict)
            .with_detail("date", day.to_string())
            .into());
    }

    if !uow
        .transition_booking(
            booking_id,
            &[BookingStatus::NotAssigned],
            BookingStatus::Assigned,
            now,
        )
        .await?
    {
        return Err(AppError::new(ErrorCode::BookingAlreadyAssigned).into());
    }
    booking.status = BookingStatus::Assigned;

    let mission = Mission {
        id: Uuid::new_v4(),
        booking_id,
        technician_id: technician.id,
        description: req.description,
        status: MissionStatus::Assigned,
        reason: None,
        evidence_images: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    uow.insert_mission(&mission).await?;
    uow.commit().await?;

    tracing::info!(
        booking_id = %booking_id,
        technician_id = %technician.id,
        mission_id = %mission.id,
        "Technician assigned"
    );
    state.notifier.notify(
        technician.email,
        templates::technician_assigned(&booking, &mission.description),
    );
    Ok(mission)
}

/// Field update by the assigned technician
pub async fn update_mission_status(
    state: &AppState,
    caller: &Identity,
    mission_id: Uuid,
    req: MissionStatusUpdate,
) -> ServiceResult<Mission> {
    caller.require_role(UserRole::Technician)?;
    validate(&req)?;
    let now = now();
    let mut uow = state.store.begin().await?;
    let mut mission = found(uow.find_mission(mission_id).await?, ErrorCode::MissionNotFound)?;
    if mission.technician_id != caller.user_id {
        return Err(AppError::new(ErrorCode::NotOwner).into());
    }

    let target = req.status;
    if !target.is_technician_update() || !mission.status.can_transition_to(target) {
        return Err(AppError::new(ErrorCode::MissionInvalidTransition)
            .with_detail("from", mission.status.as_db())
            .with_detail("to", target.as_db())
            .into());
    }
    let reason = req.reason.filter(|r| !r.trim().is_empty());
    if target == MissionStatus::Reported && reason.is_none() {
        return Err(AppError::new(ErrorCode::ReportReasonRequired).into());
    }

    mission.status = target;
    if reason.is_some() {
        mission.reason = reason;
    }
    mission.evidence_images.extend(req.evidence_images);
    mission.updated_at = now;
    uow.update_mission(&mission).await?;

    let follow = match target {
        MissionStatus::Processing => Some((
            vec![BookingStatus::Assigned],
            BookingStatus::Processing,
        )),
        MissionStatus::Done => Some((vec![BookingStatus::Processing], BookingStatus::Done)),
        MissionStatus::Missed => Some((
            vec![BookingStatus::Assigned, BookingStatus::Processing],
            BookingStatus::NotAssigned,
        )),
        _ => None,
    };
    if let Some((from, to)) = follow {
        uow.transition_booking(mission.booking_id, &from, to, now)
            .await?;
    }
    uow.commit().await?;

    tracing::info!(mission_id = %mission.id, status = %target, "Mission updated");
    Ok(mission)
}

/// Manager decision on a reported mission
pub async fn review_report(
    state: &AppState,
    caller: &Identity,
    mission_id: Uuid,
    req: ReviewReportRequest,
) -> ServiceResult<Mission> {
    caller.require_staff()?;
    let now = now();
    let mut uow = state.store.begin().await?;
    let mut mission = found(uow.find_mission(mission_id).await?, ErrorCode::MissionNotFound)?;
    if mission.status != MissionStatus::Reported {
        return Err(AppError::new(ErrorCode::MissionInvalidTransition)
            .with_detail("from", mission.status.as_db())
            .into());
    }

    let (mission_to, from, booking_to) = if req.approve {
        (
            MissionStatus::Completed,
            vec![BookingStatus::Processing],
            BookingStatus::Done,
        )
    } else {
        (
            MissionStatus::Cancelled,
            vec![BookingStatus::Assigned, BookingStatus::Processing],
            BookingStatus::NotAssigned,
        )
    };
    mission.status = mission_to;
    mission.updated_at = now;
    uow.update_mission(&mission).await?;
    uow.transition_booking(mission.booking_id, &from, booking_to, now)
        .await?;
    uow.commit().await?;

    tracing::info!(mission_id = %mission.id, approve = req.approve, "Mission report reviewed");
    Ok(mission)
}

/// Customer sign-off on finished work
pub async fn confirm_booking(
    state: &AppState,
    caller: &Identity,
    booking_id: Uuid,
) -> ServiceResult<Booking> {
    let now = now();
    let mut uow = state.store.begin().await?;
    let mut booking = found(uow.find_booking(booking_id).await?, ErrorCode::BookingNotFound)?;
    caller.require_access(booking.user_id)?;

    if !uow
        .transition_booking(
            booking_id,
            &[BookingStatus::Done],
            BookingStatus::Confirmed,
            now,
        )
        .await?
    {
        return Err(AppError::new(ErrorCode::BookingInvalidTransition)
            .with_detail("from", booking.status.as_db())
            .into());
    }
    booking.status = BookingStatus::Confirmed;
    booking.updated_at = now;

    for mut mission in uow.list_missions_for_booking(booking_id).await? {
        if mission.status == MissionStatus::Done {
            mission.status = MissionStatus::Completed;
            mission.updated_at = now;
            uow.update_mission(&mission).await?;
        }
    }
    uow.commit().await?;

    tracing::info!(booking_id = %booking_id, "Booking confirmed");
    Ok(booking)
}

pub async fn cancel_booking(
    state: &AppState,
    caller: &Identity,
    booking_id: Uuid,
    req: CancelBookingRequest,
) -> ServiceResult<Booking> {
    validate(&req)?;
    let now = now();
    let mut uow = state.store.begin().await?;
    let mut booking = found(uow.find_booking(booking_id).await?, ErrorCode::BookingNotFound)?;
    caller.require_access(booking.user_id)?;

    if !uow
        .transition_booking(
            booking_id,
            &BookingStatus::sources_of(BookingStatus::Cancelled),
            BookingStatus::Cancelled,
            now,
        )
        .await?
    {
        return Err(AppError::new(ErrorCode::BookingInvalidTransition)
            .with_detail("from", booking.status.as_db())
            .into());
    }
    booking.status = BookingStatus::Cancelled;
    booking.cancel_reason = Some(req.reason);
    booking.updated_at = now;
    uow.update_booking(&booking).await?;

    // Active missions are closed regardless of their own transition table
    for mut mission in uow.list_missions_for_booking(booking_id).await? {
        if mission.status.is_active() {
            mission.status = MissionStatus::Cancelled;
            mission.updated_at = now;
            uow.update_mission(&mission).await?;
        }
    }

    let closed = close_payments(uow.as_mut(), PaymentTarget::Booking(booking_id), now).await?;
    let owner_email = email_of(uow.as_mut(), booking.user_id).await?;
    uow.commit().await?;

    tracing::info!(booking_id = %booking_id, by = %caller.user_id, "Booking cancelled");
    if let Some(to) = owner_email {
        state
            .notifier
            .notify(to.clone(), templates::booking_cancelled(&booking));
        for payment in &closed.refunding {
            state.notifier.notify(to.clone(), templates::refund_started(payment));
        }
    }
    Ok(booking)
}

pub async fn get_booking(
    state: &AppState,
    caller: &Identity,
    id: Uuid,
) -> ServiceResult<BookingView> {
    let mut uow = state.store.begin().await?;
    let booking = found(uow.find_booking(id).await?, ErrorCode::BookingNotFound)?;
    let missions = uow.list_missions_for_booking(id).await?;
    let assigned = missions.iter().any(|m| m.technician_id == caller.user_id);
    if !assigned {
        caller.require_access(booking.user_id)?;
    }

    let mut services = Vec::with_capacity(booking.service_ids.len());
    for service_id in &booking.service_ids {
        if let Some(service) = uow.find_service_package(*service_id).await? {
            services.push(service);
        }
    }
    let payments = uow.list_payments_for(PaymentTarget::Booking(id)).await?;
    Ok(BookingView {
        booking,
        services,
        missions,
        payments,
    })
}

/// Customers only ever see their own bookings
pub async fn list_bookings(
    state: &AppState,
    caller: &Identity,
    mut filter: BookingFilter,
) -> ServiceResult<PaginatedResponse<Booking>> {
    if !caller.is_staff() {
        filter.user_id = Some(caller.user_id);
    }
    let mut uow = state.store.begin().await?;
    Ok(uow.list_bookings(&filter).await?)
}

/// Technicians see their own missions, staff see all
pub async fn list_missions(
    state: &AppState,
    caller: &Identity,
    mut filter: MissionFilter,
) -> ServiceResult<PaginatedResponse<Mission>> {
    match caller.role {
        UserRole::Technician => filter.technician_id = Some(caller.user_id),
        _ => caller.require_staff()?,
    }
    let mut uow = state.store.begin().await?;
    Ok(uow.list_missions(&filter).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{money, test_app, TestApp};
    use chrono::{Duration, Utc};
    use shared::models::{Order, OrderStatus, PaymentStatus};

    async fn paid_order(app: &TestApp, owner: &Identity) -> Order {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: owner.user_id,
            voucher_id: None,
            setup_package_id: None,
            address: "7 Pasteur".into(),
            subtotal: money("100"),
            discount: Decimal::ZERO,
            total_price: money("100"),
            ship_cost: Decimal::ZERO,
            status: OrderStatus::Paid,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        let mut uow = app.state.store.begin().await.unwrap();
        uow.insert_order(&order).await.unwrap();
        uow.commit().await.unwrap();
        order
    }

    async fn booking_for(app: &TestApp, owner: &Identity, days_ahead: i64) -> Booking {
        let order = paid_order(app, owner).await;
        let clean = app.service_package("30.00").await;
        let setup = app.service_package("45.50").await;
        book_schedule(
            &app.state,
            owner,
            BookScheduleRequest {
                order_id: order.id,
                schedule_date: Utc::now() + Duration::days(days_ahead),
                address: "7 Pasteur".into(),
                service_ids: vec![clean.id, setup.id, clean.id],
            },
        )
        .await
        .unwrap()
    }

    fn assign(technician: &Identity) -> AssignTechnicianRequest {
        AssignTechnicianRequest {
            technician_id: technician.user_id,
            description: "Install canister filter".into(),
        }
    }

    fn field_update(status: MissionStatus, reason: Option<&str>) -> MissionStatusUpdate {
        MissionStatusUpdate {
            status,
            reason: reason.map(Into::into),
            evidence_images: vec![],
        }
    }

    async fn booking_status(app: &TestApp, id: Uuid) -> BookingStatus {
        let mut uow = app.state.store.begin().await.unwrap();
        uow.find_booking(id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_book_schedule_totals_services() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let booking = booking_for(&app, &customer, 3).await;
        assert_eq!(booking.total_price, money("75.50"));
        assert_eq!(booking.service_ids.len(), 2);
        assert_eq!(booking.status, BookingStatus::NotAssigned);
    }

    #[tokio::test]
    async fn test_cancelled_order_cannot_be_booked() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let order = paid_order(&app, &customer).await;
        let mut uow = app.state.store.begin().await.unwrap();
        uow.transition_order(
            order.id,
            &[OrderStatus::Paid],
            OrderStatus::Cancelled,
            Utc::now(),
        )
        .await
        .unwrap();
        uow.commit().await.unwrap();
        let service = app.service_package("10").await;

        let err: AppError = book_schedule(
            &app.state,
            &customer,
            BookScheduleRequest {
                order_id: order.id,
                schedule_date: Utc::now() + Duration::days(1),
                address: "x".into(),
                service_ids: vec![service.id],
            },
        )
        .await
        .unwrap_err()
        .into();
        assert_eq!(err.code, ErrorCode::BookingNotEligible);
    }

    #[tokio::test]
    async fn test_assign_twice_conflicts() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let tech = app.user(UserRole::Technician).await;
        let other_tech = app.user(UserRole::Technician).await;
        let booking = booking_for(&app, &customer, 2).await;

        let mission = assign_technician(&app.state, &manager, booking.id, assign(&tech))
            .await
            .unwrap();
        assert_eq!(mission.technician_id, tech.user_id);
        assert_eq!(booking_status(&app, booking.id).await, BookingStatus::Assigned);

        let err: AppError =
            assign_technician(&app.state, &manager, booking.id, assign(&other_tech))
                .await
                .unwrap_err()
                .into();
        assert_eq!(err.code, ErrorCode::BookingAlreadyAssigned);
        assert_eq!(err.http_status().as_u16(), 409);

        let mail = app.mailer.wait_for(1).await;
        assert_eq!(mail[0].to, tech.email);
    }

    #[tokio::test]
    async fn test_concurrent_same_day_assignments() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let tech = app.user(UserRole::Technician).await;
        let first = booking_for(&app, &customer, 5).await;
        let second = booking_for(&app, &customer, 5).await;

        let mut handles = Vec::new();
        for booking_id in [first.id, second.id] {
            let manager = app.user(UserRole::Manager).await;
            let state = app.state.clone();
            let req = assign(&tech);
            handles.push(tokio::spawn(async move {
                assign_technician(&state, &manager, booking_id, req).await
            }));
        }
        let mut assigned = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => assigned += 1,
                Err(e) => {
                    let err: AppError = e.into();
                    assert_eq!(err.code, ErrorCode::TechnicianScheduleConflict);
                }
            }
        }
        assert_eq!(assigned, 1);
    }

    #[tokio::test]
    async fn test_same_day_conflict_for_technician() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let tech = app.user(UserRole::Technician).await;
        let first = booking_for(&app, &customer, 4).await;
        let second = booking_for(&app, &customer, 4).await;
        let later = booking_for(&app, &customer, 6).await;

        assign_technician(&app.state, &manager, first.id, assign(&tech))
            .await
            .unwrap();
        let err: AppError = assign_technician(&app.state, &manager, second.id, assign(&tech))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::TechnicianScheduleConflict);
        assert!(assign_technician(&app.state, &manager, later.id, assign(&tech))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_customer_cannot_be_assigned() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let booking = booking_for(&app, &customer, 2).await;

        let err: AppError =
            assign_technician(&app.state, &manager, booking.id, assign(&customer))
                .await
                .unwrap_err()
                .into();
        assert_eq!(err.code, ErrorCode::TechnicianUnavailable);
    }

    #[tokio::test]
    async fn test_mission_flow_to_confirmation() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let tech = app.user(UserRole::Technician).await;
        let booking = booking_for(&app, &customer, 2).await;
        let mission = assign_technician(&app.state, &manager, booking.id, assign(&tech))
            .await
            .unwrap();

        update_mission_status(
            &app.state,
            &tech,
            mission.id,
            field_update(MissionStatus::Processing, None),
        )
        .await
        .unwrap();
        assert_eq!(booking_status(&app, booking.id).await, BookingStatus::Processing);

        let mut done = field_update(MissionStatus::Done, None);
        done.evidence_images = vec!["memory://uploads/a.jpg".into()];
        let mission = update_mission_status(&app.state, &tech, mission.id, done)
            .await
            .unwrap();
        assert_eq!(mission.evidence_images.len(), 1);
        assert_eq!(booking_status(&app, booking.id).await, BookingStatus::Done);

        let confirmed = confirm_booking(&app.state, &customer, booking.id)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        let view = get_booking(&app.state, &customer, booking.id).await.unwrap();
        assert_eq!(view.missions[0].status, MissionStatus::Completed);
        assert_eq!(view.services.len(), 2);
    }

    #[tokio::test]
    async fn test_report_requires_reason_and_review() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let tech = app.user(UserRole::Technician).await;
        let booking = booking_for(&app, &customer, 2).await;
        let mission = assign_technician(&app.state, &manager, booking.id, assign(&tech))
            .await
            .unwrap();
        update_mission_status(
            &app.state,
            &tech,
            mission.id,
            field_update(MissionStatus::Processing, None),
        )
        .await
        .unwrap();

        let err: AppError = update_mission_status(
            &app.state,
            &tech,
            mission.id,
            field_update(MissionStatus::Reported, Some("  ")),
        )
        .await
        .unwrap_err()
        .into();
        assert_eq!(err.code, ErrorCode::ReportReasonRequired);

        update_mission_status(
            &app.state,
            &tech,
            mission.id,
            field_update(MissionStatus::Reported, Some("tank cracked")),
        )
        .await
        .unwrap();

        let reviewed = review_report(
            &app.state,
            &manager,
            mission.id,
            ReviewReportRequest { approve: false },
        )
        .await
        .unwrap();
        assert_eq!(reviewed.status, MissionStatus::Cancelled);
        assert_eq!(booking_status(&app, booking.id).await, BookingStatus::NotAssigned);

        // free for reassignment
        assert!(assign_technician(&app.state, &manager, booking.id, assign(&tech))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_only_assigned_technician_updates() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let tech = app.user(UserRole::Technician).await;
        let intruder = app.user(UserRole::Technician).await;
        let booking = booking_for(&app, &customer, 2).await;
        let mission = assign_technician(&app.state, &manager, booking.id, assign(&tech))
            .await
            .unwrap();

        let err: AppError = update_mission_status(
            &app.state,
            &intruder,
            mission.id,
            field_update(MissionStatus::Processing, None),
        )
        .await
        .unwrap_err()
        .into();
        assert_eq!(err.code, ErrorCode::NotOwner);

        let err: AppError = update_mission_status(
            &app.state,
            &tech,
            mission.id,
            field_update(MissionStatus::Completed, None),
        )
        .await
        .unwrap_err()
        .into();
        assert_eq!(err.code, ErrorCode::MissionInvalidTransition);
    }

    #[tokio::test]
    async fn test_cancel_booking_closes_missions_and_payments() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let tech = app.user(UserRole::Technician).await;
        let booking = booking_for(&app, &customer, 2).await;
        let mission = assign_technician(&app.state, &manager, booking.id, assign(&tech))
            .await
            .unwrap();
        let payment = crate::services::payment::create_payment(
            &app.state,
            &customer,
            shared::models::CreatePaymentRequest {
                order_id: None,
                booking_id: Some(booking.id),
                method: shared::models::PaymentMethod::BankTransfer,
                amount: booking.total_price,
            },
            "127.0.0.1",
        )
        .await
        .unwrap();

        let cancelled = cancel_booking(
            &app.state,
            &customer,
            booking.id,
            CancelBookingRequest {
                reason: "moving house".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let view = get_booking(&app.state, &customer, booking.id).await.unwrap();
        assert_eq!(view.missions[0].id, mission.id);
        assert_eq!(view.missions[0].status, MissionStatus::Cancelled);
        assert_eq!(view.payments[0].id, payment.id);
        assert_eq!(view.payments[0].status, PaymentStatus::Canceled);

        // a second cancel is rejected
        assert!(cancel_booking(
            &app.state,
            &customer,
            booking.id,
            CancelBookingRequest {
                reason: "again".into(),
            },
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn test_mission_listing_scope() {
        let app = test_app();
        let customer = app.user(UserRole::Customer).await;
        let manager = app.user(UserRole::Manager).await;
        let tech = app.user(UserRole::Technician).await;
        let other = app.user(UserRole::Technician).await;
        let a = booking_for(&app, &customer, 2).await;
        let b = booking_for(&app, &customer, 3).await;
        assign_technician(&app.state, &manager, a.id, assign(&tech))
            .await
            .unwrap();
        assign_technician(&app.state, &manager, b.id, assign(&other))
            .await
            .unwrap();

        let own = list_missions(&app.state, &tech, MissionFilter::default())
            .await
            .unwrap();
        assert_eq!(own.total, 1);
        let all = list_missions(&app.state, &manager, MissionFilter::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);
        assert!(list_missions(&app.state, &customer, MissionFilter::default())
            .await
            .is_err());
    }
}
