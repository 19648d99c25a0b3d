//! Booking Model: service packages, bookings and technician missions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::common::{PageQuery, RecordState};
use super::payment::Payment;

/// Installation / maintenance service offered for booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePackage {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub record_state: RecordState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServicePackageCreate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ServicePackageUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Waiting for a technician
    NotAssigned,
    Assigned,
    /// Technician on site
    Processing,
    /// Work finished, awaiting customer confirmation
    Done,
    Confirmed,
    Cancelled,
}

db_enum!(BookingStatus, "booking_status" {
    NotAssigned => "not_assigned",
    Assigned => "assigned",
    Processing => "processing",
    Done => "done",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
});

impl BookingStatus {
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (NotAssigned, Assigned | Cancelled)
                | (Assigned, Processing | NotAssigned | Cancelled)
                | (Processing, Done | NotAssigned | Cancelled)
                | (Done, Confirmed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled)
    }

    /// Every state that may legally move to `target`
    pub fn sources_of(target: BookingStatus) -> Vec<BookingStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }
}

/// Mission status
///
/// A technician's task within a booking. `Reported` enters manager review,
/// which ends in `Completed` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    NotAssigned,
    Assigned,
    Processing,
    Done,
    Missed,
    Reported,
    Completed,
    Cancelled,
}

db_enum!(MissionStatus, "mission_status" {
    NotAssigned => "not_assigned",
    Assigned => "assigned",
    Processing => "processing",
    Done => "done",
    Missed => "missed",
    Reported => "reported",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl MissionStatus {
    pub fn can_transition_to(&self, next: MissionStatus) -> bool {
        use MissionStatus::*;
        matches!(
            (self, next),
            (NotAssigned, Assigned)
                | (Assigned, Processing | Missed | Cancelled)
                | (Processing, Done | Reported | Missed)
                | (Done, Completed)
                | (Reported, Completed | Cancelled)
        )
    }

    /// Occupies the technician's calendar
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Assigned | Self::Processing)
    }

    /// States a technician may report from the field
    pub fn is_technician_update(&self) -> bool {
        matches!(
            self,
            Self::Processing | Self::Done | Self::Reported | Self::Missed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Missed | Self::Completed | Self::Cancelled)
    }
}

/// Scheduled service visit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub schedule_date: DateTime<Utc>,
    pub address: String,
    pub service_ids: Vec<Uuid>,
    /// Σ service package prices
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub is_paid: bool,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Technician assignment within a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub technician_id: Uuid,
    pub description: String,
    pub status: MissionStatus,
    /// Required when reported; free text otherwise
    pub reason: Option<String>,
    /// Evidence photo URLs
    pub evidence_images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BookScheduleRequest {
    pub order_id: Uuid,
    pub schedule_date: DateTime<Utc>,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(length(min = 1, message = "select at least one service"))]
    pub service_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssignTechnicianRequest {
    pub technician_id: Uuid,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MissionStatusUpdate {
    pub status: MissionStatus,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
    #[serde(default)]
    pub evidence_images: Vec<String>,
}

/// Manager decision on a reported mission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReportRequest {
    pub approve: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelBookingRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Booking with its missions, services and payments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub services: Vec<ServicePackage>,
    pub missions: Vec<Mission>,
    pub payments: Vec<Payment>,
}

/// Booking list query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    /// Ignored for customers (always their own id)
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl BookingFilter {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        self.status.is_none_or(|s| s == booking.status)
            && self.user_id.is_none_or(|u| u == booking.user_id)
            && self.from.is_none_or(|from| booking.schedule_date >= from)
            && self.to.is_none_or(|to| booking.schedule_date < to)
    }
}

/// Mission list query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionFilter {
    pub status: Option<MissionStatus>,
    /// Ignored for technicians (always their own id)
    pub technician_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl MissionFilter {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn matches(&self, mission: &Mission) -> bool {
        self.status.is_none_or(|s| s == mission.status)
            && self.technician_id.is_none_or(|t| t == mission.technician_id)
            && self.booking_id.is_none_or(|b| b == mission.booking_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_transitions() {
        use BookingStatus::*;
        assert!(NotAssigned.can_transition_to(Assigned));
        assert!(!Assigned.can_transition_to(Assigned));
        assert!(Processing.can_transition_to(NotAssigned));
        assert!(Done.can_transition_to(Confirmed));
        assert!(!Done.can_transition_to(Cancelled));
        assert!(!Confirmed.can_transition_to(Cancelled));
        assert_eq!(BookingStatus::sources_of(Assigned), vec![NotAssigned]);
        assert_eq!(
            BookingStatus::sources_of(Cancelled),
            vec![NotAssigned, Assigned, Processing]
        );
    }

    #[test]
    fn test_mission_transitions() {
        use MissionStatus::*;
        assert!(NotAssigned.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Reported));
        assert!(Reported.can_transition_to(Completed));
        assert!(Reported.can_transition_to(Cancelled));
        assert!(!Assigned.can_transition_to(Done));
        assert!(!Processing.can_transition_to(Cancelled));
        for terminal in MissionStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for next in MissionStatus::ALL {
                assert!(!terminal.can_transition_to(*next));
            }
        }
    }

    #[test]
    fn test_technician_update_targets() {
        use MissionStatus::*;
        let allowed: Vec<_> = MissionStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.is_technician_update())
            .collect();
        assert_eq!(allowed, vec![Processing, Done, Missed, Reported]);
    }

    #[test]
    fn test_status_json() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::NotAssigned).unwrap(),
            "\"NOT_ASSIGNED\""
        );
        let s: MissionStatus = serde_json::from_str("\"REPORTED\"").unwrap();
        assert_eq!(s, MissionStatus::Reported);
        assert_eq!(MissionStatus::NotAssigned.as_db(), "not_assigned");
    }
}
