// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use schedule_cell::models::ShiftRef;
use shared_models::auth::SessionUser;

// ==============================================================================
// WIZARD STATE MACHINE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    SelectingService,
    SelectingDoctor,
    SelectingDateTime,
    AwaitingPayment,
    Confirmed,
    Cancelled,
}

impl BookingStep {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStep::Confirmed | BookingStep::Cancelled)
    }

    /// Legal forward/back/cancel edges of the wizard.
    pub fn can_transition_to(&self, target: &BookingStep) -> bool {
        use BookingStep::*;
        match (self, target) {
            (SelectingService, SelectingDoctor) => true,
            (SelectingDoctor, SelectingDateTime) => true,
            (SelectingDateTime, AwaitingPayment) => true,
            (AwaitingPayment, Confirmed) => true,
            // Back edges: any step except the first and the terminal ones.
            (SelectingDoctor, SelectingService) => true,
            (SelectingDateTime, SelectingDoctor) => true,
            (AwaitingPayment, SelectingDateTime) => true,
            (_, Cancelled) => !self.is_terminal(),
            _ => false,
        }
    }

    pub fn back_target(&self) -> Option<BookingStep> {
        use BookingStep::*;
        match self {
            SelectingDoctor => Some(SelectingService),
            SelectingDateTime => Some(SelectingDoctor),
            AwaitingPayment => Some(SelectingDateTime),
            _ => None,
        }
    }
}

impl fmt::Display for BookingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStep::SelectingService => write!(f, "selecting_service"),
            BookingStep::SelectingDoctor => write!(f, "selecting_doctor"),
            BookingStep::SelectingDateTime => write!(f, "selecting_date_time"),
            BookingStep::AwaitingPayment => write!(f, "awaiting_payment"),
            BookingStep::Confirmed => write!(f, "confirmed"),
            BookingStep::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// SELECTION MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorRef {
    pub id: Uuid,
    pub full_name: String,
    pub service_name: String,
}

/// Everything accumulated across the wizard. Validated at each transition
/// boundary instead of being passed around as loose blobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingSelection {
    pub service: Option<ServiceRef>,
    pub doctor: Option<DoctorRef>,
    pub date: Option<NaiveDate>,
    pub shift: Option<ShiftRef>,
    pub work_schedule_id: Option<Uuid>,
    pub note: String,
}

impl BookingSelection {
    pub fn clear(&mut self) {
        *self = BookingSelection::default();
    }

    pub fn has_slot(&self) -> bool {
        self.date.is_some() && self.shift.is_some() && self.work_schedule_id.is_some()
    }

    /// The payment step may only be entered with a full selection.
    pub fn is_ready_for_payment(&self) -> bool {
        self.service.is_some() && self.doctor.is_some() && self.has_slot()
    }
}

/// Shown on the confirmation screen once the appointment exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub appointment_id: Uuid,
    pub service_name: String,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub shift_label: String,
    pub transaction_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardSession {
    pub id: Uuid,
    pub patient: SessionUser,
    pub step: BookingStep,
    pub selection: BookingSelection,
    pub confirmation: Option<BookingConfirmation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectServiceRequest {
    pub service_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectDoctorRequest {
    pub doctor_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectSlotRequest {
    pub date: NaiveDate,
    pub work_schedule_id: Uuid,
    pub note: Option<String>,
}

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedAppointment {
    pub id: Uuid,
    pub patient_id: String,
    pub doctor_id: Uuid,
    pub work_schedule_id: Uuid,
    pub date: NaiveDate,
    pub service_name: String,
    pub status: String,
    pub transaction_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledAppointment {
    pub id: Uuid,
    pub patient_id: String,
    pub service_name: String,
    pub date: NaiveDate,
    pub is_paid: bool,
    pub refunded: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking session not found")]
    SessionNotFound,

    #[error("Unauthorized access to booking session")]
    Unauthorized,

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: BookingStep, to: BookingStep },

    #[error("Selection is incomplete: {0}")]
    IncompleteSelection(String),

    #[error("You already have an appointment in this slot")]
    SlotConflict,

    #[error("Selected slot is no longer available")]
    SlotNotAvailable,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payment error: {0}")]
    PaymentError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_edges_are_sequential() {
        use BookingStep::*;
        assert!(SelectingService.can_transition_to(&SelectingDoctor));
        assert!(SelectingDoctor.can_transition_to(&SelectingDateTime));
        assert!(SelectingDateTime.can_transition_to(&AwaitingPayment));
        assert!(AwaitingPayment.can_transition_to(&Confirmed));

        assert!(!SelectingService.can_transition_to(&SelectingDateTime));
        assert!(!SelectingService.can_transition_to(&AwaitingPayment));
        assert!(!SelectingDoctor.can_transition_to(&Confirmed));
    }

    #[test]
    fn first_and_terminal_steps_have_no_back_edge() {
        use BookingStep::*;
        assert_eq!(SelectingService.back_target(), None);
        assert_eq!(Confirmed.back_target(), None);
        assert_eq!(Cancelled.back_target(), None);
        assert_eq!(AwaitingPayment.back_target(), Some(SelectingDateTime));
    }

    #[test]
    fn terminal_steps_cannot_be_cancelled() {
        use BookingStep::*;
        assert!(SelectingService.can_transition_to(&Cancelled));
        assert!(AwaitingPayment.can_transition_to(&Cancelled));
        assert!(!Confirmed.can_transition_to(&Cancelled));
        assert!(!Cancelled.can_transition_to(&Cancelled));
    }

    #[test]
    fn selection_readiness_requires_every_field() {
        let mut selection = BookingSelection::default();
        assert!(!selection.is_ready_for_payment());

        selection.service = Some(ServiceRef { id: Uuid::new_v4(), name: "Cardiology".to_string() });
        selection.doctor = Some(DoctorRef {
            id: Uuid::new_v4(),
            full_name: "Dr. Binh Tran".to_string(),
            service_name: "Cardiology".to_string(),
        });
        assert!(!selection.is_ready_for_payment());

        selection.date = NaiveDate::from_ymd_opt(2025, 6, 16);
        selection.shift = Some(ShiftRef {
            id: Uuid::new_v4(),
            label: "08:00-12:00".to_string(),
            start: chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        });
        assert!(!selection.is_ready_for_payment());

        selection.work_schedule_id = Some(Uuid::new_v4());
        assert!(selection.is_ready_for_payment());
    }
}
