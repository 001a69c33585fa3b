// libs/schedule-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// WORK SCHEDULE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkScheduleStatus {
    Active,
    Inactive,
}

/// One bookable schedule row: a doctor attached to a shift on a date. The
/// backend may hold several rows for the same doctor/shift/date (one per
/// bookable seat).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkScheduleRow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub shift_id: Uuid,
    pub shift_label: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub date: NaiveDate,
    pub status: WorkScheduleStatus,
}

/// A named time-of-day interval. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRef {
    pub id: Uuid,
    pub label: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A shift with the schedule rows that back it, after grouping rows that
/// share the same shift identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftAvailability {
    pub shift: ShiftRef,
    pub work_schedule_ids: Vec<Uuid>,
    pub remaining: usize,
}

impl ShiftAvailability {
    /// Schedule row a selection of this shift books against.
    pub fn first_schedule_id(&self) -> Option<Uuid> {
        self.work_schedule_ids.first().copied()
    }
}

/// Shift as rendered in the slot picker: availability plus whether it may be
/// selected right now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectableShift {
    #[serde(flatten)]
    pub availability: ShiftAvailability,
    pub selectable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub has_open_shift: bool,
}

// ==============================================================================
// CONFLICT CHECK MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingAppointment {
    pub id: Uuid,
    pub patient_id: String,
    pub work_schedule_id: Uuid,
    pub status: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("Patient already holds an appointment in this slot")]
    SlotConflict,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
