use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_gateway::BackendClient;

use crate::models::{ExistingAppointment, ScheduleError};

/// Checks whether the patient already holds an appointment against a work
/// schedule before a selection is recorded.
pub struct SlotConflictService {
    gateway: Arc<BackendClient>,
}

impl SlotConflictService {
    pub fn new(gateway: Arc<BackendClient>) -> Self {
        Self { gateway }
    }

    pub async fn patient_holds_appointment(
        &self,
        patient_id: &str,
        work_schedule_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, ScheduleError> {
        debug!(
            "Checking existing appointments for patient {} on work schedule {}",
            patient_id, work_schedule_id
        );

        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&work_schedule_id=eq.{}&status=in.(pending,confirmed)",
            patient_id, work_schedule_id
        );

        let result: Vec<Value> = self.gateway.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let existing: Vec<ExistingAppointment> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<ExistingAppointment>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        Ok(!existing.is_empty())
    }

    /// Fails with SlotConflict when the patient already booked this slot.
    pub async fn ensure_slot_free(
        &self,
        patient_id: &str,
        work_schedule_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        if self.patient_holds_appointment(patient_id, work_schedule_id, auth_token).await? {
            warn!(
                "Patient {} already holds an appointment on work schedule {}",
                patient_id, work_schedule_id
            );
            return Err(ScheduleError::SlotConflict);
        }
        Ok(())
    }
}
