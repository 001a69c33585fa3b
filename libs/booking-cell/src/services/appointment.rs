use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_gateway::BackendClient;
use shared_models::auth::SessionUser;

use crate::models::{BookingError, BookingSelection, CancelledAppointment, CreatedAppointment};

#[derive(Clone)]
pub struct AppointmentCreationService {
    gateway: Arc<BackendClient>,
}

impl AppointmentCreationService {
    pub fn new(gateway: Arc<BackendClient>) -> Self {
        Self { gateway }
    }

    /// Create the appointment record after a verified payment. Called once
    /// per confirmed payment signal; the transaction code makes the write
    /// idempotent on the backend.
    pub async fn create_appointment(
        &self,
        patient: &SessionUser,
        selection: &BookingSelection,
        transaction_code: &str,
        auth_token: &str,
    ) -> Result<CreatedAppointment, BookingError> {
        let service = selection.service.as_ref()
            .ok_or_else(|| BookingError::IncompleteSelection("service".to_string()))?;
        let doctor = selection.doctor.as_ref()
            .ok_or_else(|| BookingError::IncompleteSelection("doctor".to_string()))?;
        let date = selection.date
            .ok_or_else(|| BookingError::IncompleteSelection("date".to_string()))?;
        let shift = selection.shift.as_ref()
            .ok_or_else(|| BookingError::IncompleteSelection("shift".to_string()))?;
        let work_schedule_id = selection.work_schedule_id
            .ok_or_else(|| BookingError::IncompleteSelection("work schedule".to_string()))?;

        let now = Utc::now();
        let appointment_data = json!({
            "patient_id": patient.id,
            "doctor_id": doctor.id,
            "work_schedule_id": work_schedule_id,
            "date": date,
            "shift_start": shift.start.format("%H:%M:%S").to_string(),
            "shift_end": shift.end.format("%H:%M:%S").to_string(),
            "service_name": service.name,
            "note": selection.note,
            "status": "confirmed",
            "is_paid": true,
            "transaction_code": transaction_code,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.gateway.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(auth_token),
            Some(appointment_data),
            Some(headers),
        ).await.map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::DatabaseError("Failed to create appointment".to_string()));
        }

        let appointment: CreatedAppointment = serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse created appointment: {}", e)))?;

        info!("Appointment {} created for patient {}", appointment.id, patient.id);
        Ok(appointment)
    }

    /// Cancelled appointments for the admin refund screen, most recent first.
    pub async fn list_cancelled(&self, auth_token: &str) -> Result<Vec<CancelledAppointment>, BookingError> {
        debug!("Listing cancelled appointments");

        let path = "/rest/v1/appointments?status=eq.cancelled&order=updated_at.desc";
        let result: Vec<Value> = self.gateway.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await.map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<CancelledAppointment>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }
}
