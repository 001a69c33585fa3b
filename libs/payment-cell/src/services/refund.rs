use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_gateway::BackendClient;

use crate::models::{BankAccount, PaymentError, RefundRecord};

/// Admin-side reversal of a cancelled, already-paid appointment.
pub struct RefundService {
    gateway: Arc<BackendClient>,
}

impl RefundService {
    pub fn new(gateway: Arc<BackendClient>) -> Self {
        Self { gateway }
    }

    /// Bank account the refund should be transferred to.
    pub async fn bank_account_for_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<BankAccount, PaymentError> {
        debug!("Fetching bank account for patient {}", patient_id);

        let path = format!("/rest/v1/bank_accounts?patient_id=eq.{}", patient_id);
        let result: Vec<Value> = self.gateway.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PaymentError::BankAccountNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| PaymentError::DatabaseError(format!("Failed to parse bank account: {}", e)))
    }

    /// Mark a cancelled, paid, not-yet-refunded appointment as refunded.
    pub async fn mark_refunded(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<RefundRecord, PaymentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.gateway.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PaymentError::RefundNotAllowed("Appointment not found".to_string()));
        }

        let appointment = &result[0];

        if appointment["status"].as_str() != Some("cancelled") {
            return Err(PaymentError::RefundNotAllowed(
                "Only cancelled appointments can be refunded".to_string(),
            ));
        }
        if !appointment["is_paid"].as_bool().unwrap_or(false) {
            return Err(PaymentError::RefundNotAllowed(
                "Appointment was never paid".to_string(),
            ));
        }
        if appointment["refunded"].as_bool().unwrap_or(false) {
            return Err(PaymentError::RefundNotAllowed(
                "Appointment is already refunded".to_string(),
            ));
        }

        let refunded_at = Utc::now();
        let update_data = json!({
            "refunded": true,
            "refunded_at": refunded_at.to_rfc3339(),
            "refund_note": reason,
            "updated_at": refunded_at.to_rfc3339()
        });

        let _: Vec<Value> = self.gateway.request(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update_data),
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        info!("Appointment {} marked as refunded", appointment_id);

        Ok(RefundRecord {
            appointment_id,
            refunded_at,
            reason,
        })
    }
}
