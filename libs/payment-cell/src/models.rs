// libs/payment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// PAYMENT SESSION MODELS
// ==============================================================================

/// Derive the bank-transfer reconciliation code for a booking attempt.
/// Deterministic so the payment verifier can match a transfer to exactly one
/// attempt: the same inputs always yield the same code.
pub fn transaction_code(work_schedule_id: Uuid, patient_id: &str) -> String {
    let sanitized: String = patient_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    format!("{}{}", work_schedule_id.simple(), sanitized)
}

/// Lives for the duration of one payment step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub transaction_code: String,
    pub amount_due: f64,
    pub confirmed: bool,
}

/// Everything the transfer screen needs to render the QR code and reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub amount_due: f64,
    pub transaction_code: String,
    pub bank_account_number: String,
    pub bank_code: String,
    pub is_default_price: bool,
}

/// Where a checkout currently stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    AwaitingTransfer,
    Verifying,
    Confirmed,
    Failed(String),
}

// ==============================================================================
// CHANNEL MESSAGE MODELS
// ==============================================================================

/// Push notification from the payment verifier on the patient-scoped result
/// topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotice {
    pub transaction_content: String,
    pub amount_in: f64,
    pub token: Option<String>,
}

/// Heartbeat published to the check topic while a checkout is active. The
/// verifier uses it to poll for transfers whose push delivery was missed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCheck {
    pub amount_in: f64,
    pub transaction_content: String,
}

// ==============================================================================
// REFUND MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: Uuid,
    pub patient_id: String,
    pub account_number: String,
    pub bank_code: String,
    pub account_holder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRecord {
    pub appointment_id: Uuid,
    pub refunded_at: DateTime<Utc>,
    pub reason: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Fee lookup failed: {0}")]
    FeeLookupFailed(String),

    #[error("Payment channel error: {0}")]
    ChannelError(String),

    #[error("Appointment creation failed: {0}")]
    CompletionFailed(String),

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Refund not allowed: {0}")]
    RefundNotAllowed(String),

    #[error("Bank account not found")]
    BankAccountNotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_code_is_deterministic() {
        let ws = Uuid::new_v4();
        let first = transaction_code(ws, "patient-42");
        let second = transaction_code(ws, "patient-42");
        assert_eq!(first, second);
    }

    #[test]
    fn transaction_code_strips_non_alphanumerics_from_patient_id() {
        let ws = Uuid::new_v4();
        let code = transaction_code(ws, "pa-ti_ent.42");
        assert_eq!(code, format!("{}patient42", ws.simple()));
    }

    #[test]
    fn transaction_code_differs_when_either_input_changes() {
        let ws_a = Uuid::new_v4();
        let ws_b = Uuid::new_v4();
        let base = transaction_code(ws_a, "patient-1");

        assert_ne!(base, transaction_code(ws_b, "patient-1"));
        assert_ne!(base, transaction_code(ws_a, "patient-2"));
    }
}
