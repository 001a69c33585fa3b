// libs/catalog-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// MEDICAL SERVICE CATALOG MODELS
// ==============================================================================

/// A bookable medical service (disease type) in the clinic catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalService {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// One row of an admin bulk import. Parsing the uploaded file happens on the
/// admin frontend; the gateway receives rows already split into fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceImportRow {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: Vec<String>,
}

// ==============================================================================
// DOCTOR DIRECTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub service_name: String,
    pub is_active: bool,
    pub avatar_url: Option<String>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ==============================================================================
// PRICING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePrice {
    pub id: Uuid,
    pub service_name: String,
    pub amount: f64,
}

/// A resolved consultation fee, tagging whether the configured default was
/// used because no price row exists for the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedFee {
    pub service_name: String,
    pub amount: f64,
    pub is_default: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Service not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
