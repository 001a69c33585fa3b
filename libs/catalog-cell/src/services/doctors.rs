use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_gateway::BackendClient;

use crate::models::{CatalogError, Doctor};

pub struct DoctorDirectoryService {
    gateway: Arc<BackendClient>,
}

impl DoctorDirectoryService {
    pub fn new(gateway: Arc<BackendClient>) -> Self {
        Self { gateway }
    }

    /// List active doctors attached to a medical service, for the doctor
    /// selection step.
    pub async fn doctors_for_service(
        &self,
        service_name: &str,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, CatalogError> {
        debug!("Listing doctors for service '{}'", service_name);

        let encoded = urlencoding::encode(service_name);
        let path = format!(
            "/rest/v1/doctors?service_name=eq.{}&is_active=eq.true&order=last_name.asc",
            encoded
        );

        let result: Vec<Value> = self.gateway.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        let doctors: Vec<Doctor> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Doctor>, _>>()
            .map_err(|e| CatalogError::DatabaseError(format!("Failed to parse doctors: {}", e)))?;

        Ok(doctors)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, CatalogError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.gateway.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(CatalogError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| CatalogError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }
}
