use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use chrono::Utc;
use shared_gateway::BackendClient;

use crate::models::{
    CatalogError, CreateServiceRequest, ImportOutcome, MedicalService, ServiceImportRow,
    UpdateServiceRequest,
};

pub struct CatalogService {
    gateway: Arc<BackendClient>,
}

impl CatalogService {
    pub fn new(gateway: Arc<BackendClient>) -> Self {
        Self { gateway }
    }

    /// List active services, ordered by name for the selection screen.
    pub async fn list_services(&self, auth_token: &str) -> Result<Vec<MedicalService>, CatalogError> {
        debug!("Listing active medical services");

        let path = "/rest/v1/medical_services?is_active=eq.true&order=name.asc";
        let result: Vec<Value> = self.gateway.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await.map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        let services: Vec<MedicalService> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<MedicalService>, _>>()
            .map_err(|e| CatalogError::DatabaseError(format!("Failed to parse services: {}", e)))?;

        Ok(services)
    }

    pub async fn get_service(&self, service_id: Uuid, auth_token: &str) -> Result<MedicalService, CatalogError> {
        let path = format!("/rest/v1/medical_services?id=eq.{}", service_id);
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
            .map_err(|e| CatalogError::DatabaseError(format!("Failed to parse service: {}", e)))
    }

    pub async fn create_service(
        &self,
        request: CreateServiceRequest,
        auth_token: &str,
    ) -> Result<MedicalService, CatalogError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(CatalogError::ValidationError("Service name must not be empty".to_string()));
        }

        let now = Utc::now();
        let service_data = json!({
            "name": name,
            "description": request.description,
            "is_active": true,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.gateway.request_with_headers(
            Method::POST,
            "/rest/v1/medical_services",
            Some(auth_token),
            Some(service_data),
            Some(headers),
        ).await.map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(CatalogError::DatabaseError("Failed to create service".to_string()));
        }

        let service: MedicalService = serde_json::from_value(result[0].clone())
            .map_err(|e| CatalogError::DatabaseError(format!("Failed to parse created service: {}", e)))?;

        info!("Medical service {} created", service.id);
        Ok(service)
    }

    pub async fn update_service(
        &self,
        service_id: Uuid,
        request: UpdateServiceRequest,
        auth_token: &str,
    ) -> Result<MedicalService, CatalogError> {
        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(CatalogError::ValidationError("Service name must not be empty".to_string()));
            }
            update_data.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(description) = request.description {
            update_data.insert("description".to_string(), json!(description));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/medical_services?id=eq.{}", service_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.gateway.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(headers),
        ).await.map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(CatalogError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| CatalogError::DatabaseError(format!("Failed to parse updated service: {}", e)))
    }

    /// Soft-delete: the catalog keeps the row so historic appointments still
    /// resolve their service name.
    pub async fn deactivate_service(&self, service_id: Uuid, auth_token: &str) -> Result<MedicalService, CatalogError> {
        self.update_service(
            service_id,
            UpdateServiceRequest {
                name: None,
                description: None,
                is_active: Some(false),
            },
            auth_token,
        ).await
    }

    /// Bulk import of catalog rows. Rows whose name already exists (case
    /// insensitive) are skipped rather than duplicated.
    pub async fn import_services(
        &self,
        rows: Vec<ServiceImportRow>,
        auth_token: &str,
    ) -> Result<ImportOutcome, CatalogError> {
        debug!("Importing {} catalog rows", rows.len());

        let existing = self.list_services(auth_token).await?;
        let existing_names: Vec<String> = existing.iter()
            .map(|s| s.name.to_lowercase())
            .collect();

        let mut imported = 0;
        let mut skipped = Vec::new();

        for row in rows {
            let name = row.name.trim().to_string();
            if name.is_empty() {
                skipped.push(row.name);
                continue;
            }
            if existing_names.contains(&name.to_lowercase()) {
                warn!("Skipping import of duplicate service '{}'", name);
                skipped.push(name);
                continue;
            }

            self.create_service(
                CreateServiceRequest {
                    name,
                    description: row.description,
                },
                auth_token,
            ).await?;
            imported += 1;
        }

        info!("Catalog import finished: {} imported, {} skipped", imported, skipped.len());
        Ok(ImportOutcome { imported, skipped })
    }
}
