// libs/catalog-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_gateway::BackendClient;
use shared_models::auth::SessionUser;
use shared_models::error::AppError;

use crate::models::{
    CatalogError, CreateServiceRequest, ServiceImportRow, UpdateServiceRequest,
};
use crate::services::{CatalogService, DoctorDirectoryService, PriceLookupService};

#[derive(Debug, Deserialize)]
pub struct ServiceNameQuery {
    pub service: String,
}

fn map_catalog_error(e: CatalogError) -> AppError {
    match e {
        CatalogError::NotFound => AppError::NotFound("Service not found".to_string()),
        CatalogError::ValidationError(msg) => AppError::ValidationError(msg),
        CatalogError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

fn require_admin(session: &SessionUser) -> Result<(), AppError> {
    if !session.is_admin() {
        return Err(AppError::Auth("Admin role required".to_string()));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn list_services(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let catalog = CatalogService::new(Arc::new(BackendClient::new(&state)));

    let services = catalog.list_services(auth.token()).await
        .map_err(map_catalog_error)?;

    Ok(Json(json!({
        "success": true,
        "services": services
    })))
}

#[axum::debug_handler]
pub async fn create_service(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(session): Extension<SessionUser>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&session)?;

    let catalog = CatalogService::new(Arc::new(BackendClient::new(&state)));
    let service = catalog.create_service(request, auth.token()).await
        .map_err(map_catalog_error)?;

    Ok(Json(json!({
        "success": true,
        "service": service
    })))
}

#[axum::debug_handler]
pub async fn update_service(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(session): Extension<SessionUser>,
    Path(service_id): Path<Uuid>,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&session)?;

    let catalog = CatalogService::new(Arc::new(BackendClient::new(&state)));
    let service = catalog.update_service(service_id, request, auth.token()).await
        .map_err(map_catalog_error)?;

    Ok(Json(json!({
        "success": true,
        "service": service
    })))
}

#[axum::debug_handler]
pub async fn deactivate_service(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(session): Extension<SessionUser>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&session)?;

    let catalog = CatalogService::new(Arc::new(BackendClient::new(&state)));
    let service = catalog.deactivate_service(service_id, auth.token()).await
        .map_err(map_catalog_error)?;

    Ok(Json(json!({
        "success": true,
        "service": service
    })))
}

#[axum::debug_handler]
pub async fn import_services(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(session): Extension<SessionUser>,
    Json(rows): Json<Vec<ServiceImportRow>>,
) -> Result<Json<Value>, AppError> {
    require_admin(&session)?;

    let catalog = CatalogService::new(Arc::new(BackendClient::new(&state)));
    let outcome = catalog.import_services(rows, auth.token()).await
        .map_err(map_catalog_error)?;

    Ok(Json(json!({
        "success": true,
        "imported": outcome.imported,
        "skipped": outcome.skipped
    })))
}

#[axum::debug_handler]
pub async fn list_doctors_for_service(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ServiceNameQuery>,
) -> Result<Json<Value>, AppError> {
    let directory = DoctorDirectoryService::new(Arc::new(BackendClient::new(&state)));

    let doctors = directory.doctors_for_service(&query.service, auth.token()).await
        .map_err(map_catalog_error)?;

    Ok(Json(json!({
        "success": true,
        "doctors": doctors
    })))
}

#[axum::debug_handler]
pub async fn get_service_fee(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ServiceNameQuery>,
) -> Result<Json<Value>, AppError> {
    let pricing = PriceLookupService::new(
        Arc::new(BackendClient::new(&state)),
        state.default_appointment_price,
    );

    let fee = pricing.fee_for_service(&query.service, auth.token()).await
        .map_err(map_catalog_error)?;

    Ok(Json(json!({
        "success": true,
        "fee": fee
    })))
}
