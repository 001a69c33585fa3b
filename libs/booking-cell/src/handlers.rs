// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::SessionUser;
use shared_models::error::AppError;

use crate::models::{
    BookingError, SelectDoctorRequest, SelectServiceRequest, SelectSlotRequest,
};
use crate::services::WizardService;

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::SessionNotFound => AppError::NotFound("Booking session not found".to_string()),
        BookingError::Unauthorized => {
            AppError::Auth("Not authorized to access this booking session".to_string())
        }
        BookingError::InvalidTransition { .. } => AppError::BadRequest(e.to_string()),
        BookingError::IncompleteSelection(_) => AppError::BadRequest(e.to_string()),
        BookingError::SlotConflict => AppError::Conflict(e.to_string()),
        BookingError::SlotNotAvailable => AppError::BadRequest(e.to_string()),
        BookingError::ValidationError(msg) => AppError::ValidationError(msg),
        BookingError::PaymentError(msg) => AppError::Upstream(msg),
        BookingError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn start_session(
    State(wizard): State<Arc<WizardService>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Value>, AppError> {
    let session = wizard.start_session(user).await;

    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

#[axum::debug_handler]
pub async fn get_session(
    State(wizard): State<Arc<WizardService>>,
    Extension(user): Extension<SessionUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let (session, payment) = wizard.get_session(session_id, &user).await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "session": session,
        "payment": payment
    })))
}

#[axum::debug_handler]
pub async fn select_service(
    State(wizard): State<Arc<WizardService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<SessionUser>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SelectServiceRequest>,
) -> Result<Json<Value>, AppError> {
    let session = wizard.select_service(session_id, request, &user, auth.token()).await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

#[axum::debug_handler]
pub async fn select_doctor(
    State(wizard): State<Arc<WizardService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<SessionUser>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SelectDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let session = wizard.select_doctor(session_id, request, &user, auth.token()).await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

#[axum::debug_handler]
pub async fn select_slot(
    State(wizard): State<Arc<WizardService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<SessionUser>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SelectSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let session = wizard.select_slot(session_id, request, &user, auth.token()).await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

#[axum::debug_handler]
pub async fn enter_payment(
    State(wizard): State<Arc<WizardService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<SessionUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let (session, payment) = wizard.enter_payment(session_id, &user, auth.token()).await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "session": session,
        "payment": payment
    })))
}

#[axum::debug_handler]
pub async fn step_back(
    State(wizard): State<Arc<WizardService>>,
    Extension(user): Extension<SessionUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let session = wizard.back(session_id, &user).await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

#[axum::debug_handler]
pub async fn cancel_session(
    State(wizard): State<Arc<WizardService>>,
    Extension(user): Extension<SessionUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let session = wizard.cancel(session_id, &user).await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "session": session
    })))
}

/// Cancelled appointments for the refund screen. Admin only.
#[axum::debug_handler]
pub async fn list_cancelled_appointments(
    State(wizard): State<Arc<WizardService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Admin role required".to_string()));
    }

    let appointments = wizard.appointments().list_cancelled(auth.token()).await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}
