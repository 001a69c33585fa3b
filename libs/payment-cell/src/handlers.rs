// libs/payment-cell/src/handlers.rs
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

use crate::models::{PaymentError, RefundRequest};
use crate::services::RefundService;

#[derive(Debug, Deserialize)]
pub struct BankAccountQuery {
    pub patient_id: String,
}

fn map_payment_error(e: PaymentError) -> AppError {
    match e {
        PaymentError::BankAccountNotFound => {
            AppError::NotFound("Bank account not found".to_string())
        }
        PaymentError::RefundNotAllowed(msg) => AppError::BadRequest(msg),
        other => AppError::Internal(other.to_string()),
    }
}

fn require_admin(session: &SessionUser) -> Result<(), AppError> {
    if !session.is_admin() {
        return Err(AppError::Auth("Admin role required".to_string()));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn get_bank_account(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(session): Extension<SessionUser>,
    Query(query): Query<BankAccountQuery>,
) -> Result<Json<Value>, AppError> {
    require_admin(&session)?;

    let refunds = RefundService::new(Arc::new(BackendClient::new(&state)));
    let account = refunds.bank_account_for_patient(&query.patient_id, auth.token()).await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "bank_account": account
    })))
}

#[axum::debug_handler]
pub async fn mark_refunded(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(session): Extension<SessionUser>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&session)?;

    let refunds = RefundService::new(Arc::new(BackendClient::new(&state)));
    let record = refunds.mark_refunded(appointment_id, request.reason, auth.token()).await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "refund": record
    })))
}
