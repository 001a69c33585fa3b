// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::session_middleware;

use crate::handlers;
use crate::services::WizardService;

pub fn booking_routes(wizard: Arc<WizardService>) -> Router {
    let config = wizard.config();

    let protected_routes = Router::new()
        .route("/sessions", post(handlers::start_session))
        .route("/sessions/{session_id}", get(handlers::get_session))
        .route("/sessions/{session_id}/service", post(handlers::select_service))
        .route("/sessions/{session_id}/doctor", post(handlers::select_doctor))
        .route("/sessions/{session_id}/slot", post(handlers::select_slot))
        .route("/sessions/{session_id}/payment", post(handlers::enter_payment))
        .route("/sessions/{session_id}/back", post(handlers::step_back))
        .route("/sessions/{session_id}/cancel", post(handlers::cancel_session))
        .route("/cancelled", get(handlers::list_cancelled_appointments))
        .layer(middleware::from_fn_with_state(config, session_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(wizard)
}
