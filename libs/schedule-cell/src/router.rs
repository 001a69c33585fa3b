// libs/schedule-cell/src/router.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::session_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/doctors/{doctor_id}/shifts", get(handlers::get_shifts_for_date))
        .route("/doctors/{doctor_id}/days", get(handlers::get_bookable_days))
        .route("/conflicts/check", get(handlers::check_slot_conflict))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
