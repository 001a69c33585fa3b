// libs/catalog-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::session_middleware;

use crate::handlers;

pub fn catalog_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/services", get(handlers::list_services))
        .route("/services", post(handlers::create_service))
        .route("/services/{service_id}", patch(handlers::update_service))
        .route("/services/{service_id}/deactivate", post(handlers::deactivate_service))
        .route("/services/import", post(handlers::import_services))
        .route("/doctors", get(handlers::list_doctors_for_service))
        .route("/fees", get(handlers::get_service_fee))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
