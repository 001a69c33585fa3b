use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};

use booking_cell::router::booking_routes;
use booking_cell::WizardService;
use catalog_cell::router::catalog_routes;
use payment_cell::router::payment_routes;
use schedule_cell::router::schedule_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>, wizard: Arc<WizardService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking gateway is running!" }))
        .nest("/catalog", catalog_routes(state.clone()))
        .nest("/schedule", schedule_routes(state.clone()))
        .nest("/booking", booking_routes(wizard))
        .nest("/payments", payment_routes(state))
}
