use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use catalog_cell::services::PriceLookupService;
use shared_gateway::BackendClient;

const DEFAULT_PRICE: f64 = 150_000.0;

fn service_under_test(server: &MockServer) -> PriceLookupService {
    let gateway = Arc::new(BackendClient::with_base_url(&server.uri()));
    PriceLookupService::new(gateway, DEFAULT_PRICE)
}

#[tokio::test]
async fn fee_uses_price_row_when_present() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/service_prices"))
        .and(query_param("service_name", "eq.Cardiology"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "7f0c2c5e-30a1-4f7e-9a93-111111111111",
            "service_name": "Cardiology",
            "amount": 250000.0
        }])))
        .mount(&server)
        .await;

    let pricing = service_under_test(&server);
    let fee = pricing.fee_for_service("Cardiology", "token").await.unwrap();

    assert_eq!(fee.amount, 250_000.0);
    assert!(!fee.is_default, "A priced service should not use the default");
}

#[tokio::test]
async fn fee_falls_back_to_default_when_no_price_row() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/service_prices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let pricing = service_under_test(&server);
    let fee = pricing.fee_for_service("Dermatology", "token").await.unwrap();

    assert_eq!(fee.amount, DEFAULT_PRICE);
    assert!(fee.is_default, "Missing price row should fall back to the default");
}

#[tokio::test]
async fn fee_lookup_surfaces_backend_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/service_prices"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let pricing = service_under_test(&server);
    let result = pricing.fee_for_service("Cardiology", "token").await;

    assert!(result.is_err(), "Backend failure must not silently price the visit");
}
