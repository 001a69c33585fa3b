use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::models::ScheduleError;
use schedule_cell::services::SlotConflictService;
use shared_gateway::BackendClient;

fn service_under_test(server: &MockServer) -> SlotConflictService {
    SlotConflictService::new(Arc::new(BackendClient::with_base_url(&server.uri())))
}

#[tokio::test]
async fn existing_appointment_blocks_the_slot() {
    let server = MockServer::start().await;
    let work_schedule_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("work_schedule_id", format!("eq.{}", work_schedule_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": "patient-1",
            "work_schedule_id": work_schedule_id,
            "status": "confirmed"
        }])))
        .mount(&server)
        .await;

    let conflicts = service_under_test(&server);

    let holds = conflicts
        .patient_holds_appointment("patient-1", work_schedule_id, "token")
        .await
        .unwrap();
    assert!(holds, "An existing appointment must be reported as a conflict");

    let result = conflicts
        .ensure_slot_free("patient-1", work_schedule_id, "token")
        .await;
    assert_matches!(result, Err(ScheduleError::SlotConflict));
}

#[tokio::test]
async fn free_slot_passes_the_check() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let conflicts = service_under_test(&server);

    let result = conflicts
        .ensure_slot_free("patient-1", Uuid::new_v4(), "token")
        .await;
    assert!(result.is_ok(), "A free slot should pass the conflict check");
}

#[tokio::test]
async fn backend_failure_is_not_treated_as_free() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let conflicts = service_under_test(&server);

    let result = conflicts
        .ensure_slot_free("patient-1", Uuid::new_v4(), "token")
        .await;
    assert_matches!(result, Err(ScheduleError::DatabaseError(_)));
}
