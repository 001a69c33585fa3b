use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use tokio::time::{sleep, Duration};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::models::{
    BookingError, BookingStep, SelectDoctorRequest, SelectServiceRequest, SelectSlotRequest,
};
use booking_cell::services::WizardService;
use payment_cell::models::PaymentNotice;
use payment_cell::services::LoopbackPaymentChannel;
use shared_gateway::BackendClient;
use shared_models::auth::SessionUser;
use shared_utils::test_utils::{TestConfig, TestUser};

const VERIFICATION_TOKEN: &str = "test-verification-token";
const DEFAULT_PRICE: f64 = 150_000.0;

struct Harness {
    server: MockServer,
    wizard: Arc<WizardService>,
    channel: Arc<LoopbackPaymentChannel>,
    patient: SessionUser,
    service_id: Uuid,
    doctor_id: Uuid,
    work_schedule_id: Uuid,
}

impl Harness {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let channel = LoopbackPaymentChannel::new();
        let gateway = Arc::new(BackendClient::with_base_url(&server.uri()));
        let config = TestConfig::default().to_arc();

        let wizard = Arc::new(WizardService::with_parts(config, gateway, channel.clone()));

        Self {
            server,
            wizard,
            channel,
            patient: TestUser::patient("pat@example.com").to_session(),
            service_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            work_schedule_id: Uuid::new_v4(),
        }
    }

    async fn mount_catalog_mocks(&self) {
        let now = Utc::now();

        Mock::given(method("GET"))
            .and(path("/rest/v1/medical_services"))
            .and(query_param("id", format!("eq.{}", self.service_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": self.service_id,
                "name": "Cardiology",
                "description": "Heart and vascular consultations",
                "is_active": true,
                "created_at": now.to_rfc3339(),
                "updated_at": now.to_rfc3339()
            }])))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/doctors"))
            .and(query_param("id", format!("eq.{}", self.doctor_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": self.doctor_id,
                "first_name": "Binh",
                "last_name": "Tran",
                "service_name": "Cardiology",
                "is_active": true
            }])))
            .mount(&self.server)
            .await;
    }

    async fn mount_schedule_mocks(&self, conflict: bool) {
        let tomorrow = Utc::now().date_naive() + ChronoDuration::days(1);

        Mock::given(method("GET"))
            .and(path("/rest/v1/work_schedules"))
            .and(query_param("doctor_id", format!("eq.{}", self.doctor_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": self.work_schedule_id,
                "doctor_id": self.doctor_id,
                "shift_id": "a8098c1a-f86e-11da-bd1a-00112444be1e",
                "shift_label": "08:00-12:00",
                "start_time": "08:00:00",
                "end_time": "12:00:00",
                "date": tomorrow,
                "status": "active"
            }])))
            .mount(&self.server)
            .await;

        let existing = if conflict {
            json!([{
                "id": Uuid::new_v4(),
                "patient_id": self.patient.id,
                "work_schedule_id": self.work_schedule_id,
                "status": "confirmed"
            }])
        } else {
            json!([])
        };

        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("work_schedule_id", format!("eq.{}", self.work_schedule_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(existing))
            .mount(&self.server)
            .await;
    }

    async fn mount_payment_mocks(&self) {
        // No price row for Cardiology: the default appointment price applies.
        Mock::given(method("GET"))
            .and(path("/rest/v1/service_prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&self.server)
            .await;
    }

    /// Drive a fresh session up to a recorded slot selection.
    async fn session_with_slot(&self) -> Uuid {
        let session = self.wizard.start_session(self.patient.clone()).await;
        let tomorrow = Utc::now().date_naive() + ChronoDuration::days(1);

        self.wizard
            .select_service(
                session.id,
                SelectServiceRequest { service_id: self.service_id },
                &self.patient,
                "token",
            )
            .await
            .expect("service selection should succeed");

        self.wizard
            .select_doctor(
                session.id,
                SelectDoctorRequest { doctor_id: self.doctor_id },
                &self.patient,
                "token",
            )
            .await
            .expect("doctor selection should succeed");

        self.wizard
            .select_slot(
                session.id,
                SelectSlotRequest {
                    date: tomorrow,
                    work_schedule_id: self.work_schedule_id,
                    note: None,
                },
                &self.patient,
                "token",
            )
            .await
            .expect("slot selection should succeed");

        session.id
    }
}

#[tokio::test]
async fn payment_step_is_unreachable_without_a_complete_selection() {
    let harness = Harness::new().await;
    harness.mount_catalog_mocks().await;

    // Straight from the first step.
    let session = harness.wizard.start_session(harness.patient.clone()).await;
    let result = harness.wizard.enter_payment(session.id, &harness.patient, "token").await;
    assert_matches!(result, Err(BookingError::InvalidTransition { .. }));

    // With service and doctor but no slot.
    harness.wizard
        .select_service(session.id, SelectServiceRequest { service_id: harness.service_id }, &harness.patient, "token")
        .await
        .unwrap();
    harness.wizard
        .select_doctor(session.id, SelectDoctorRequest { doctor_id: harness.doctor_id }, &harness.patient, "token")
        .await
        .unwrap();

    let result = harness.wizard.enter_payment(session.id, &harness.patient, "token").await;
    assert_matches!(result, Err(BookingError::IncompleteSelection(_)));

    let (session, payment) = harness.wizard.get_session(session.id, &harness.patient).await.unwrap();
    assert_eq!(session.step, BookingStep::SelectingDateTime);
    assert!(payment.is_none(), "No checkout may exist before the payment step");
}

#[tokio::test]
async fn steps_cannot_be_skipped() {
    let harness = Harness::new().await;
    let session = harness.wizard.start_session(harness.patient.clone()).await;

    let result = harness.wizard
        .select_doctor(session.id, SelectDoctorRequest { doctor_id: harness.doctor_id }, &harness.patient, "token")
        .await;
    assert_matches!(result, Err(BookingError::InvalidTransition { .. }));

    let tomorrow = Utc::now().date_naive() + ChronoDuration::days(1);
    let result = harness.wizard
        .select_slot(
            session.id,
            SelectSlotRequest {
                date: tomorrow,
                work_schedule_id: harness.work_schedule_id,
                note: None,
            },
            &harness.patient,
            "token",
        )
        .await;
    assert_matches!(result, Err(BookingError::InvalidTransition { .. }));
}

#[tokio::test]
async fn conflicting_slot_is_blocked_and_not_recorded() {
    let harness = Harness::new().await;
    harness.mount_catalog_mocks().await;
    harness.mount_schedule_mocks(true).await;

    let session = harness.wizard.start_session(harness.patient.clone()).await;
    harness.wizard
        .select_service(session.id, SelectServiceRequest { service_id: harness.service_id }, &harness.patient, "token")
        .await
        .unwrap();
    harness.wizard
        .select_doctor(session.id, SelectDoctorRequest { doctor_id: harness.doctor_id }, &harness.patient, "token")
        .await
        .unwrap();

    let tomorrow = Utc::now().date_naive() + ChronoDuration::days(1);
    let result = harness.wizard
        .select_slot(
            session.id,
            SelectSlotRequest {
                date: tomorrow,
                work_schedule_id: harness.work_schedule_id,
                note: None,
            },
            &harness.patient,
            "token",
        )
        .await;
    assert_matches!(result, Err(BookingError::SlotConflict));

    let (session, _) = harness.wizard.get_session(session.id, &harness.patient).await.unwrap();
    assert_eq!(session.step, BookingStep::SelectingDateTime);
    assert!(session.selection.work_schedule_id.is_none(), "A blocked slot must not be recorded");
    assert!(session.selection.shift.is_none());
}

#[tokio::test]
async fn dates_outside_the_horizon_are_rejected() {
    let harness = Harness::new().await;
    harness.mount_catalog_mocks().await;
    harness.mount_schedule_mocks(false).await;

    let session = harness.wizard.start_session(harness.patient.clone()).await;
    harness.wizard
        .select_service(session.id, SelectServiceRequest { service_id: harness.service_id }, &harness.patient, "token")
        .await
        .unwrap();
    harness.wizard
        .select_doctor(session.id, SelectDoctorRequest { doctor_id: harness.doctor_id }, &harness.patient, "token")
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    for date in [today - ChronoDuration::days(1), today + ChronoDuration::days(31)] {
        let result = harness.wizard
            .select_slot(
                session.id,
                SelectSlotRequest {
                    date,
                    work_schedule_id: harness.work_schedule_id,
                    note: None,
                },
                &harness.patient,
                "token",
            )
            .await;
        assert_matches!(result, Err(BookingError::ValidationError(_)));
    }
}

#[tokio::test]
async fn end_to_end_booking_flow_confirms_after_payment() {
    let harness = Harness::new().await;
    harness.mount_catalog_mocks().await;
    harness.mount_schedule_mocks(false).await;
    harness.mount_payment_mocks().await;

    let tomorrow = Utc::now().date_naive() + ChronoDuration::days(1);
    let appointment_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": appointment_id,
            "patient_id": harness.patient.id,
            "doctor_id": harness.doctor_id,
            "work_schedule_id": harness.work_schedule_id,
            "date": tomorrow,
            "service_name": "Cardiology",
            "status": "confirmed",
            "transaction_code": "placeholder"
        }])))
        .expect(1)
        .mount(&harness.server)
        .await;

    let session_id = harness.session_with_slot().await;

    let (_, payment) = harness.wizard
        .enter_payment(session_id, &harness.patient, "token")
        .await
        .expect("payment step should open");

    assert_eq!(payment.details.amount_due, DEFAULT_PRICE);
    assert!(payment.details.is_default_price, "Cardiology has no price row, default applies");

    // Simulate the payment verifier pushing a confirmation.
    harness.channel
        .push_result(
            &harness.patient.id,
            PaymentNotice {
                transaction_content: payment.details.transaction_code.clone(),
                amount_in: payment.details.amount_due,
                token: Some(VERIFICATION_TOKEN.to_string()),
            },
        )
        .await;

    // The watcher confirms asynchronously; poll until the session flips.
    let mut confirmed = None;
    for _ in 0..40 {
        let (session, _) = harness.wizard.get_session(session_id, &harness.patient).await.unwrap();
        if session.step == BookingStep::Confirmed {
            confirmed = Some(session);
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    let session = confirmed.expect("session should reach Confirmed after the payment signal");
    let confirmation = session.confirmation.expect("confirmation details should be recorded");
    assert_eq!(confirmation.appointment_id, appointment_id);
    assert_eq!(confirmation.service_name, "Cardiology");
    assert_eq!(confirmation.doctor_name, "Binh Tran");
    assert_eq!(confirmation.date, tomorrow);
    assert_eq!(confirmation.shift_label, "08:00-12:00");

    // The POST mock's expect(1) verifies appointment creation ran exactly once.
}

#[tokio::test]
async fn leaving_the_payment_step_tears_the_checkout_down() {
    let harness = Harness::new().await;
    harness.mount_catalog_mocks().await;
    harness.mount_schedule_mocks(false).await;
    harness.mount_payment_mocks().await;

    let session_id = harness.session_with_slot().await;
    harness.wizard
        .enter_payment(session_id, &harness.patient, "token")
        .await
        .unwrap();

    assert_eq!(harness.channel.active_subscriptions(&harness.patient.id).await, 1);

    let session = harness.wizard.back(session_id, &harness.patient).await.unwrap();
    assert_eq!(session.step, BookingStep::SelectingDateTime);
    assert_eq!(
        harness.channel.active_subscriptions(&harness.patient.id).await,
        0,
        "Back must close the payment subscription"
    );

    let published_at_exit = harness.channel.published_checks().await.len();
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        harness.channel.published_checks().await.len(),
        published_at_exit,
        "No heartbeat may be published after leaving the payment step"
    );
}

#[tokio::test]
async fn cancel_resets_the_selection_and_is_terminal() {
    let harness = Harness::new().await;
    harness.mount_catalog_mocks().await;
    harness.mount_schedule_mocks(false).await;

    let session_id = harness.session_with_slot().await;

    let session = harness.wizard.cancel(session_id, &harness.patient).await.unwrap();
    assert_eq!(session.step, BookingStep::Cancelled);
    assert!(session.selection.service.is_none());
    assert!(session.selection.doctor.is_none());
    assert!(session.selection.work_schedule_id.is_none());

    let result = harness.wizard.cancel(session_id, &harness.patient).await;
    assert_matches!(result, Err(BookingError::InvalidTransition { .. }));
}

#[tokio::test]
async fn other_patients_cannot_touch_a_session() {
    let harness = Harness::new().await;
    let session = harness.wizard.start_session(harness.patient.clone()).await;

    let stranger = TestUser::patient("other@example.com").to_session();
    let result = harness.wizard.get_session(session.id, &stranger).await;
    assert_matches!(result, Err(BookingError::Unauthorized));
}
