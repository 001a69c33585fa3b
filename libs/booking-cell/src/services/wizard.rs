// libs/booking-cell/src/services/wizard.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use catalog_cell::services::{CatalogService, DoctorDirectoryService, PriceLookupService};
use payment_cell::models::{CheckoutPhase, PaymentDetails, PaymentError};
use payment_cell::services::{
    CheckoutService, CompletionHook, LoopbackPaymentChannel, PaymentChannel, PaymentCheckout,
    RedisPaymentChannel,
};
use schedule_cell::models::ScheduleError;
use schedule_cell::services::slots::is_date_bookable;
use schedule_cell::services::{SlotConflictService, WorkScheduleService};
use shared_config::AppConfig;
use shared_gateway::BackendClient;
use shared_models::auth::SessionUser;

use crate::models::{
    BookingConfirmation, BookingError, BookingSelection, BookingStep, DoctorRef,
    SelectDoctorRequest, SelectServiceRequest, SelectSlotRequest, ServiceRef, WizardSession,
};
use crate::services::appointment::AppointmentCreationService;

type SessionStore = Arc<RwLock<HashMap<Uuid, WizardSession>>>;
type CheckoutStore = Arc<RwLock<HashMap<Uuid, PaymentCheckout>>>;

/// Payment-step state as rendered to the client.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusView {
    pub details: PaymentDetails,
    pub phase: CheckoutPhase,
}

/// Drives the five-step booking flow. Owns every live wizard session and,
/// for sessions in the payment step, the active checkout.
pub struct WizardService {
    config: Arc<AppConfig>,
    catalog: CatalogService,
    doctors: DoctorDirectoryService,
    schedules: WorkScheduleService,
    conflicts: SlotConflictService,
    checkout_service: CheckoutService,
    appointments: AppointmentCreationService,
    sessions: SessionStore,
    checkouts: CheckoutStore,
}

impl WizardService {
    pub fn new(config: Arc<AppConfig>) -> Result<Self, BookingError> {
        let channel: Arc<dyn PaymentChannel> = match config.redis_url.as_deref() {
            Some(url) => Arc::new(
                RedisPaymentChannel::new(url)
                    .map_err(|e| BookingError::PaymentError(e.to_string()))?,
            ),
            None => {
                warn!("REDIS_URL not set, using in-process payment channel");
                LoopbackPaymentChannel::new()
            }
        };

        let gateway = Arc::new(BackendClient::new(&config));
        Ok(Self::with_parts(config, gateway, channel))
    }

    /// Wire the wizard from explicit parts. Tests inject a stub gateway and
    /// an in-process payment channel here.
    pub fn with_parts(
        config: Arc<AppConfig>,
        gateway: Arc<BackendClient>,
        channel: Arc<dyn PaymentChannel>,
    ) -> Self {
        let pricing = PriceLookupService::new(Arc::clone(&gateway), config.default_appointment_price);

        Self {
            catalog: CatalogService::new(Arc::clone(&gateway)),
            doctors: DoctorDirectoryService::new(Arc::clone(&gateway)),
            schedules: WorkScheduleService::new(Arc::clone(&gateway)),
            conflicts: SlotConflictService::new(Arc::clone(&gateway)),
            checkout_service: CheckoutService::new(channel, pricing, Arc::clone(&config)),
            appointments: AppointmentCreationService::new(gateway),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            checkouts: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    pub fn appointments(&self) -> &AppointmentCreationService {
        &self.appointments
    }

    // ==========================================================================
    // SESSION LIFECYCLE
    // ==========================================================================

    pub async fn start_session(&self, patient: SessionUser) -> WizardSession {
        let now = Utc::now();
        let session = WizardSession {
            id: Uuid::new_v4(),
            patient,
            step: BookingStep::SelectingService,
            selection: Default::default(),
            confirmation: None,
            created_at: now,
            updated_at: now,
        };

        info!("Booking session {} started for patient {}", session.id, session.patient.id);

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id, session.clone());
        session
    }

    pub async fn get_session(
        &self,
        session_id: Uuid,
        requester: &SessionUser,
    ) -> Result<(WizardSession, Option<PaymentStatusView>), BookingError> {
        let session = self.load_session(session_id, requester).await?;

        let payment = {
            let checkouts = self.checkouts.read().await;
            match checkouts.get(&session_id) {
                Some(checkout) => Some(PaymentStatusView {
                    details: checkout.details().clone(),
                    phase: checkout.phase().await,
                }),
                None => None,
            }
        };

        Ok((session, payment))
    }

    // ==========================================================================
    // STEP TRANSITIONS
    // ==========================================================================

    pub async fn select_service(
        &self,
        session_id: Uuid,
        request: SelectServiceRequest,
        requester: &SessionUser,
        auth_token: &str,
    ) -> Result<WizardSession, BookingError> {
        let session = self.load_session(session_id, requester).await?;
        Self::ensure_step(&session, BookingStep::SelectingService)?;

        let service = self.catalog.get_service(request.service_id, auth_token).await
            .map_err(|e| BookingError::ValidationError(e.to_string()))?;
        if !service.is_active {
            return Err(BookingError::ValidationError("Service is not bookable".to_string()));
        }

        self.mutate_session(session_id, BookingStep::SelectingService, |session| {
            session.selection.service = Some(ServiceRef {
                id: service.id,
                name: service.name.clone(),
            });
            // A new service invalidates everything chosen after it.
            session.selection.doctor = None;
            session.selection.date = None;
            session.selection.shift = None;
            session.selection.work_schedule_id = None;
            session.step = BookingStep::SelectingDoctor;
        }).await
    }

    pub async fn select_doctor(
        &self,
        session_id: Uuid,
        request: SelectDoctorRequest,
        requester: &SessionUser,
        auth_token: &str,
    ) -> Result<WizardSession, BookingError> {
        let session = self.load_session(session_id, requester).await?;
        Self::ensure_step(&session, BookingStep::SelectingDoctor)?;

        let service = session.selection.service.clone()
            .ok_or_else(|| BookingError::IncompleteSelection("service".to_string()))?;

        let doctor = self.doctors.get_doctor(request.doctor_id, auth_token).await
            .map_err(|e| BookingError::ValidationError(e.to_string()))?;
        if !doctor.is_active {
            return Err(BookingError::ValidationError("Doctor is not available".to_string()));
        }
        if !doctor.service_name.eq_ignore_ascii_case(&service.name) {
            return Err(BookingError::ValidationError(format!(
                "Doctor does not offer {}",
                service.name
            )));
        }

        self.mutate_session(session_id, BookingStep::SelectingDoctor, |session| {
            session.selection.doctor = Some(DoctorRef {
                id: doctor.id,
                full_name: doctor.full_name(),
                service_name: doctor.service_name.clone(),
            });
            // A new doctor invalidates the previously chosen slot.
            session.selection.date = None;
            session.selection.shift = None;
            session.selection.work_schedule_id = None;
            session.step = BookingStep::SelectingDateTime;
        }).await
    }

    /// Record date + shift + work schedule. The conflict check runs before
    /// anything is stored: a patient already holding an appointment in the
    /// slot leaves the selection untouched.
    pub async fn select_slot(
        &self,
        session_id: Uuid,
        request: SelectSlotRequest,
        requester: &SessionUser,
        auth_token: &str,
    ) -> Result<WizardSession, BookingError> {
        let session = self.load_session(session_id, requester).await?;
        Self::ensure_step(&session, BookingStep::SelectingDateTime)?;

        let doctor = session.selection.doctor.clone()
            .ok_or_else(|| BookingError::IncompleteSelection("doctor".to_string()))?;

        let now = Utc::now();
        let today = now.date_naive();
        if !is_date_bookable(request.date, today) {
            return Err(BookingError::ValidationError(
                "Date is outside the booking horizon".to_string(),
            ));
        }

        let shifts = self.schedules.shifts_for_date(
            doctor.id,
            request.date,
            today,
            now.time(),
            auth_token,
        ).await.map_err(Self::map_schedule_error)?;

        let shift = shifts.into_iter()
            .find(|s| s.availability.work_schedule_ids.contains(&request.work_schedule_id))
            .ok_or(BookingError::SlotNotAvailable)?;
        if !shift.selectable {
            return Err(BookingError::SlotNotAvailable);
        }

        self.conflicts.ensure_slot_free(
            &session.patient.id,
            request.work_schedule_id,
            auth_token,
        ).await.map_err(Self::map_schedule_error)?;

        self.mutate_session(session_id, BookingStep::SelectingDateTime, |session| {
            session.selection.date = Some(request.date);
            session.selection.shift = Some(shift.availability.shift.clone());
            session.selection.work_schedule_id = Some(request.work_schedule_id);
            if let Some(note) = request.note.clone() {
                session.selection.note = note;
            }
        }).await
    }

    /// Continue into the payment step. Opens exactly one checkout for the
    /// activation; a fee-lookup failure keeps the session where it is so the
    /// step can be retried.
    pub async fn enter_payment(
        &self,
        session_id: Uuid,
        requester: &SessionUser,
        auth_token: &str,
    ) -> Result<(WizardSession, PaymentStatusView), BookingError> {
        let session = self.load_session(session_id, requester).await?;
        Self::ensure_step(&session, BookingStep::SelectingDateTime)?;

        if !session.selection.is_ready_for_payment() {
            return Err(BookingError::IncompleteSelection(
                "service, doctor, date, shift and work schedule must all be set".to_string(),
            ));
        }

        let service_name = session.selection.service.as_ref()
            .map(|s| s.name.clone())
            .ok_or_else(|| BookingError::IncompleteSelection("service".to_string()))?;
        let work_schedule_id = session.selection.work_schedule_id
            .ok_or_else(|| BookingError::IncompleteSelection("work schedule".to_string()))?;

        let hook = Arc::new(FinalizeBooking {
            sessions: Arc::clone(&self.sessions),
            appointments: self.appointments.clone(),
            session_id,
            patient: session.patient.clone(),
            selection: session.selection.clone(),
            auth_token: auth_token.to_string(),
        });

        let checkout = self.checkout_service.open_checkout(
            &session.patient,
            work_schedule_id,
            &service_name,
            auth_token,
            hook,
        ).await.map_err(|e| BookingError::PaymentError(e.to_string()))?;

        let view = PaymentStatusView {
            details: checkout.details().clone(),
            phase: CheckoutPhase::AwaitingTransfer,
        };

        {
            let mut checkouts = self.checkouts.write().await;
            if let Some(stale) = checkouts.remove(&session_id) {
                warn!("Replacing stale checkout for session {}", session_id);
                stale.teardown().await;
            }
            checkouts.insert(session_id, checkout);
        }

        let session = match self.mutate_session(session_id, BookingStep::SelectingDateTime, |session| {
            session.step = BookingStep::AwaitingPayment;
        }).await {
            Ok(session) => session,
            Err(e) => {
                // The step moved under us; the checkout must not outlive it.
                self.teardown_checkout(session_id).await;
                return Err(e);
            }
        };

        Ok((session, view))
    }

    /// Step back one screen. Leaving the payment step tears the checkout
    /// down before the step changes.
    pub async fn back(
        &self,
        session_id: Uuid,
        requester: &SessionUser,
    ) -> Result<WizardSession, BookingError> {
        let session = self.load_session(session_id, requester).await?;

        let target = session.step.back_target().ok_or_else(|| {
            BookingError::ValidationError(format!("Cannot go back from {}", session.step))
        })?;

        if session.step == BookingStep::AwaitingPayment {
            self.teardown_checkout(session_id).await;
        }

        self.mutate_session(session_id, session.step, move |session| {
            session.step = target;
        }).await
    }

    /// Terminal cancel: tears down any live checkout and resets the
    /// accumulated selection.
    pub async fn cancel(
        &self,
        session_id: Uuid,
        requester: &SessionUser,
    ) -> Result<WizardSession, BookingError> {
        let session = self.load_session(session_id, requester).await?;

        if !session.step.can_transition_to(&BookingStep::Cancelled) {
            return Err(BookingError::InvalidTransition {
                from: session.step,
                to: BookingStep::Cancelled,
            });
        }

        self.teardown_checkout(session_id).await;

        self.mutate_session(session_id, session.step, |session| {
            session.selection.clear();
            session.step = BookingStep::Cancelled;
        }).await
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    async fn load_session(
        &self,
        session_id: Uuid,
        requester: &SessionUser,
    ) -> Result<WizardSession, BookingError> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(&session_id).ok_or(BookingError::SessionNotFound)?;

        if session.patient.id != requester.id && !requester.is_admin() {
            return Err(BookingError::Unauthorized);
        }

        Ok(session.clone())
    }

    fn ensure_step(session: &WizardSession, expected: BookingStep) -> Result<(), BookingError> {
        if session.step != expected {
            return Err(BookingError::InvalidTransition {
                from: session.step,
                to: expected,
            });
        }
        Ok(())
    }

    /// Re-validates the step under the write lock before applying the
    /// mutation; a concurrent transition turns into InvalidTransition
    /// instead of a lost update.
    async fn mutate_session<F>(
        &self,
        session_id: Uuid,
        expected_step: BookingStep,
        mutate: F,
    ) -> Result<WizardSession, BookingError>
    where
        F: FnOnce(&mut WizardSession),
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&session_id).ok_or(BookingError::SessionNotFound)?;

        if session.step != expected_step {
            return Err(BookingError::InvalidTransition {
                from: session.step,
                to: expected_step,
            });
        }

        mutate(session);
        session.updated_at = Utc::now();
        debug!("Session {} now at step {}", session_id, session.step);
        Ok(session.clone())
    }

    async fn teardown_checkout(&self, session_id: Uuid) {
        let checkout = {
            let mut checkouts = self.checkouts.write().await;
            checkouts.remove(&session_id)
        };
        if let Some(checkout) = checkout {
            checkout.teardown().await;
            debug!("Checkout for session {} torn down", session_id);
        }
    }

    fn map_schedule_error(e: ScheduleError) -> BookingError {
        match e {
            ScheduleError::SlotConflict => BookingError::SlotConflict,
            ScheduleError::ValidationError(msg) => BookingError::ValidationError(msg),
            ScheduleError::DatabaseError(msg) => BookingError::DatabaseError(msg),
        }
    }
}

/// Completion hook handed to the payment watcher: creates the appointment
/// and flips the session to Confirmed. Invoked at most once per checkout.
struct FinalizeBooking {
    sessions: SessionStore,
    appointments: AppointmentCreationService,
    session_id: Uuid,
    patient: SessionUser,
    selection: BookingSelection,
    auth_token: String,
}

#[async_trait]
impl CompletionHook for FinalizeBooking {
    async fn payment_confirmed(&self, transaction_code: &str) -> Result<(), PaymentError> {
        let appointment = self.appointments.create_appointment(
            &self.patient,
            &self.selection,
            transaction_code,
            &self.auth_token,
        ).await.map_err(|e| PaymentError::CompletionFailed(e.to_string()))?;

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(&self.session_id) {
            if session.step.can_transition_to(&BookingStep::Confirmed) {
                session.step = BookingStep::Confirmed;
                session.confirmation = Some(BookingConfirmation {
                    appointment_id: appointment.id,
                    service_name: appointment.service_name.clone(),
                    doctor_name: self.selection.doctor.as_ref()
                        .map(|d| d.full_name.clone())
                        .unwrap_or_default(),
                    date: appointment.date,
                    shift_label: self.selection.shift.as_ref()
                        .map(|s| s.label.clone())
                        .unwrap_or_default(),
                    transaction_code: transaction_code.to_string(),
                });
                session.updated_at = Utc::now();
                info!("Session {} confirmed with appointment {}", self.session_id, appointment.id);
            }
        }

        Ok(())
    }
}
