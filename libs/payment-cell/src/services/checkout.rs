use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use catalog_cell::services::PriceLookupService;
use shared_config::AppConfig;
use shared_models::auth::SessionUser;

use crate::models::{
    transaction_code, CheckoutPhase, PaymentCheck, PaymentDetails, PaymentError, PaymentSession,
};
use crate::services::channel::PaymentChannel;

/// Invoked exactly once per confirmed payment signal. The caller creates the
/// appointment; a failure is surfaced, never retried automatically.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn payment_confirmed(&self, transaction_code: &str) -> Result<(), PaymentError>;
}

pub struct CheckoutService {
    channel: Arc<dyn PaymentChannel>,
    pricing: PriceLookupService,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        channel: Arc<dyn PaymentChannel>,
        pricing: PriceLookupService,
        config: Arc<AppConfig>,
    ) -> Self {
        Self { channel, pricing, config }
    }

    /// Open a checkout for one payment-step activation. Resolves the fee,
    /// acquires the result subscription once, and starts the watcher that
    /// publishes the 1-second heartbeat until the checkout ends.
    pub async fn open_checkout(
        &self,
        patient: &SessionUser,
        work_schedule_id: Uuid,
        service_name: &str,
        auth_token: &str,
        hook: Arc<dyn CompletionHook>,
    ) -> Result<PaymentCheckout, PaymentError> {
        let fee = self.pricing.fee_for_service(service_name, auth_token).await
            .map_err(|e| PaymentError::FeeLookupFailed(e.to_string()))?;

        let code = transaction_code(work_schedule_id, &patient.id);
        let session = PaymentSession {
            transaction_code: code.clone(),
            amount_due: fee.amount,
            confirmed: false,
        };

        let details = PaymentDetails {
            amount_due: fee.amount,
            transaction_code: code.clone(),
            bank_account_number: self.config.bank_account_number.clone(),
            bank_code: self.config.bank_code.clone(),
            is_default_price: fee.is_default,
        };

        // One subscription per activation; it lives until teardown.
        let mut rx = self.channel.subscribe(&patient.id).await?;

        let phase = Arc::new(RwLock::new(CheckoutPhase::AwaitingTransfer));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let channel = Arc::clone(&self.channel);
        let watcher_phase = Arc::clone(&phase);
        let expected_token = self.config.payment_verification_token.clone();
        let check = PaymentCheck {
            amount_in: fee.amount,
            transaction_content: code.clone(),
        };
        let watcher_code = code.clone();
        let patient_id = patient.id.clone();

        let handle = tokio::spawn(async move {
            let mut heartbeat = interval(Duration::from_secs(1));
            let mut invoked = false;

            info!("Payment watcher started for patient {} ({})", patient_id, watcher_code);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("Payment watcher for {} received shutdown", watcher_code);
                        break;
                    }
                    _ = heartbeat.tick() => {
                        if let Err(e) = channel.publish_check(&check).await {
                            warn!("Failed to publish payment check: {}", e);
                        }
                    }
                    notice = rx.recv() => {
                        let Some(notice) = notice else {
                            warn!("Payment result channel closed for {}", watcher_code);
                            break;
                        };

                        if !expected_token.is_empty()
                            && notice.token.as_deref() != Some(expected_token.as_str())
                        {
                            warn!("Dropping payment notice with bad verification token");
                            continue;
                        }
                        if notice.transaction_content != watcher_code {
                            debug!("Payment notice for another booking attempt, ignoring");
                            continue;
                        }
                        if invoked {
                            continue;
                        }
                        invoked = true;

                        *watcher_phase.write().await = CheckoutPhase::Verifying;
                        info!("Payment confirmed for {}, creating appointment", watcher_code);

                        match hook.payment_confirmed(&watcher_code).await {
                            Ok(()) => {
                                *watcher_phase.write().await = CheckoutPhase::Confirmed;
                                info!("Appointment created for {}", watcher_code);
                            }
                            Err(e) => {
                                // Left for manual retry: re-invoking here risks
                                // a duplicate appointment.
                                error!("Appointment creation failed for {}: {}", watcher_code, e);
                                *watcher_phase.write().await = CheckoutPhase::Failed(e.to_string());
                            }
                        }
                        break;
                    }
                }
            }

            debug!("Payment watcher for {} stopped", watcher_code);
        });

        Ok(PaymentCheckout {
            session,
            details,
            phase,
            shutdown: shutdown_tx,
            handle,
        })
    }
}

/// Handle for one active payment step. Owns the subscription and heartbeat;
/// dropping through teardown guarantees no message is published afterwards.
pub struct PaymentCheckout {
    session: PaymentSession,
    details: PaymentDetails,
    phase: Arc<RwLock<CheckoutPhase>>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PaymentCheckout {
    pub fn details(&self) -> &PaymentDetails {
        &self.details
    }

    pub fn transaction_code(&self) -> &str {
        &self.session.transaction_code
    }

    pub async fn phase(&self) -> CheckoutPhase {
        self.phase.read().await.clone()
    }

    pub async fn session(&self) -> PaymentSession {
        let confirmed = matches!(*self.phase.read().await, CheckoutPhase::Confirmed);
        PaymentSession {
            confirmed,
            ..self.session.clone()
        }
    }

    /// Stop the heartbeat and close the subscription. Waits for the watcher
    /// to finish, so no network activity can happen after this returns.
    pub async fn teardown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!("Payment watcher ended abnormally: {}", e);
        }
    }
}
