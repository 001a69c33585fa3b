use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use futures::StreamExt;
use redis::AsyncCommands;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::models::{PaymentCheck, PaymentError, PaymentNotice};

pub const CHECK_TOPIC: &str = "payments:check";

pub fn result_topic(patient_id: &str) -> String {
    format!("payments:result:{}", patient_id)
}

/// The payment result/check channel. One subscription per checkout
/// activation; the receiver closing tears the subscription down.
#[async_trait]
pub trait PaymentChannel: Send + Sync {
    async fn subscribe(&self, patient_id: &str) -> Result<mpsc::Receiver<PaymentNotice>, PaymentError>;
    async fn publish_check(&self, check: &PaymentCheck) -> Result<(), PaymentError>;
}

// ==============================================================================
// REDIS CHANNEL
// ==============================================================================

pub struct RedisPaymentChannel {
    client: redis::Client,
    pool: Pool,
}

impl RedisPaymentChannel {
    pub fn new(redis_url: &str) -> Result<Self, PaymentError> {
        let client = redis::Client::open(redis_url)?;

        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            PaymentError::ChannelError(format!("Failed to create Redis pool: {}", e))
        })?;

        Ok(Self { client, pool })
    }
}

#[async_trait]
impl PaymentChannel for RedisPaymentChannel {
    async fn subscribe(&self, patient_id: &str) -> Result<mpsc::Receiver<PaymentNotice>, PaymentError> {
        let topic = result_topic(patient_id);

        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.subscribe(&topic).await?;

        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    msg = stream.next() => {
                        let Some(msg) = msg else { break };
                        let payload: String = match msg.get_payload() {
                            Ok(p) => p,
                            Err(e) => {
                                warn!("Unreadable payment result payload: {}", e);
                                continue;
                            }
                        };
                        match serde_json::from_str::<PaymentNotice>(&payload) {
                            Ok(notice) => {
                                if tx.send(notice).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Malformed payment result message: {}", e),
                        }
                    }
                }
            }
            debug!("Payment result subscription on {} closed", topic);
        });

        Ok(rx)
    }

    async fn publish_check(&self, check: &PaymentCheck) -> Result<(), PaymentError> {
        let mut conn = self.pool.get().await.map_err(|e| {
            PaymentError::ChannelError(format!("Failed to get Redis connection: {}", e))
        })?;

        let payload = serde_json::to_string(check)?;
        let _: () = conn.publish(CHECK_TOPIC, payload).await?;

        Ok(())
    }
}

// ==============================================================================
// LOOPBACK CHANNEL
// ==============================================================================

/// In-process channel used when no redis URL is configured (local
/// development) and by tests. Records every published check so teardown
/// behavior can be observed.
pub struct LoopbackPaymentChannel {
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<PaymentNotice>>>>,
    published: Mutex<Vec<PaymentCheck>>,
}

impl LoopbackPaymentChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
        })
    }

    /// Deliver a payment result to the patient's active subscriptions.
    /// Returns how many subscriptions received it.
    pub async fn push_result(&self, patient_id: &str, notice: PaymentNotice) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        let Some(senders) = subscribers.get_mut(patient_id) else {
            return 0;
        };

        let mut delivered = 0;
        senders.retain(|sender| !sender.is_closed());
        for sender in senders.iter() {
            if sender.send(notice.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn published_checks(&self) -> Vec<PaymentCheck> {
        self.published.lock().await.clone()
    }

    pub async fn active_subscriptions(&self, patient_id: &str) -> usize {
        let subscribers = self.subscribers.lock().await;
        subscribers
            .get(patient_id)
            .map(|senders| senders.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PaymentChannel for LoopbackPaymentChannel {
    async fn subscribe(&self, patient_id: &str) -> Result<mpsc::Receiver<PaymentNotice>, PaymentError> {
        let (tx, rx) = mpsc::channel(16);
        let mut subscribers = self.subscribers.lock().await;
        subscribers.entry(patient_id.to_string()).or_default().push(tx);
        Ok(rx)
    }

    async fn publish_check(&self, check: &PaymentCheck) -> Result<(), PaymentError> {
        self.published.lock().await.push(check.clone());
        Ok(())
    }
}
