use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use shared_gateway::BackendClient;

use crate::models::{CatalogError, ResolvedFee, ServicePrice};

pub struct PriceLookupService {
    gateway: Arc<BackendClient>,
    default_price: f64,
}

impl PriceLookupService {
    pub fn new(gateway: Arc<BackendClient>, default_price: f64) -> Self {
        Self { gateway, default_price }
    }

    /// Price row for a service, if one exists.
    pub async fn price_for_service(
        &self,
        service_name: &str,
        auth_token: &str,
    ) -> Result<Option<ServicePrice>, CatalogError> {
        debug!("Looking up price for service '{}'", service_name);

        let encoded = urlencoding::encode(service_name);
        let path = format!("/rest/v1/service_prices?service_name=eq.{}", encoded);

        let result: Vec<Value> = self.gateway.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Ok(None);
        }

        let price: ServicePrice = serde_json::from_value(result[0].clone())
            .map_err(|e| CatalogError::DatabaseError(format!("Failed to parse price: {}", e)))?;

        Ok(Some(price))
    }

    /// Resolve the consultation fee for a service, falling back to the
    /// configured default appointment price when no row exists.
    pub async fn fee_for_service(
        &self,
        service_name: &str,
        auth_token: &str,
    ) -> Result<ResolvedFee, CatalogError> {
        match self.price_for_service(service_name, auth_token).await? {
            Some(price) => Ok(ResolvedFee {
                service_name: service_name.to_string(),
                amount: price.amount,
                is_default: false,
            }),
            None => {
                info!("No price row for '{}', using default appointment price", service_name);
                Ok(ResolvedFee {
                    service_name: service_name.to_string(),
                    amount: self.default_price,
                    is_default: true,
                })
            }
        }
    }
}
