use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub domain_service_url: String,
    pub auth_jwt_secret: String,
    pub redis_url: Option<String>,
    pub bank_account_number: String,
    pub bank_code: String,
    pub payment_verification_token: String,
    pub default_appointment_price: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            domain_service_url: env::var("DOMAIN_SERVICE_URL")
                .unwrap_or_else(|_| {
                    warn!("DOMAIN_SERVICE_URL not set, using empty value");
                    String::new()
                }),
            auth_jwt_secret: env::var("AUTH_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("AUTH_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok(),
            bank_account_number: env::var("BANK_ACCOUNT_NUMBER")
                .unwrap_or_else(|_| {
                    warn!("BANK_ACCOUNT_NUMBER not set, using empty value");
                    String::new()
                }),
            bank_code: env::var("BANK_CODE")
                .unwrap_or_else(|_| {
                    warn!("BANK_CODE not set, using empty value");
                    String::new()
                }),
            payment_verification_token: env::var("PAYMENT_VERIFICATION_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_VERIFICATION_TOKEN not set, using empty value");
                    String::new()
                }),
            default_appointment_price: env::var("DEFAULT_APPOINTMENT_PRICE")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_else(|| {
                    warn!("DEFAULT_APPOINTMENT_PRICE not set, using 150000");
                    150_000.0
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.domain_service_url.is_empty()
            && !self.auth_jwt_secret.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.bank_account_number.is_empty()
            && !self.bank_code.is_empty()
            && !self.payment_verification_token.is_empty()
    }
}
