use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub iat: Option<u64>,
}

/// Explicit session context for the logged-in user. Built once per request
/// from the bearer token and passed to every handler that needs it; nothing
/// reads session state from process-wide globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}
