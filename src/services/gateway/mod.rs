pub mod http;

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha1::Sha1;

#[derive(Debug, Clone, Serialize)]
pub struct PaymentInit {
    pub amount: Decimal,
    pub reference: String,
    pub email: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub reference: String,
    pub authorization_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentVerification {
    pub reference: String,
    pub success: bool,
    pub amount: Decimal,
    pub fees: Option<Decimal>,
    pub transaction_id: Option<String>,
}

/// Payload pushed by the gateway when a charge settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayWebhook {
    pub reference: String,
    pub status: String,
    pub amount: Decimal,
    #[serde(default)]
    pub fees: Option<Decimal>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl GatewayWebhook {
    pub fn is_success(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "success" | "successful" | "paid"
        )
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize_payment(&self, init: &PaymentInit) -> anyhow::Result<PaymentSession>;
    async fn verify_payment(&self, reference: &str) -> anyhow::Result<PaymentVerification>;
}

/// Base64 HMAC-SHA1 of the raw webhook body, keyed by the gateway secret.
pub fn sign_payload(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn validate_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&decoded).is_ok()
}
