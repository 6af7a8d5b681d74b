//! Chapa payment gateway client.
//!
//! All money movement goes through this seam: tuition checkout initialization,
//! transaction verification and salary transfers. The gateway, not this
//! service, is the source of truth for whether money moved.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway did not answer in time. Transient; safe to retry with
    /// the same reference.
    #[error("Payment gateway timed out")]
    Timeout,

    #[error("Payment gateway unreachable: {0}")]
    Transport(String),

    #[error("Unexpected gateway response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Customization {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct InitializeRequest {
    pub amount: f64,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tx_ref: String,
    pub callback_url: String,
    pub return_url: String,
    pub customization: Customization,
}

#[derive(Debug, Serialize)]
pub struct TransferRequest {
    pub account_name: String,
    pub account_number: String,
    pub amount: f64,
    pub currency: String,
    pub bank_code: String,
    pub reference: String,
}

/// Normalized gateway answer. `message` is the gateway's own wording when
/// it supplied one; `reference` is its transaction identifier.
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub success: bool,
    pub message: String,
    pub checkout_url: Option<String>,
    pub reference: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, req: InitializeRequest) -> Result<GatewayReply, GatewayError>;
    async fn verify(&self, tx_ref: &str) -> Result<GatewayReply, GatewayError>;
    async fn transfer(&self, req: TransferRequest) -> Result<GatewayReply, GatewayError>;
}

/// Raw Chapa response envelope. `message` can be a string or an object of
/// field errors, so it is kept as a JSON value and coerced later.
#[derive(Debug, Deserialize)]
struct ChapaEnvelope {
    status: String,
    #[serde(default)]
    message: Value,
    #[serde(default)]
    data: Value,
}

impl ChapaEnvelope {
    fn success(&self) -> bool {
        self.status == "success"
    }

    fn message_string(&self, fallback: &str) -> String {
        match &self.message {
            Value::String(s) => s.clone(),
            Value::Null => fallback.to_string(),
            other => other.to_string(),
        }
    }

    fn data_string(&self, key: &str) -> Option<String> {
        match self.data.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub struct ChapaClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    simulate_transfers: bool,
}

impl ChapaClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: config.chapa_base_url.clone(),
            secret_key: config.chapa_secret_key.clone(),
            simulate_transfers: config.simulate_transfers,
        }
    }
}

#[async_trait]
impl PaymentGateway for ChapaClient {
    async fn initialize(&self, req: InitializeRequest) -> Result<GatewayReply, GatewayError> {
        let envelope: ChapaEnvelope = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&req)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        Ok(GatewayReply {
            success: envelope.success(),
            message: envelope.message_string("Chapa initialization failed"),
            checkout_url: envelope.data_string("checkout_url"),
            reference: None,
        })
    }

    async fn verify(&self, tx_ref: &str) -> Result<GatewayReply, GatewayError> {
        let envelope: ChapaEnvelope = self
            .http
            .get(format!("{}/transaction/verify/{}", self.base_url, tx_ref))
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        Ok(GatewayReply {
            success: envelope.success(),
            message: envelope.message_string("Verification failed"),
            checkout_url: None,
            reference: envelope.data_string("reference"),
        })
    }

    async fn transfer(&self, req: TransferRequest) -> Result<GatewayReply, GatewayError> {
        if self.simulate_transfers {
            warn!(
                reference = %req.reference,
                amount = req.amount,
                "SIMULATE_TRANSFERS is on; transfer not sent to gateway"
            );
            return Ok(GatewayReply {
                success: true,
                message: "Transfer simulated".to_string(),
                checkout_url: None,
                reference: Some(format!("SIM-{}", req.reference)),
            });
        }

        let envelope: ChapaEnvelope = self
            .http
            .post(format!("{}/transfers", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&req)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        Ok(GatewayReply {
            success: envelope.success(),
            message: envelope.message_string("Transfer failed"),
            checkout_url: None,
            reference: envelope.data_string("reference"),
        })
    }
}

/// Chapa rejects most punctuation in the checkout description. Keep only
/// letters, digits, space, `.`, `-`, `_` and cap the length.
pub fn sanitize_description(reason: &str) -> String {
    let clean: String = reason
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'))
        .take(15)
        .collect();

    if clean.is_empty() {
        "Tuition Fee".to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_rejected_punctuation() {
        assert_eq!(sanitize_description("Sept: tuition!"), "Sept tuition");
    }

    #[test]
    fn sanitize_caps_length_at_fifteen() {
        assert_eq!(
            sanitize_description("A very long payment description"),
            "A very long pay"
        );
    }

    #[test]
    fn sanitize_keeps_allowed_characters() {
        assert_eq!(sanitize_description("Fee_2026.03-a"), "Fee_2026.03-a");
    }

    #[test]
    fn sanitize_falls_back_when_nothing_survives() {
        assert_eq!(sanitize_description("!!!???"), "Tuition Fee");
    }

    #[test]
    fn envelope_message_coerces_objects_to_strings() {
        let env: ChapaEnvelope = serde_json::from_str(
            r#"{"status":"failed","message":{"customization.description":["invalid"]}}"#,
        )
        .unwrap();
        assert!(!env.success());
        let msg = env.message_string("fallback");
        assert!(msg.contains("customization.description"));
    }

    #[test]
    fn envelope_reads_numeric_references() {
        let env: ChapaEnvelope =
            serde_json::from_str(r#"{"status":"success","data":{"reference":12345}}"#).unwrap();
        assert_eq!(env.data_string("reference").as_deref(), Some("12345"));
    }
}
