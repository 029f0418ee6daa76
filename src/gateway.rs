// eSewa Gateway Client
//
// Outbound calls to the eSewa ePay API: transaction status lookups (used by
// both verification and status reporting) and refunds. Every call goes
// through a `GatewayTransport`, which the server backs with reqwest and a
// bounded timeout. Failures never escape as errors here: they come back as
// `success: false, status: "FAILED"` records.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::amount::Amount;
use crate::config::CredentialConfig;
use crate::error::{PaymentError, Result};
use crate::reliability::{retry_with_backoff, RetryPolicy};

pub const STATUS_COMPLETE: &str = "COMPLETE";
pub const STATUS_FAILED: &str = "FAILED";

/// Minimal HTTP surface the gateway client needs
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    /// GET `url` with query parameters sent in the given order
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value>;

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value>;
}

/// reqwest-backed transport. Every request is bounded by the client timeout.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("❌ Gateway request failed with status {}: {}", status, body);
            return Err(PaymentError::GatewayStatus { status: status.as_u16(), body });
        }

        serde_json::from_str(&body).map_err(|e| {
            PaymentError::MalformedResponse(format!("expected JSON body ({}): {}", e, body))
        })
    }
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        info!("🌐 GET {}", url);
        let response = self.client.get(url).query(query).send().await?;
        Self::read_json(response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        info!("🌐 POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        Self::read_json(response).await
    }
}

/// Identifies a transaction at the gateway. Both fields must match what was
/// signed at initiation.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusQuery {
    pub transaction_id: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    pub verified: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatus {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResult {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct EsewaGateway {
    transport: Arc<dyn GatewayTransport>,
    lookup_retry: RetryPolicy,
}

impl EsewaGateway {
    pub fn new(transport: Arc<dyn GatewayTransport>, lookup_retry: RetryPolicy) -> Self {
        Self { transport, lookup_retry }
    }

    /// Ask the gateway for a transaction's status and classify it.
    /// `COMPLETE` is the only verified status.
    pub async fn verify(&self, config: &CredentialConfig, query: &StatusQuery) -> VerificationResult {
        match self.lookup_status(config, query).await {
            Ok((status, raw)) => {
                let verified = status == STATUS_COMPLETE;
                info!(
                    transaction = %query.transaction_id,
                    status = %status,
                    verified = verified,
                    "✅ Transaction verification finished"
                );
                VerificationResult {
                    success: true,
                    verified,
                    status,
                    raw_response: Some(raw),
                    error: None,
                }
            }
            Err(e) => {
                warn!(transaction = %query.transaction_id, error = %e, "Transaction verification failed");
                VerificationResult {
                    success: false,
                    verified: false,
                    status: STATUS_FAILED.to_string(),
                    raw_response: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn status(&self, config: &CredentialConfig, query: &StatusQuery) -> PaymentStatus {
        match self.lookup_status(config, query).await {
            Ok((status, raw)) => PaymentStatus {
                success: true,
                status,
                details: Some(raw),
                error: None,
            },
            Err(e) => {
                warn!(transaction = %query.transaction_id, error = %e, "Status lookup failed");
                PaymentStatus {
                    success: false,
                    status: STATUS_FAILED.to_string(),
                    details: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Refunds are not idempotent, so this makes exactly one attempt.
    pub async fn refund(&self, config: &CredentialConfig, query: &StatusQuery) -> RefundResult {
        let body = json!({
            "product_code": config.merchant_identity,
            "transaction_uuid": query.transaction_id,
            "refund_amount": query.amount.to_string(),
        });

        match self.transport.post_json(&config.refund_url, &body).await {
            Ok(response) => {
                let status = response["status"].as_str().unwrap_or("UNKNOWN").to_string();
                let message = response["message"]
                    .as_str()
                    .unwrap_or("Refund processed")
                    .to_string();
                info!(transaction = %query.transaction_id, status = %status, "💸 Refund submitted");
                RefundResult {
                    success: true,
                    status,
                    message: Some(message),
                    error: None,
                }
            }
            Err(e) => {
                error!(transaction = %query.transaction_id, error = %e, "❌ Refund failed");
                RefundResult {
                    success: false,
                    status: STATUS_FAILED.to_string(),
                    message: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn lookup_status(
        &self,
        config: &CredentialConfig,
        query: &StatusQuery,
    ) -> Result<(String, Value)> {
        let params = [
            ("product_code", config.merchant_identity.clone()),
            ("total_amount", query.amount.to_string()),
            ("transaction_uuid", query.transaction_id.clone()),
        ];

        let raw = retry_with_backoff(&self.lookup_retry, || {
            self.transport.get_json(&config.verify_url, &params)
        })
        .await?;

        let status = raw["status"]
            .as_str()
            .ok_or_else(|| {
                PaymentError::MalformedResponse(format!("response has no status field: {}", raw))
            })?
            .to_string();

        Ok((status, raw))
    }
}
