// Signed Request Builder
//
// eSewa ePay v2 authenticates a payment form with an HMAC-SHA256 signature
// over exactly three fields, in this order:
//
//   total_amount=<amount>,transaction_uuid=<id>,product_code=<merchant>
//
// The signature is base64 encoded. Every other form field is unsigned.
// The same scheme protects the base64 JSON the gateway hands back on the
// success redirect, where `signed_field_names` lists the covered fields.

use base64::{engine::general_purpose::STANDARD as BASE64_ENGINE, Engine};
use ring::hmac;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::amount::Amount;
use crate::config::CredentialConfig;
use crate::error::{PaymentError, Result};

pub const SIGNED_FIELD_NAMES: &str = "total_amount,transaction_uuid,product_code";

/// One payment the caller wants to start
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRequest {
    pub amount: Amount,
    pub transaction_id: String,
    pub success_url: String,
    pub failure_url: String,
}

/// Form fields to POST to the environment's payment URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub amount: String,
    pub tax_amount: String,
    pub total_amount: String,
    pub transaction_uuid: String,
    pub product_code: String,
    pub product_service_charge: String,
    pub product_delivery_charge: String,
    pub success_url: String,
    pub failure_url: String,
    pub signed_field_names: String,
    pub signature: String,
}

pub fn canonical_message(total_amount: &str, transaction_uuid: &str, product_code: &str) -> String {
    format!(
        "total_amount={},transaction_uuid={},product_code={}",
        total_amount, transaction_uuid, product_code
    )
}

/// base64(HMAC-SHA256(secret, message))
pub fn sign(secret_key: &str, message: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret_key.as_bytes());
    BASE64_ENGINE.encode(hmac::sign(&key, message.as_bytes()).as_ref())
}

/// Constant-time check of a base64 signature against a message
pub fn verify_signature(secret_key: &str, message: &str, signature: &str) -> bool {
    let Ok(tag) = BASE64_ENGINE.decode(signature.trim()) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret_key.as_bytes());
    hmac::verify(&key, message.as_bytes(), &tag).is_ok()
}

/// Build the signed payment form for a transaction. Performs no I/O.
pub fn build_initiation(config: &CredentialConfig, tx: &TransactionRequest) -> Result<SignedPayload> {
    let merchant = config.merchant_identity.trim();
    if merchant.is_empty() {
        return Err(PaymentError::invalid("merchant identity is required"));
    }
    if config.secret_key.is_empty() {
        return Err(PaymentError::invalid("secret key is required"));
    }
    validate_transaction_id(&tx.transaction_id)?;
    validate_redirect_url("successUrl", &tx.success_url)?;
    validate_redirect_url("failureUrl", &tx.failure_url)?;

    let total_amount = tx.amount.to_string();
    let message = canonical_message(&total_amount, &tx.transaction_id, merchant);
    let signature = sign(&config.secret_key, &message);

    Ok(SignedPayload {
        amount: total_amount.clone(),
        tax_amount: "0".to_string(),
        total_amount,
        transaction_uuid: tx.transaction_id.clone(),
        product_code: merchant.to_string(),
        product_service_charge: "0".to_string(),
        product_delivery_charge: "0".to_string(),
        success_url: tx.success_url.clone(),
        failure_url: tx.failure_url.clone(),
        signed_field_names: SIGNED_FIELD_NAMES.to_string(),
        signature,
    })
}

/// Transaction ids are signed and used as lookup keys, so they must not
/// contain the message separators.
pub fn validate_transaction_id(transaction_id: &str) -> Result<()> {
    if transaction_id.trim().is_empty() {
        return Err(PaymentError::invalid("transactionId is required"));
    }
    if transaction_id
        .chars()
        .any(|c| c == ',' || c == '=' || c.is_whitespace() || c.is_control())
    {
        return Err(PaymentError::invalid(format!(
            "transactionId '{}' must not contain ',', '=' or whitespace",
            transaction_id
        )));
    }
    Ok(())
}

fn validate_redirect_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value.trim())
        .map_err(|e| PaymentError::invalid(format!("{} '{}' is not a valid URL: {}", field, value, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(PaymentError::invalid(format!(
            "{} must use http or https, got '{}'",
            field, other
        ))),
    }
}

/// Decoded success-redirect data from the gateway
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackData {
    pub signature_valid: bool,
    pub status: Option<String>,
    pub transaction_uuid: Option<String>,
    pub total_amount: Option<String>,
    pub transaction_code: Option<String>,
    pub fields: Map<String, Value>,
}

/// Decode the base64 JSON the gateway appends to the success URL and check
/// its signature under the resolved secret.
pub fn decode_callback(config: &CredentialConfig, encoded: &str) -> Result<CallbackData> {
    let raw = BASE64_ENGINE
        .decode(encoded.trim())
        .map_err(|e| PaymentError::invalid(format!("callback data is not valid base64: {}", e)))?;
    let fields: Map<String, Value> = serde_json::from_slice(&raw)
        .map_err(|e| PaymentError::invalid(format!("callback data is not a JSON object: {}", e)))?;

    let signed_names = fields
        .get("signed_field_names")
        .and_then(Value::as_str)
        .ok_or_else(|| PaymentError::invalid("callback data has no signed_field_names"))?;
    let signature = fields
        .get("signature")
        .and_then(Value::as_str)
        .ok_or_else(|| PaymentError::invalid("callback data has no signature"))?;

    let mut parts = Vec::new();
    for name in signed_names.split(',') {
        let value = fields.get(name).ok_or_else(|| {
            PaymentError::invalid(format!("signed field '{}' missing from callback data", name))
        })?;
        parts.push(format!("{}={}", name, field_text(value)));
    }
    let message = parts.join(",");

    let text = |key: &str| fields.get(key).map(field_text);
    Ok(CallbackData {
        signature_valid: verify_signature(&config.secret_key, &message, signature),
        status: text("status"),
        transaction_uuid: text("transaction_uuid"),
        total_amount: text("total_amount"),
        transaction_code: text("transaction_code"),
        fields: fields.clone(),
    })
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
