// Tool Catalog and Dispatch
//
// Maps tool names to `PaymentService` operations. Arguments arrive as raw
// JSON and results leave as JSON records; every failure, including an
// unknown tool name, becomes a `success: false` record instead of an error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::{PaymentError, Result};
use crate::gateway::STATUS_FAILED;
use crate::service::PaymentService;

pub const INITIATE_PAYMENT: &str = "initiate_payment";
pub const VERIFY_PAYMENT: &str = "verify_payment";
pub const GET_PAYMENT_STATUS: &str = "get_payment_status";
pub const REFUND_PAYMENT: &str = "refund_payment";
pub const CONFIGURE_CREDENTIALS: &str = "configure_credentials";
pub const GET_CURRENT_CONFIG: &str = "get_current_config";
pub const DECODE_CALLBACK: &str = "decode_callback";

/// Result of one tool call, ready for the protocol envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub is_error: bool,
    pub body: Value,
}

impl ToolOutput {
    fn failure(err: &PaymentError) -> Self {
        let mut body = json!({
            "success": false,
            "error": err.to_string(),
        });
        if err.is_transport_failure() {
            body["status"] = json!(STATUS_FAILED);
        }
        Self { is_error: true, body }
    }

    fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result {
            Ok(record) => match serde_json::to_value(record) {
                Ok(body) => {
                    let is_error = body["success"].as_bool() == Some(false);
                    Self { is_error, body }
                }
                Err(e) => {
                    error!("Failed to serialize tool result: {}", e);
                    Self::failure(&PaymentError::MalformedResponse(e.to_string()))
                }
            },
            Err(e) => Self::failure(&e),
        }
    }
}

/// Run a tool by name. Legacy camelCase names are accepted as aliases.
pub async fn dispatch(service: &PaymentService, name: &str, arguments: &Value) -> ToolOutput {
    info!("🔧 Tool call: {}", name);

    let output = match name {
        INITIATE_PAYMENT | "createPaymentSession" => match parse_args(arguments) {
            Ok(args) => ToolOutput::from_result(service.initiate_payment(args).await),
            Err(e) => ToolOutput::failure(&e),
        },
        VERIFY_PAYMENT | "verifyTransaction" => match parse_args(arguments) {
            Ok(args) => ToolOutput::from_result(service.verify_payment(args).await),
            Err(e) => ToolOutput::failure(&e),
        },
        GET_PAYMENT_STATUS | "getPaymentStatus" => match parse_args(arguments) {
            Ok(args) => ToolOutput::from_result(service.get_payment_status(args).await),
            Err(e) => ToolOutput::failure(&e),
        },
        REFUND_PAYMENT | "refundPayment" => match parse_args(arguments) {
            Ok(args) => ToolOutput::from_result(service.refund_payment(args).await),
            Err(e) => ToolOutput::failure(&e),
        },
        CONFIGURE_CREDENTIALS | "configureCredentials" => match parse_args(arguments) {
            Ok(args) => ToolOutput::from_result(service.configure_credentials(args).await),
            Err(e) => ToolOutput::failure(&e),
        },
        GET_CURRENT_CONFIG | "getCurrentConfig" => match parse_args(arguments) {
            Ok(args) => ToolOutput::from_result(Ok(service.get_current_config(args).await)),
            Err(e) => ToolOutput::failure(&e),
        },
        DECODE_CALLBACK | "decodeCallback" => match parse_args(arguments) {
            Ok(args) => ToolOutput::from_result(service.decode_callback(args).await),
            Err(e) => ToolOutput::failure(&e),
        },
        _ => ToolOutput::failure(&PaymentError::UnknownOperation(name.to_string())),
    };

    if output.is_error {
        warn!(tool = name, "Tool call finished with success=false");
    }
    output
}

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments.clone() };
    serde_json::from_value(arguments).map_err(|e| PaymentError::invalid(e.to_string()))
}

fn credential_properties() -> Value {
    json!({
        "merchantIdentity": {"type": "string", "description": "Merchant/product code; overrides session and default credentials when given with secretKey"},
        "secretKey": {"type": "string", "description": "HMAC secret matching merchantIdentity"},
        "environment": {"type": "string", "enum": ["sandbox", "production"], "description": "Gateway environment for inline credentials (default sandbox). Ignored unless merchantIdentity and secretKey are both given"},
        "sessionHandle": {"type": "string", "description": "Handle returned by configure_credentials"}
    })
}

fn schema(mut properties: Value, required: &[&str], with_credentials: bool) -> Value {
    if with_credentials {
        if let (Some(target), Value::Object(extra)) = (properties.as_object_mut(), credential_properties()) {
            target.extend(extra);
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

/// Tool descriptors for `tools/list`
pub fn tool_catalog() -> Value {
    let amount = json!({"type": ["number", "string"], "description": "Amount in NPR, at most 2 decimal places"});
    let transaction_id = json!({"type": "string", "description": "Unique transaction id (transaction_uuid) used at initiation"});

    json!([
        {
            "name": INITIATE_PAYMENT,
            "description": "Create a signed eSewa payment form. POST the returned paymentData to paymentUrl.",
            "inputSchema": schema(json!({
                "amount": amount,
                "transactionId": transaction_id,
                "successUrl": {"type": "string", "description": "Redirect URL after a successful payment"},
                "failureUrl": {"type": "string", "description": "Redirect URL after a failed or cancelled payment"}
            }), &["amount", "transactionId", "successUrl", "failureUrl"], true)
        },
        {
            "name": VERIFY_PAYMENT,
            "description": "Check a transaction with eSewa. verified is true only for status COMPLETE.",
            "inputSchema": schema(json!({
                "transactionId": transaction_id,
                "amount": amount
            }), &["transactionId", "amount"], true)
        },
        {
            "name": GET_PAYMENT_STATUS,
            "description": "Fetch the gateway status record for a transaction",
            "inputSchema": schema(json!({
                "transactionId": transaction_id,
                "amount": amount
            }), &["transactionId", "amount"], true)
        },
        {
            "name": REFUND_PAYMENT,
            "description": "Request a refund for a transaction (single attempt, never retried)",
            "inputSchema": schema(json!({
                "transactionId": transaction_id,
                "amount": amount
            }), &["transactionId", "amount"], true)
        },
        {
            "name": CONFIGURE_CREDENTIALS,
            "description": "Store merchant credentials under a session handle for later calls",
            "inputSchema": schema(json!({
                "merchantIdentity": {"type": "string", "description": "Merchant/product code"},
                "secretKey": {"type": "string", "description": "HMAC secret key"},
                "environment": {"type": "string", "enum": ["sandbox", "production"], "description": "Defaults to sandbox"},
                "sessionHandle": {"type": "string", "description": "Handle to store under; generated when omitted"}
            }), &["merchantIdentity", "secretKey"], false)
        },
        {
            "name": GET_CURRENT_CONFIG,
            "description": "Show the environment and merchant identity a session would use",
            "inputSchema": schema(json!({
                "sessionHandle": {"type": "string", "description": "Handle returned by configure_credentials"}
            }), &[], false)
        },
        {
            "name": DECODE_CALLBACK,
            "description": "Decode the base64 data eSewa appends to the success URL and check its signature",
            "inputSchema": schema(json!({
                "data": {"type": "string", "description": "Value of the data query parameter"}
            }), &["data"], true)
        }
    ])
}
