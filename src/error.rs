// Payment Errors
//
// Error taxonomy for the eSewa tool operations. Tool dispatch folds every
// variant into a `success: false` record, so none of these reach the client
// as a protocol-level failure.

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// Malformed amount, missing identifiers or bad URLs. Raised before any
    /// signing or network activity.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network-level failure talking to the gateway (includes timeouts).
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status.
    #[error("Gateway returned HTTP {status}: {body}")]
    GatewayStatus { status: u16, body: String },

    /// The gateway answered 2xx but the body was not what we expect.
    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),

    #[error("Unknown tool: {0}")]
    UnknownOperation(String),
}

impl PaymentError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Transport failures are reported as `status: "FAILED"` records.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::GatewayStatus { .. } | Self::MalformedResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PaymentError::invalid("amount must not be negative");
        assert_eq!(error.to_string(), "Invalid input: amount must not be negative");

        let error = PaymentError::GatewayStatus { status: 503, body: "busy".into() };
        assert_eq!(error.to_string(), "Gateway returned HTTP 503: busy");
    }

    #[test]
    fn test_transport_classification() {
        assert!(PaymentError::MalformedResponse("no status".into()).is_transport_failure());
        assert!(PaymentError::GatewayStatus { status: 404, body: String::new() }.is_transport_failure());
        assert!(!PaymentError::invalid("x").is_transport_failure());
        assert!(!PaymentError::UnknownOperation("x".into()).is_transport_failure());
    }
}
