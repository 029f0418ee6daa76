// eSewa MCP Library
//
// Credential resolution, HMAC request signing and gateway verification for
// the eSewa ePay v2 API, plus the MCP tool surface that exposes them.

pub mod amount;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod reliability;
pub mod resolver;
pub mod service;
pub mod session_store;
pub mod signing;

// Re-export public types and functions
pub use amount::{Amount, AmountInput};
pub use config::{CredentialConfig, Environment, GatewaySettings};
pub use error::{PaymentError, Result};
pub use gateway::{EsewaGateway, GatewayTransport, HttpTransport, VerificationResult};
pub use resolver::{ConfigResolver, CredentialOverride};
pub use service::PaymentService;
pub use session_store::{InMemorySessionStore, SessionStore};
pub use signing::{build_initiation, SignedPayload, TransactionRequest};
