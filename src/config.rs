// Gateway Configuration
//
// Environment selection, the fixed eSewa endpoint table, per-call credential
// configuration and process settings read from environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::PaymentError;
use crate::reliability::RetryPolicy;

pub const DEFAULT_MERCHANT_CODE: &str = "EPAYTEST";
pub const DEFAULT_SECRET_KEY: &str = "8gBm/:&EnhH.1/q";

const SANDBOX_BASE: &str = "https://rc-epay.esewa.com.np";
const PRODUCTION_BASE: &str = "https://epay.esewa.com.np";

/// Which eSewa deployment a configuration talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }

    /// Endpoint pair for this environment. Credentials never influence it.
    pub fn endpoints(&self) -> GatewayEndpoints {
        let base = match self {
            Self::Sandbox => SANDBOX_BASE,
            Self::Production => PRODUCTION_BASE,
        };
        GatewayEndpoints {
            payment_url: format!("{}/api/epay/main/v2/form", base),
            verify_url: format!("{}/api/epay/transaction/status/", base),
            refund_url: format!("{}/api/epay/refund", base),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(PaymentError::invalid(format!(
                "unknown environment '{}', expected 'sandbox' or 'production'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEndpoints {
    pub payment_url: String,
    pub verify_url: String,
    pub refund_url: String,
}

/// Effective merchant identity, secret and endpoints for one outbound call.
///
/// Built fresh by the resolver and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialConfig {
    pub merchant_identity: String,
    pub secret_key: String,
    pub environment: Environment,
    pub payment_url: String,
    pub verify_url: String,
    pub refund_url: String,
}

impl CredentialConfig {
    pub fn new(
        merchant_identity: impl Into<String>,
        secret_key: impl Into<String>,
        environment: Environment,
    ) -> Self {
        let GatewayEndpoints { payment_url, verify_url, refund_url } = environment.endpoints();
        Self {
            merchant_identity: merchant_identity.into(),
            secret_key: secret_key.into(),
            environment,
            payment_url,
            verify_url,
            refund_url,
        }
    }

    pub fn sandbox_default() -> Self {
        Self::new(DEFAULT_MERCHANT_CODE, DEFAULT_SECRET_KEY, Environment::Sandbox)
    }
}

// Keeps the secret out of logs
impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("merchant_identity", &self.merchant_identity)
            .field("secret_key", &"<redacted>")
            .field("environment", &self.environment)
            .field("payment_url", &self.payment_url)
            .field("verify_url", &self.verify_url)
            .finish()
    }
}

/// Process-level settings for the tool server
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Fallback used when neither an override nor a stored session applies
    pub default_credentials: CredentialConfig,
    /// Environment given to inline overrides that do not name one
    pub override_default_environment: Environment,
    pub http_timeout: Duration,
    pub lookup_retry: RetryPolicy,
    pub session_capacity: usize,
    pub session_ttl: Option<Duration>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            default_credentials: CredentialConfig::sandbox_default(),
            override_default_environment: Environment::Sandbox,
            http_timeout: Duration::from_secs(10),
            lookup_retry: RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(200),
                max_delay: Duration::from_secs(5),
                backoff_multiplier: 2.0,
            },
            session_capacity: 1024,
            session_ttl: Some(Duration::from_secs(86_400)),
        }
    }
}

impl GatewaySettings {
    /// Read settings from environment variables, keeping defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let merchant = lookup("ESEWA_MERCHANT_CODE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MERCHANT_CODE.to_string());
        let secret = lookup("ESEWA_SECRET_KEY")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string());

        let override_default_environment = match lookup("ESEWA_OVERRIDE_DEFAULT_ENVIRONMENT") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("⚠️  Ignoring ESEWA_OVERRIDE_DEFAULT_ENVIRONMENT: {}", e);
                defaults.override_default_environment
            }),
            None => defaults.override_default_environment,
        };

        let timeout_secs = parse_or::<_, u64>(&lookup, "ESEWA_HTTP_TIMEOUT_SECS", 10);
        let max_attempts = parse_or::<_, u32>(&lookup, "ESEWA_VERIFY_MAX_ATTEMPTS", 3).max(1);
        let initial_backoff_ms = parse_or::<_, u64>(&lookup, "ESEWA_VERIFY_INITIAL_BACKOFF_MS", 200);
        let session_capacity = parse_or::<_, usize>(&lookup, "ESEWA_SESSION_CAPACITY", 1024).max(1);
        let ttl_secs = parse_or::<_, u64>(&lookup, "ESEWA_SESSION_TTL_SECS", 86_400);

        Self {
            default_credentials: CredentialConfig::new(merchant, secret, Environment::Sandbox),
            override_default_environment,
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
            lookup_retry: RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(initial_backoff_ms),
                ..defaults.lookup_retry
            },
            session_capacity,
            session_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("⚠️  Invalid value for {} ('{}'), using default", key, raw);
            default
        }),
        None => default,
    }
}
