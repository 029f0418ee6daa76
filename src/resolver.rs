// Configuration Resolver
//
// Picks the credential configuration for one outbound call. First match wins
// and levels are never merged:
//   1. an inline override carrying both merchant identity and secret key
//   2. the configuration stored under the caller's session handle
//   3. the sandbox default
// Resolution never fails; missing or partial input falls through.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{CredentialConfig, Environment, GatewaySettings};
use crate::session_store::SessionStore;

/// Credentials supplied inline with a single tool call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialOverride {
    pub merchant_identity: Option<String>,
    pub secret_key: Option<String>,
    pub environment: Option<Environment>,
}

impl CredentialOverride {
    /// Merchant and secret, when both are present
    pub(crate) fn complete(&self) -> Option<(&str, &str)> {
        let merchant = non_empty(self.merchant_identity.as_deref())?;
        let secret = self.secret_key.as_deref().filter(|s| !s.is_empty())?;
        Some((merchant, secret))
    }

    fn is_partial(&self) -> bool {
        self.complete().is_none()
            && (non_empty(self.merchant_identity.as_deref()).is_some()
                || self.secret_key.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

/// What `get_current_config` reports. Never includes the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub environment: Environment,
    pub merchant_identity: String,
    pub using_stored_credentials: bool,
}

pub struct ConfigResolver {
    store: Arc<dyn SessionStore>,
    default_credentials: CredentialConfig,
    override_default_environment: Environment,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn SessionStore>, settings: &GatewaySettings) -> Self {
        Self {
            store,
            default_credentials: settings.default_credentials.clone(),
            override_default_environment: settings.override_default_environment,
        }
    }

    pub async fn resolve(
        &self,
        session: Option<&str>,
        inline: Option<&CredentialOverride>,
    ) -> CredentialConfig {
        if let Some(inline) = inline {
            if let Some((merchant, secret)) = inline.complete() {
                let environment = match inline.environment {
                    Some(environment) => environment,
                    None => {
                        if self.override_default_environment == Environment::Production {
                            warn!(
                                merchant = merchant,
                                "⚠️  Inline credentials without an environment resolve to production"
                            );
                        }
                        self.override_default_environment
                    }
                };
                debug!(merchant = merchant, environment = %environment, "Using inline credentials");
                return CredentialConfig::new(merchant, secret, environment);
            }
            if inline.is_partial() {
                warn!("⚠️  Inline credentials need both merchant identity and secret key, ignoring them");
            }
        }

        if let Some(handle) = non_empty(session) {
            if let Some(stored) = self.store.load(handle).await {
                debug!(session = handle, environment = %stored.environment, "Using stored session credentials");
                return stored;
            }
        }

        self.default_credentials.clone()
    }

    /// Store credentials for a session handle, replacing earlier ones
    pub async fn configure(&self, handle: &str, config: CredentialConfig) {
        info!(
            session = handle,
            merchant = %config.merchant_identity,
            environment = %config.environment,
            "🔐 Stored session credentials"
        );
        self.store.store(handle, config).await;
    }

    pub async fn describe(&self, session: Option<&str>) -> ConfigSummary {
        let stored = match non_empty(session) {
            Some(handle) => self.store.load(handle).await,
            None => None,
        };
        let using_stored_credentials = stored.is_some();
        let effective = stored.unwrap_or_else(|| self.default_credentials.clone());

        ConfigSummary {
            environment: effective.environment,
            merchant_identity: effective.merchant_identity,
            using_stored_credentials,
        }
    }
}

/// Blank handles and identifiers count as absent
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_MERCHANT_CODE, DEFAULT_SECRET_KEY};
    use crate::session_store::InMemorySessionStore;

    fn resolver() -> ConfigResolver {
        ConfigResolver::new(Arc::new(InMemorySessionStore::default()), &GatewaySettings::default())
    }

    fn inline(merchant: &str, secret: &str, environment: Option<Environment>) -> CredentialOverride {
        CredentialOverride {
            merchant_identity: Some(merchant.to_string()),
            secret_key: Some(secret.to_string()),
            environment,
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_sandbox_default() {
        let resolver = resolver();
        let config = resolver.resolve(None, None).await;
        assert_eq!(config, CredentialConfig::sandbox_default());
        assert_eq!(config.merchant_identity, DEFAULT_MERCHANT_CODE);
        assert_eq!(config.secret_key, DEFAULT_SECRET_KEY);

        // unknown handle is not an error
        let config = resolver.resolve(Some("never-configured"), None).await;
        assert_eq!(config.environment, Environment::Sandbox);
    }

    #[tokio::test]
    async fn test_precedence_inline_then_session_then_default() {
        let resolver = resolver();
        let stored = CredentialConfig::new("STORED", "S-secret", Environment::Production);
        resolver.configure("abc", stored.clone()).await;

        let o = inline("INLINE", "I-secret", Some(Environment::Sandbox));
        let config = resolver.resolve(Some("abc"), Some(&o)).await;
        assert_eq!(config.merchant_identity, "INLINE");
        assert_eq!(config.secret_key, "I-secret");
        assert_eq!(config.environment, Environment::Sandbox);

        assert_eq!(resolver.resolve(Some("abc"), None).await, stored);
        assert_eq!(resolver.resolve(None, None).await, CredentialConfig::sandbox_default());
    }

    #[tokio::test]
    async fn test_configure_then_resolve_production() {
        let resolver = resolver();
        resolver
            .configure("abc", CredentialConfig::new("M1", "S1", Environment::Production))
            .await;

        let config = resolver.resolve(Some("abc"), None).await;
        assert_eq!(config.merchant_identity, "M1");
        assert_eq!(config.secret_key, "S1");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.payment_url, Environment::Production.endpoints().payment_url);
        assert_eq!(config.verify_url, Environment::Production.endpoints().verify_url);
    }

    #[tokio::test]
    async fn test_partial_override_falls_through() {
        let resolver = resolver();
        resolver
            .configure("abc", CredentialConfig::new("STORED", "S", Environment::Sandbox))
            .await;

        let partial = CredentialOverride {
            merchant_identity: Some("ONLY-MERCHANT".to_string()),
            ..Default::default()
        };
        let config = resolver.resolve(Some("abc"), Some(&partial)).await;
        assert_eq!(config.merchant_identity, "STORED");
    }

    #[tokio::test]
    async fn test_override_environment_default_is_configurable() {
        let o = inline("M", "S", None);
        assert_eq!(resolver().resolve(None, Some(&o)).await.environment, Environment::Sandbox);

        let settings = GatewaySettings {
            override_default_environment: Environment::Production,
            ..GatewaySettings::default()
        };
        let resolver = ConfigResolver::new(Arc::new(InMemorySessionStore::default()), &settings);
        assert_eq!(resolver.resolve(None, Some(&o)).await.environment, Environment::Production);
    }

    #[tokio::test]
    async fn test_blank_handle_is_absent() {
        let resolver = resolver();
        resolver
            .configure("", CredentialConfig::new("BLANK", "S", Environment::Production))
            .await;
        assert_eq!(resolver.resolve(Some("   "), None).await, CredentialConfig::sandbox_default());
    }

    #[tokio::test]
    async fn test_describe_reports_stored_state() {
        let resolver = resolver();
        let summary = resolver.describe(Some("abc")).await;
        assert!(!summary.using_stored_credentials);
        assert_eq!(summary.merchant_identity, DEFAULT_MERCHANT_CODE);

        resolver
            .configure("abc", CredentialConfig::new("M1", "S1", Environment::Production))
            .await;
        let summary = resolver.describe(Some("abc")).await;
        assert_eq!(
            summary,
            ConfigSummary {
                environment: Environment::Production,
                merchant_identity: "M1".to_string(),
                using_stored_credentials: true,
            }
        );
    }
}
