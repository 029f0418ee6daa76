// Payment Service
//
// The tool operations. Each takes a plain argument record, resolves the
// effective credentials, and returns a plain result record. Only input
// validation produces an `Err`; gateway failures are already folded into
// `success: false` results by the gateway client.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::amount::{Amount, AmountInput};
use crate::config::{CredentialConfig, Environment, GatewaySettings};
use crate::error::{PaymentError, Result};
use crate::gateway::{
    EsewaGateway, GatewayTransport, HttpTransport, PaymentStatus, RefundResult, StatusQuery,
    VerificationResult,
};
use crate::resolver::{non_empty, ConfigResolver, ConfigSummary, CredentialOverride};
use crate::session_store::{InMemorySessionStore, SessionStore};
use crate::signing::{self, CallbackData, SignedPayload, TransactionRequest};

/// Optional per-call credentials and session scope shared by most tools
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialArgs {
    #[serde(default, alias = "merchantCode", alias = "merchant_identity")]
    pub merchant_identity: Option<String>,
    #[serde(default, alias = "secret_key")]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default, alias = "sessionId", alias = "session_handle")]
    pub session_handle: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentArgs {
    pub amount: AmountInput,
    #[serde(alias = "transaction_id")]
    pub transaction_id: String,
    #[serde(alias = "returnUrl", alias = "success_url")]
    pub success_url: String,
    #[serde(alias = "cancelUrl", alias = "failure_url")]
    pub failure_url: String,
    #[serde(flatten)]
    pub credentials: CredentialArgs,
}

/// Arguments for verify, status and refund
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionArgs {
    #[serde(alias = "transaction_id")]
    pub transaction_id: String,
    pub amount: AmountInput,
    #[serde(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureArgs {
    #[serde(alias = "merchantCode", alias = "merchant_identity")]
    pub merchant_identity: String,
    #[serde(alias = "secret_key")]
    pub secret_key: String,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default, alias = "sessionId", alias = "session_handle")]
    pub session_handle: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionArgs {
    #[serde(default, alias = "sessionId", alias = "session_handle")]
    pub session_handle: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackArgs {
    /// base64 `data` query parameter from the success redirect
    pub data: String,
    #[serde(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub success: bool,
    pub payment_url: String,
    pub payment_data: SignedPayload,
    pub environment: Environment,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureConfirmation {
    pub success: bool,
    pub session_handle: String,
    pub merchant_identity: String,
    pub environment: Environment,
    pub configured_at: String,
    pub message: String,
}

pub struct PaymentService {
    resolver: ConfigResolver,
    gateway: EsewaGateway,
}

impl PaymentService {
    pub fn new(resolver: ConfigResolver, gateway: EsewaGateway) -> Self {
        Self { resolver, gateway }
    }

    /// Wire a service from settings with the given backends
    pub fn with_backends(
        settings: &GatewaySettings,
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn GatewayTransport>,
    ) -> Self {
        Self::new(
            ConfigResolver::new(store, settings),
            EsewaGateway::new(transport, settings.lookup_retry.clone()),
        )
    }

    /// In-memory session store and the reqwest transport
    pub fn from_settings(settings: &GatewaySettings) -> Result<Self> {
        let store = Arc::new(InMemorySessionStore::new(
            settings.session_capacity,
            settings.session_ttl,
        ));
        let transport = Arc::new(HttpTransport::new(settings.http_timeout)?);
        Ok(Self::with_backends(settings, store, transport))
    }

    pub async fn initiate_payment(&self, args: InitiatePaymentArgs) -> Result<PaymentSession> {
        let amount = Amount::parse(&args.amount)?;
        let config = self.resolve(&args.credentials).await?;

        let tx = TransactionRequest {
            amount,
            transaction_id: args.transaction_id,
            success_url: args.success_url,
            failure_url: args.failure_url,
        };
        let payment_data = signing::build_initiation(&config, &tx)?;

        info!(
            transaction = %tx.transaction_id,
            amount = %tx.amount,
            environment = %config.environment,
            "🧾 Payment session created"
        );

        Ok(PaymentSession {
            success: true,
            payment_url: config.payment_url,
            payment_data,
            environment: config.environment,
            message: "Payment session created successfully. POST this data to paymentUrl."
                .to_string(),
        })
    }

    pub async fn verify_payment(&self, args: TransactionArgs) -> Result<VerificationResult> {
        let (config, query) = self.prepare_lookup(&args).await?;
        Ok(self.gateway.verify(&config, &query).await)
    }

    pub async fn get_payment_status(&self, args: TransactionArgs) -> Result<PaymentStatus> {
        let (config, query) = self.prepare_lookup(&args).await?;
        Ok(self.gateway.status(&config, &query).await)
    }

    pub async fn refund_payment(&self, args: TransactionArgs) -> Result<RefundResult> {
        let (config, query) = self.prepare_lookup(&args).await?;
        if query.amount.is_zero() {
            return Err(PaymentError::invalid("refund amount must be greater than zero"));
        }
        Ok(self.gateway.refund(&config, &query).await)
    }

    pub async fn configure_credentials(&self, args: ConfigureArgs) -> Result<ConfigureConfirmation> {
        let merchant = non_empty(Some(args.merchant_identity.as_str()))
            .ok_or_else(|| PaymentError::invalid("merchantIdentity is required"))?
            .to_string();
        if args.secret_key.is_empty() {
            return Err(PaymentError::invalid("secretKey is required"));
        }
        let environment = parse_environment(args.environment.as_deref())?.unwrap_or_default();
        let handle = match non_empty(args.session_handle.as_deref()) {
            Some(handle) => handle.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let config = CredentialConfig::new(merchant.clone(), args.secret_key, environment);
        self.resolver.configure(&handle, config).await;

        Ok(ConfigureConfirmation {
            success: true,
            message: format!(
                "Credentials stored for session {}. Pass this sessionHandle on later calls.",
                handle
            ),
            session_handle: handle,
            merchant_identity: merchant,
            environment,
            configured_at: Utc::now().to_rfc3339(),
        })
    }

    pub async fn get_current_config(&self, args: SessionArgs) -> ConfigSummary {
        self.resolver.describe(args.session_handle.as_deref()).await
    }

    pub async fn decode_callback(&self, args: CallbackArgs) -> Result<CallbackData> {
        let config = self.resolve(&args.credentials).await?;
        let data = signing::decode_callback(&config, &args.data)?;
        info!(
            transaction = data.transaction_uuid.as_deref().unwrap_or("unknown"),
            signature_valid = data.signature_valid,
            "Decoded gateway callback"
        );
        Ok(data)
    }

    async fn resolve(&self, credentials: &CredentialArgs) -> Result<CredentialConfig> {
        let mut inline = CredentialOverride {
            merchant_identity: credentials.merchant_identity.clone(),
            secret_key: credentials.secret_key.clone(),
            environment: None,
        };
        // environment only applies to a complete override
        if inline.complete().is_some() {
            inline.environment = parse_environment(credentials.environment.as_deref())?;
        }
        Ok(self
            .resolver
            .resolve(credentials.session_handle.as_deref(), Some(&inline))
            .await)
    }

    async fn prepare_lookup(&self, args: &TransactionArgs) -> Result<(CredentialConfig, StatusQuery)> {
        let amount = Amount::parse(&args.amount)?;
        signing::validate_transaction_id(&args.transaction_id)?;
        let config = self.resolve(&args.credentials).await?;
        if config.merchant_identity.trim().is_empty() {
            return Err(PaymentError::invalid("merchant identity is required"));
        }
        let query = StatusQuery {
            transaction_id: args.transaction_id.clone(),
            amount,
        };
        Ok((config, query))
    }
}

fn parse_environment(raw: Option<&str>) -> Result<Option<Environment>> {
    non_empty(raw).map(str::parse::<Environment>).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct CompleteTransport;

    #[async_trait]
    impl GatewayTransport for CompleteTransport {
        async fn get_json(&self, _url: &str, query: &[(&str, String)]) -> Result<Value> {
            Ok(json!({ "status": "COMPLETE", "transaction_uuid": query[2].1 }))
        }

        async fn post_json(&self, _url: &str, _body: &Value) -> Result<Value> {
            Ok(json!({ "status": "REFUNDED", "message": "ok" }))
        }
    }

    fn service() -> PaymentService {
        PaymentService::with_backends(
            &GatewaySettings::default(),
            Arc::new(InMemorySessionStore::default()),
            Arc::new(CompleteTransport),
        )
    }

    fn initiate_args(value: Value) -> InitiatePaymentArgs {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_initiate_with_defaults() {
        let session = service()
            .initiate_payment(initiate_args(json!({
                "amount": 100,
                "transactionId": "TXN-001",
                "successUrl": "https://shop.example.com/ok",
                "failureUrl": "https://shop.example.com/fail"
            })))
            .await
            .unwrap();

        assert!(session.success);
        assert_eq!(session.environment, Environment::Sandbox);
        assert_eq!(session.payment_url, "https://rc-epay.esewa.com.np/api/epay/main/v2/form");
        assert_eq!(session.payment_data.signature, "NAmQNA4frUMSFqdX8BSoDVytAF52pKOFK4KUCWKPR2U=");
    }

    #[tokio::test]
    async fn test_initiate_accepts_legacy_argument_names() {
        let session = service()
            .initiate_payment(initiate_args(json!({
                "amount": "100.0",
                "transactionId": "TXN-001",
                "returnUrl": "https://shop.example.com/ok",
                "cancelUrl": "https://shop.example.com/fail",
                "merchantCode": "SHOP",
                "secretKey": "shop-secret",
                "environment": "production"
            })))
            .await
            .unwrap();

        assert_eq!(session.environment, Environment::Production);
        assert_eq!(session.payment_data.product_code, "SHOP");
        assert_eq!(session.payment_data.total_amount, "100");
        assert_eq!(
            session.payment_data.signature,
            signing::sign(
                "shop-secret",
                "total_amount=100,transaction_uuid=TXN-001,product_code=SHOP"
            )
        );
    }

    #[tokio::test]
    async fn test_initiate_rejects_bad_environment() {
        let result = service()
            .initiate_payment(initiate_args(json!({
                "amount": 100,
                "transactionId": "TXN-001",
                "successUrl": "https://shop.example.com/ok",
                "failureUrl": "https://shop.example.com/fail",
                "merchantIdentity": "SHOP",
                "secretKey": "shop-secret",
                "environment": "staging"
            })))
            .await;
        assert!(matches!(result, Err(PaymentError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_environment_without_inline_credentials_is_ignored() {
        let service = service();
        service
            .configure_credentials(ConfigureArgs {
                merchant_identity: "M1".into(),
                secret_key: "S1".into(),
                environment: Some("production".into()),
                session_handle: Some("abc".into()),
            })
            .await
            .unwrap();

        for environment in ["staging", "sandbox"] {
            let session = service
                .initiate_payment(initiate_args(json!({
                    "amount": 100,
                    "transactionId": "TXN-001",
                    "successUrl": "https://shop.example.com/ok",
                    "failureUrl": "https://shop.example.com/fail",
                    "sessionHandle": "abc",
                    "environment": environment
                })))
                .await
                .unwrap();
            assert_eq!(session.environment, Environment::Production);
            assert_eq!(session.payment_data.product_code, "M1");
        }
    }

    #[tokio::test]
    async fn test_configure_generates_handle_when_missing() {
        let service = service();
        let confirmation = service
            .configure_credentials(ConfigureArgs {
                merchant_identity: "M1".into(),
                secret_key: "S1".into(),
                environment: None,
                session_handle: None,
            })
            .await
            .unwrap();

        assert_eq!(confirmation.environment, Environment::Sandbox);
        assert!(Uuid::parse_str(&confirmation.session_handle).is_ok());

        let summary = service
            .get_current_config(SessionArgs { session_handle: Some(confirmation.session_handle) })
            .await;
        assert!(summary.using_stored_credentials);
        assert_eq!(summary.merchant_identity, "M1");
    }

    #[tokio::test]
    async fn test_configure_requires_credentials() {
        let result = service()
            .configure_credentials(ConfigureArgs {
                merchant_identity: "  ".into(),
                secret_key: "S1".into(),
                environment: None,
                session_handle: Some("abc".into()),
            })
            .await;
        assert!(matches!(result, Err(PaymentError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_lookups_validate_before_network() {
        let args: TransactionArgs =
            serde_json::from_value(json!({ "transactionId": "TXN-001", "amount": -5 })).unwrap();
        assert!(service().verify_payment(args).await.is_err());

        let args: TransactionArgs =
            serde_json::from_value(json!({ "transactionId": "", "amount": 5 })).unwrap();
        assert!(service().get_payment_status(args).await.is_err());

        let args: TransactionArgs =
            serde_json::from_value(json!({ "transactionId": "TXN-001", "amount": 0 })).unwrap();
        assert!(service().refund_payment(args).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_and_refund() {
        let service = service();
        let args: TransactionArgs =
            serde_json::from_value(json!({ "transactionId": "TXN-001", "amount": 100 })).unwrap();

        let verification = service.verify_payment(args.clone()).await.unwrap();
        assert!(verification.verified);

        let refund = service.refund_payment(args).await.unwrap();
        assert!(refund.success);
        assert_eq!(refund.status, "REFUNDED");
        assert_eq!(refund.message.as_deref(), Some("ok"));
    }
}
