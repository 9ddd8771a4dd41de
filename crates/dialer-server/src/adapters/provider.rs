//! HTTP Call Initiator
//!
//! Hands calls to the external call provider using reqwest.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use dialer::{CallInitiator, DispatchFailure, DomainError, InitiateCallRequest, InitiatedCall};

/// Provider connection settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL; calls are posted to `{base_url}/calls`
    pub base_url: String,
    /// Bearer credential for the provider
    pub api_key: Option<String>,
    /// Bound on a single initiation request
    pub timeout: Duration,
    pub user_agent: String,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            user_agent: "Dialer/1.0".to_string(),
        }
    }
}

/// HTTP implementation of CallInitiator
pub struct HttpCallInitiator {
    client: Client,
    endpoint: String,
    config: ProviderConfig,
}

impl HttpCallInitiator {
    pub fn new(config: ProviderConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DomainError::ExternalService(format!("Failed to build HTTP client: {e}")))?;

        let endpoint = format!("{}/calls", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("Provider request timed out: {e}")
    } else if e.is_connect() {
        format!("Could not connect to provider: {e}")
    } else {
        format!("Provider request failed: {e}")
    }
}

#[async_trait]
impl CallInitiator for HttpCallInitiator {
    async fn initiate(
        &self,
        request: &InitiateCallRequest,
    ) -> Result<InitiatedCall, DispatchFailure> {
        let mut builder = self.client.post(&self.endpoint).json(request);

        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        // Anything that prevents a response is worth retrying
        let response = builder
            .send()
            .await
            .map_err(|e| DispatchFailure::retryable(describe_transport_error(&e)))?;

        let status = response.status();

        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchFailure::from_status(status.as_u16(), &body));
        }

        // Accepted: the provider may already be dialing, so a garbled
        // acceptance is not retried.
        let body = response.text().await.map_err(|e| {
            DispatchFailure::non_retryable(format!(
                "Provider accepted the call but the response could not be read: {e}"
            ))
        })?;

        let accepted: InitiatedCall = serde_json::from_str(&body).map_err(|e| {
            DispatchFailure::non_retryable(format!(
                "Provider accepted the call but returned an invalid body: {e}"
            ))
        })?;

        if accepted.external_correlation_id.trim().is_empty() {
            return Err(DispatchFailure::non_retryable(
                "Provider accepted the call without a correlation id",
            ));
        }

        Ok(accepted)
    }
}
