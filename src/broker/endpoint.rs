//! Provider token endpoint client
//!
//! The wire-level half of the broker: authorization-code exchange and
//! refresh-token grants against a provider's token endpoint. Behind a trait
//! so the issuance service's refresh policy can be tested against a
//! counting fake instead of the network.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::provider::ProviderSpec;
use crate::{Error, Result};

/// Parsed token-endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    /// Access token
    pub access_token: String,
    /// Refresh token, when the provider issues one
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, when the provider reports one
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Granted scope
    #[serde(default)]
    pub scope: Option<String>,
}

/// Client for a provider's OAuth token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync + 'static {
    /// Exchange an authorization code for tokens (`authorization_code` grant).
    async fn exchange_code(
        &self,
        spec: &ProviderSpec,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant>;

    /// Trade a refresh token for a fresh access token (`refresh_token` grant).
    async fn refresh(&self, spec: &ProviderSpec, refresh_token: &str) -> Result<TokenGrant>;
}

/// HTTP implementation over a shared `reqwest` client.
pub struct HttpTokenEndpoint {
    http: Client,
}

impl HttpTokenEndpoint {
    /// Create an endpoint client with a bounded request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { http })
    }

    async fn post_form(
        &self,
        spec: &ProviderSpec,
        params: HashMap<&str, &str>,
    ) -> Result<TokenGrant> {
        let response = self
            .http
            .post(&spec.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // Provider error body kept for diagnosis
            return Err(Error::Transport(format!(
                "Token endpoint returned HTTP {status}: {body}"
            )));
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse token response: {e}")))?;

        debug!(provider = %spec.id, has_refresh = grant.refresh_token.is_some(), "Token grant received");
        Ok(grant)
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(
        &self,
        spec: &ProviderSpec,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant> {
        let client_id = spec
            .client_id
            .as_deref()
            .ok_or_else(|| Error::Config(format!("Provider '{}' has no client_id", spec.id)))?;
        let client_secret = spec
            .client_secret
            .as_deref()
            .ok_or_else(|| Error::Config(format!("Provider '{}' has no client_secret", spec.id)))?;

        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri);
        params.insert("client_id", client_id);
        params.insert("client_secret", client_secret);

        self.post_form(spec, params).await
    }

    async fn refresh(&self, spec: &ProviderSpec, refresh_token: &str) -> Result<TokenGrant> {
        let client_id = spec
            .client_id
            .as_deref()
            .ok_or_else(|| Error::Config(format!("Provider '{}' has no client_id", spec.id)))?;
        let client_secret = spec
            .client_secret
            .as_deref()
            .ok_or_else(|| Error::Config(format!("Provider '{}' has no client_secret", spec.id)))?;

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", client_id);
        params.insert("client_secret", client_secret);

        self.post_form(spec, params).await
    }
}
