//! OAuth authorization flow
//!
//! Builds provider authorization URLs and completes authorization-code
//! exchanges, persisting the resulting token record.
//!
//! The `state` parameter carries the user id verbatim — it is the only
//! mechanism correlating a callback to a user. It is not signed or
//! otherwise protected against forgery; a production hardening pass would
//! replace it with an authenticated, single-use value.

use std::sync::Arc;

use tracing::info;
use url::Url;

use super::endpoint::TokenEndpoint;
use super::provider::{ProviderTable, expires_at_ms, now_ms};
use super::store::{TokenRecord, TokenStore};
use crate::{Error, Result};

/// Authorization-flow controller for all configured providers.
pub struct OAuthFlow {
    providers: Arc<ProviderTable>,
    store: Arc<dyn TokenStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    /// Public base URL of the broker, used to derive callback URLs
    public_url: String,
}

impl OAuthFlow {
    /// Create a flow controller.
    #[must_use]
    pub fn new(
        providers: Arc<ProviderTable>,
        store: Arc<dyn TokenStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        public_url: String,
    ) -> Self {
        Self {
            providers,
            store,
            endpoint,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn redirect_uri(&self, provider: &str) -> String {
        format!("{}/callback/{provider}", self.public_url)
    }

    /// Build the provider authorization URL for a user.
    ///
    /// Fails fast with a configuration error when the provider is unknown
    /// or has no client credentials — a half-configured provider must never
    /// silently proceed.
    pub fn authorization_url(
        &self,
        provider: &str,
        user_id: &str,
        scope: Option<&str>,
    ) -> Result<Url> {
        let spec = self
            .providers
            .get(provider)
            .ok_or_else(|| Error::Config(format!("Unknown provider: {provider}")))?;

        let client_id = spec
            .client_id
            .as_deref()
            .ok_or_else(|| Error::Config(format!("Provider '{provider}' has no client_id")))?;
        if spec.client_secret.is_none() {
            return Err(Error::Config(format!(
                "Provider '{provider}' has no client_secret"
            )));
        }

        let mut url = Url::parse(&spec.authorize_url)
            .map_err(|e| Error::Config(format!("Invalid authorize URL for '{provider}': {e}")))?;

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", client_id);
            params.append_pair("redirect_uri", &self.redirect_uri(provider));
            params.append_pair("state", user_id);

            if let Some(scope) = scope.or(spec.default_scope.as_deref()) {
                params.append_pair("scope", scope);
            }

            if spec.offline_access {
                // Force the consent screen so the provider reissues a
                // refresh token even on re-authorization.
                params.append_pair("access_type", "offline");
                params.append_pair("prompt", "consent");
            }
        }

        Ok(url)
    }

    /// Complete an authorization-code exchange and persist the record.
    ///
    /// The stored record replaces any prior record for the
    /// `(user, provider)` key in full.
    pub async fn complete_authorization(
        &self,
        provider: &str,
        code: &str,
        state: &str,
    ) -> Result<()> {
        let spec = self
            .providers
            .get(provider)
            .ok_or_else(|| Error::Config(format!("Unknown provider: {provider}")))?;

        let user_id = state;
        let redirect_uri = self.redirect_uri(provider);
        let grant = self.endpoint.exchange_code(spec, code, &redirect_uri).await?;

        let now = now_ms();
        let record = TokenRecord {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: expires_at_ms(spec, grant.expires_in, now),
            scope: grant.scope,
        };

        self.store.put(user_id, provider, record).await?;
        info!(user = %user_id, provider = %provider, "Authorization complete");
        Ok(())
    }
}
