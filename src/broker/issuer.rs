//! Token issuance service
//!
//! Serves short-lived access tokens on demand, refreshing through the
//! provider's token endpoint when the provider's policy requires it.
//! Refresh tokens never leave this module.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::endpoint::TokenEndpoint;
use super::provider::{ProviderTable, RefreshPolicy, expires_at_ms, now_ms};
use super::store::TokenStore;
use crate::{Error, Result};

/// What callers get back: the access token and its expiry, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Access token
    pub access_token: String,
    /// Expiry as epoch milliseconds
    pub expires_at: i64,
}

/// On-demand token issuance with per-provider refresh policies.
pub struct TokenIssuer {
    store: Arc<dyn TokenStore>,
    providers: Arc<ProviderTable>,
    endpoint: Arc<dyn TokenEndpoint>,
}

impl TokenIssuer {
    /// Create an issuer over the given store, policy table, and endpoint.
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        providers: Arc<ProviderTable>,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            store,
            providers,
            endpoint,
        }
    }

    /// Issue an access token for `(provider, user_id)`.
    ///
    /// Fails with [`Error::NotConnected`] when no record exists (the caller
    /// must run authorization first) and [`Error::RefreshFailed`] when a
    /// required refresh is rejected by the provider.
    pub async fn issue(&self, provider: &str, user_id: &str) -> Result<IssuedToken> {
        let spec = self
            .providers
            .get(provider)
            .ok_or_else(|| Error::Config(format!("Unknown provider: {provider}")))?;

        let Some(mut record) = self.store.get(user_id, provider).await? else {
            return Err(Error::NotConnected {
                user: user_id.to_string(),
                provider: provider.to_string(),
            });
        };

        let now = now_ms();
        let needs_refresh = match spec.refresh {
            // No refresh capability: serve the stored token as-is, even past
            // its recorded expiry.
            RefreshPolicy::Never => false,
            // Scope-drift providers: refresh on every issuance while a
            // refresh token exists, so the caller matches current consent.
            RefreshPolicy::Always => record.refresh_token.is_some(),
            RefreshPolicy::OnExpiry => record.is_expired(now),
        };

        if needs_refresh {
            let Some(refresh_token) = record.refresh_token.clone() else {
                // Expired with nothing to refresh against; the caller must
                // re-authorize.
                return Err(Error::RefreshFailed(format!(
                    "Token for '{provider}' expired and no refresh token is stored"
                )));
            };

            let grant = match self.endpoint.refresh(spec, &refresh_token).await {
                Ok(grant) => grant,
                Err(e) => {
                    warn!(user = %user_id, provider = %provider, error = %e, "Refresh rejected");
                    return Err(Error::RefreshFailed(e.to_string()));
                }
            };

            record.access_token = grant.access_token;
            record.expires_at = expires_at_ms(spec, grant.expires_in, now_ms());
            // Keep the stored refresh token unless the provider reissued one
            if let Some(new_refresh) = grant.refresh_token {
                record.refresh_token = Some(new_refresh);
            }
            if grant.scope.is_some() {
                record.scope = grant.scope;
            }

            self.store.put(user_id, provider, record.clone()).await?;
            info!(user = %user_id, provider = %provider, "Token refreshed");
        } else {
            debug!(user = %user_id, provider = %provider, "Serving stored token");
        }

        Ok(IssuedToken {
            access_token: record.access_token,
            expires_at: record.expires_at,
        })
    }
}
