//! Credential resolver
//!
//! Fallback chain used by any code path that needs a live access token for
//! an outbound provider call. Tiers are attempted in strict order; a tier's
//! failure is logged and falls through to the next, never aborting the
//! request:
//!
//! 1. caller-supplied bearer credential, used verbatim
//! 2. in-process broker call (when a direct binding is available)
//! 3. network broker call
//! 4. statically configured fallback credential
//!
//! The tier that satisfied a request is carried on the result so refresh
//! and routing problems stay diagnosable.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::broker::{IssuedToken, TokenIssuer};
use crate::{Error, Result};

/// Which tier produced a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Caller-supplied bearer token, passed through verbatim
    Bearer,
    /// In-process token issuance
    LocalBroker,
    /// Broker issuance endpoint over the network
    RemoteBroker,
    /// Statically configured fallback token
    StaticFallback,
}

/// A resolved credential and where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    /// Access token to attach to the outbound call
    pub token: String,
    /// Tier that satisfied the request
    pub source: CredentialSource,
}

/// Multi-tier credential resolution.
pub struct CredentialResolver {
    issuer: Option<Arc<TokenIssuer>>,
    broker_url: Option<String>,
    static_token: Option<String>,
    user_id: String,
    http: Client,
}

impl CredentialResolver {
    /// Create a resolver.
    ///
    /// `issuer` enables the in-process tier, `broker_url` the network tier,
    /// and `static_token` the final fallback; any of them may be absent.
    pub fn new(
        issuer: Option<Arc<TokenIssuer>>,
        broker_url: Option<String>,
        static_token: Option<String>,
        user_id: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            issuer,
            broker_url: broker_url.map(|u| u.trim_end_matches('/').to_string()),
            static_token,
            user_id,
            http,
        })
    }

    /// Resolve a credential for a provider.
    ///
    /// `bearer` is the credential carried on the inbound request, if any;
    /// when present it wins outright and the broker is never consulted.
    pub async fn resolve(
        &self,
        bearer: Option<&str>,
        provider: &str,
    ) -> Result<ResolvedCredential> {
        if let Some(token) = bearer.filter(|t| !t.is_empty()) {
            debug!(provider = %provider, tier = "bearer", "Credential resolved");
            return Ok(ResolvedCredential {
                token: token.to_string(),
                source: CredentialSource::Bearer,
            });
        }

        if let Some(issuer) = &self.issuer {
            match issuer.issue(provider, &self.user_id).await {
                Ok(token) => {
                    debug!(provider = %provider, tier = "local-broker", "Credential resolved");
                    return Ok(ResolvedCredential {
                        token: token.access_token,
                        source: CredentialSource::LocalBroker,
                    });
                }
                Err(e) => {
                    warn!(provider = %provider, tier = "local-broker", error = %e, "Tier failed, falling through");
                }
            }
        }

        if let Some(base) = &self.broker_url {
            match self.remote_issue(base, provider).await {
                Ok(token) => {
                    debug!(provider = %provider, tier = "remote-broker", "Credential resolved");
                    return Ok(ResolvedCredential {
                        token: token.access_token,
                        source: CredentialSource::RemoteBroker,
                    });
                }
                Err(e) => {
                    warn!(provider = %provider, tier = "remote-broker", error = %e, "Tier failed, falling through");
                }
            }
        }

        if let Some(token) = &self.static_token {
            debug!(provider = %provider, tier = "static", "Credential resolved");
            return Ok(ResolvedCredential {
                token: token.clone(),
                source: CredentialSource::StaticFallback,
            });
        }

        Err(Error::CredentialUnavailable(provider.to_string()))
    }

    async fn remote_issue(&self, base: &str, provider: &str) -> Result<IssuedToken> {
        let response = self
            .http
            .post(format!("{base}/token/{provider}"))
            .json(&json!({"user_id": self.user_id}))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Broker unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "Broker returned HTTP {status}: {body}"
            )));
        }

        response
            .json::<IssuedToken>()
            .await
            .map_err(|e| Error::Transport(format!("Malformed broker response: {e}")))
    }
}
