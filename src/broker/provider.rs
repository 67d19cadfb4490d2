//! Provider policy table
//!
//! Each identity provider has its own expiry and refresh semantics. This
//! module collects them into one inspectable table: OAuth endpoints, default
//! scopes, refresh policy, and whether issued tokens expire at all.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;

/// Milliseconds in one year; sentinel horizon for non-expiring tokens.
const YEAR_MS: i64 = 365 * 24 * 3600 * 1000;

/// Default token lifetime when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// When a provider's access token must be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshPolicy {
    /// Provider has no refresh capability; never attempt one.
    Never,
    /// Refresh on every issuance while a refresh token is present, so the
    /// caller always gets a token matching the provider's current consent.
    /// Used for providers whose granted scopes drift.
    Always,
    /// Refresh only once `now >= expires_at`.
    OnExpiry,
}

/// Resolved settings for one provider.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    /// Provider identifier (e.g. "github")
    pub id: String,
    /// Authorization endpoint
    pub authorize_url: String,
    /// Token endpoint
    pub token_url: String,
    /// OAuth client id; checked at authorization-start time
    pub client_id: Option<String>,
    /// OAuth client secret; checked at authorization-start time
    pub client_secret: Option<String>,
    /// Scope requested when the caller supplies none
    pub default_scope: Option<String>,
    /// Refresh policy
    pub refresh: RefreshPolicy,
    /// Tokens never expire; `expires_at` gets the far-future sentinel
    pub non_expiring: bool,
    /// Request offline access and force the consent screen so a refresh
    /// token is reliably issued even on re-authorization
    pub offline_access: bool,
}

struct BuiltinDefaults {
    authorize_url: &'static str,
    token_url: &'static str,
    default_scope: Option<&'static str>,
    refresh: RefreshPolicy,
    non_expiring: bool,
    offline_access: bool,
}

/// Built-in provider knowledge. Config entries override any field; unknown
/// providers must spell out their endpoints in config.
fn builtin(id: &str) -> Option<BuiltinDefaults> {
    match id {
        "github" => Some(BuiltinDefaults {
            authorize_url: "https://github.com/login/oauth/authorize",
            token_url: "https://github.com/login/oauth/access_token",
            default_scope: Some("repo read:user"),
            refresh: RefreshPolicy::Never,
            non_expiring: true,
            offline_access: false,
        }),
        "google" => Some(BuiltinDefaults {
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
            token_url: "https://oauth2.googleapis.com/token",
            default_scope: Some(
                "https://www.googleapis.com/auth/calendar https://www.googleapis.com/auth/gmail.send",
            ),
            refresh: RefreshPolicy::OnExpiry,
            non_expiring: false,
            offline_access: true,
        }),
        // Granted scopes drift between issuances; refreshing every time keeps
        // the served token aligned with current consent. Whether that is an
        // upstream quirk or intended behavior is unverified.
        "microsoft" => Some(BuiltinDefaults {
            authorize_url: "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
            token_url: "https://login.microsoftonline.com/common/oauth2/v2.0/token",
            default_scope: Some("offline_access Files.ReadWrite Mail.Send"),
            refresh: RefreshPolicy::Always,
            non_expiring: false,
            offline_access: true,
        }),
        _ => None,
    }
}

/// Table of provider specs, keyed by provider id.
#[derive(Debug, Default)]
pub struct ProviderTable {
    providers: HashMap<String, ProviderSpec>,
}

impl ProviderTable {
    /// Build the table by layering config entries over built-in defaults.
    ///
    /// Built-in providers are present even without a config entry (they just
    /// lack client credentials until configured); config-only providers need
    /// explicit endpoints.
    #[must_use]
    pub fn from_config(config: &HashMap<String, ProviderConfig>) -> Self {
        let mut providers = HashMap::new();

        for id in ["github", "google", "microsoft"] {
            providers.insert(id.to_string(), Self::resolve(id, config.get(id)));
        }
        for (id, cfg) in config {
            providers
                .entry(id.clone())
                .or_insert_with(|| Self::resolve(id, Some(cfg)));
        }

        Self { providers }
    }

    fn resolve(id: &str, cfg: Option<&ProviderConfig>) -> ProviderSpec {
        let defaults = builtin(id);
        let d = defaults.as_ref();

        ProviderSpec {
            id: id.to_string(),
            authorize_url: cfg
                .and_then(|c| c.authorize_url.clone())
                .or_else(|| d.map(|d| d.authorize_url.to_string()))
                .unwrap_or_default(),
            token_url: cfg
                .and_then(|c| c.token_url.clone())
                .or_else(|| d.map(|d| d.token_url.to_string()))
                .unwrap_or_default(),
            client_id: cfg.and_then(|c| c.client_id.clone()),
            client_secret: cfg.and_then(|c| c.client_secret.clone()),
            default_scope: cfg
                .and_then(|c| c.scope.clone())
                .or_else(|| d.and_then(|d| d.default_scope.map(String::from))),
            refresh: cfg
                .and_then(|c| c.refresh)
                .or_else(|| d.map(|d| d.refresh))
                .unwrap_or(RefreshPolicy::OnExpiry),
            non_expiring: cfg
                .and_then(|c| c.non_expiring)
                .or_else(|| d.map(|d| d.non_expiring))
                .unwrap_or(false),
            offline_access: cfg
                .and_then(|c| c.offline_access)
                .or_else(|| d.map(|d| d.offline_access))
                .unwrap_or(false),
        }
    }

    /// Look up a provider by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ProviderSpec> {
        self.providers.get(id)
    }

    /// Ids of all known providers.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

/// Current time as epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Compute `expires_at` for a grant per the provider's expiry policy.
///
/// Non-expiring providers get `now + 1 year` so downstream checks stay a
/// single comparison; everyone else gets `now + expires_in`, with a one
/// hour default when the provider omits the field.
#[must_use]
pub fn expires_at_ms(spec: &ProviderSpec, expires_in_secs: Option<u64>, now_ms: i64) -> i64 {
    if spec.non_expiring {
        return now_ms + YEAR_MS;
    }
    let secs = expires_in_secs.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    now_ms + i64::try_from(secs).unwrap_or(0) * 1000
}
