//! Configuration management
//!
//! One explicit config struct per component; values are merged from an
//! optional YAML file and `TOOLHUB_`-prefixed environment variables.

use std::{collections::HashMap, path::Path, path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::adapter::AdapterKind;
use crate::broker::RefreshPolicy;
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Credential broker configuration
    pub broker: BrokerConfig,
    /// Protocol gateway configuration
    pub gateway: GatewayConfig,
    /// Identity provider configurations, keyed by provider id
    pub providers: HashMap<String, ProviderConfig>,
    /// Backend adapter configurations, keyed by adapter name
    pub adapters: HashMap<String, AdapterConfig>,
}

/// Credential broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL used to derive provider callback URLs; defaults to
    /// `http://{host}:{port}`
    pub public_url: Option<String>,
    /// Token storage directory; defaults to `~/.toolhub/tokens`
    pub storage_dir: Option<PathBuf>,
    /// Timeout for outbound calls to provider token endpoints
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            public_url: None,
            storage_dir: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl BrokerConfig {
    /// Public base URL of the broker.
    #[must_use]
    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

/// Protocol gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Broker issuance endpoint base URL (network resolver tier)
    pub broker_url: Option<String>,
    /// User on whose behalf broker tokens are issued
    pub user_id: String,
    /// Static fallback credential for offline/local use
    pub static_token: Option<String>,
    /// Timeout for broker calls made by the resolver
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Timeout for a single adapter tool call
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8788,
            broker_url: None,
            user_id: "default".to_string(),
            static_token: None,
            request_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// Per-provider configuration; unset fields fall back to built-in defaults
/// for known providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OAuth client id
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<String>,
    /// Authorization endpoint override
    pub authorize_url: Option<String>,
    /// Token endpoint override
    pub token_url: Option<String>,
    /// Default scope override
    pub scope: Option<String>,
    /// Refresh policy override
    pub refresh: Option<RefreshPolicy>,
    /// Whether issued tokens never expire
    pub non_expiring: Option<bool>,
    /// Whether to request offline access and force consent
    pub offline_access: Option<bool>,
}

/// Per-adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Service family, used for keyword-heuristic routing
    pub kind: AdapterKind,
    /// Remote adapter URL
    pub url: String,
    /// Provider whose credentials the adapter needs
    #[serde(default)]
    pub provider: Option<String>,
    /// Whether the adapter is registered at startup
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from an optional YAML file merged with
    /// `TOOLHUB_`-prefixed environment variables (`__` as separator).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed("TOOLHUB_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        for (name, adapter) in &self.adapters {
            if adapter.url.is_empty() {
                return Err(Error::Config(format!("Adapter '{name}' has an empty url")));
            }
        }
        for (id, provider) in &self.providers {
            if provider.client_id.is_some() != provider.client_secret.is_some() {
                return Err(Error::Config(format!(
                    "Provider '{id}' must set both client_id and client_secret or neither"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.broker.port, 8787);
        assert_eq!(config.gateway.port, 8788);
        assert_eq!(config.gateway.user_id, "default");
        assert_eq!(config.broker.public_url(), "http://127.0.0.1:8787");
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        write!(
            file,
            r#"
broker:
  port: 9000
  request_timeout: 5s
providers:
  github:
    client_id: cid
    client_secret: secret
adapters:
  tracker:
    kind: tracker
    url: http://localhost:7001/rpc
    provider: github
gateway:
  broker_url: http://localhost:9000
  static_token: offline-token
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.broker.port, 9000);
        assert_eq!(config.broker.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.providers["github"].client_id.as_deref(),
            Some("cid")
        );
        let tracker = &config.adapters["tracker"];
        assert_eq!(tracker.kind, AdapterKind::Tracker);
        assert!(tracker.enabled);
        assert_eq!(
            config.gateway.broker_url.as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::load(Some(Path::new("/nonexistent/toolhub.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn half_configured_provider_is_rejected() {
        let mut config = Config::default();
        config.providers.insert(
            "github".to_string(),
            ProviderConfig {
                client_id: Some("cid".to_string()),
                ..ProviderConfig::default()
            },
        );
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn empty_adapter_url_is_rejected() {
        let mut config = Config::default();
        config.adapters.insert(
            "tracker".to_string(),
            AdapterConfig {
                kind: AdapterKind::Tracker,
                url: String::new(),
                provider: None,
                enabled: true,
            },
        );
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
