//! Backend adapter abstraction
//!
//! Adapters translate generic tool calls into provider-specific API calls.
//! Their tool semantics live outside this crate; the gateway consumes them
//! through [`ToolAdapter`] and routes calls with [`AdapterRegistry`].

mod http;

pub use http::HttpAdapter;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::Result;
use crate::protocol::Tool;

/// Service family an adapter fronts; drives keyword-heuristic routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    /// Issue tracker (issues, repos, pull requests)
    Tracker,
    /// Calendar service
    Calendar,
    /// Mailbox
    Mail,
    /// File storage
    Storage,
    /// Relational store
    Database,
}

impl AdapterKind {
    /// Guess the adapter family from a tool name.
    ///
    /// Defensive default for tools that were never listed; exact routing
    /// via the descriptor table always takes precedence.
    #[must_use]
    pub fn from_tool_name(name: &str) -> Option<Self> {
        let n = name.to_ascii_lowercase();
        let contains = |keys: &[&str]| keys.iter().any(|k| n.contains(k));

        if contains(&["issue", "repo", "pull"]) {
            Some(Self::Tracker)
        } else if contains(&["event", "calendar"]) {
            Some(Self::Calendar)
        } else if contains(&["mail", "inbox"]) {
            Some(Self::Mail)
        } else if contains(&["file", "folder", "drive", "upload"]) {
            Some(Self::Storage)
        } else if contains(&["table", "record", "query", "row"]) {
            Some(Self::Database)
        } else {
            None
        }
    }
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tracker => "tracker",
            Self::Calendar => "calendar",
            Self::Mail => "mail",
            Self::Storage => "storage",
            Self::Database => "database",
        };
        f.write_str(s)
    }
}

/// A backend adapter: a source of tools and an executor for them.
///
/// Implementations must be `Send + Sync + 'static` so they can be stored
/// in `Arc<dyn ToolAdapter>` and shared across request tasks.
#[async_trait]
pub trait ToolAdapter: Send + Sync + 'static {
    /// Unique, stable adapter name.
    fn name(&self) -> &str;

    /// Service family, for heuristic routing.
    fn kind(&self) -> AdapterKind;

    /// Identity provider whose credentials this adapter needs, if any.
    fn provider(&self) -> Option<&str>;

    /// List the tools this adapter exposes.
    async fn list_tools(&self) -> Result<Vec<Tool>>;

    /// Invoke a tool with JSON arguments and an already-resolved
    /// credential. Returns the raw result payload.
    async fn call_tool(&self, tool: &str, args: Value, credential: Option<&str>) -> Result<Value>;
}

/// Registry of adapters plus the tool-name routing table.
pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<dyn ToolAdapter>>,
    /// tool name → adapter name, rebuilt on every aggregation
    routes: DashMap<String, String>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
            routes: DashMap::new(),
        }
    }

    /// Register an adapter under its own name.
    pub fn register(&self, adapter: Arc<dyn ToolAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    /// All registered adapters.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn ToolAdapter>> {
        self.adapters.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Returns `true` if no adapters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Aggregate tool listings across all adapters, concurrently.
    ///
    /// An adapter that fails or times out is logged and excluded from the
    /// aggregate; the listing itself never fails. The exact-name routing
    /// table is rebuilt from whatever listed successfully.
    pub async fn aggregate_tools(&self) -> Vec<Tool> {
        let adapters = self.all();
        let listings = futures::future::join_all(adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            async move {
                let tools = adapter.list_tools().await;
                (adapter.name().to_string(), tools)
            }
        }))
        .await;

        let mut aggregate = Vec::new();
        for (name, listing) in listings {
            match listing {
                Ok(tools) => {
                    for tool in tools {
                        self.routes.insert(tool.name.clone(), name.clone());
                        aggregate.push(tool);
                    }
                }
                Err(e) => {
                    warn!(adapter = %name, error = %e, "Adapter excluded from tool listing");
                }
            }
        }
        aggregate
    }

    /// Resolve the adapter for a tool name.
    ///
    /// Exact lookup against the descriptor-built table first; keyword
    /// heuristics on the name as a defensive fallback.
    #[must_use]
    pub fn route(&self, tool: &str) -> Option<Arc<dyn ToolAdapter>> {
        if let Some(adapter_name) = self.routes.get(tool) {
            if let Some(adapter) = self.adapters.get(adapter_name.value()) {
                return Some(Arc::clone(adapter.value()));
            }
        }

        let kind = AdapterKind::from_tool_name(tool)?;
        let fallback = self
            .adapters
            .iter()
            .find(|e| e.value().kind() == kind)
            .map(|e| Arc::clone(e.value()));
        if fallback.is_some() {
            debug!(tool = %tool, kind = %kind, "Routed by keyword heuristic");
        }
        fallback
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
