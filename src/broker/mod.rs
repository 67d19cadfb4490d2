//! Credential broker
//!
//! Manages the lifecycle of delegated-access tokens for multiple identity
//! providers:
//!
//! - durable token storage keyed by `(user, provider)`
//! - authorization-code flows (redirect out, exchange on callback)
//! - on-demand access-token issuance with per-provider refresh policies
//!
//! The broker is the only component that ever sees refresh tokens; callers
//! receive `{access_token, expires_at}` and nothing more.

mod endpoint;
mod flow;
mod issuer;
mod provider;
mod server;
mod store;

pub use endpoint::{HttpTokenEndpoint, TokenEndpoint, TokenGrant};
pub use flow::OAuthFlow;
pub use issuer::{IssuedToken, TokenIssuer};
pub use provider::{ProviderSpec, ProviderTable, RefreshPolicy, expires_at_ms, now_ms};
pub use server::{Broker, BrokerState, create_router, state_with};
pub use store::{FileTokenStore, MemoryTokenStore, TokenRecord, TokenStore};
