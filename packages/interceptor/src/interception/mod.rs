// packages/interceptor/src/interception/mod.rs
//! Request interception layer
//!
//! Every outbound request from a controlled context passes through here
//! before it reaches the network:
//!
//! - **Allow List**: domain fragments eligible for rerouting
//! - **Matcher**: pure decision, pass through or redirect
//! - **Rewriter**: builds the `/proxy?url=...` request, credentials stripped
//! - **Forwarder**: issues the proxied request through a transport
//! - **Interceptor**: one activated instance tying the above together
//!
//! # Architecture
//!
//! ```text
//! Outbound request
//!     │
//!     ├─ Matcher ── PassThrough ──▶ network (unchanged)
//!     │
//!     └─ Redirect ─▶ Rewriter ─▶ Forwarder ─▶ <origin>/proxy?url=...
//!                                     │
//!                                     └─▶ response returned to the caller
//! ```

pub mod allow_list;
pub mod forwarder;
pub mod interceptor;
pub mod matcher;
pub mod origin;
pub mod request;
pub mod rewriter;
pub mod transport;

// Re-export commonly used types
pub use allow_list::DomainAllowList;
pub use forwarder::Forwarder;
pub use interceptor::{FetchOutcome, InstanceId, Interceptor, InterceptorStats};
pub use matcher::{evaluate, should_redirect, InterceptionDecision};
pub use origin::{ProxyOrigin, PROXY_PATH};
pub use request::{CredentialsMode, InterceptedRequest};
pub use rewriter::{rewrite, ProxiedRequest};
pub use transport::{HyperTransport, ProxyTransport};
