// packages/interceptor/src/lib.rs
//! Relay Interceptor Library
//!
//! Intercepts outbound requests from a set of network-facing contexts and
//! reroutes those aimed at configured domains through a same-origin proxy
//! endpoint (`/proxy?url=...`), stripping credentials on the way.
//!
//! # Architecture
//!
//! - **interception**: matching, rewriting and forwarding of requests
//! - **lifecycle**: scope registry, activation and context claiming
//! - **observability**: tracing setup and metric counters
//! - **utils**: configuration and errors
//!
//! # Example
//!
//! ```no_run
//! use relay_interceptor::{
//!     ContextId, HyperTransport, InterceptorConfig, LifecycleManager, ScopeId, ScopeRegistry,
//! };
//!
//! # fn main() -> relay_interceptor::Result<()> {
//! let registry = ScopeRegistry::new();
//! let scope = ScopeId::new("/");
//! registry.register_context(&scope, ContextId::new("tab-1"));
//!
//! let manager = LifecycleManager::new(InterceptorConfig::load()?, HyperTransport::new()?.boxed());
//! let interceptor = manager.activate(&registry, &scope)?;
//! println!("active: {}", interceptor.id());
//! # Ok(())
//! # }
//! ```

// Public module exports
pub mod interception;
pub mod lifecycle;
pub mod observability;
pub mod utils;

// Re-export commonly used types
pub use interception::{
    CredentialsMode, DomainAllowList, FetchOutcome, HyperTransport, InterceptedRequest,
    InterceptionDecision, Interceptor, ProxiedRequest, ProxyOrigin, ProxyTransport,
};
pub use lifecycle::{ContextId, LifecycleManager, LifecycleState, ScopeId, ScopeRegistry};
pub use utils::config::InterceptorConfig;
pub use utils::errors::{InterceptorError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
