// packages/interceptor/src/lifecycle/mod.rs
//! Interceptor lifecycle
//!
//! - **Registry**: scope → active instance, context → controlling instance
//! - **Manager**: activation and context claiming
//!
//! The registry is an explicit value owned by the host and passed to every
//! lifecycle operation; there is no process-wide singleton.

pub mod manager;
pub mod registry;

// Re-export commonly used types
pub use manager::LifecycleManager;
pub use registry::{
    ClaimReport, ContextId, Installation, LifecycleState, ScopeId, ScopeRegistry,
};
