// packages/interceptor/src/utils/errors.rs
//! Error types for the relay interceptor
//!
//! Three families matter to callers:
//!
//! - **Configuration**: the allow-list or proxy origin is unusable. Fatal to
//!   activation, the scope is never claimed in that state.
//! - **Forwarding**: the proxied request did not complete. Surfaced as the
//!   failure of the original request, never retried.
//! - **Claim**: a context could not be brought under a new instance. Logged
//!   and skipped by the lifecycle manager.

use thiserror::Error;

/// Errors produced by the interceptor
#[derive(Error, Debug)]
pub enum InterceptorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Forwarding to {target} failed: {reason}")]
    Forwarding { target: String, reason: String },

    #[error("Forwarding to {target} timed out after {secs}s")]
    ForwardTimeout { target: String, secs: u64 },

    #[error("Request abandoned before the proxy responded")]
    Cancelled,

    #[error("Failed to claim context {context}: {reason}")]
    ClaimFailed { context: String, reason: String },

    #[error("No active interceptor for scope {0}")]
    NotActive(String),

    #[error("Interceptor instance {0} has been superseded")]
    Superseded(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),
}

impl InterceptorError {
    /// True for every way a proxied request can fail to produce a response
    pub fn is_forwarding_failure(&self) -> bool {
        matches!(
            self,
            Self::Forwarding { .. } | Self::ForwardTimeout { .. } | Self::Cancelled
        )
    }

    /// True for errors that must abort activation
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::ConfigLoad(_))
    }
}

/// Result type alias for interceptor operations
pub type Result<T> = std::result::Result<T, InterceptorError>;
