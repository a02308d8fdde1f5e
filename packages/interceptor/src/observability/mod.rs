// packages/interceptor/src/observability/mod.rs
//! Logging and metrics
//!
//! - **Tracing**: `init_tracing` installs an `EnvFilter`-driven subscriber
//!   with pretty or JSON output. Hosts that already own a subscriber skip it.
//! - **Metrics**: counters are emitted through the `metrics` facade. The
//!   library installs no recorder; whichever one the host installs receives
//!   them.

use crate::utils::config::LogFormat;
use crate::utils::errors::{InterceptorError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Requests seen by an interceptor, labelled by `decision`
pub const REQUESTS_TOTAL: &str = "interceptor_requests_total";

/// Proxied requests that produced no response
pub const FORWARD_FAILURES_TOTAL: &str = "interceptor_forward_failures_total";

/// Successful scope activations
pub const ACTIVATIONS_TOTAL: &str = "interceptor_activations_total";

/// Contexts that could not be claimed during activation
pub const CLAIM_FAILURES_TOTAL: &str = "interceptor_claim_failures_total";

pub const DECISION_REDIRECT: &str = "redirect";
pub const DECISION_PASS_THROUGH: &str = "pass_through";

/// Install the global tracing subscriber
///
/// Filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| {
        InterceptorError::Configuration(format!("Failed to initialize tracing: {}", e))
    })
}

pub fn record_decision(decision: &'static str) {
    metrics::counter!(REQUESTS_TOTAL, "decision" => decision).increment(1);
}

pub fn record_forward_failure() {
    metrics::counter!(FORWARD_FAILURES_TOTAL).increment(1);
}

pub fn record_activation() {
    metrics::counter!(ACTIVATIONS_TOTAL).increment(1);
}

pub fn record_claim_failure() {
    metrics::counter!(CLAIM_FAILURES_TOTAL).increment(1);
}
