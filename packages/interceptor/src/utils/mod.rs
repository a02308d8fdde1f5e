// packages/interceptor/src/utils/mod.rs
//! Common utilities
//!
//! - **config**: layered configuration loading and validation
//! - **errors**: error taxonomy and `Result` alias

pub mod config;
pub mod errors;

pub use config::{InterceptorConfig, LogFormat};
pub use errors::{InterceptorError, Result};
