// packages/interceptor/src/utils/config.rs
//! Interceptor configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! config file, then `RELAY_INTERCEPTOR__*` environment variables.
//!
//! ```text
//! RELAY_INTERCEPTOR__PROXY_ORIGIN=http://127.0.0.1:5000
//! RELAY_INTERCEPTOR__DOMAINS=netflix.com,nflximg.net
//! ```

use crate::interception::allow_list::DomainAllowList;
use crate::interception::origin::ProxyOrigin;
use crate::utils::errors::{InterceptorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix (`RELAY_INTERCEPTOR__PROXY_ORIGIN`, ...)
pub const ENV_PREFIX: &str = "RELAY_INTERCEPTOR";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "RELAY_INTERCEPTOR_CONFIG";

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_NAME: &str = "relay-interceptor";

/// Domains rerouted through the proxy when none are configured
pub const DEFAULT_DOMAINS: &[&str] = &[
    "netflix.com",
    "nflxext.com",
    "nflxso.net",
    "nflxvideo.net",
    "nflximg.net",
];

pub const DEFAULT_PROXY_ORIGIN: &str = "http://localhost:5000";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Interceptor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Domain fragments whose requests are rerouted
    pub domains: Vec<String>,

    /// Origin serving the `/proxy` endpoint
    pub proxy_origin: String,

    /// Upper bound on a single proxied request (seconds)
    pub forward_timeout_secs: u64,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            proxy_origin: DEFAULT_PROXY_ORIGIN.to_string(),
            forward_timeout_secs: 30,
            log_format: LogFormat::default(),
        }
    }
}

impl InterceptorConfig {
    /// Load configuration from the default file (if present) and environment
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from_file(path),
            Err(_) => {
                let builder = config::Config::builder()
                    .add_source(config::File::with_name(DEFAULT_CONFIG_NAME).required(false));
                Self::build(builder, Self::environment())
            }
        }
    }

    /// Load configuration from an explicit file, still honouring environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading interceptor configuration from {}", path.display());

        let builder = config::Config::builder().add_source(config::File::from(path));
        Self::build(builder, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("domains")
            .try_parsing(true)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        env: config::Environment,
    ) -> Result<Self> {
        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field, returning the first configuration error found
    pub fn validate(&self) -> Result<()> {
        DomainAllowList::new(&self.domains)?;
        ProxyOrigin::parse(&self.proxy_origin)?;

        if self.forward_timeout_secs == 0 {
            return Err(InterceptorError::Configuration(
                "forward_timeout_secs must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = InterceptorConfig::default();
        assert_eq!(config.domains.len(), 5);
        assert_eq!(config.proxy_origin, "http://localhost:5000");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "domains = [\"example.com\"]\nproxy_origin = \"http://127.0.0.1:9000\"\nlog_format = \"json\""
        )
        .unwrap();

        let builder = config::Config::builder().add_source(config::File::from(file.path()));
        let env = InterceptorConfig::environment().source(Some(HashMap::new()));
        let config = InterceptorConfig::build(builder, env).unwrap();

        assert_eq!(config.domains, vec!["example.com".to_string()]);
        assert_eq!(config.proxy_origin, "http://127.0.0.1:9000");
        assert_eq!(config.log_format, LogFormat::Json);
        // Unset fields keep their defaults
        assert_eq!(config.forward_timeout_secs, 30);
    }

    #[test]
    fn test_environment_overrides_file() {
        let env_vars = HashMap::from([
            (
                "RELAY_INTERCEPTOR__PROXY_ORIGIN".to_string(),
                "http://10.0.0.2:5000".to_string(),
            ),
            (
                "RELAY_INTERCEPTOR__DOMAINS".to_string(),
                "netflix.com,nflximg.net".to_string(),
            ),
        ]);

        let env = InterceptorConfig::environment().source(Some(env_vars));
        let config = InterceptorConfig::build(config::Config::builder(), env).unwrap();

        assert_eq!(config.proxy_origin, "http://10.0.0.2:5000");
        assert_eq!(config.domains, vec!["netflix.com", "nflximg.net"]);
    }

    #[test]
    fn test_validate_rejects_empty_domains() {
        let config = InterceptorConfig {
            domains: vec![],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = InterceptorConfig {
            forward_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_origin() {
        let config = InterceptorConfig {
            proxy_origin: "not a url".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
