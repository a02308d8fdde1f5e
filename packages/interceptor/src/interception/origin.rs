// packages/interceptor/src/interception/origin.rs
//! Proxy origin
//!
//! The origin that serves the `/proxy` endpoint. Rewritten requests are
//! addressed to `<origin>/proxy?url=<encoded original URL>`.

use crate::utils::errors::{InterceptorError, Result};
use std::fmt;
use url::Url;

/// Reserved path prefix of the proxy endpoint
pub const PROXY_PATH: &str = "/proxy";

/// Name of the query parameter carrying the original URL
pub const PROXY_URL_PARAM: &str = "url";

/// Scheme, host and port of the proxy endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyOrigin {
    url: Url,
}

impl ProxyOrigin {
    /// Parse an origin such as `http://localhost:5000`
    ///
    /// A trailing `/` is accepted; any other path, query or fragment is
    /// rejected since the origin is not a resource.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| {
            InterceptorError::Configuration(format!("Invalid proxy origin {:?}: {}", raw, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(InterceptorError::Configuration(format!(
                "Proxy origin must be http or https, got {:?}",
                url.scheme()
            )));
        }

        if url.host_str().is_none() {
            return Err(InterceptorError::Configuration(format!(
                "Proxy origin {:?} has no host",
                raw
            )));
        }

        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(InterceptorError::Configuration(format!(
                "Proxy origin {:?} must not carry a path, query or fragment",
                raw
            )));
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(InterceptorError::Configuration(format!(
                "Proxy origin {:?} must not embed credentials",
                raw
            )));
        }

        Ok(Self { url })
    }

    /// Host name the proxy is reached on (lowercased by URL parsing)
    pub fn host(&self) -> &str {
        // Presence checked in `parse`
        self.url.host_str().unwrap_or_default()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Serialized origin without trailing slash, e.g. `https://myproxy.example`
    pub fn as_origin_string(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Build `<origin>/proxy?url=<percent-encoded target>`
    pub fn proxy_url_for(&self, target: &Url) -> Url {
        let mut proxied = self.url.clone();
        proxied.set_path(PROXY_PATH);
        proxied.set_query(Some(&format!(
            "{}={}",
            PROXY_URL_PARAM,
            urlencoding::encode(target.as_str())
        )));
        proxied
    }
}

impl fmt::Display for ProxyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_origin_string())
    }
}
