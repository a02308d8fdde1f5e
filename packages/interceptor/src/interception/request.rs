// packages/interceptor/src/interception/request.rs
//! Outbound request as seen at the interception boundary

use crate::utils::errors::{InterceptorError, Result};
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Request};
use url::Url;

/// Credential mode requested by the caller of an outbound request
///
/// Hosts attach it to a `hyper::Request` as an extension; requests without
/// one are treated as [`CredentialsMode::SameOrigin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMode {
    /// Never attach ambient credentials
    Omit,
    /// Attach ambient credentials only for same-origin targets
    #[default]
    SameOrigin,
    /// Always attach ambient credentials
    Include,
}

/// An outbound request at the moment of interception
///
/// Never mutated once intercepted; the rewriter derives a new value.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
    credentials: CredentialsMode,
}

impl InterceptedRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            credentials: CredentialsMode::default(),
        }
    }

    /// Parse a raw absolute URL
    pub fn parse(method: Method, raw_url: &str) -> Result<Self> {
        let url = Url::parse(raw_url)
            .map_err(|e| InterceptorError::InvalidRequest(format!("{}: {}", raw_url, e)))?;
        Ok(Self::new(method, url))
    }

    /// Build from a request handed over by the host
    ///
    /// The URI must be absolute since the interceptor sees requests before
    /// any connection is chosen.
    pub fn from_http(request: &Request<Bytes>) -> Result<Self> {
        let uri = request.uri();
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(InterceptorError::InvalidRequest(format!(
                "request URI {} is not absolute",
                uri
            )));
        }

        let credentials = request
            .extensions()
            .get::<CredentialsMode>()
            .copied()
            .unwrap_or_default();

        Ok(Self::parse(request.method().clone(), &uri.to_string())?
            .with_headers(request.headers().clone())
            .with_body(request.body().clone())
            .with_credentials(credentials))
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Append a header, keeping any existing values for the same name
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| InterceptorError::InvalidRequest(format!("header {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| InterceptorError::InvalidRequest(format!("header {}: {}", name, e)))?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialsMode) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Host of the target URL, `None` for host-less schemes such as `data:`
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn credentials(&self) -> CredentialsMode {
        self.credentials
    }
}
