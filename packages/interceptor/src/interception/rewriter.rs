// packages/interceptor/src/interception/rewriter.rs
//! Rewrites a matched request into a request against the proxy endpoint
//!
//! ```text
//! GET https://www.netflix.com/title/123
//!   => GET https://myproxy.example/proxy?url=https%3A%2F%2Fwww.netflix.com%2Ftitle%2F123
//! ```
//!
//! Method, headers and body carry over. Credential headers are dropped and
//! the credentials mode is forced to `Omit` so that neither side of the
//! boundary sees the other's session.

use crate::interception::origin::ProxyOrigin;
use crate::interception::request::{CredentialsMode, InterceptedRequest};
use crate::utils::errors::{InterceptorError, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderName};
use hyper::{HeaderMap, Method, Request, Uri};
use url::Url;

/// Headers holding credential material tied to the original origin
pub const CREDENTIAL_HEADERS: [HeaderName; 3] = [
    header::COOKIE,
    header::AUTHORIZATION,
    header::PROXY_AUTHORIZATION,
];

/// Headers the transport derives from the proxy target
const TRANSPORT_HEADERS: [HeaderName; 1] = [header::HOST];

/// A request addressed to the proxy endpoint in place of the original
#[derive(Debug, Clone)]
pub struct ProxiedRequest {
    method: Method,
    target: Url,
    original_url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl ProxiedRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// `<origin>/proxy?url=...`
    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn original_url(&self) -> &Url {
        &self.original_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Always [`CredentialsMode::Omit`]
    pub fn credentials(&self) -> CredentialsMode {
        CredentialsMode::Omit
    }

    /// View this request as it would appear to an interceptor on the way out
    pub fn to_intercepted(&self) -> InterceptedRequest {
        InterceptedRequest::new(self.method.clone(), self.target.clone())
            .with_headers(self.headers.clone())
            .with_body(self.body.clone())
            .with_credentials(self.credentials())
    }

    /// Convert into a request ready for the transport
    pub fn into_http_request(self) -> Result<Request<Full<Bytes>>> {
        let uri: Uri = self.target.as_str().parse().map_err(|e| {
            InterceptorError::InvalidRequest(format!("proxy target {}: {}", self.target, e))
        })?;

        let mut request = Request::new(Full::new(self.body));
        *request.method_mut() = self.method;
        *request.uri_mut() = uri;
        *request.headers_mut() = self.headers;
        request.extensions_mut().insert(CredentialsMode::Omit);

        Ok(request)
    }
}

/// Build the proxied form of `request`
pub fn rewrite(request: &InterceptedRequest, proxy_origin: &ProxyOrigin) -> ProxiedRequest {
    let original_url = without_userinfo(request.url());

    ProxiedRequest {
        method: request.method().clone(),
        target: proxy_origin.proxy_url_for(&original_url),
        original_url,
        headers: forwardable_headers(request.headers()),
        body: request.body().clone(),
    }
}

/// `url` with any `user:password@` removed
fn without_userinfo(url: &Url) -> Url {
    let mut url = url.clone();
    if url.has_authority() {
        // Only cannot-be-a-base URLs refuse these, and they carry no userinfo
        let _ = url.set_username("");
        let _ = url.set_password(None);
    }
    url
}

/// Copy headers in order, leaving out credential and transport headers
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        if CREDENTIAL_HEADERS.contains(name) || TRANSPORT_HEADERS.contains(name) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }

    forwarded
}
