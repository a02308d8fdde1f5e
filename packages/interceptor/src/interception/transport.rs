// packages/interceptor/src/interception/transport.rs
//! Transport used to reach the proxy endpoint
//!
//! The forwarder talks to the proxy through a boxed `tower::Service`, so the
//! production hyper client and test doubles plug in the same way.

use crate::utils::errors::{InterceptorError, Result as InterceptorResult};
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::util::BoxCloneService;
use tower::{Service, ServiceExt};
use tracing::{debug, warn};

/// Boxed error produced by a transport
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request as handed to the transport
pub type ProxyHttpRequest = Request<Full<Bytes>>;

/// Fully buffered proxy response
pub type ProxyHttpResponse = Response<Full<Bytes>>;

/// Type-erased transport
pub type ProxyTransport = BoxCloneService<ProxyHttpRequest, ProxyHttpResponse, BoxError>;

/// Box any cloneable service into a [`ProxyTransport`]
pub fn boxed<S>(service: S) -> ProxyTransport
where
    S: Service<ProxyHttpRequest, Response = ProxyHttpResponse> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    BoxCloneService::new(service.map_err(|err: S::Error| -> BoxError { err.into() }))
}

/// Pooled hyper client reaching `http` and `https` proxy origins
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HyperTransport {
    /// Build a client trusting the system roots, or the bundled webpki roots
    /// when none of the system ones load
    pub fn new() -> InterceptorResult<Self> {
        let tls = client_tls_config(root_store())?;
        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Self { client })
    }

    pub fn boxed(self) -> ProxyTransport {
        boxed(self)
    }
}

fn root_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        warn!("Certificate load error: {}", err);
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    if ignored > 0 {
        warn!("Ignored {} unparsable system certificates", ignored);
    }

    if added == 0 {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    debug!("Loaded {} root certificates", roots.len());
    roots
}

fn client_tls_config(roots: RootCertStore) -> InterceptorResult<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| InterceptorError::Configuration(format!("TLS client setup: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(config)
}

impl Service<ProxyHttpRequest> for HyperTransport {
    type Response = ProxyHttpResponse;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ProxyHttpRequest) -> Self::Future {
        let client = self.client.clone();

        Box::pin(async move {
            debug!("Proxy request: {} {}", request.method(), request.uri());

            let response = client.request(request).await?;

            // Buffer the body so the response outlives the connection
            let (parts, body) = response.into_parts();
            let body_bytes = body.collect().await?.to_bytes();

            debug!("Proxy response: {}", parts.status);
            Ok(Response::from_parts(parts, Full::new(body_bytes)))
        })
    }
}
