// packages/interceptor/src/interception/forwarder.rs
//! Rewriter/Forwarder
//!
//! Issues a proxied request in place of the original and hands back the
//! proxy's response as the outcome of the original request. A failure here
//! is final: no retry, and no direct request to the original host.

use crate::interception::origin::ProxyOrigin;
use crate::interception::request::InterceptedRequest;
use crate::interception::rewriter::{self, ProxiedRequest};
use crate::interception::transport::{ProxyHttpResponse, ProxyTransport};
use crate::utils::errors::{InterceptorError, Result};
use parking_lot::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{debug, error};

/// Sends proxied requests through a transport
pub struct Forwarder {
    /// Cloned per request; the lock is never held across an await
    transport: Mutex<ProxyTransport>,

    /// Upper bound on one proxied request
    timeout: Duration,
}

impl Forwarder {
    pub fn new(transport: ProxyTransport, timeout: Duration) -> Self {
        Self {
            transport: Mutex::new(transport),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Rewrite `request` against `proxy_origin` and forward it
    pub async fn forward_request(
        &self,
        request: &InterceptedRequest,
        proxy_origin: &ProxyOrigin,
        cancel: &CancellationToken,
    ) -> Result<ProxyHttpResponse> {
        self.forward(rewriter::rewrite(request, proxy_origin), cancel)
            .await
    }

    /// Issue `proxied` once and return the proxy's response
    ///
    /// Cancelling `cancel` drops the in-flight request.
    pub async fn forward(
        &self,
        proxied: ProxiedRequest,
        cancel: &CancellationToken,
    ) -> Result<ProxyHttpResponse> {
        let target = proxied.target().to_string();
        let request = proxied.into_http_request()?;
        let transport = self.transport.lock().clone();

        debug!("Forwarding {} {}", request.method(), target);

        let call = tokio::time::timeout(self.timeout, transport.oneshot(request));

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Caller abandoned request to {}", target);
                Err(InterceptorError::Cancelled)
            }

            result = call => match result {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => {
                    error!("Forwarding to {} failed: {}", target, e);
                    Err(InterceptorError::Forwarding {
                        target,
                        reason: e.to_string(),
                    })
                }
                Err(_) => {
                    error!("Forwarding to {} timed out", target);
                    Err(InterceptorError::ForwardTimeout {
                        target,
                        secs: self.timeout.as_secs(),
                    })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::request::CredentialsMode;
    use crate::interception::transport::{boxed, ProxyHttpRequest};
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use hyper::{Method, Response, StatusCode};
    use std::sync::Arc;

    fn origin() -> ProxyOrigin {
        ProxyOrigin::parse("http://localhost:5000").unwrap()
    }

    /// Transport that records every request and answers 200 with the target URI
    fn recording_transport(seen: Arc<Mutex<Vec<ProxyHttpRequest>>>) -> ProxyTransport {
        boxed(tower::service_fn(move |req: ProxyHttpRequest| {
            let seen = Arc::clone(&seen);
            async move {
                let body = Full::new(Bytes::from(req.uri().to_string()));
                seen.lock().push(req);
                Ok::<_, std::io::Error>(Response::new(body))
            }
        }))
    }

    #[tokio::test]
    async fn test_forward_returns_proxy_response() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let forwarder = Forwarder::new(
            recording_transport(Arc::clone(&seen)),
            Duration::from_secs(5),
        );

        let req = InterceptedRequest::parse(Method::POST, "https://www.netflix.com/api")
            .unwrap()
            .with_header("content-type", "text/plain")
            .unwrap()
            .with_header("cookie", "a=b")
            .unwrap()
            .with_body(Bytes::from_static(b"payload"))
            .with_credentials(CredentialsMode::Include);

        let response = forwarder
            .forward_request(&req, &origin(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            body.as_ref(),
            b"http://localhost:5000/proxy?url=https%3A%2F%2Fwww.netflix.com%2Fapi"
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method(), &Method::POST);
        assert!(seen[0].headers().get("cookie").is_none());
        assert_eq!(seen[0].headers()["content-type"].to_str().unwrap(), "text/plain");
    }

    #[tokio::test]
    async fn test_transport_error_is_forwarding_failure() {
        let transport = boxed(tower::service_fn(|_req: ProxyHttpRequest| async {
            Err::<Response<Full<Bytes>>, _>(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        }));
        let forwarder = Forwarder::new(transport, Duration::from_secs(5));

        let req = InterceptedRequest::parse(Method::GET, "https://www.netflix.com/").unwrap();
        let err = forwarder
            .forward_request(&req, &origin(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, InterceptorError::Forwarding { .. }));
        assert!(err.is_forwarding_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_forwarding_failure() {
        let transport = boxed(tower::service_fn(|_req: ProxyHttpRequest| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, std::io::Error>(Response::new(Full::new(Bytes::new())))
        }));
        let forwarder = Forwarder::new(transport, Duration::from_secs(1));

        let req = InterceptedRequest::parse(Method::GET, "https://www.netflix.com/").unwrap();
        let err = forwarder
            .forward_request(&req, &origin(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, InterceptorError::ForwardTimeout { secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_cancellation_drops_request() {
        let transport = boxed(tower::service_fn(|_req: ProxyHttpRequest| async {
            std::future::pending::<()>().await;
            Ok::<_, std::io::Error>(Response::new(Full::new(Bytes::new())))
        }));
        let forwarder = Forwarder::new(transport, Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let req = InterceptedRequest::parse(Method::GET, "https://www.netflix.com/").unwrap();
        let abandon = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            abandon.cancel();
        });

        let err = forwarder
            .forward_request(&req, &origin(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, InterceptorError::Cancelled));
    }
}
