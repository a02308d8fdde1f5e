// packages/interceptor/src/interception/interceptor.rs
//! Interceptor instance
//!
//! One activated interceptor for one scope. Every outbound request from a
//! context it controls goes through [`Interceptor::on_fetch`], which either
//! hands the request back untouched or answers it with the proxy's response.

use crate::interception::allow_list::DomainAllowList;
use crate::interception::forwarder::Forwarder;
use crate::interception::matcher::{self, InterceptionDecision};
use crate::interception::origin::ProxyOrigin;
use crate::interception::request::InterceptedRequest;
use crate::interception::transport::{ProxyHttpResponse, ProxyTransport};
use crate::lifecycle::registry::ScopeId;
use crate::observability;
use crate::utils::config::InterceptorConfig;
use crate::utils::errors::{InterceptorError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::Request;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use ulid::Ulid;

/// Unique identity of an activated instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Ulid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// What became of an outbound request
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the host sends the original request as-is
    PassThrough(Request<Bytes>),
    /// Intercepted; this response stands in for the original request's
    Respond(ProxyHttpResponse),
}

/// Interceptor statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptorStats {
    pub redirected: u64,
    pub passed_through: u64,
    pub forward_failures: u64,
}

/// An interceptor bound to one scope
pub struct Interceptor {
    id: InstanceId,
    scope: ScopeId,
    activated_at: DateTime<Utc>,

    /// Configuration the instance was built from
    config: InterceptorConfig,

    allow_list: DomainAllowList,
    proxy_origin: ProxyOrigin,
    forwarder: Forwarder,

    /// Set once a newer instance takes over the scope
    superseded: AtomicBool,

    redirected: AtomicU64,
    passed_through: AtomicU64,
    forward_failures: AtomicU64,
}

impl Interceptor {
    /// Build an instance, failing on any configuration error
    pub fn new(
        scope: ScopeId,
        config: InterceptorConfig,
        transport: ProxyTransport,
    ) -> Result<Self> {
        config.validate()?;

        let allow_list = DomainAllowList::new(&config.domains)?;
        let proxy_origin = ProxyOrigin::parse(&config.proxy_origin)?;
        let forwarder = Forwarder::new(transport, config.forward_timeout());

        Ok(Self {
            id: InstanceId::new(),
            scope,
            activated_at: Utc::now(),
            config,
            allow_list,
            proxy_origin,
            forwarder,
            superseded: AtomicBool::new(false),
            redirected: AtomicU64::new(0),
            passed_through: AtomicU64::new(0),
            forward_failures: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    pub fn activated_at(&self) -> DateTime<Utc> {
        self.activated_at
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    pub fn allow_list(&self) -> &DomainAllowList {
        &self.allow_list
    }

    pub fn proxy_origin(&self) -> &ProxyOrigin {
        &self.proxy_origin
    }

    /// Decide what to do with `request` without sending anything
    pub fn evaluate(&self, request: &InterceptedRequest) -> InterceptionDecision {
        matcher::evaluate(request, &self.allow_list, &self.proxy_origin)
    }

    /// Handle one outbound request
    ///
    /// Requests that do not match, including ones whose URL cannot be
    /// parsed, come back as [`FetchOutcome::PassThrough`] unchanged. A
    /// matched request is answered by the proxy; if that fails the error is
    /// the outcome of the original request.
    pub async fn on_fetch(
        &self,
        request: Request<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        if self.is_superseded() {
            return Err(InterceptorError::Superseded(self.id.to_string()));
        }

        self.handle(request, cancel).await
    }

    /// Handle `request` whether or not this instance has been superseded
    ///
    /// Callers that resolved this instance as the current controller use
    /// this so a supersede racing the request does not fail it.
    pub(crate) async fn handle(
        &self,
        request: Request<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let intercepted = match InterceptedRequest::from_http(&request) {
            Ok(intercepted) => intercepted,
            Err(e) => {
                debug!("Passing through unparseable request: {}", e);
                self.record_pass_through();
                return Ok(FetchOutcome::PassThrough(request));
            }
        };

        let proxied = match self.evaluate(&intercepted) {
            InterceptionDecision::PassThrough => {
                self.record_pass_through();
                return Ok(FetchOutcome::PassThrough(request));
            }
            InterceptionDecision::Redirect(proxied) => proxied,
        };

        info!("Proxying: {} -> {}", intercepted.url(), proxied.target());
        self.redirected.fetch_add(1, Ordering::Relaxed);
        observability::record_decision(observability::DECISION_REDIRECT);

        match self.forwarder.forward(proxied, cancel).await {
            Ok(response) => Ok(FetchOutcome::Respond(response)),
            Err(e) => {
                self.forward_failures.fetch_add(1, Ordering::Relaxed);
                observability::record_forward_failure();
                Err(e)
            }
        }
    }

    fn record_pass_through(&self) {
        self.passed_through.fetch_add(1, Ordering::Relaxed);
        observability::record_decision(observability::DECISION_PASS_THROUGH);
    }

    /// Stop accepting requests; a newer instance owns the scope
    pub(crate) fn supersede(&self) {
        if !self.superseded.swap(true, Ordering::AcqRel) {
            info!("Interceptor {} for scope {} superseded", self.id, self.scope);
        }
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> InterceptorStats {
        InterceptorStats {
            redirected: self.redirected.load(Ordering::Relaxed),
            passed_through: self.passed_through.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("activated_at", &self.activated_at)
            .field("proxy_origin", &self.proxy_origin.to_string())
            .field("domains", &self.allow_list.entries())
            .field("superseded", &self.is_superseded())
            .finish()
    }
}
