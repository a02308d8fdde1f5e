// packages/interceptor/src/lifecycle/registry.rs
//! Scope registry
//!
//! Records which interceptor instance owns each scope and which instance
//! controls each context inside it. Installing an instance and claiming the
//! scope's contexts happen under one entry lock, so no request can be routed
//! to a superseded instance once installation returns.
//!
//! ```text
//! ScopeRegistry
//! ├─ "/app"  Active   owner=01J..A  contexts: tab-1 -> 01J..A, tab-2 -> 01J..A
//! └─ "/docs" Uninstalled            contexts: tab-3 -> (none)
//! ```

use crate::interception::interceptor::{FetchOutcome, InstanceId, Interceptor};
use crate::observability;
use crate::utils::errors::{InterceptorError, Result};
use bytes::Bytes;
use dashmap::DashMap;
use hyper::Request;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Identifies a scope (a set of network-facing contexts)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one network-facing context, such as a browsing tab
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextId(String);

impl ContextId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninstalled,
    Installing,
    Active,
}

/// Result of claiming a scope's contexts
#[derive(Debug, Default)]
pub struct ClaimReport {
    /// Contexts now controlled by the claiming instance
    pub claimed: Vec<ContextId>,

    /// One `ClaimFailed` per context left out
    pub failed: Vec<InterceptorError>,
}

impl ClaimReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// How an instance came to own its scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installation {
    /// Newly installed, replacing the previous owner if there was one
    Installed { superseded: Option<InstanceId> },
    /// An equivalent instance already owned the scope and was kept
    Reasserted,
}

struct ContextSlot {
    controller: Option<Arc<Interceptor>>,
    detaching: bool,
}

#[derive(Default)]
struct ScopeSlot {
    state: LifecycleState,
    active: Option<Arc<Interceptor>>,
    contexts: HashMap<ContextId, ContextSlot>,
}

/// Registry of scopes and their active interceptors
#[derive(Default)]
pub struct ScopeRegistry {
    scopes: DashMap<ScopeId, ScopeSlot>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new context; it starts under the scope's active instance
    pub fn register_context(&self, scope: &ScopeId, context: ContextId) {
        let mut slot = self.scopes.entry(scope.clone()).or_default();
        let controller = slot.active.clone();

        debug!(
            "Registering context {} in scope {} (controlled: {})",
            context,
            scope,
            controller.is_some()
        );

        slot.contexts.insert(
            context,
            ContextSlot {
                controller,
                detaching: false,
            },
        );
    }

    /// Flag a context as going away; detaching contexts cannot be claimed
    pub fn mark_detaching(&self, scope: &ScopeId, context: &ContextId) -> bool {
        self.scopes
            .get_mut(scope)
            .and_then(|mut slot| {
                slot.contexts
                    .get_mut(context)
                    .map(|ctx| ctx.detaching = true)
            })
            .is_some()
    }

    pub fn remove_context(&self, scope: &ScopeId, context: &ContextId) -> bool {
        self.scopes
            .get_mut(scope)
            .map(|mut slot| slot.contexts.remove(context).is_some())
            .unwrap_or(false)
    }

    pub fn state(&self, scope: &ScopeId) -> LifecycleState {
        self.scopes
            .get(scope)
            .map(|slot| slot.state)
            .unwrap_or_default()
    }

    pub fn active_instance(&self, scope: &ScopeId) -> Option<Arc<Interceptor>> {
        self.scopes.get(scope).and_then(|slot| slot.active.clone())
    }

    /// Instance controlling `context`, `None` for default network handling
    pub fn controller(&self, scope: &ScopeId, context: &ContextId) -> Option<Arc<Interceptor>> {
        self.scopes
            .get(scope)
            .and_then(|slot| slot.contexts.get(context).and_then(|ctx| ctx.controller.clone()))
    }

    pub fn contexts(&self, scope: &ScopeId) -> Vec<ContextId> {
        let mut contexts: Vec<_> = self
            .scopes
            .get(scope)
            .map(|slot| slot.contexts.keys().cloned().collect())
            .unwrap_or_default();
        contexts.sort_by(|a, b| a.0.cmp(&b.0));
        contexts
    }

    /// Route an outbound request from `context` through its controller
    ///
    /// Uncontrolled contexts get the request back as a pass-through. A
    /// controller found superseded at lookup is re-resolved once; one
    /// superseded after lookup still completes the request, so dispatch never
    /// fails with [`InterceptorError::Superseded`].
    pub async fn dispatch(
        &self,
        scope: &ScopeId,
        context: &ContextId,
        request: Request<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let Some(controller) = self.controller(scope, context) else {
            return Ok(FetchOutcome::PassThrough(request));
        };

        if controller.is_superseded() {
            debug!("Controller {} of {} superseded, re-resolving", controller.id(), context);
            return match self.controller(scope, context) {
                Some(current) if !current.is_superseded() => current.handle(request, cancel).await,
                _ => Ok(FetchOutcome::PassThrough(request)),
            };
        }

        // A supersede landing from here on finishes under the resolved controller
        controller.handle(request, cancel).await
    }

    /// Make `instance` the owner of its scope and claim the scope's contexts
    ///
    /// An active, non-superseded owner with identical configuration is kept
    /// and only its claim is re-asserted.
    pub(crate) fn install(
        &self,
        instance: Arc<Interceptor>,
    ) -> (Arc<Interceptor>, Installation, ClaimReport) {
        let scope = instance.scope().clone();
        let mut slot = self.scopes.entry(scope.clone()).or_default();

        if let Some(existing) = slot.active.clone() {
            if slot.state == LifecycleState::Active
                && !existing.is_superseded()
                && existing.config() == instance.config()
            {
                debug!("Scope {} already owned by {}, re-asserting", scope, existing.id());
                let report = Self::claim_contexts(&mut slot, &existing);
                return (existing, Installation::Reasserted, report);
            }
        }

        slot.state = LifecycleState::Installing;

        let previous = slot.active.replace(Arc::clone(&instance));
        let superseded = previous.map(|old| {
            old.supersede();
            old.id()
        });

        let report = Self::claim_contexts(&mut slot, &instance);
        slot.state = LifecycleState::Active;

        info!(
            "Interceptor {} active for scope {} ({} contexts claimed, {} failed)",
            instance.id(),
            scope,
            report.claimed.len(),
            report.failed.len()
        );

        (instance, Installation::Installed { superseded }, report)
    }

    /// Re-claim the contexts of `scope` for its active instance
    pub(crate) fn claim(&self, scope: &ScopeId) -> Result<ClaimReport> {
        let mut slot = self
            .scopes
            .get_mut(scope)
            .ok_or_else(|| InterceptorError::NotActive(scope.to_string()))?;

        let active = match (&slot.active, slot.state) {
            (Some(active), LifecycleState::Active) => Arc::clone(active),
            _ => return Err(InterceptorError::NotActive(scope.to_string())),
        };

        Ok(Self::claim_contexts(&mut slot, &active))
    }

    fn claim_contexts(slot: &mut ScopeSlot, instance: &Arc<Interceptor>) -> ClaimReport {
        let mut report = ClaimReport::default();

        for (context_id, context) in slot.contexts.iter_mut() {
            if context.detaching {
                // Stale controllers are dropped; the context falls back to
                // default handling until it re-registers
                if context
                    .controller
                    .as_ref()
                    .is_some_and(|c| c.id() != instance.id() && c.is_superseded())
                {
                    context.controller = None;
                }

                let err = InterceptorError::ClaimFailed {
                    context: context_id.to_string(),
                    reason: "context is detaching".into(),
                };
                warn!("{}", err);
                observability::record_claim_failure();
                report.failed.push(err);
                continue;
            }

            context.controller = Some(Arc::clone(instance));
            report.claimed.push(context_id.clone());
        }

        report.claimed.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }
}
