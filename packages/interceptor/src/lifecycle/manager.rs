// packages/interceptor/src/lifecycle/manager.rs
//! Lifecycle manager
//!
//! Brings an interceptor into the active, exclusive state for a scope:
//!
//! ```text
//! Uninstalled ──activate──▶ Installing ──contexts claimed──▶ Active
//!                                                             │
//!                       activate (new config) supersedes ◀────┘
//! ```
//!
//! Configuration is validated before the registry is touched, so a broken
//! configuration never claims a scope.

use crate::interception::interceptor::Interceptor;
use crate::interception::transport::ProxyTransport;
use crate::lifecycle::registry::{ClaimReport, Installation, ScopeId, ScopeRegistry};
use crate::observability;
use crate::utils::config::InterceptorConfig;
use crate::utils::errors::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info};

/// Activates interceptors built from one configuration
pub struct LifecycleManager {
    /// Configuration used for every activation
    config: InterceptorConfig,

    /// Cloned into each new instance
    transport: Mutex<ProxyTransport>,
}

impl LifecycleManager {
    pub fn new(config: InterceptorConfig, transport: ProxyTransport) -> Self {
        Self {
            config,
            transport: Mutex::new(transport),
        }
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Install an interceptor for `scope`, superseding any previous owner
    ///
    /// Returns once every claimable context of the scope is controlled by the
    /// returned instance. Re-activating with unchanged configuration keeps
    /// the current owner and only re-asserts its claim.
    pub fn activate(&self, registry: &ScopeRegistry, scope: &ScopeId) -> Result<Arc<Interceptor>> {
        info!("Activating interceptor for scope {}", scope);

        let transport = self.transport.lock().clone();
        let instance = match Interceptor::new(scope.clone(), self.config.clone(), transport) {
            Ok(instance) => Arc::new(instance),
            Err(e) => {
                error!("Refusing to activate scope {}: {}", scope, e);
                return Err(e);
            }
        };

        let (active, installation, report) = registry.install(instance);
        self.log_claims(scope, &report);

        match installation {
            Installation::Installed { superseded } => {
                observability::record_activation();
                match superseded {
                    Some(old) => info!(
                        "Interceptor {} replaced {} for scope {}",
                        active.id(),
                        old,
                        scope
                    ),
                    None => info!("Interceptor {} installed for scope {}", active.id(), scope),
                }
            }
            Installation::Reasserted => {
                info!("Interceptor {} already active for scope {}", active.id(), scope);
            }
        }

        Ok(active)
    }

    /// Bring every context of `scope` under its active instance
    ///
    /// Contexts that cannot be claimed are reported, not fatal.
    pub fn claim_existing_contexts(
        &self,
        registry: &ScopeRegistry,
        scope: &ScopeId,
    ) -> Result<ClaimReport> {
        let report = registry.claim(scope)?;
        self.log_claims(scope, &report);
        Ok(report)
    }

    fn log_claims(&self, scope: &ScopeId, report: &ClaimReport) {
        if !report.is_complete() {
            info!(
                "Scope {}: {} contexts claimed, {} left on previous handling",
                scope,
                report.claimed.len(),
                report.failed.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::transport::{boxed, ProxyHttpRequest};
    use crate::lifecycle::registry::{ContextId, LifecycleState};
    use crate::utils::errors::InterceptorError;
    use bytes::Bytes;
    use http_body_util::Full;
    use hyper::Response;

    fn transport() -> ProxyTransport {
        boxed(tower::service_fn(|_req: ProxyHttpRequest| async {
            Ok::<_, std::io::Error>(Response::new(Full::new(Bytes::new())))
        }))
    }

    #[test]
    fn test_activate_installs_instance() {
        let registry = ScopeRegistry::new();
        let scope = ScopeId::new("/");
        let manager = LifecycleManager::new(InterceptorConfig::default(), transport());

        let active = manager.activate(&registry, &scope).unwrap();

        assert_eq!(registry.state(&scope), LifecycleState::Active);
        assert_eq!(registry.active_instance(&scope).unwrap().id(), active.id());
    }

    #[test]
    fn test_activate_is_idempotent() {
        let registry = ScopeRegistry::new();
        let scope = ScopeId::new("/");
        let manager = LifecycleManager::new(InterceptorConfig::default(), transport());

        let first = manager.activate(&registry, &scope).unwrap();
        let second = manager.activate(&registry, &scope).unwrap();

        assert_eq!(first.id(), second.id());
        assert!(!first.is_superseded());
    }

    #[test]
    fn test_new_manager_supersedes_old_instance() {
        let registry = ScopeRegistry::new();
        let scope = ScopeId::new("/");
        registry.register_context(&scope, ContextId::new("tab-1"));

        let old = LifecycleManager::new(InterceptorConfig::default(), transport())
            .activate(&registry, &scope)
            .unwrap();

        let config = InterceptorConfig {
            proxy_origin: "http://127.0.0.1:8080".into(),
            ..Default::default()
        };
        let new = LifecycleManager::new(config, transport())
            .activate(&registry, &scope)
            .unwrap();

        assert!(old.is_superseded());
        assert_ne!(old.id(), new.id());
        assert_eq!(
            registry.controller(&scope, &ContextId::new("tab-1")).unwrap().id(),
            new.id()
        );
    }

    #[test]
    fn test_bad_config_never_claims_scope() {
        let registry = ScopeRegistry::new();
        let scope = ScopeId::new("/");
        registry.register_context(&scope, ContextId::new("tab-1"));

        let config = InterceptorConfig {
            domains: vec!["HTTPS://Netflix.com".into()],
            ..Default::default()
        };
        let err = LifecycleManager::new(config, transport())
            .activate(&registry, &scope)
            .unwrap_err();

        assert!(err.is_configuration_error());
        assert_eq!(registry.state(&scope), LifecycleState::Uninstalled);
        assert!(registry.controller(&scope, &ContextId::new("tab-1")).is_none());
    }

    #[test]
    fn test_claim_existing_contexts() {
        let registry = ScopeRegistry::new();
        let scope = ScopeId::new("/");
        let manager = LifecycleManager::new(InterceptorConfig::default(), transport());

        assert!(matches!(
            manager.claim_existing_contexts(&registry, &scope),
            Err(InterceptorError::NotActive(_))
        ));

        let active = manager.activate(&registry, &scope).unwrap();
        registry.register_context(&scope, ContextId::new("tab-1"));
        registry.register_context(&scope, ContextId::new("tab-2"));
        registry.mark_detaching(&scope, &ContextId::new("tab-2"));

        let report = manager.claim_existing_contexts(&registry, &scope).unwrap();
        assert_eq!(report.claimed, vec![ContextId::new("tab-1")]);
        assert_eq!(report.failed.len(), 1);

        // Still controlled by the active instance: its controller was not stale
        assert_eq!(
            registry.controller(&scope, &ContextId::new("tab-2")).unwrap().id(),
            active.id()
        );
    }
}
