// packages/interceptor/src/interception/allow_list.rs
//! Domain allow-list for rerouting decisions
//!
//! An ordered, immutable list of domain fragments. A host is covered when it
//! contains any fragment as a substring, so `netflix.com` covers
//! `www.netflix.com` and `assets.netflix.com.cdn.example` alike.

use crate::utils::errors::{InterceptorError, Result};
use std::sync::Arc;
use tracing::debug;

/// Immutable list of domain fragments, cheap to clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAllowList {
    entries: Arc<[String]>,
}

impl DomainAllowList {
    /// Build and validate an allow-list
    ///
    /// Entries are trimmed; each must be non-empty, lowercase and free of
    /// scheme, path, port and whitespace.
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        if entries.is_empty() {
            return Err(InterceptorError::Configuration(
                "domain allow-list must not be empty".into(),
            ));
        }

        let mut validated = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.as_ref().trim();
            Self::validate_entry(entry)?;
            validated.push(entry.to_string());
        }

        debug!("Loaded domain allow-list with {} entries", validated.len());

        Ok(Self {
            entries: validated.into(),
        })
    }

    fn validate_entry(entry: &str) -> Result<()> {
        let reason = if entry.is_empty() {
            Some("empty entry")
        } else if entry.contains("://") {
            Some("entry carries a scheme")
        } else if entry.contains('/') {
            Some("entry carries a path")
        } else if entry.contains(':') {
            Some("entry carries a port")
        } else if entry.chars().any(char::is_whitespace) {
            Some("entry contains whitespace")
        } else if entry.chars().any(|c| c.is_ascii_uppercase()) {
            Some("entry is not lowercase")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InterceptorError::Configuration(format!(
                "invalid allow-list entry {:?}: {}",
                entry, reason
            ))),
            None => Ok(()),
        }
    }

    /// First fragment contained in `host`, scanning in configured order
    pub fn find_match(&self, host: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|fragment| host.contains(fragment.as_str()))
            .map(String::as_str)
    }

    pub fn matches(&self, host: &str) -> bool {
        self.find_match(host).is_some()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed list
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
