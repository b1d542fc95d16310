//! Secret reference pooling
//!
//! Jobs never carry secret material. Every referenced secret key is recorded
//! once per compilation under a canonical `namespace/name/key` token, and the
//! token is what ends up in the job's `*_ref` fields. A materializer resolves
//! the pool when it writes the collector's config.

use std::collections::BTreeMap;

use serde::Serialize;
use vigil_common::crd::SecretKeySelector;

use crate::error::CompileError;

// =============================================================================
// Scope
// =============================================================================

/// Which namespaces a resource's secret references may point at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretScope<'a> {
    /// Only the resource's own namespace
    Namespaced(&'a str),
    /// Any namespace, `default_namespace` when unset
    Cluster {
        /// Namespace used when a reference names none
        default_namespace: &'a str,
    },
}

impl SecretScope<'_> {
    fn namespace_for(&self, selector: &SecretKeySelector) -> Result<String, CompileError> {
        let explicit = selector.namespace.as_deref().filter(|ns| !ns.is_empty());
        match (self, explicit) {
            (Self::Namespaced(own), Some(requested)) if requested != *own => {
                Err(CompileError::Tenancy {
                    secret: selector.name.clone(),
                    namespace: own.to_string(),
                    requested: requested.to_string(),
                })
            }
            (Self::Namespaced(own), _) => Ok(own.to_string()),
            (Self::Cluster { .. }, Some(requested)) => Ok(requested.to_string()),
            (Self::Cluster { default_namespace }, None) => Ok(default_namespace.to_string()),
        }
    }
}

// =============================================================================
// Pool
// =============================================================================

/// A resolved secret key
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SecretKeyRef {
    /// Secret namespace
    pub namespace: String,
    /// Secret name
    pub name: String,
    /// Key within the secret
    pub key: String,
}

impl SecretKeyRef {
    /// Canonical `namespace/name/key` token
    pub fn token(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.name, self.key)
    }
}

/// Secret keys referenced by one compilation, keyed by token
///
/// Entries are only ever added; the first resolution of a token wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SecretRefPool {
    refs: BTreeMap<String, SecretKeyRef>,
}

impl SecretRefPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a reference and record it
    ///
    /// Returns the token to embed in the job, or an empty string when there
    /// is no reference.
    pub fn resolve(
        &mut self,
        selector: Option<&SecretKeySelector>,
        scope: SecretScope<'_>,
    ) -> Result<String, CompileError> {
        let Some(selector) = selector else {
            return Ok(String::new());
        };
        let resolved = SecretKeyRef {
            namespace: scope.namespace_for(selector)?,
            name: selector.name.clone(),
            key: selector.key.clone(),
        };
        let token = resolved.token();
        self.refs.entry(token.clone()).or_insert(resolved);
        Ok(token)
    }

    /// Add every entry of `other` not already present
    pub fn merge(&mut self, other: SecretRefPool) {
        for (token, resolved) in other.refs {
            self.refs.entry(token).or_insert(resolved);
        }
    }

    /// Look up a token
    pub fn get(&self, token: &str) -> Option<&SecretKeyRef> {
        self.refs.get(token)
    }

    /// Entries in token order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretKeyRef)> {
        self.refs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of distinct references
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Check if no references were recorded
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
