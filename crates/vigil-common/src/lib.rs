//! Common types for vigil: monitoring CRDs, the collector config model, and errors
//!
//! - [`crd`] - Custom Resource Definitions (PodMonitoring, ClusterPodMonitoring,
//!   ClusterNodeMonitoring, ProbeMonitoring) and their shared endpoint types
//! - [`promconfig`] - The collector's scrape configuration format, its decoder and
//!   a relabeling evaluator
//! - [`error`] - Error types shared across vigil crates

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod promconfig;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group for all vigil monitoring resources
pub const API_GROUP: &str = "monitoring.vigil.dev";

/// Namespace used for secret references of cluster-scoped resources that do not
/// name one explicitly
pub const DEFAULT_SECRET_NAMESPACE: &str = "default";

/// Environment variable the collector's config reloader substitutes with the
/// name of the node the collector runs on
pub const DEFAULT_NODE_NAME_ENV: &str = "NODE_NAME";
