//! Custom Resource Definitions for vigil
//!
//! Four monitoring kinds describe what to scrape; the shared endpoint,
//! selector and relabeling types describe how.

mod endpoint;
mod node_monitoring;
mod pod_monitoring;
mod probe_monitoring;
mod relabel;
mod selector;
mod types;

pub use endpoint::{
    AuthorizationSpec, BasicAuthSpec, HttpClientSpec, OAuth2Spec, ScrapeEndpoint, ScrapeSettings,
    SecretKeySelector, TlsSpec,
};
pub use node_monitoring::{ClusterNodeMonitoring, ClusterNodeMonitoringSpec};
pub use pod_monitoring::{
    ClusterPodMonitoring, ClusterPodMonitoringSpec, PodMonitoring, PodMonitoringSpec,
};
pub use probe_monitoring::{ProbeModule, ProbeMonitoring, ProbeMonitoringSpec, Prober};
pub use relabel::RelabelingRule;
pub use selector::{LabelSelector, LabelSelectorOperator, LabelSelectorRequirement};
pub use types::{
    Condition, ConditionStatus, LabelMapping, MonitoringStatus, ScrapeLimits, TargetLabels,
    CONFIGURATION_CREATE_SUCCESS,
};

/// Re-exported so callers can build port specifiers without depending on
/// k8s-openapi directly
pub use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
