//! PodMonitoring and ClusterPodMonitoring Custom Resource Definitions
//!
//! Both kinds scrape pods picked by a label selector. A PodMonitoring only sees
//! pods in its own namespace and may only use secrets from that namespace. A
//! ClusterPodMonitoring sees pods in every namespace.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{LabelSelector, MonitoringStatus, ScrapeEndpoint, ScrapeLimits, TargetLabels};

/// Specification for a PodMonitoring
///
/// ## Example
///
/// ```yaml
/// apiVersion: monitoring.vigil.dev/v1
/// kind: PodMonitoring
/// metadata:
///   name: api
///   namespace: prod
/// spec:
///   selector:
///     matchLabels:
///       app: api
///   endpoints:
///     - port: metrics
///       interval: 30s
///   targetLabels:
///     metadata: [pod, container]
///     fromPod:
///       - from: app.kubernetes.io/version
///         to: version
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "monitoring.vigil.dev",
    version = "v1",
    kind = "PodMonitoring",
    plural = "podmonitorings",
    shortname = "pm",
    namespaced,
    status = "MonitoringStatus",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PodMonitoringSpec {
    /// Pods to scrape, within the resource's namespace
    #[serde(default)]
    pub selector: LabelSelector,

    /// Ports to scrape on every selected pod
    pub endpoints: Vec<ScrapeEndpoint>,

    /// Labels to attach to scraped series
    #[serde(default)]
    pub target_labels: TargetLabels,

    /// Scrape limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ScrapeLimits>,

    /// Skip pods that have finished (Succeeded or Failed), true if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_running: Option<bool>,
}

/// Specification for a ClusterPodMonitoring
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "monitoring.vigil.dev",
    version = "v1",
    kind = "ClusterPodMonitoring",
    plural = "clusterpodmonitorings",
    shortname = "cpm",
    status = "MonitoringStatus",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPodMonitoringSpec {
    /// Pods to scrape, across all namespaces
    #[serde(default)]
    pub selector: LabelSelector,

    /// Ports to scrape on every selected pod
    pub endpoints: Vec<ScrapeEndpoint>,

    /// Labels to attach to scraped series
    #[serde(default)]
    pub target_labels: TargetLabels,

    /// Scrape limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ScrapeLimits>,

    /// Skip pods that have finished (Succeeded or Failed), true if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_running: Option<bool>,
}
