//! ClusterNodeMonitoring Custom Resource Definition
//!
//! Scrapes an endpoint on every selected node, addressed through the kubelet
//! address that node discovery reports.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{LabelSelector, MonitoringStatus, ScrapeLimits, ScrapeSettings};

/// Specification for a ClusterNodeMonitoring
///
/// ## Example
///
/// ```yaml
/// apiVersion: monitoring.vigil.dev/v1
/// kind: ClusterNodeMonitoring
/// metadata:
///   name: kubelet
/// spec:
///   endpoints:
///     - path: /metrics/cadvisor
///       interval: 30s
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "monitoring.vigil.dev",
    version = "v1",
    kind = "ClusterNodeMonitoring",
    plural = "clusternodemonitorings",
    shortname = "cnm",
    status = "MonitoringStatus",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNodeMonitoringSpec {
    /// Nodes to scrape, all nodes if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,

    /// Endpoints to scrape on every selected node
    pub endpoints: Vec<ScrapeSettings>,

    /// Scrape limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ScrapeLimits>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_optional() {
        let spec: ClusterNodeMonitoringSpec =
            serde_yaml::from_str("endpoints: [{path: /metrics/cadvisor, interval: 30s}]\n")
                .unwrap();
        assert!(spec.selector.is_none());
        assert_eq!(spec.endpoints[0].path.as_deref(), Some("/metrics/cadvisor"));
    }
}
