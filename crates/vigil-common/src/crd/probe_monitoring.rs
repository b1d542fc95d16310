//! ProbeMonitoring Custom Resource Definition
//!
//! Black-box monitoring: a prober (blackbox-exporter style) is asked to probe
//! each static target with a named module, and the prober's response is what
//! gets scraped.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{MonitoringStatus, ScrapeLimits, ScrapeSettings};

/// Where the prober runs
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Prober {
    /// `host:port` of the prober
    pub address: String,
}

/// A prober module and how often to run it
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeModule {
    /// Module name configured in the prober
    pub module: String,

    /// Scrape settings for the prober requests
    #[serde(flatten)]
    pub scrape: ScrapeSettings,
}

/// Specification for a ProbeMonitoring
///
/// ## Example
///
/// ```yaml
/// apiVersion: monitoring.vigil.dev/v1
/// kind: ProbeMonitoring
/// metadata:
///   name: public-sites
///   namespace: uptime
/// spec:
///   prober:
///     address: blackbox-exporter.uptime.svc:9115
///   targets: [https://example.com]
///   modules:
///     - module: http_2xx
///       interval: 1m
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "monitoring.vigil.dev",
    version = "v1",
    kind = "ProbeMonitoring",
    plural = "probemonitorings",
    shortname = "probe",
    namespaced,
    status = "MonitoringStatus",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProbeMonitoringSpec {
    /// The prober to send requests through
    pub prober: Prober,

    /// Targets passed to the prober
    pub targets: Vec<String>,

    /// Modules to run against every target
    pub modules: Vec<ProbeModule>,

    /// Scrape limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ScrapeLimits>,
}
