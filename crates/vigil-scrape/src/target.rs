//! Monitoring resources as compiler input
//!
//! The four monitoring kinds share one pipeline. [`MonitoringTarget`] borrows
//! a resource and answers the questions the pipeline asks of it, so the
//! compiler never matches on the concrete kind outside this module.

use std::collections::BTreeSet;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use vigil_common::crd::{
    ClusterNodeMonitoring, ClusterPodMonitoring, LabelMapping, LabelSelector, PodMonitoring,
    ProbeModule, ProbeMonitoring, ScrapeEndpoint, ScrapeLimits, ScrapeSettings,
};
use vigil_common::promconfig::KubernetesRole;

use crate::error::CompileError;
use crate::labels::{LabelPrefix, NODE_LABELS, POD_LABELS};
use crate::metadata::{resolve_metadata, MetadataLabel, CLUSTER_ALLOWED, NAMESPACED_ALLOWED};
use crate::secrets::SecretScope;

/// A borrowed monitoring resource of any kind
#[derive(Clone, Copy, Debug)]
pub enum MonitoringTarget<'a> {
    /// Namespaced pod monitoring
    Pod(&'a PodMonitoring),
    /// Cluster-wide pod monitoring
    ClusterPod(&'a ClusterPodMonitoring),
    /// Cluster-wide kubelet monitoring
    ClusterNode(&'a ClusterNodeMonitoring),
    /// Black-box probing through a prober
    Probe(&'a ProbeMonitoring),
}

impl<'a> From<&'a PodMonitoring> for MonitoringTarget<'a> {
    fn from(resource: &'a PodMonitoring) -> Self {
        Self::Pod(resource)
    }
}

impl<'a> From<&'a ClusterPodMonitoring> for MonitoringTarget<'a> {
    fn from(resource: &'a ClusterPodMonitoring) -> Self {
        Self::ClusterPod(resource)
    }
}

impl<'a> From<&'a ClusterNodeMonitoring> for MonitoringTarget<'a> {
    fn from(resource: &'a ClusterNodeMonitoring) -> Self {
        Self::ClusterNode(resource)
    }
}

impl<'a> From<&'a ProbeMonitoring> for MonitoringTarget<'a> {
    fn from(resource: &'a ProbeMonitoring) -> Self {
        Self::Probe(resource)
    }
}

/// One scrape endpoint of a resource, each compiling to one job
#[derive(Clone, Copy, Debug)]
pub enum EndpointRef<'a> {
    /// A pod port
    Port(&'a ScrapeEndpoint),
    /// A kubelet endpoint
    Node(&'a ScrapeSettings),
    /// A prober module
    Probe(&'a ProbeModule),
}

impl<'a> EndpointRef<'a> {
    /// Scrape settings shared by every endpoint kind
    pub fn settings(&self) -> &'a ScrapeSettings {
        match *self {
            Self::Port(endpoint) => &endpoint.scrape,
            Self::Node(settings) => settings,
            Self::Probe(module) => &module.scrape,
        }
    }
}

impl<'a> MonitoringTarget<'a> {
    /// Resource kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pod(_) => "PodMonitoring",
            Self::ClusterPod(_) => "ClusterPodMonitoring",
            Self::ClusterNode(_) => "ClusterNodeMonitoring",
            Self::Probe(_) => "ProbeMonitoring",
        }
    }

    fn object_meta(&self) -> &'a ObjectMeta {
        match *self {
            Self::Pod(r) => r.meta(),
            Self::ClusterPod(r) => r.meta(),
            Self::ClusterNode(r) => r.meta(),
            Self::Probe(r) => r.meta(),
        }
    }

    /// Whether the resource lives in, and is confined to, a namespace
    pub fn is_namespaced(&self) -> bool {
        matches!(self, Self::Pod(_) | Self::Probe(_))
    }

    /// Resource name
    pub fn name(&self) -> Result<&'a str, CompileError> {
        self.object_meta()
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(CompileError::MissingMetadata { field: "name" })
    }

    /// Resource namespace; `None` for cluster-scoped kinds
    pub fn namespace(&self) -> Result<Option<&'a str>, CompileError> {
        if !self.is_namespaced() {
            return Ok(None);
        }
        self.object_meta()
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .map(Some)
            .ok_or(CompileError::MissingMetadata { field: "namespace" })
    }

    /// Unique key, used as the job name prefix
    ///
    /// `Kind/namespace/name` for namespaced kinds, `Kind/name` otherwise.
    pub fn key(&self) -> Result<String, CompileError> {
        let name = self.name()?;
        Ok(match self.namespace()? {
            Some(namespace) => format!("{}/{namespace}/{name}", self.kind()),
            None => format!("{}/{name}", self.kind()),
        })
    }

    /// Discovery role; `None` for statically configured probes
    pub fn role(&self) -> Option<KubernetesRole> {
        match self {
            Self::Pod(_) | Self::ClusterPod(_) => Some(KubernetesRole::Pod),
            Self::ClusterNode(_) => Some(KubernetesRole::Node),
            Self::Probe(_) => None,
        }
    }

    /// Meta-label prefix for labels of discovered objects
    pub fn label_prefix(&self) -> Option<LabelPrefix> {
        match self.role() {
            Some(KubernetesRole::Node) => Some(NODE_LABELS),
            Some(_) => Some(POD_LABELS),
            None => None,
        }
    }

    /// Selector over discovered objects, with its meta-label prefix
    pub fn selector(&self) -> Option<(&'a LabelSelector, LabelPrefix)> {
        match *self {
            Self::Pod(r) => Some((&r.spec.selector, POD_LABELS)),
            Self::ClusterPod(r) => Some((&r.spec.selector, POD_LABELS)),
            Self::ClusterNode(r) => r.spec.selector.as_ref().map(|s| (s, NODE_LABELS)),
            Self::Probe(_) => None,
        }
    }

    /// Endpoints in declaration order
    pub fn endpoints(&self) -> Vec<EndpointRef<'a>> {
        match *self {
            Self::Pod(r) => r.spec.endpoints.iter().map(EndpointRef::Port).collect(),
            Self::ClusterPod(r) => r.spec.endpoints.iter().map(EndpointRef::Port).collect(),
            Self::ClusterNode(r) => r.spec.endpoints.iter().map(EndpointRef::Node).collect(),
            Self::Probe(r) => r.spec.modules.iter().map(EndpointRef::Probe).collect(),
        }
    }

    /// Spec field holding the endpoints
    pub fn endpoints_field(&self) -> &'static str {
        match self {
            Self::Probe(_) => "modules",
            _ => "endpoints",
        }
    }

    /// Statically configured targets, for probes
    pub fn static_targets(&self) -> &'a [String] {
        match *self {
            Self::Probe(r) => &r.spec.targets,
            _ => &[],
        }
    }

    /// Address of the prober, for probes
    pub fn prober_address(&self) -> Option<&'a str> {
        match *self {
            Self::Probe(r) => Some(r.spec.prober.address.as_str()),
            _ => None,
        }
    }

    /// Scrape limits applied to every job of the resource
    pub fn limits(&self) -> Option<&'a ScrapeLimits> {
        match *self {
            Self::Pod(r) => r.spec.limits.as_ref(),
            Self::ClusterPod(r) => r.spec.limits.as_ref(),
            Self::ClusterNode(r) => r.spec.limits.as_ref(),
            Self::Probe(r) => r.spec.limits.as_ref(),
        }
    }

    /// Whether pods that are not running are skipped
    pub fn filter_running(&self) -> bool {
        match *self {
            Self::Pod(r) => r.spec.filter_running.unwrap_or(true),
            Self::ClusterPod(r) => r.spec.filter_running.unwrap_or(true),
            Self::ClusterNode(_) | Self::Probe(_) => false,
        }
    }

    /// Object labels copied onto series
    pub fn label_mappings(&self) -> &'a [LabelMapping] {
        match *self {
            Self::Pod(r) => &r.spec.target_labels.from_pod,
            Self::ClusterPod(r) => &r.spec.target_labels.from_pod,
            Self::ClusterNode(_) | Self::Probe(_) => &[],
        }
    }

    /// Requested metadata labels, with the kind's defaults applied
    pub fn metadata_labels(&self) -> Result<BTreeSet<MetadataLabel>, CompileError> {
        match *self {
            Self::Pod(r) => resolve_metadata(
                r.spec.target_labels.metadata.as_deref(),
                &[],
                NAMESPACED_ALLOWED,
            ),
            Self::ClusterPod(r) => resolve_metadata(
                r.spec.target_labels.metadata.as_deref(),
                &[MetadataLabel::Namespace],
                CLUSTER_ALLOWED,
            ),
            Self::ClusterNode(_) | Self::Probe(_) => Ok(BTreeSet::new()),
        }
    }

    /// Namespaces the resource's secret references may resolve to
    pub fn secret_scope<'s>(
        &self,
        default_namespace: &'s str,
    ) -> Result<SecretScope<'s>, CompileError>
    where
        'a: 's,
    {
        Ok(match self.namespace()? {
            Some(namespace) => SecretScope::Namespaced(namespace),
            None => SecretScope::Cluster { default_namespace },
        })
    }
}

#[cfg(test)]
mod tests {
    use vigil_common::crd::{
        ClusterNodeMonitoringSpec, ClusterPodMonitoringSpec, PodMonitoringSpec, ProbeMonitoringSpec,
        Prober, TargetLabels,
    };

    use super::*;

    fn pod_monitoring(namespace: Option<&str>) -> PodMonitoring {
        let mut resource = PodMonitoring::new(
            "api",
            PodMonitoringSpec {
                selector: LabelSelector::from_labels([("app", "api")]),
                endpoints: vec![
                    ScrapeEndpoint::named("web", "30s"),
                    ScrapeEndpoint::numbered(9090, "30s"),
                ],
                ..Default::default()
            },
        );
        resource.metadata.namespace = namespace.map(str::to_string);
        resource
    }

    #[test]
    fn test_keys_follow_scope() {
        let pm = pod_monitoring(Some("prod"));
        assert_eq!(MonitoringTarget::from(&pm).key().unwrap(), "PodMonitoring/prod/api");

        let cpm = ClusterPodMonitoring::new("api", ClusterPodMonitoringSpec::default());
        assert_eq!(
            MonitoringTarget::from(&cpm).key().unwrap(),
            "ClusterPodMonitoring/api"
        );
    }

    #[test]
    fn test_namespaced_kind_requires_namespace() {
        let pm = pod_monitoring(None);
        let err = MonitoringTarget::from(&pm).key().unwrap_err();
        assert!(matches!(err, CompileError::MissingMetadata { field: "namespace" }));
    }

    #[test]
    fn test_endpoints_and_settings() {
        let pm = pod_monitoring(Some("prod"));
        let target = MonitoringTarget::from(&pm);
        let endpoints = target.endpoints();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[1].settings().interval.as_deref(), Some("30s"));
        assert!(target.filter_running());
        assert_eq!(target.role(), Some(KubernetesRole::Pod));
    }

    #[test]
    fn test_metadata_defaults_differ_by_scope() {
        let pm = pod_monitoring(Some("prod"));
        assert!(MonitoringTarget::from(&pm).metadata_labels().unwrap().is_empty());

        let cpm = ClusterPodMonitoring::new("api", ClusterPodMonitoringSpec::default());
        let labels = MonitoringTarget::from(&cpm).metadata_labels().unwrap();
        assert_eq!(labels.into_iter().collect::<Vec<_>>(), [MetadataLabel::Namespace]);

        let cpm = ClusterPodMonitoring::new(
            "api",
            ClusterPodMonitoringSpec {
                target_labels: TargetLabels {
                    metadata: Some(vec!["pod".to_string()]),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let labels = MonitoringTarget::from(&cpm).metadata_labels().unwrap();
        assert_eq!(labels.into_iter().collect::<Vec<_>>(), [MetadataLabel::Pod]);
    }

    #[test]
    fn test_secret_scope() {
        let pm = pod_monitoring(Some("prod"));
        assert_eq!(
            MonitoringTarget::from(&pm).secret_scope("default").unwrap(),
            SecretScope::Namespaced("prod")
        );

        let cnm = ClusterNodeMonitoring::new("kubelet", ClusterNodeMonitoringSpec::default());
        assert_eq!(
            MonitoringTarget::from(&cnm).secret_scope("default").unwrap(),
            SecretScope::Cluster {
                default_namespace: "default"
            }
        );
    }

    #[test]
    fn test_node_and_probe_capabilities() {
        let cnm = ClusterNodeMonitoring::new("kubelet", ClusterNodeMonitoringSpec::default());
        let target = MonitoringTarget::from(&cnm);
        assert!(target.selector().is_none());
        assert_eq!(target.label_prefix(), Some(NODE_LABELS));
        assert!(!target.filter_running());

        let mut probe = ProbeMonitoring::new(
            "uptime",
            ProbeMonitoringSpec {
                prober: Prober {
                    address: "blackbox:9115".to_string(),
                },
                ..Default::default()
            },
        );
        probe.metadata.namespace = Some("ops".to_string());
        let target = MonitoringTarget::from(&probe);
        assert_eq!(target.key().unwrap(), "ProbeMonitoring/ops/uptime");
        assert_eq!(target.role(), None);
        assert!(target.label_mappings().is_empty());
    }
}
