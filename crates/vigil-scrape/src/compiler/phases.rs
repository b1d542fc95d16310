//! The target relabeling phases, in emission order

use vigil_common::promconfig::relabel::escape_literal;
use vigil_common::promconfig::RelabelConfig;

use super::phase::{JobContext, RelabelPhase};
use crate::error::CompileError;
use crate::label_mapping::compile_label_mappings;
use crate::labels;
use crate::metadata::metadata_rules;
use crate::port::tmp_instance_rules;
use crate::selector::compile_selector;
use crate::target::{EndpointRef, MonitoringTarget};

/// Phases every job runs through
pub fn default_phases() -> Vec<Box<dyn RelabelPhase>> {
    vec![
        Box::new(ForcedLabelsPhase),
        Box::new(TargetFilterPhase),
        Box::new(MetadataPhase),
        Box::new(JobLabelPhase),
        Box::new(RunningFilterPhase),
        Box::new(AddressPhase),
        Box::new(LabelMappingPhase),
    ]
}

/// Stamps the platform identifiers onto every target
pub struct ForcedLabelsPhase;

impl RelabelPhase for ForcedLabelsPhase {
    fn name(&self) -> &str {
        "forced-labels"
    }

    fn compile(&self, ctx: &JobContext<'_>, rules: &mut Vec<RelabelConfig>) -> Result<(), CompileError> {
        rules.push(RelabelConfig::set(labels::PROJECT_ID, &ctx.config.project_id));
        rules.push(RelabelConfig::set(labels::LOCATION, &ctx.config.location));
        rules.push(RelabelConfig::set(labels::CLUSTER, &ctx.config.cluster));
        Ok(())
    }
}

/// Restricts discovery to the resource's namespace and selector
pub struct TargetFilterPhase;

impl RelabelPhase for TargetFilterPhase {
    fn name(&self) -> &str {
        "target-filter"
    }

    fn compile(&self, ctx: &JobContext<'_>, rules: &mut Vec<RelabelConfig>) -> Result<(), CompileError> {
        if let (MonitoringTarget::Pod(_), Some(namespace)) = (ctx.target, ctx.namespace) {
            rules.push(RelabelConfig::keep(
                &[labels::META_NAMESPACE],
                escape_literal(namespace),
            ));
        }
        if let Some((selector, prefix)) = ctx.target.selector() {
            rules.extend(compile_selector(selector, prefix)?);
        }
        Ok(())
    }
}

/// Writes `namespace` and the requested pod metadata
pub struct MetadataPhase;

impl RelabelPhase for MetadataPhase {
    fn name(&self) -> &str {
        "metadata"
    }

    fn compile(&self, ctx: &JobContext<'_>, rules: &mut Vec<RelabelConfig>) -> Result<(), CompileError> {
        if let Some(namespace) = ctx.namespace {
            rules.push(RelabelConfig::set(labels::NAMESPACE, namespace));
        }
        rules.extend(metadata_rules(ctx.metadata));
        Ok(())
    }
}

/// Names the job after the resource
pub struct JobLabelPhase;

impl RelabelPhase for JobLabelPhase {
    fn name(&self) -> &str {
        "job-label"
    }

    fn compile(&self, ctx: &JobContext<'_>, rules: &mut Vec<RelabelConfig>) -> Result<(), CompileError> {
        rules.push(RelabelConfig::set(labels::JOB, ctx.name));
        Ok(())
    }
}

/// Skips pods that have terminated
pub struct RunningFilterPhase;

impl RelabelPhase for RunningFilterPhase {
    fn name(&self) -> &str {
        "running-filter"
    }

    fn compile(&self, ctx: &JobContext<'_>, rules: &mut Vec<RelabelConfig>) -> Result<(), CompileError> {
        if ctx.target.filter_running() {
            rules.push(RelabelConfig::drop(
                &[labels::META_POD_PHASE],
                "(Failed|Succeeded)",
            ));
        }
        Ok(())
    }
}

/// Derives `instance` and the scrape address
pub struct AddressPhase;

impl RelabelPhase for AddressPhase {
    fn name(&self) -> &str {
        "address"
    }

    fn compile(&self, ctx: &JobContext<'_>, rules: &mut Vec<RelabelConfig>) -> Result<(), CompileError> {
        match ctx.endpoint {
            EndpointRef::Port(_) => {
                let port = ctx.port.ok_or_else(|| {
                    CompileError::Port("pod endpoint compiled without a resolved port".to_string())
                })?;
                rules.extend(tmp_instance_rules());
                rules.extend(port.rules());
            }
            EndpointRef::Node(_) => {
                rules.push(RelabelConfig::copy(&[labels::META_NODE_NAME], labels::NODE));
                rules.push(RelabelConfig::copy(&[labels::META_NODE_NAME], labels::INSTANCE));
            }
            EndpointRef::Probe(_) => {
                let prober = ctx
                    .target
                    .prober_address()
                    .ok_or(CompileError::Empty { field: "prober.address" })?;
                rules.push(RelabelConfig::copy(&[labels::ADDRESS], labels::PARAM_TARGET));
                rules.push(RelabelConfig::copy(&[labels::PARAM_TARGET], labels::INSTANCE));
                rules.push(RelabelConfig::set(labels::ADDRESS, prober));
            }
        }
        Ok(())
    }
}

/// Copies object labels onto series
pub struct LabelMappingPhase;

impl RelabelPhase for LabelMappingPhase {
    fn name(&self) -> &str {
        "label-mapping"
    }

    fn compile(&self, ctx: &JobContext<'_>, rules: &mut Vec<RelabelConfig>) -> Result<(), CompileError> {
        let mappings = ctx.target.label_mappings();
        if let (Some(prefix), false) = (ctx.target.label_prefix(), mappings.is_empty()) {
            rules.extend(compile_label_mappings(mappings, prefix)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use vigil_common::crd::{
        LabelMapping, LabelSelector, PodMonitoring, PodMonitoringSpec, ProbeModule,
        ProbeMonitoring, ProbeMonitoringSpec, Prober, ScrapeEndpoint, ScrapeSettings, TargetLabels,
    };
    use vigil_common::promconfig::RelabelAction;

    use super::*;
    use crate::config::CompilerConfig;
    use crate::port::PortSpec;

    fn config() -> CompilerConfig {
        CompilerConfig::new("acme", "europe-west4", "prod")
    }

    fn pod_monitoring(spec: PodMonitoringSpec) -> PodMonitoring {
        let mut resource = PodMonitoring::new("api", spec);
        resource.metadata.namespace = Some("team-a".to_string());
        resource
    }

    fn run(phase: &dyn RelabelPhase, ctx: &JobContext<'_>) -> Vec<RelabelConfig> {
        let mut rules = Vec::new();
        phase.compile(ctx, &mut rules).unwrap();
        rules
    }

    #[test]
    fn test_forced_labels_come_from_config() {
        let config = config();
        let pm = pod_monitoring(PodMonitoringSpec::default());
        let endpoint = ScrapeEndpoint::named("web", "10s");
        let metadata = BTreeSet::new();
        let ctx = JobContext {
            config: &config,
            target: MonitoringTarget::from(&pm),
            name: "api",
            namespace: Some("team-a"),
            endpoint: EndpointRef::Port(&endpoint),
            port: Some(PortSpec::Named("web")),
            metadata: &metadata,
        };

        let rules = run(&ForcedLabelsPhase, &ctx);
        let written: Vec<_> = rules
            .iter()
            .map(|r| (r.target_label.as_str(), r.replacement.as_str()))
            .collect();
        assert_eq!(
            written,
            [("project_id", "acme"), ("location", "europe-west4"), ("cluster", "prod")]
        );
    }

    #[test]
    fn test_pod_monitoring_filters_to_own_namespace() {
        let config = config();
        let pm = pod_monitoring(PodMonitoringSpec {
            selector: LabelSelector::from_labels([("app", "api")]),
            ..Default::default()
        });
        let endpoint = ScrapeEndpoint::named("web", "10s");
        let metadata = BTreeSet::new();
        let ctx = JobContext {
            config: &config,
            target: MonitoringTarget::from(&pm),
            name: "api",
            namespace: Some("team-a"),
            endpoint: EndpointRef::Port(&endpoint),
            port: Some(PortSpec::Named("web")),
            metadata: &metadata,
        };

        let rules = run(&TargetFilterPhase, &ctx);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].source_labels, [labels::META_NAMESPACE]);
        assert_eq!(rules[0].regex, "team-a");
        assert_eq!(rules[1].action, RelabelAction::Keep);

        let rules = run(&MetadataPhase, &ctx);
        assert_eq!(rules[0].target_label, labels::NAMESPACE);
        assert_eq!(rules[0].replacement, "team-a");

        let rules = run(&RunningFilterPhase, &ctx);
        assert_eq!(rules[0].action, RelabelAction::Drop);
        assert_eq!(rules[0].regex, "(Failed|Succeeded)");
    }

    #[test]
    fn test_running_filter_can_be_disabled() {
        let config = config();
        let pm = pod_monitoring(PodMonitoringSpec {
            filter_running: Some(false),
            ..Default::default()
        });
        let endpoint = ScrapeEndpoint::numbered(9090, "10s");
        let metadata = BTreeSet::new();
        let ctx = JobContext {
            config: &config,
            target: MonitoringTarget::from(&pm),
            name: "api",
            namespace: Some("team-a"),
            endpoint: EndpointRef::Port(&endpoint),
            port: Some(PortSpec::Numeric(9090)),
            metadata: &metadata,
        };
        assert!(run(&RunningFilterPhase, &ctx).is_empty());
    }

    #[test]
    fn test_probe_address_points_at_prober() {
        let config = config();
        let module = ProbeModule {
            module: "http_2xx".to_string(),
            scrape: ScrapeSettings::every("1m"),
        };
        let mut probe = ProbeMonitoring::new(
            "uptime",
            ProbeMonitoringSpec {
                prober: Prober {
                    address: "blackbox.ops:9115".to_string(),
                },
                targets: vec!["https://example.com".to_string()],
                modules: vec![module.clone()],
                limits: None,
            },
        );
        probe.metadata.namespace = Some("ops".to_string());
        let metadata = BTreeSet::new();
        let ctx = JobContext {
            config: &config,
            target: MonitoringTarget::from(&probe),
            name: "uptime",
            namespace: Some("ops"),
            endpoint: EndpointRef::Probe(&module),
            port: None,
            metadata: &metadata,
        };

        let rules = run(&AddressPhase, &ctx);
        assert_eq!(rules[0].target_label, labels::PARAM_TARGET);
        assert_eq!(rules[1].target_label, labels::INSTANCE);
        assert_eq!(rules[2].target_label, labels::ADDRESS);
        assert_eq!(rules[2].replacement, "blackbox.ops:9115");
        assert!(run(&LabelMappingPhase, &ctx).is_empty());
    }

    #[test]
    fn test_label_mapping_errors_propagate() {
        let config = config();
        let pm = pod_monitoring(PodMonitoringSpec {
            target_labels: TargetLabels {
                from_pod: vec![LabelMapping::new("owner", "instance")],
                ..Default::default()
            },
            ..Default::default()
        });
        let endpoint = ScrapeEndpoint::named("web", "10s");
        let metadata = BTreeSet::new();
        let ctx = JobContext {
            config: &config,
            target: MonitoringTarget::from(&pm),
            name: "api",
            namespace: Some("team-a"),
            endpoint: EndpointRef::Port(&endpoint),
            port: Some(PortSpec::Named("web")),
            metadata: &metadata,
        };
        let mut rules = Vec::new();
        let err = LabelMappingPhase.compile(&ctx, &mut rules).unwrap_err();
        assert!(matches!(err, CompileError::LabelMapping { .. }));
    }

    #[test]
    fn test_phase_order() {
        let names: Vec<_> = default_phases().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(
            names,
            [
                "forced-labels",
                "target-filter",
                "metadata",
                "job-label",
                "running-filter",
                "address",
                "label-mapping"
            ]
        );
    }
}
