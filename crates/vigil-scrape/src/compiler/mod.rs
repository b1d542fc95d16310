//! Scrape config compiler
//!
//! Compiles a batch of monitoring resources into collector scrape jobs. Each
//! endpoint of a resource becomes one job whose target relabeling is assembled
//! by the [`RelabelPhase`]s in a fixed order:
//!
//! 1. platform identifiers (`project_id`, `location`, `cluster`)
//! 2. namespace and selector filters
//! 3. metadata labels
//! 4. the `job` label
//! 5. the non-running pod filter
//! 6. `instance` and the scrape address
//! 7. label mappings
//!
//! A resource compiles completely or not at all. Its errors are returned with
//! the batch instead of aborting it, so one broken resource never blocks its
//! siblings.
//!
//! # Usage
//!
//! ```text
//! let compiler = ScrapeCompiler::new(CompilerConfig::from_env()?)?;
//! let batch = compiler.compile(&[MonitoringTarget::from(&pod_monitoring)]);
//! // batch.jobs, batch.errors, batch.secrets
//! ```

mod phase;
mod phases;

use std::collections::BTreeMap;

use tracing::{debug, info, info_span, trace, warn};
use vigil_common::crd::{RelabelingRule, ScrapeSettings};
use vigil_common::promconfig::{
    ConfigError, KubernetesRole, KubernetesSdConfig, PrometheusConfig, PromDuration,
    RelabelConfig, ScrapeConfig, SelectorConfig, StaticConfig,
};

pub use phase::{JobContext, RelabelPhase};
pub use phases::{
    default_phases, AddressPhase, ForcedLabelsPhase, JobLabelPhase, LabelMappingPhase,
    MetadataPhase, RunningFilterPhase, TargetFilterPhase,
};

use crate::config::CompilerConfig;
use crate::error::{CompileError, ResourceError};
use crate::http::{compile_http_client, with_service_account_defaults};
use crate::metrics::{self, BatchTimer};
use crate::port::PortSpec;
use crate::protected;
use crate::secrets::{SecretRefPool, SecretScope};
use crate::target::{EndpointRef, MonitoringTarget};
use crate::validate::{round_trip, JobNames};

/// Output of one compilation
#[derive(Debug, Default)]
pub struct CompiledBatch {
    /// Jobs in input order, endpoints in declaration order
    pub jobs: Vec<ScrapeConfig>,
    /// One entry per rejected resource
    pub errors: Vec<ResourceError>,
    /// Secret references used by `jobs`
    pub secrets: SecretRefPool,
}

impl CompiledBatch {
    /// Render the jobs as a collector configuration file
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        PrometheusConfig {
            scrape_configs: self.jobs.clone(),
        }
        .to_yaml()
    }

    /// Errors attributed to `resource`
    pub fn errors_for<'a>(&'a self, resource: &'a str) -> impl Iterator<Item = &'a ResourceError> {
        self.errors.iter().filter(move |e| e.resource == resource)
    }
}

/// Jobs and secret references of one successfully compiled resource
struct CompiledTarget {
    resource: String,
    jobs: Vec<ScrapeConfig>,
    secrets: SecretRefPool,
}

/// Compiles monitoring resources into scrape jobs
///
/// Holds no state between calls; one compiler may serve concurrent batches.
pub struct ScrapeCompiler {
    config: CompilerConfig,
    global_metric_relabeling: Vec<RelabelConfig>,
    phases: Vec<Box<dyn RelabelPhase>>,
}

impl ScrapeCompiler {
    /// Create a compiler, checking the config and its global metric relabeling
    pub fn new(config: CompilerConfig) -> Result<Self, vigil_common::Error> {
        config.validate()?;
        let global_metric_relabeling = compile_metric_relabeling(&config.metric_relabeling)
            .map_err(|e| {
                vigil_common::Error::validation_for_field(
                    "CompilerConfig",
                    "metricRelabeling",
                    e.to_string(),
                )
            })?;
        Ok(Self {
            config,
            global_metric_relabeling,
            phases: default_phases(),
        })
    }

    /// The compiler's settings
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a batch of resources
    ///
    /// Job names are unique across the batch: when two jobs collide, the
    /// resource compiled first keeps its job and the later resource is
    /// rejected with both batch positions.
    pub fn compile(&self, targets: &[MonitoringTarget<'_>]) -> CompiledBatch {
        let timer = BatchTimer::start();
        let mut batch = CompiledBatch::default();
        let mut names = JobNames::new();

        for target in targets {
            let result = self.compile_target(target).and_then(|compiled| {
                names.register(&compiled.resource, &compiled.jobs)?;
                Ok(compiled)
            });
            match result {
                Ok(compiled) => {
                    batch.jobs.extend(compiled.jobs);
                    batch.secrets.merge(compiled.secrets);
                }
                Err(err) => {
                    warn!(
                        resource = %err.resource,
                        endpoint = ?err.endpoint,
                        error = %err.source,
                        "rejected monitoring resource"
                    );
                    metrics::record_error(&err.source);
                    batch.errors.push(err);
                }
            }
        }

        info!(
            jobs = batch.jobs.len(),
            errors = batch.errors.len(),
            secrets = batch.secrets.len(),
            "compiled scrape configuration"
        );
        timer.complete(batch.jobs.len());
        batch
    }

    /// Compile a single resource on its own, discarding the output
    ///
    /// Entry point for admission checks.
    pub fn validate(&self, target: &MonitoringTarget<'_>) -> Result<(), ResourceError> {
        let compiled = self.compile_target(target)?;
        JobNames::new().register(&compiled.resource, &compiled.jobs)
    }

    fn compile_target(&self, target: &MonitoringTarget<'_>) -> Result<CompiledTarget, ResourceError> {
        let key = target
            .key()
            .map_err(|e| ResourceError::new(target.kind(), None, e))?;
        let span = info_span!("compile_target", resource = %key);
        let _guard = span.enter();

        let fail = |source: CompileError| ResourceError::new(key.as_str(), None, source);
        let at = |index: usize| {
            let key = key.as_str();
            move |source: CompileError| ResourceError::new(key, Some(index), source)
        };

        let name = target.name().map_err(fail)?;
        let namespace = target.namespace().map_err(fail)?;
        let metadata = target.metadata_labels().map_err(fail)?;
        let scope = target
            .secret_scope(&self.config.default_secret_namespace)
            .map_err(fail)?;

        let endpoints = target.endpoints();
        if endpoints.is_empty() {
            return Err(fail(CompileError::Empty {
                field: target.endpoints_field(),
            }));
        }
        if target.role().is_none() && target.static_targets().is_empty() {
            return Err(fail(CompileError::Empty { field: "targets" }));
        }
        if target.prober_address().is_some_and(str::is_empty) {
            return Err(fail(CompileError::Empty {
                field: "prober.address",
            }));
        }

        let mut secrets = SecretRefPool::new();
        let mut jobs = Vec::with_capacity(endpoints.len());
        for (index, endpoint) in endpoints.into_iter().enumerate() {
            let port = match endpoint {
                EndpointRef::Port(e) => {
                    Some(PortSpec::from_endpoint(e.port.as_ref()).map_err(at(index))?)
                }
                EndpointRef::Node(_) | EndpointRef::Probe(_) => None,
            };
            let ctx = JobContext {
                config: &self.config,
                target: *target,
                name,
                namespace,
                endpoint,
                port,
                metadata: &metadata,
            };
            let job = self
                .compile_job(&key, index, &ctx, &mut secrets, scope)
                .map_err(at(index))?;
            debug!(
                job = %job.job_name,
                relabel_rules = job.relabel_configs.len(),
                metric_relabel_rules = job.metric_relabel_configs.len(),
                "compiled scrape job"
            );
            jobs.push(job);
        }

        Ok(CompiledTarget {
            resource: key.clone(),
            jobs,
            secrets,
        })
    }

    fn compile_job(
        &self,
        key: &str,
        index: usize,
        ctx: &JobContext<'_>,
        secrets: &mut SecretRefPool,
        scope: SecretScope<'_>,
    ) -> Result<ScrapeConfig, CompileError> {
        let settings = ctx.endpoint.settings();
        let suffix = ctx
            .port
            .map(|p| p.job_suffix())
            .unwrap_or_else(|| index.to_string());
        let (scrape_interval, scrape_timeout) = scrape_durations(settings)?;

        let mut relabel_configs = Vec::new();
        for phase in &self.phases {
            phase.compile(ctx, &mut relabel_configs)?;
            trace!(phase = phase.name(), rules = relabel_configs.len(), "relabel phase complete");
        }

        let mut metric_relabel_configs = compile_metric_relabeling(&settings.metric_relabeling)?;
        metric_relabel_configs.extend(self.global_metric_relabeling.iter().cloned());

        let mut http_client_config = compile_http_client(&settings.http, secrets, scope)?;
        let mut params = settings.params.clone();
        let (default_scheme, default_path) = match ctx.endpoint {
            EndpointRef::Port(_) => ("http", "/metrics"),
            EndpointRef::Node(_) => {
                http_client_config = with_service_account_defaults(http_client_config);
                ("https", "/metrics")
            }
            EndpointRef::Probe(module) => {
                if module.module.is_empty() {
                    return Err(CompileError::Empty { field: "module" });
                }
                params.insert("module".to_string(), vec![module.module.clone()]);
                ("http", "/probe")
            }
        };

        let (kubernetes_sd_configs, static_configs) = self.discovery(&ctx.target);
        let limits = ctx.target.limits().cloned().unwrap_or_default();

        let job = ScrapeConfig {
            job_name: format!("{key}/{suffix}"),
            scrape_interval,
            scrape_timeout,
            metrics_path: non_empty(settings.path.as_deref()).unwrap_or(default_path).to_string(),
            scheme: non_empty(settings.scheme.as_deref()).unwrap_or(default_scheme).to_string(),
            params,
            kubernetes_sd_configs,
            static_configs,
            http_client_config,
            relabel_configs,
            metric_relabel_configs,
            sample_limit: limits.samples,
            label_limit: limits.labels,
            label_name_length_limit: limits.label_name_length,
            label_value_length_limit: limits.label_value_length,
        };
        round_trip(&job)?;
        Ok(job)
    }

    /// Discovery restricted to the collector's own node, or the probe's
    /// static targets
    fn discovery(&self, target: &MonitoringTarget<'_>) -> (Vec<KubernetesSdConfig>, Vec<StaticConfig>) {
        let Some(role) = target.role() else {
            let targets = StaticConfig {
                targets: target.static_targets().to_vec(),
                labels: BTreeMap::new(),
            };
            return (Vec::new(), vec![targets]);
        };
        let field = match role {
            KubernetesRole::Node => format!("metadata.name=$({})", self.config.node_name_env),
            _ => format!("spec.nodeName=$({})", self.config.node_name_env),
        };
        let sd = KubernetesSdConfig {
            role,
            selectors: vec![SelectorConfig {
                role,
                label: String::new(),
                field,
            }],
        };
        (vec![sd], Vec::new())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Parse interval and timeout; an unset timeout equals the interval
fn scrape_durations(settings: &ScrapeSettings) -> Result<(PromDuration, PromDuration), CompileError> {
    let raw_interval = non_empty(settings.interval.as_deref())
        .ok_or_else(|| CompileError::duration("interval", "interval must be set"))?;
    let interval = raw_interval
        .parse::<PromDuration>()
        .map_err(|e| CompileError::duration("interval", e.to_string()))?;
    if interval.as_millis() == 0 {
        return Err(CompileError::duration("interval", "interval must be greater than zero"));
    }

    let Some(raw_timeout) = non_empty(settings.timeout.as_deref()) else {
        return Ok((interval, interval));
    };
    let timeout = raw_timeout
        .parse::<PromDuration>()
        .map_err(|e| CompileError::duration("timeout", e.to_string()))?;
    if timeout.as_millis() == 0 {
        return Err(CompileError::duration("timeout", "timeout must be greater than zero"));
    }
    if timeout > interval {
        return Err(CompileError::duration(
            "timeout",
            format!("timeout {raw_timeout} exceeds interval {raw_interval}"),
        ));
    }
    Ok((interval, timeout))
}

/// Convert user metric relabeling rules, rejecting malformed rules and rules
/// that touch protected labels
fn compile_metric_relabeling(rules: &[RelabelingRule]) -> Result<Vec<RelabelConfig>, CompileError> {
    rules
        .iter()
        .map(|rule| {
            let config = rule.to_relabel_config();
            config
                .validate()
                .map_err(|e| CompileError::InvalidRelabeling(e.to_string()))?;
            protected::check_rule(&config)?;
            Ok(config)
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
