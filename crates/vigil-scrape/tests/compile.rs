//! Integration tests for batch compilation
//!
//! These run the public compiler end to end and evaluate the emitted rules
//! against synthetic discovery candidates, so they check what the collector
//! would actually see rather than the shape of the rules.

use std::collections::BTreeMap;

use proptest::prelude::*;
use vigil_common::crd::{
    BasicAuthSpec, ClusterNodeMonitoring, ClusterNodeMonitoringSpec, ClusterPodMonitoring,
    ClusterPodMonitoringSpec, HttpClientSpec, IntOrString, LabelMapping, LabelSelector, PodMonitoring,
    PodMonitoringSpec, ProbeModule, ProbeMonitoring, ProbeMonitoringSpec, Prober,
    RelabelingRule, ScrapeEndpoint, ScrapeSettings, SecretKeySelector, TargetLabels,
};
use vigil_common::promconfig::relabel::process;
use vigil_common::promconfig::{load_config, RelabelAction, ScrapeConfig};
use vigil_scrape::protected::{check_rule, PROTECTED_LABELS};
use vigil_scrape::{CompileError, CompilerConfig, MonitoringTarget, ScrapeCompiler};

// =============================================================================
// Fixtures
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn compiler() -> ScrapeCompiler {
    init_tracing();
    ScrapeCompiler::new(CompilerConfig::new("test_project", "test_location", "test_cluster"))
        .unwrap()
}

fn pod_monitoring(namespace: &str, name: &str, spec: PodMonitoringSpec) -> PodMonitoring {
    let mut resource = PodMonitoring::new(name, spec);
    resource.metadata.namespace = Some(namespace.to_string());
    resource
}

fn endpoint_with_password(password: SecretKeySelector) -> ScrapeEndpoint {
    let mut endpoint = ScrapeEndpoint::named("web", "30s");
    endpoint.scrape.http = HttpClientSpec {
        basic_auth: Some(BasicAuthSpec {
            username: "scraper".to_string(),
            password: Some(password),
        }),
        ..Default::default()
    };
    endpoint
}

/// A pod discovery candidate as the collector would produce it
fn candidate(pod: &str, ip: &str, port_name: Option<&str>, port: u16) -> BTreeMap<String, String> {
    let mut labels: BTreeMap<String, String> = [
        ("__address__", format!("{ip}:{port}")),
        ("__meta_kubernetes_namespace", "ns1".to_string()),
        ("__meta_kubernetes_pod_name", pod.to_string()),
        ("__meta_kubernetes_pod_ip", ip.to_string()),
        ("__meta_kubernetes_pod_phase", "Running".to_string()),
        ("__meta_kubernetes_pod_node_name", "node-1".to_string()),
        ("__meta_kubernetes_pod_controller_kind", "ReplicaSet".to_string()),
        ("__meta_kubernetes_pod_controller_name", format!("{pod}-7d4b9c")),
        ("__meta_kubernetes_pod_container_name", "app".to_string()),
        ("__meta_kubernetes_pod_label_app", "frontend".to_string()),
        ("__meta_kubernetes_pod_labelpresent_app", "true".to_string()),
        ("__meta_kubernetes_pod_label_key1", "value1".to_string()),
        ("__meta_kubernetes_pod_labelpresent_key1", "true".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    if let Some(name) = port_name {
        labels.insert(
            "__meta_kubernetes_pod_container_port_name".to_string(),
            name.to_string(),
        );
    }
    labels
}

fn relabel(job: &ScrapeConfig, labels: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    process(labels, &job.relabel_configs).unwrap()
}

fn frontend_spec(endpoints: Vec<ScrapeEndpoint>) -> PodMonitoringSpec {
    PodMonitoringSpec {
        selector: LabelSelector::from_labels([("app", "frontend")]),
        endpoints,
        ..Default::default()
    }
}

// =============================================================================
// Story Tests
// =============================================================================

/// Story: a team monitors `name1` in `ns1` on port `web`, copying `key1`
/// onto its series as `key2`
#[test]
fn story_named_port_with_label_mapping() {
    let pm = pod_monitoring(
        "ns1",
        "name1",
        PodMonitoringSpec {
            endpoints: vec![ScrapeEndpoint::named("web", "10s")],
            target_labels: TargetLabels {
                from_pod: vec![LabelMapping::new("key1", "key2")],
                ..Default::default()
            },
            ..Default::default()
        },
    );
    let batch = compiler().compile(&[MonitoringTarget::from(&pm)]);
    assert!(batch.errors.is_empty(), "{:?}", batch.errors);
    assert_eq!(batch.jobs.len(), 1);

    let job = &batch.jobs[0];
    assert_eq!(job.job_name, "PodMonitoring/ns1/name1/web");

    let forced: Vec<_> = job.relabel_configs[..3]
        .iter()
        .map(|r| (r.action, r.target_label.as_str(), r.replacement.as_str()))
        .collect();
    assert_eq!(
        forced,
        [
            (RelabelAction::Replace, "project_id", "test_project"),
            (RelabelAction::Replace, "location", "test_location"),
            (RelabelAction::Replace, "cluster", "test_cluster"),
        ]
    );

    let labels = relabel(job, &candidate("pod-a", "10.0.0.1", Some("web"), 8080)).unwrap();
    assert_eq!(labels["instance"], "pod-a:web");
    assert_eq!(labels["namespace"], "ns1");
    assert_eq!(labels["job"], "name1");
    assert_eq!(labels["project_id"], "test_project");
    assert_eq!(labels["key2"], "value1");
}

/// Story: every kind of resource compiles together, secrets are pooled once,
/// and the rendered file loads back into the same jobs
#[test]
fn story_mixed_batch_round_trips() {
    let password = SecretKeySelector::new("creds", "password");
    let pm = pod_monitoring(
        "ns1",
        "frontend",
        frontend_spec(vec![endpoint_with_password(password.clone())]),
    );
    let other = pod_monitoring(
        "ns1",
        "backend",
        frontend_spec(vec![endpoint_with_password(password)]),
    );
    let cpm = ClusterPodMonitoring::new(
        "mesh",
        ClusterPodMonitoringSpec {
            selector: LabelSelector::from_labels([("mesh", "enabled")]),
            endpoints: vec![ScrapeEndpoint::numbered(15090, "30s")],
            ..Default::default()
        },
    );
    let node = ClusterNodeMonitoring::new(
        "kubelet",
        ClusterNodeMonitoringSpec {
            selector: None,
            endpoints: vec![ScrapeSettings::every("30s")],
            limits: None,
        },
    );
    let mut probe = ProbeMonitoring::new(
        "uptime",
        ProbeMonitoringSpec {
            prober: Prober {
                address: "blackbox:9115".to_string(),
            },
            targets: vec!["https://example.com".to_string()],
            modules: vec![ProbeModule {
                module: "http_2xx".to_string(),
                scrape: ScrapeSettings::every("1m"),
            }],
            limits: None,
        },
    );
    probe.metadata.namespace = Some("ops".to_string());

    let targets = [
        MonitoringTarget::from(&pm),
        MonitoringTarget::from(&other),
        MonitoringTarget::from(&cpm),
        MonitoringTarget::from(&node),
        MonitoringTarget::from(&probe),
    ];
    let batch = compiler().compile(&targets);
    assert!(batch.errors.is_empty(), "{:?}", batch.errors);

    let names: Vec<_> = batch.jobs.iter().map(|j| j.job_name.as_str()).collect();
    assert_eq!(
        names,
        [
            "PodMonitoring/ns1/frontend/web",
            "PodMonitoring/ns1/backend/web",
            "ClusterPodMonitoring/mesh/15090",
            "ClusterNodeMonitoring/kubelet/0",
            "ProbeMonitoring/ops/uptime/0",
        ]
    );
    assert_eq!(batch.secrets.len(), 1);
    assert!(batch.secrets.get("ns1/creds/password").is_some());

    let yaml = batch.to_yaml().unwrap();
    let loaded = load_config(&yaml).unwrap();
    assert_eq!(loaded.scrape_configs, batch.jobs);
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_compilation_is_byte_identical() {
    let forward = pod_monitoring(
        "ns1",
        "api",
        PodMonitoringSpec {
            selector: LabelSelector::from_labels([("app", "api"), ("tier", "web"), ("zone", "a")]),
            endpoints: vec![ScrapeEndpoint::named("web", "30s")],
            ..Default::default()
        },
    );
    let reversed = pod_monitoring(
        "ns1",
        "api",
        PodMonitoringSpec {
            selector: LabelSelector::from_labels([("zone", "a"), ("tier", "web"), ("app", "api")]),
            endpoints: vec![ScrapeEndpoint::named("web", "30s")],
            ..Default::default()
        },
    );

    let compiler = compiler();
    let first = compiler.compile(&[MonitoringTarget::from(&forward)]).to_yaml().unwrap();
    let again = compiler.compile(&[MonitoringTarget::from(&forward)]).to_yaml().unwrap();
    let other_order = compiler.compile(&[MonitoringTarget::from(&reversed)]).to_yaml().unwrap();

    assert_eq!(first, again);
    assert_eq!(first, other_order);
}

// =============================================================================
// Port Resolution
// =============================================================================

#[test]
fn test_numeric_port_merges_candidates_of_one_pod() {
    let pm = pod_monitoring(
        "ns1",
        "frontend",
        frontend_spec(vec![ScrapeEndpoint::numbered(8080, "30s")]),
    );
    let batch = compiler().compile(&[MonitoringTarget::from(&pm)]);
    let job = &batch.jobs[0];

    let candidates = [
        candidate("pod-a", "10.0.0.1", Some("http"), 80),
        candidate("pod-a", "10.0.0.1", Some("metrics"), 9090),
        candidate("pod-a", "10.0.0.1", None, 80),
    ];
    let resolved: Vec<_> = candidates
        .iter()
        .map(|c| relabel(job, c).unwrap())
        .map(|l| (l["instance"].clone(), l["__address__"].clone(), l.contains_key("container")))
        .collect();

    for labels in &resolved {
        assert_eq!(labels, &("pod-a:8080".to_string(), "10.0.0.1:8080".to_string(), false));
    }
}

#[test]
fn test_named_port_never_merges_pods() {
    let pm = pod_monitoring(
        "ns1",
        "frontend",
        frontend_spec(vec![ScrapeEndpoint::named("web", "30s")]),
    );
    let batch = compiler().compile(&[MonitoringTarget::from(&pm)]);
    let job = &batch.jobs[0];

    let a = relabel(job, &candidate("pod-a", "10.0.0.1", Some("web"), 8080)).unwrap();
    let b = relabel(job, &candidate("pod-b", "10.0.0.2", Some("web"), 8080)).unwrap();
    assert_eq!(a["instance"], "pod-a:web");
    assert_eq!(b["instance"], "pod-b:web");
    assert_eq!(a["__address__"], "10.0.0.1:8080");

    assert!(relabel(job, &candidate("pod-a", "10.0.0.1", Some("grpc"), 9000)).is_none());
    assert!(relabel(job, &candidate("pod-a", "10.0.0.1", None, 8080)).is_none());
}

#[test]
fn test_candidates_outside_namespace_or_selector_are_dropped() {
    let pm = pod_monitoring(
        "ns1",
        "frontend",
        frontend_spec(vec![ScrapeEndpoint::named("web", "30s")]),
    );
    let batch = compiler().compile(&[MonitoringTarget::from(&pm)]);
    let job = &batch.jobs[0];

    let mut foreign = candidate("pod-a", "10.0.0.1", Some("web"), 8080);
    foreign.insert("__meta_kubernetes_namespace".to_string(), "ns2".to_string());
    assert!(relabel(job, &foreign).is_none());

    let mut unselected = candidate("pod-a", "10.0.0.1", Some("web"), 8080);
    unselected.insert("__meta_kubernetes_pod_label_app".to_string(), "backend".to_string());
    assert!(relabel(job, &unselected).is_none());

    let mut finished = candidate("pod-a", "10.0.0.1", Some("web"), 8080);
    finished.insert("__meta_kubernetes_pod_phase".to_string(), "Succeeded".to_string());
    assert!(relabel(job, &finished).is_none());
}

// =============================================================================
// Tenancy
// =============================================================================

#[test]
fn test_tenancy_law() {
    let compiler = compiler();

    let foreign = pod_monitoring(
        "ns1",
        "foreign",
        frontend_spec(vec![endpoint_with_password(
            SecretKeySelector::new("creds", "password").in_namespace("ns2"),
        )]),
    );
    let err = compiler.validate(&MonitoringTarget::from(&foreign)).unwrap_err();
    assert!(matches!(err.source, CompileError::Tenancy { .. }), "{err}");
    assert_eq!(err.endpoint, Some(0));

    let own = pod_monitoring(
        "ns1",
        "own",
        frontend_spec(vec![endpoint_with_password(
            SecretKeySelector::new("creds", "password").in_namespace("ns1"),
        )]),
    );
    let implicit = pod_monitoring(
        "ns1",
        "implicit",
        frontend_spec(vec![endpoint_with_password(SecretKeySelector::new("creds", "password"))]),
    );

    let batch = compiler.compile(&[
        MonitoringTarget::from(&foreign),
        MonitoringTarget::from(&own),
        MonitoringTarget::from(&implicit),
    ]);
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.errors[0].resource, "PodMonitoring/ns1/foreign");
    assert_eq!(batch.jobs.len(), 2);

    let tokens: Vec<_> = batch.secrets.iter().map(|(token, _)| token).collect();
    assert_eq!(tokens, ["ns1/creds/password"]);
}

#[test]
fn test_cluster_resources_reach_any_namespace() {
    let mut admin =
        endpoint_with_password(SecretKeySelector::new("creds", "password").in_namespace("ns2"));
    admin.port = Some(IntOrString::String("admin".to_string()));

    let cluster = ClusterPodMonitoring::new(
        "shared",
        ClusterPodMonitoringSpec {
            selector: LabelSelector::from_labels([("app", "frontend")]),
            endpoints: vec![
                endpoint_with_password(SecretKeySelector::new("creds", "password")),
                admin,
            ],
            ..Default::default()
        },
    );
    let batch = compiler().compile(&[MonitoringTarget::from(&cluster)]);
    assert!(batch.errors.is_empty(), "{:?}", batch.errors);

    let tokens: Vec<_> = batch.secrets.iter().map(|(token, _)| token).collect();
    assert_eq!(tokens, ["default/creds/password", "ns2/creds/password"]);
}

// =============================================================================
// Durations
// =============================================================================

fn with_durations(interval: &str, timeout: Option<&str>) -> PodMonitoring {
    let mut endpoint = ScrapeEndpoint::named("web", interval);
    endpoint.scrape.timeout = timeout.map(str::to_string);
    pod_monitoring("ns1", "api", frontend_spec(vec![endpoint]))
}

proptest! {
    #[test]
    fn prop_timeout_never_exceeds_interval(interval in 1u64..600, timeout in proptest::option::of(1u64..600)) {
        let raw_interval = format!("{interval}s");
        let raw_timeout = timeout.map(|t| format!("{t}s"));
        let pm = with_durations(&raw_interval, raw_timeout.as_deref());
        let result = compiler().validate(&MonitoringTarget::from(&pm));

        match timeout {
            Some(t) if t > interval => {
                let err = result.unwrap_err();
                let message = err.source.to_string();
                let is_timeout = matches!(err.source, CompileError::Duration { field: "timeout", .. });
                prop_assert!(is_timeout, "{}", message);
                prop_assert!(message.contains(&format!("timeout {t}s")), "{}", message);
                prop_assert!(message.contains(&format!("interval {interval}s")), "{}", message);
            }
            _ => prop_assert!(result.is_ok(), "{:?}", result),
        }
    }
}

#[test]
fn test_unset_timeout_equals_interval() {
    let pm = with_durations("45s", None);
    let batch = compiler().compile(&[MonitoringTarget::from(&pm)]);
    let job = &batch.jobs[0];
    assert_eq!(job.scrape_timeout, job.scrape_interval);
}

// =============================================================================
// Protected Labels
// =============================================================================

fn label_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "project_id", "location", "cluster", "namespace", "job", "instance", "__address__",
        "team", "env", "__name__", "$1", "${1}_copy", "",
    ])
    .prop_map(str::to_string)
}

fn regex_pattern() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "(.*)", ".*", "instance", "inst.*", "job|team", "team", "env|team", "__.*",
        "[a-z_]+", ".*_id", "(.+)", "x",
    ])
    .prop_map(str::to_string)
}

fn action() -> impl Strategy<Value = RelabelAction> {
    prop::sample::select(vec![
        RelabelAction::Replace,
        RelabelAction::Keep,
        RelabelAction::Drop,
        RelabelAction::HashMod,
        RelabelAction::LabelMap,
        RelabelAction::LabelDrop,
        RelabelAction::LabelKeep,
    ])
}

prop_compose! {
    fn relabeling_rule()(
        action in proptest::option::of(action()),
        source_labels in prop::collection::vec(label_name(), 0..3),
        target_label in proptest::option::of(label_name()),
        regex in proptest::option::of(regex_pattern()),
        replacement in proptest::option::of(prop::sample::select(vec!["$1", "fixed", "", "${1}"])),
        modulus in proptest::option::of(1u64..16),
    ) -> RelabelingRule {
        RelabelingRule {
            source_labels,
            separator: None,
            target_label,
            regex,
            modulus,
            replacement: replacement.map(str::to_string),
            action,
        }
    }
}

fn source_labels() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::sample::select(vec![
            "project_id", "location", "cluster", "namespace", "job", "instance", "__address__",
            "team", "env", "__name__",
        ])
        .prop_map(str::to_string),
        1..3,
    )
}

fn written_label(templated: bool) -> impl Strategy<Value = String> {
    let mut names = vec!["team", "env", "tier", "owner", "job", "instance", "project_id"];
    if templated {
        names.extend(["$1", "${1}_copy"]);
    }
    prop::sample::select(names).prop_map(str::to_string)
}

/// Rules the collector would load, spread over every action the policy can accept
fn loadable_relabeling_rule() -> impl Strategy<Value = RelabelingRule> {
    prop_oneof![
        (
            source_labels(),
            written_label(true),
            regex_pattern(),
            prop::sample::select(vec!["$1", "fixed", "", "${1}"]),
        )
            .prop_map(|(source_labels, target, regex, replacement)| RelabelingRule {
                source_labels,
                target_label: Some(target),
                regex: Some(regex),
                replacement: Some(replacement.to_string()),
                action: Some(RelabelAction::Replace),
                ..Default::default()
            }),
        (
            source_labels(),
            regex_pattern(),
            prop::sample::select(vec![RelabelAction::Keep, RelabelAction::Drop]),
        )
            .prop_map(|(source_labels, regex, action)| RelabelingRule {
                source_labels,
                regex: Some(regex),
                action: Some(action),
                ..Default::default()
            }),
        (source_labels(), written_label(false), 1u64..16).prop_map(
            |(source_labels, target, modulus)| RelabelingRule {
                source_labels,
                target_label: Some(target),
                modulus: Some(modulus),
                action: Some(RelabelAction::HashMod),
                ..Default::default()
            }
        ),
        (
            regex_pattern(),
            prop::sample::select(vec![RelabelAction::LabelDrop, RelabelAction::LabelKeep]),
        )
            .prop_map(|(regex, action)| RelabelingRule {
                regex: Some(regex),
                action: Some(action),
                ..Default::default()
            }),
    ]
}

fn scraped_series() -> BTreeMap<String, String> {
    let mut labels: BTreeMap<String, String> = PROTECTED_LABELS
        .iter()
        .map(|name| (name.to_string(), format!("{name}-value")))
        .collect();
    labels.insert("__name__".to_string(), "http_requests_total".to_string());
    labels.insert("team".to_string(), "payments".to_string());
    labels.insert("env".to_string(), "prod".to_string());
    labels
}

proptest! {
    /// An accepted rule leaves every protected label untouched on any series
    /// it does not drop outright
    #[test]
    fn prop_accepted_rules_preserve_protected_labels(rule in loadable_relabeling_rule()) {
        let config = rule.to_relabel_config();
        prop_assert!(config.validate().is_ok(), "{:?}", config);
        prop_assume!(check_rule(&config).is_ok());

        let input = scraped_series();
        if let Some(output) = process(&input, std::slice::from_ref(&config)).unwrap() {
            for name in PROTECTED_LABELS {
                prop_assert_eq!(output.get(name), input.get(name), "rule {:?} changed {}", config, name);
            }
        }
    }

    /// The compiler applies the same gate to metric relabeling
    #[test]
    fn prop_compiler_gates_metric_relabeling(rule in relabeling_rule()) {
        let config = rule.to_relabel_config();
        let accepted = config.validate().is_ok() && check_rule(&config).is_ok();

        let mut endpoint = ScrapeEndpoint::named("web", "30s");
        endpoint.scrape.metric_relabeling = vec![rule];
        let pm = pod_monitoring("ns1", "api", frontend_spec(vec![endpoint]));
        let result = compiler().validate(&MonitoringTarget::from(&pm));
        prop_assert_eq!(result.is_ok(), accepted, "{:?}", result);
    }
}
