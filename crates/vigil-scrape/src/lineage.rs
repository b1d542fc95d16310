//! Top-level controller inference
//!
//! Pods only know their immediate owner. The heuristics below walk one step
//! further up for the common cases, using naming conventions of the built-in
//! controllers. Each heuristic is a relabel pair over the same source labels;
//! later entries overwrite earlier ones when they match, so a new heuristic is
//! one more table entry.

use std::collections::BTreeMap;

use vigil_common::promconfig::relabel::process;
use vigil_common::promconfig::{ConfigError, RelabelConfig};

use crate::labels::{self, POD_LABELS};

/// One inference step: when `regex` matches the joined `sources`, set the
/// controller name to `name` and the type to `type_` (capture references
/// allowed)
#[derive(Clone, Copy, Debug)]
pub struct LineageRule {
    /// What the rule recognizes
    pub description: &'static str,
    sources: &'static [&'static str],
    regex: &'static str,
    name: &'static str,
    type_: &'static str,
}

const CONTROLLER_SOURCES: &[&str] = &[labels::META_POD_CONTROLLER_NAME, labels::META_POD_CONTROLLER_KIND];
const REPLICA_SET_SOURCES: &[&str] = &[
    labels::META_POD_CONTROLLER_KIND,
    labels::META_POD_CONTROLLER_NAME,
    "__meta_kubernetes_pod_label_pod_template_hash",
];
const JOB_SOURCES: &[&str] = &[labels::META_POD_CONTROLLER_KIND, labels::META_POD_CONTROLLER_NAME];

/// Inference steps, applied in order with the last match winning
pub const LINEAGE_RULES: [LineageRule; 3] = [
    LineageRule {
        description: "immediate controller",
        sources: CONTROLLER_SOURCES,
        regex: "(.+);(.+)",
        name: "$1",
        type_: "$2",
    },
    LineageRule {
        description: "ReplicaSet owned by a Deployment",
        sources: REPLICA_SET_SOURCES,
        regex: "ReplicaSet;(.+)-[a-z0-9]+;.+",
        name: "$1",
        type_: "Deployment",
    },
    LineageRule {
        description: "Job created by a CronJob",
        sources: JOB_SOURCES,
        regex: "Job;(.+)-[0-9]{8}",
        name: "$1",
        type_: "CronJob",
    },
];

/// Relabel rules writing the requested lineage labels
pub fn lineage_rules(with_name: bool, with_type: bool) -> Vec<RelabelConfig> {
    let mut rules = Vec::new();
    for rule in &LINEAGE_RULES {
        if with_name {
            rules.push(
                RelabelConfig::copy(rule.sources, labels::TOP_LEVEL_CONTROLLER_NAME)
                    .with_regex(rule.regex)
                    .with_replacement(rule.name),
            );
        }
        if with_type {
            rules.push(
                RelabelConfig::copy(rule.sources, labels::TOP_LEVEL_CONTROLLER_TYPE)
                    .with_regex(rule.regex)
                    .with_replacement(rule.type_),
            );
        }
    }
    rules
}

/// Inferred top-level controller of a pod
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lineage {
    /// Controller name
    pub name: Option<String>,
    /// Controller type
    pub type_: Option<String>,
}

/// Evaluate the lineage rules for a pod owned by `kind`/`name` with the given
/// pod labels, exactly as the collector would
pub fn resolve(
    kind: &str,
    name: &str,
    pod_labels: &BTreeMap<String, String>,
) -> Result<Lineage, ConfigError> {
    let mut meta: BTreeMap<String, String> = pod_labels
        .iter()
        .map(|(k, v)| (POD_LABELS.value_of(k), v.clone()))
        .collect();
    meta.insert(labels::META_POD_CONTROLLER_KIND.to_string(), kind.to_string());
    meta.insert(labels::META_POD_CONTROLLER_NAME.to_string(), name.to_string());

    let mut out = process(&meta, &lineage_rules(true, true))?.unwrap_or_default();
    Ok(Lineage {
        name: out.remove(labels::TOP_LEVEL_CONTROLLER_NAME),
        type_: out.remove(labels::TOP_LEVEL_CONTROLLER_TYPE),
    })
}
