//! Metadata labels a resource may ask to have attached to its series

use std::collections::BTreeSet;
use std::fmt;

use vigil_common::promconfig::RelabelConfig;

use crate::error::CompileError;
use crate::labels;
use crate::lineage;

/// A pod metadata label
///
/// Variants are declared in emission order, so a sorted set of them yields
/// rules in a fixed order regardless of how the resource listed them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataLabel {
    /// Pod namespace
    Namespace,
    /// Pod name
    Pod,
    /// Container name
    Container,
    /// Node name
    Node,
    /// Inferred top-level controller name
    TopLevelControllerName,
    /// Inferred top-level controller type
    TopLevelControllerType,
}

/// Metadata labels a namespaced pod resource may request
pub const NAMESPACED_ALLOWED: &[MetadataLabel] = &[
    MetadataLabel::Pod,
    MetadataLabel::Container,
    MetadataLabel::Node,
    MetadataLabel::TopLevelControllerName,
    MetadataLabel::TopLevelControllerType,
];

/// Metadata labels a cluster-scoped pod resource may request
pub const CLUSTER_ALLOWED: &[MetadataLabel] = &[
    MetadataLabel::Namespace,
    MetadataLabel::Pod,
    MetadataLabel::Container,
    MetadataLabel::Node,
    MetadataLabel::TopLevelControllerName,
    MetadataLabel::TopLevelControllerType,
];

impl MetadataLabel {
    /// Output label name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => labels::NAMESPACE,
            Self::Pod => labels::POD,
            Self::Container => labels::CONTAINER,
            Self::Node => labels::NODE,
            Self::TopLevelControllerName => labels::TOP_LEVEL_CONTROLLER_NAME,
            Self::TopLevelControllerType => labels::TOP_LEVEL_CONTROLLER_TYPE,
        }
    }

    /// Parse a requested label, checking it against `allowed`
    pub fn parse(value: &str, allowed: &[MetadataLabel]) -> Result<Self, CompileError> {
        allowed
            .iter()
            .copied()
            .find(|label| label.as_str() == value)
            .ok_or_else(|| CompileError::InvalidMetadataLabel {
                label: value.to_string(),
                allowed: allowed
                    .iter()
                    .map(|l| l.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl fmt::Display for MetadataLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the requested metadata list, falling back to `default` when unset
pub fn resolve_metadata(
    requested: Option<&[String]>,
    default: &[MetadataLabel],
    allowed: &[MetadataLabel],
) -> Result<BTreeSet<MetadataLabel>, CompileError> {
    match requested {
        None => Ok(default.iter().copied().collect()),
        Some(values) => values
            .iter()
            .map(|v| MetadataLabel::parse(v, allowed))
            .collect(),
    }
}

/// Rules copying the requested pod metadata onto the series
pub fn metadata_rules(requested: &BTreeSet<MetadataLabel>) -> Vec<RelabelConfig> {
    let mut rules = Vec::new();
    for label in requested {
        let source = match label {
            MetadataLabel::Namespace => labels::META_NAMESPACE,
            MetadataLabel::Pod => labels::META_POD_NAME,
            MetadataLabel::Container => labels::META_POD_CONTAINER_NAME,
            MetadataLabel::Node => labels::META_POD_NODE_NAME,
            MetadataLabel::TopLevelControllerName | MetadataLabel::TopLevelControllerType => {
                continue
            }
        };
        rules.push(RelabelConfig::copy(&[source], label.as_str()));
    }
    rules.extend(lineage::lineage_rules(
        requested.contains(&MetadataLabel::TopLevelControllerName),
        requested.contains(&MetadataLabel::TopLevelControllerType),
    ));
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_defaults_apply_only_when_unset() {
        let resolved = resolve_metadata(None, &[MetadataLabel::Namespace], CLUSTER_ALLOWED).unwrap();
        assert_eq!(resolved.into_iter().collect::<Vec<_>>(), [MetadataLabel::Namespace]);

        let empty = strings(&[]);
        let resolved = resolve_metadata(Some(empty.as_slice()), &[MetadataLabel::Namespace], CLUSTER_ALLOWED)
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_namespace_not_allowed_for_namespaced() {
        let requested = strings(&["pod", "namespace"]);
        let err = resolve_metadata(Some(requested.as_slice()), &[], NAMESPACED_ALLOWED).unwrap_err();
        assert!(matches!(err, CompileError::InvalidMetadataLabel { ref label, .. } if label == "namespace"));
    }

    #[test]
    fn test_unknown_label_rejected() {
        let requested = strings(&["image"]);
        assert!(resolve_metadata(Some(requested.as_slice()), &[], CLUSTER_ALLOWED).is_err());
    }

    #[test]
    fn test_rules_follow_fixed_order() {
        let requested = strings(&["top_level_controller_type", "node", "pod", "container"]);
        let resolved = resolve_metadata(Some(requested.as_slice()), &[], NAMESPACED_ALLOWED).unwrap();
        let rules = metadata_rules(&resolved);
        let targets: Vec<_> = rules.iter().map(|r| r.target_label.as_str()).collect();
        assert_eq!(
            targets,
            [
                "pod",
                "container",
                "node",
                "top_level_controller_type",
                "top_level_controller_type",
                "top_level_controller_type"
            ]
        );
    }
}
