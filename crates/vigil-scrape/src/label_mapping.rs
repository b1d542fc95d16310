//! Label mappings: copy an object label onto scraped series

use vigil_common::crd::LabelMapping;
use vigil_common::promconfig::{is_valid_label_name, RelabelConfig};

use crate::error::CompileError;
use crate::labels::LabelPrefix;
use crate::protected;

/// Compile label mappings into replace rules, in declaration order
pub fn compile_label_mappings(
    mappings: &[LabelMapping],
    prefix: LabelPrefix,
) -> Result<Vec<RelabelConfig>, CompileError> {
    mappings
        .iter()
        .map(|mapping| {
            compile_one(mapping, prefix).map_err(|source| CompileError::LabelMapping {
                from: mapping.from.clone(),
                source: Box::new(source),
            })
        })
        .collect()
}

fn compile_one(mapping: &LabelMapping, prefix: LabelPrefix) -> Result<RelabelConfig, CompileError> {
    if mapping.from.is_empty() {
        return Err(CompileError::InvalidRelabeling(
            "source label must not be empty".to_string(),
        ));
    }
    let target = mapping.target();
    if !is_valid_label_name(target) {
        return Err(CompileError::InvalidRelabeling(format!(
            "{target:?} is not a valid label name"
        )));
    }
    let rule = RelabelConfig::copy(&[prefix.value_of(&mapping.from).as_str()], target);
    protected::check_rule(&rule)?;
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::POD_LABELS;

    #[test]
    fn test_mapping_copies_sanitized_meta_label() {
        let rules = compile_label_mappings(
            &[
                LabelMapping::new("app.kubernetes.io/version", "version"),
                LabelMapping {
                    from: "team".to_string(),
                    to: None,
                },
            ],
            POD_LABELS,
        )
        .unwrap();
        assert_eq!(
            rules[0].source_labels,
            ["__meta_kubernetes_pod_label_app_kubernetes_io_version"]
        );
        assert_eq!(rules[0].target_label, "version");
        assert_eq!(rules[1].target_label, "team");
    }

    #[test]
    fn test_mapping_onto_protected_label_fails() {
        let err = compile_label_mappings(&[LabelMapping::new("owner", "namespace")], POD_LABELS)
            .unwrap_err();
        match err {
            CompileError::LabelMapping { from, source } => {
                assert_eq!(from, "owner");
                assert!(matches!(*source, CompileError::ProtectedLabel { .. }));
            }
            other => panic!("expected LabelMapping error, got {other:?}"),
        }
    }

    #[test]
    fn test_source_name_used_as_target_is_checked_too() {
        let mapping = LabelMapping {
            from: "job".to_string(),
            to: None,
        };
        assert!(compile_label_mappings(&[mapping], POD_LABELS).is_err());
    }

    #[test]
    fn test_unsanitized_target_rejected() {
        let err = compile_label_mappings(&[LabelMapping::new("a", "b.c")], POD_LABELS).unwrap_err();
        assert!(err.to_string().contains("not a valid label name"));
    }
}
