//! Label selector to keep/drop rule translation
//!
//! Equality matches come from a sorted map, so the emitted rules follow key
//! order and are reproducible. Expressions keep their declared order. `In` and
//! `NotIn` values are joined into an alternation and compiled here so a bad
//! pattern fails the resource instead of the collector.

use vigil_common::crd::{LabelSelector, LabelSelectorOperator};
use vigil_common::promconfig::relabel::{compile_anchored, escape_literal};
use vigil_common::promconfig::RelabelConfig;

use crate::error::CompileError;
use crate::labels::LabelPrefix;

/// Compile `selector` into filter rules over the meta-labels under `prefix`
pub fn compile_selector(
    selector: &LabelSelector,
    prefix: LabelPrefix,
) -> Result<Vec<RelabelConfig>, CompileError> {
    let mut rules = Vec::with_capacity(selector.match_labels.len() + selector.match_expressions.len());

    for (key, value) in &selector.match_labels {
        rules.push(RelabelConfig::keep(&[prefix.value_of(key).as_str()], escape_literal(value)));
    }

    for expr in &selector.match_expressions {
        expr.validate().map_err(|message| CompileError::Selector {
            key: expr.key.clone(),
            message,
        })?;
        let rule = match expr.operator {
            LabelSelectorOperator::In | LabelSelectorOperator::NotIn => {
                let pattern = expr.values.join("|");
                compile_anchored(&pattern).map_err(|e| CompileError::Selector {
                    key: expr.key.clone(),
                    message: e.to_string(),
                })?;
                let source = prefix.value_of(&expr.key);
                if expr.operator == LabelSelectorOperator::In {
                    RelabelConfig::keep(&[source.as_str()], pattern)
                } else {
                    RelabelConfig::drop(&[source.as_str()], pattern)
                }
            }
            LabelSelectorOperator::Exists => {
                RelabelConfig::keep(&[prefix.presence_of(&expr.key).as_str()], "true")
            }
            LabelSelectorOperator::DoesNotExist => {
                RelabelConfig::drop(&[prefix.presence_of(&expr.key).as_str()], "true")
            }
        };
        rules.push(rule);
    }

    Ok(rules)
}
