//! User-supplied relabeling rules

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::promconfig::{RelabelAction, RelabelConfig};

/// A relabeling rule as written in a monitoring resource
///
/// Unset fields take the collector's defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelabelingRule {
    /// Labels whose values are concatenated and matched against `regex`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_labels: Vec<String>,

    /// Separator between concatenated source values (default `;`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,

    /// Label written by `replace` and `hashmod`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,

    /// Regex matched against the source values (default `(.*)`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    /// Modulus for `hashmod`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulus: Option<u64>,

    /// Replacement template (default `$1`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,

    /// Action to perform (default `replace`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RelabelAction>,
}

impl RelabelingRule {
    /// The action this rule performs once defaults are applied
    pub fn effective_action(&self) -> RelabelAction {
        self.action.unwrap_or_default()
    }

    /// Convert to the collector's relabel config, filling in defaults
    pub fn to_relabel_config(&self) -> RelabelConfig {
        let defaults = RelabelConfig::default();
        RelabelConfig {
            source_labels: self.source_labels.clone(),
            separator: self.separator.clone().unwrap_or(defaults.separator),
            regex: self.regex.clone().unwrap_or(defaults.regex),
            modulus: self.modulus.unwrap_or(0),
            target_label: self.target_label.clone().unwrap_or_default(),
            replacement: self.replacement.clone().unwrap_or(defaults.replacement),
            action: self.effective_action(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_in() {
        let rule = RelabelingRule {
            source_labels: vec!["__name__".to_string()],
            regex: Some("go_.*".to_string()),
            action: Some(RelabelAction::Drop),
            ..Default::default()
        };
        let cfg = rule.to_relabel_config();
        assert_eq!(cfg.separator, ";");
        assert_eq!(cfg.replacement, "$1");
        assert_eq!(cfg.regex, "go_.*");
        assert_eq!(cfg.action, RelabelAction::Drop);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_action_means_replace() {
        let rule: RelabelingRule =
            serde_json::from_str(r#"{"sourceLabels":["a"],"targetLabel":"b"}"#).unwrap();
        assert_eq!(rule.effective_action(), RelabelAction::Replace);
        let cfg = rule.to_relabel_config();
        assert_eq!(cfg.regex, "(.*)");
        assert_eq!(cfg.target_label, "b");
    }
}
