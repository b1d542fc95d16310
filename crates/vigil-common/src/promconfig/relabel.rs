//! Relabel rules and their evaluation
//!
//! [`RelabelConfig`] is one step of a relabeling pipeline as the collector
//! understands it. [`process`] evaluates a pipeline against a label set with
//! the collector's semantics, which lets callers check what a compiled job
//! will do to a discovered target without running a collector.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{is_valid_label_name, ConfigError};

/// Default separator placed between concatenated source label values
pub const DEFAULT_SEPARATOR: &str = ";";
/// Default regex, capturing the whole input
pub const DEFAULT_REGEX: &str = "(.*)";
/// Default replacement, the first capture group
pub const DEFAULT_REPLACEMENT: &str = "$1";

/// Relabel action
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RelabelAction {
    /// Write the (expanded) replacement into the target label if the regex matches
    #[default]
    Replace,
    /// Drop the target unless the regex matches
    Keep,
    /// Drop the target if the regex matches
    Drop,
    /// Write the hash of the source values modulo `modulus` into the target label
    HashMod,
    /// Copy every label whose name matches the regex to the expanded replacement name
    LabelMap,
    /// Remove every label whose name matches the regex
    LabelDrop,
    /// Remove every label whose name does not match the regex
    LabelKeep,
}

impl RelabelAction {
    /// The action's name in the configuration file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Keep => "keep",
            Self::Drop => "drop",
            Self::HashMod => "hashmod",
            Self::LabelMap => "labelmap",
            Self::LabelDrop => "labeldrop",
            Self::LabelKeep => "labelkeep",
        }
    }
}

impl fmt::Display for RelabelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One relabeling step
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelabelConfig {
    /// Labels whose values are concatenated to form the regex input
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_labels: Vec<String>,
    /// Separator placed between concatenated source values
    pub separator: String,
    /// Regex matched against the concatenated values (fully anchored)
    pub regex: String,
    /// Modulus for `hashmod`
    #[serde(skip_serializing_if = "is_zero")]
    pub modulus: u64,
    /// Label written by `replace` and `hashmod`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_label: String,
    /// Replacement template with `$n` / `${name}` capture references
    pub replacement: String,
    /// Action to perform
    pub action: RelabelAction,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Default for RelabelConfig {
    fn default() -> Self {
        Self {
            source_labels: Vec::new(),
            separator: DEFAULT_SEPARATOR.to_string(),
            regex: DEFAULT_REGEX.to_string(),
            modulus: 0,
            target_label: String::new(),
            replacement: DEFAULT_REPLACEMENT.to_string(),
            action: RelabelAction::Replace,
        }
    }
}

impl RelabelConfig {
    /// Unconditionally set `target` to a constant value
    pub fn set(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            target_label: target.into(),
            replacement: value.into(),
            ..Default::default()
        }
    }

    /// Copy the concatenated source values into `target`
    pub fn copy(sources: &[&str], target: impl Into<String>) -> Self {
        Self {
            source_labels: to_strings(sources),
            target_label: target.into(),
            ..Default::default()
        }
    }

    /// Keep only targets whose source values match `regex`
    pub fn keep(sources: &[&str], regex: impl Into<String>) -> Self {
        Self {
            source_labels: to_strings(sources),
            regex: regex.into(),
            action: RelabelAction::Keep,
            ..Default::default()
        }
    }

    /// Drop targets whose source values match `regex`
    pub fn drop(sources: &[&str], regex: impl Into<String>) -> Self {
        Self {
            source_labels: to_strings(sources),
            regex: regex.into(),
            action: RelabelAction::Drop,
            ..Default::default()
        }
    }

    /// Remove every label whose name matches `regex`
    pub fn label_drop(regex: impl Into<String>) -> Self {
        Self {
            regex: regex.into(),
            action: RelabelAction::LabelDrop,
            ..Default::default()
        }
    }

    /// Override the regex
    pub fn with_regex(mut self, regex: impl Into<String>) -> Self {
        self.regex = regex.into();
        self
    }

    /// Override the replacement template
    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = replacement.into();
        self
    }

    /// Compile the rule's regex with the collector's full anchoring
    pub fn compiled_regex(&self) -> Result<Regex, ConfigError> {
        compile_anchored(&self.regex)
    }

    /// Apply the collector's validation rules for a single relabel step
    pub fn validate(&self) -> Result<(), ConfigError> {
        let action = self.action;
        self.compiled_regex()?;

        for label in &self.source_labels {
            if !is_valid_label_name(label) {
                return Err(ConfigError::Relabel(format!(
                    "{label:?} is not a valid label name"
                )));
            }
        }

        if action == RelabelAction::HashMod && self.modulus == 0 {
            return Err(ConfigError::Relabel(
                "relabel configuration for hashmod requires non-zero modulus".to_string(),
            ));
        }

        let needs_target = matches!(action, RelabelAction::Replace | RelabelAction::HashMod);
        if needs_target && self.target_label.is_empty() {
            return Err(ConfigError::Relabel(format!(
                "relabel configuration for {action} action requires 'target_label' value"
            )));
        }

        if action == RelabelAction::Replace {
            let valid = if self.target_label.contains('$') {
                is_valid_relabel_target(&self.target_label)
            } else {
                is_valid_label_name(&self.target_label)
            };
            if !valid {
                return Err(ConfigError::Relabel(format!(
                    "{:?} is invalid 'target_label' for {action} action",
                    self.target_label
                )));
            }
        }

        if action == RelabelAction::HashMod && !is_valid_label_name(&self.target_label) {
            return Err(ConfigError::Relabel(format!(
                "{:?} is invalid 'target_label' for {action} action",
                self.target_label
            )));
        }

        if action == RelabelAction::LabelMap && !is_valid_relabel_target(&self.replacement) {
            return Err(ConfigError::Relabel(format!(
                "{:?} is invalid 'replacement' for {action} action",
                self.replacement
            )));
        }

        if matches!(action, RelabelAction::LabelDrop | RelabelAction::LabelKeep)
            && (!self.source_labels.is_empty()
                || !self.target_label.is_empty()
                || self.modulus != 0
                || self.separator != DEFAULT_SEPARATOR
                || self.replacement != DEFAULT_REPLACEMENT)
        {
            return Err(ConfigError::Relabel(format!(
                "{action} action requires only 'regex', and no other fields"
            )));
        }

        Ok(())
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Compile `pattern` anchored at both ends, as the collector does
pub fn compile_anchored(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?s:{pattern})$"))
        .map_err(|e| ConfigError::Relabel(format!("invalid regex {pattern:?}: {e}")))
}

/// Escape `value` so a relabel regex matches it literally
///
/// Only the collector's regex metacharacters are escaped, so label values
/// such as `team-a` stay readable in the rendered config.
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Check a label-name template: letters, digits, underscores and `$name` /
/// `${name}` capture references, not starting with a digit
fn is_valid_relabel_target(s: &str) -> bool {
    let bytes = s.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    if bytes.is_empty() {
        return false;
    }

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_alphabetic() || b == b'_' {
            i += 1;
        } else if b == b'$' {
            i += 1;
            if bytes.get(i) == Some(&b'{') {
                i += 1;
                let start = i;
                while i < bytes.len() && is_word(bytes[i]) {
                    i += 1;
                }
                if i == start || bytes.get(i) != Some(&b'}') {
                    return false;
                }
                i += 1;
            } else {
                let start = i;
                while i < bytes.len() && is_word(bytes[i]) {
                    i += 1;
                }
                if i == start {
                    return false;
                }
            }
        } else {
            return false;
        }
        while i < bytes.len() && is_word(bytes[i]) {
            i += 1;
        }
    }
    true
}

/// Run a relabeling pipeline over `labels`
///
/// Returns `Ok(None)` if a `keep`/`drop` step discarded the target, and the
/// resulting label set otherwise. Labels set to an empty value are removed,
/// as in the collector.
pub fn process(
    labels: &BTreeMap<String, String>,
    rules: &[RelabelConfig],
) -> Result<Option<BTreeMap<String, String>>, ConfigError> {
    let mut labels = labels.clone();
    for rule in rules {
        let regex = rule.compiled_regex()?;
        if !apply(&mut labels, rule, &regex) {
            return Ok(None);
        }
    }
    Ok(Some(labels))
}

fn apply(labels: &mut BTreeMap<String, String>, rule: &RelabelConfig, regex: &Regex) -> bool {
    let value = rule
        .source_labels
        .iter()
        .map(|name| labels.get(name).map(String::as_str).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(&rule.separator);

    match rule.action {
        RelabelAction::Keep => return regex.is_match(&value),
        RelabelAction::Drop => return !regex.is_match(&value),
        RelabelAction::Replace => {
            let Some(captures) = regex.captures(&value) else {
                return true;
            };
            let mut target = String::new();
            captures.expand(&rule.target_label, &mut target);
            if !is_valid_label_name(&target) {
                return true;
            }
            let mut replaced = String::new();
            captures.expand(&rule.replacement, &mut replaced);
            set_label(labels, target, replaced);
        }
        RelabelAction::HashMod => {
            let digest = md5::compute(value.as_bytes());
            let mut tail = [0u8; 8];
            tail.copy_from_slice(&digest.0[8..]);
            let hashed = u64::from_be_bytes(tail) % rule.modulus.max(1);
            set_label(labels, rule.target_label.clone(), hashed.to_string());
        }
        RelabelAction::LabelMap => {
            let mapped: Vec<(String, String)> = labels
                .iter()
                .filter(|(name, _)| regex.is_match(name))
                .map(|(name, v)| (regex.replace_all(name, rule.replacement.as_str()).into_owned(), v.clone()))
                .collect();
            for (name, v) in mapped {
                set_label(labels, name, v);
            }
        }
        RelabelAction::LabelDrop => labels.retain(|name, _| !regex.is_match(name)),
        RelabelAction::LabelKeep => labels.retain(|name, _| regex.is_match(name)),
    }
    true
}

fn set_label(labels: &mut BTreeMap<String, String>, name: String, value: String) {
    if value.is_empty() {
        labels.remove(&name);
    } else {
        labels.insert(name, value);
    }
}
