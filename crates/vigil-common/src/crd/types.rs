//! Types shared by the monitoring CRDs

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type the reconciler sets after compiling a monitoring resource
pub const CONFIGURATION_CREATE_SUCCESS: &str = "ConfigurationCreateSuccess";

/// Labels added to every scraped series, beyond the protected ones
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetLabels {
    /// Pod metadata to attach as labels
    ///
    /// Allowed: `pod`, `container`, `node`, `top_level_controller_name`,
    /// `top_level_controller_type`, and for cluster-scoped resources `namespace`.
    /// When unset, namespaced resources add none and cluster-scoped resources
    /// add `namespace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<String>>,

    /// Pod labels to copy onto scraped series
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from_pod: Vec<LabelMapping>,
}

/// Copy a label from the discovered object to the scraped series
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelMapping {
    /// Label name on the discovered object
    pub from: String,

    /// Label name on the series, defaults to `from`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl LabelMapping {
    /// Create a mapping that renames `from` to `to`
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: Some(to.into()),
        }
    }

    /// Effective target label name
    pub fn target(&self) -> &str {
        self.to.as_deref().filter(|t| !t.is_empty()).unwrap_or(&self.from)
    }
}

/// Per-scrape safety limits, zero or unset meaning unlimited
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeLimits {
    /// Maximum samples accepted from one scrape
    #[serde(default)]
    pub samples: u64,
    /// Maximum labels per sample
    #[serde(default)]
    pub labels: u64,
    /// Maximum label name length
    #[serde(default)]
    pub label_name_length: u64,
    /// Maximum label value length
    #[serde(default)]
    pub label_value_length: u64,
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., ConfigurationCreateSuccess)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Status shared by all monitoring resources
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatus {
    /// Generation last compiled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl MonitoringStatus {
    /// Insert or replace the condition of the same type
    ///
    /// The transition time is kept when the status did not change.
    pub fn set_condition(&mut self, condition: Condition) {
        match self.conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) if existing.status == condition.status => {
                existing.reason = condition.reason;
                existing.message = condition.message;
            }
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }

    /// Look up a condition by type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}
