//! Compile errors and their attribution to resources

use std::fmt;

use vigil_common::crd::{Condition, ConditionStatus, CONFIGURATION_CREATE_SUCCESS};
use vigil_common::promconfig::{ConfigError, RelabelAction};

/// Errors that can occur while compiling a monitoring resource
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The resource's label selector cannot be turned into relabel rules
    #[error("invalid selector on key {key:?}: {message}")]
    Selector {
        /// Selector key
        key: String,
        /// What is wrong with it
        message: String,
    },

    /// Interval or timeout missing, malformed, or inconsistent
    #[error("invalid {field}: {message}")]
    Duration {
        /// `interval` or `timeout`
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// A rule would write, drop, or fail to keep a protected label
    #[error("relabeling rule with action {action} is not allowed: {message}")]
    ProtectedLabel {
        /// Action of the offending rule
        action: RelabelAction,
        /// What the rule would do
        message: String,
    },

    /// Port specifier missing or out of range
    #[error("invalid port: {0}")]
    Port(String),

    /// A namespaced resource referenced a secret outside its namespace
    #[error("secret {secret:?} must be in namespace {namespace:?}, found {requested:?}")]
    Tenancy {
        /// Secret name
        secret: String,
        /// The resource's namespace
        namespace: String,
        /// The namespace the reference asked for
        requested: String,
    },

    /// Two jobs in one batch share a name
    #[error("job name {job:?} at index {second} duplicates the job at index {first}")]
    DuplicateJobName {
        /// The shared job name
        job: String,
        /// Position of the job that was kept
        first: usize,
        /// Position of the job that was dropped
        second: usize,
    },

    /// The collector's own decoder rejects the generated job
    #[error("generated config rejected by collector: {0}")]
    RoundTrip(#[source] ConfigError),

    /// The resource is missing required metadata
    #[error("resource missing {field}")]
    MissingMetadata {
        /// Missing field
        field: &'static str,
    },

    /// A requested metadata label is not supported for this kind
    #[error("metadata label {label:?} is not supported, allowed: {allowed}")]
    InvalidMetadataLabel {
        /// Requested label
        label: String,
        /// Comma-separated allowed labels
        allowed: String,
    },

    /// A label mapping cannot be compiled
    #[error("invalid label mapping from {from:?}: {source}")]
    LabelMapping {
        /// Source label of the mapping
        from: String,
        /// Why it was rejected
        source: Box<CompileError>,
    },

    /// A relabeling rule is malformed
    #[error("invalid relabeling rule: {0}")]
    InvalidRelabeling(String),

    /// HTTP client settings are invalid
    #[error("invalid HTTP client settings: {0}")]
    HttpClient(String),

    /// A required list or value is empty
    #[error("{field} must not be empty")]
    Empty {
        /// Field path within the spec
        field: &'static str,
    },
}

impl CompileError {
    /// Short machine-readable kind, used as a metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Selector { .. } => "selector",
            Self::Duration { .. } => "duration",
            Self::ProtectedLabel { .. } => "protected_label",
            Self::Port(_) => "port",
            Self::Tenancy { .. } => "tenancy",
            Self::DuplicateJobName { .. } => "duplicate_job_name",
            Self::RoundTrip(_) => "round_trip",
            Self::MissingMetadata { .. } => "missing_metadata",
            Self::InvalidMetadataLabel { .. } => "invalid_metadata_label",
            Self::LabelMapping { .. } => "label_mapping",
            Self::InvalidRelabeling(_) => "invalid_relabeling",
            Self::HttpClient(_) => "http_client",
            Self::Empty { .. } => "empty",
        }
    }

    /// CamelCase reason for status conditions
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Selector { .. } => "InvalidSelector",
            Self::Duration { .. } => "InvalidDuration",
            Self::ProtectedLabel { .. } => "ProtectedLabel",
            Self::Port(_) => "InvalidPort",
            Self::Tenancy { .. } => "SecretNamespaceNotAllowed",
            Self::DuplicateJobName { .. } => "DuplicateJobName",
            Self::RoundTrip(_) => "CollectorConfigRejected",
            Self::MissingMetadata { .. } => "MissingMetadata",
            Self::InvalidMetadataLabel { .. } => "InvalidMetadataLabel",
            Self::LabelMapping { .. } => "InvalidLabelMapping",
            Self::InvalidRelabeling(_) => "InvalidRelabeling",
            Self::HttpClient(_) => "InvalidHttpClient",
            Self::Empty { .. } => "MissingField",
        }
    }

    pub(crate) fn duration(field: &'static str, message: impl Into<String>) -> Self {
        Self::Duration {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn protected(action: RelabelAction, message: impl Into<String>) -> Self {
        Self::ProtectedLabel {
            action,
            message: message.into(),
        }
    }
}

impl From<CompileError> for vigil_common::Error {
    fn from(err: CompileError) -> Self {
        vigil_common::Error::validation(err.to_string())
    }
}

/// A compile error attributed to the resource (and endpoint) that caused it
#[derive(Debug)]
pub struct ResourceError {
    /// Resource key, e.g. `PodMonitoring/ns/name`
    pub resource: String,
    /// Index of the endpoint, module, or target in the resource, if specific
    pub endpoint: Option<usize>,
    /// The underlying error
    pub source: CompileError,
}

impl ResourceError {
    pub(crate) fn new(resource: impl Into<String>, endpoint: Option<usize>, source: CompileError) -> Self {
        Self {
            resource: resource.into(),
            endpoint,
            source,
        }
    }

    /// Compile errors are pure functions of the input and never succeed on retry
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Failed `ConfigurationCreateSuccess` condition describing this error
    pub fn condition(&self) -> Condition {
        Condition::new(
            CONFIGURATION_CREATE_SUCCESS,
            ConditionStatus::False,
            self.source.reason(),
            self.to_string(),
        )
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.endpoint {
            Some(index) => write!(f, "{} endpoint {}: {}", self.resource, index, self.source),
            None => write!(f, "{}: {}", self.resource, self.source),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<ResourceError> for vigil_common::Error {
    fn from(err: ResourceError) -> Self {
        let list = if err.resource.starts_with("ProbeMonitoring/") {
            "modules"
        } else {
            "endpoints"
        };
        let field = err.endpoint.map(|i| format!("spec.{list}[{i}]"));
        match field {
            Some(field) => {
                vigil_common::Error::validation_for_field(err.resource, field, err.source.to_string())
            }
            None => vigil_common::Error::validation_for(err.resource, err.source.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Story Tests: errors surface as resource conditions
    // =========================================================================

    /// Story: a failing endpoint is named in the message and in the condition
    #[test]
    fn story_resource_error_renders_failed_condition() {
        let err = ResourceError::new(
            "PodMonitoring/prod/api",
            Some(1),
            CompileError::Port("neither a port name nor a port number is set".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "PodMonitoring/prod/api endpoint 1: invalid port: neither a port name nor a port number is set"
        );
        assert!(!err.is_retryable());

        let condition = err.condition();
        assert_eq!(condition.type_, CONFIGURATION_CREATE_SUCCESS);
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, "InvalidPort");
    }

    #[test]
    fn story_resource_error_maps_to_field_validation() {
        let err = ResourceError::new(
            "PodMonitoring/prod/api",
            Some(0),
            CompileError::duration("timeout", "timeout 20s exceeds interval 10s"),
        );
        let common: vigil_common::Error = err.into();
        assert_eq!(common.resource(), Some("PodMonitoring/prod/api"));
        assert_eq!(common.field(), Some("spec.endpoints[0]"));
    }

    #[test]
    fn test_label_mapping_wraps_cause() {
        let err = CompileError::LabelMapping {
            from: "team".to_string(),
            source: Box::new(CompileError::protected(
                RelabelAction::Replace,
                "writes protected label \"job\"",
            )),
        };
        assert!(err.to_string().contains("\"team\""));
        assert!(err.to_string().contains("protected label \"job\""));
        assert_eq!(err.kind(), "label_mapping");
    }

    #[test]
    fn test_kinds_are_distinct() {
        let errors = [
            CompileError::Port(String::new()),
            CompileError::MissingMetadata { field: "name" },
            CompileError::HttpClient(String::new()),
            CompileError::InvalidRelabeling(String::new()),
            CompileError::Empty { field: "endpoints" },
        ];
        let kinds: std::collections::BTreeSet<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len());
    }
}
