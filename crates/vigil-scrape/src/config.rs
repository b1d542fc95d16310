//! Compiler configuration
//!
//! The identifiers stamped onto every series, plus cluster-wide metric
//! relabeling. Loaded from a file or from the operator's environment.

use serde::Deserialize;
use vigil_common::crd::RelabelingRule;
use vigil_common::promconfig::is_valid_label_name;
use vigil_common::{Error, DEFAULT_NODE_NAME_ENV, DEFAULT_SECRET_NAMESPACE};

/// Environment variable holding the project identifier
pub const PROJECT_ID_ENV: &str = "VIGIL_PROJECT_ID";
/// Environment variable holding the cluster location
pub const LOCATION_ENV: &str = "VIGIL_LOCATION";
/// Environment variable holding the cluster name
pub const CLUSTER_ENV: &str = "VIGIL_CLUSTER";
/// Environment variable overriding the node name variable
pub const NODE_NAME_ENV_ENV: &str = "VIGIL_NODE_NAME_ENV";

/// Settings shared by every resource in a compilation
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Project identifier, written to `project_id`
    pub project_id: String,
    /// Cluster location, written to `location`
    pub location: String,
    /// Cluster name, written to `cluster`
    pub cluster: String,
    /// Metric relabeling appended after every endpoint's own rules
    #[serde(default)]
    pub metric_relabeling: Vec<RelabelingRule>,
    /// Environment variable the collector's reloader expands to its node name
    #[serde(default = "default_node_name_env")]
    pub node_name_env: String,
    /// Namespace cluster-scoped secret references fall back to
    #[serde(default = "default_secret_namespace")]
    pub default_secret_namespace: String,
}

fn default_node_name_env() -> String {
    DEFAULT_NODE_NAME_ENV.to_string()
}

fn default_secret_namespace() -> String {
    DEFAULT_SECRET_NAMESPACE.to_string()
}

impl CompilerConfig {
    /// Create a config with the given identifiers and defaults for the rest
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            cluster: cluster.into(),
            metric_relabeling: Vec::new(),
            node_name_env: default_node_name_env(),
            default_secret_namespace: default_secret_namespace(),
        }
    }

    /// Append cluster-wide metric relabeling rules
    pub fn with_metric_relabeling(mut self, rules: Vec<RelabelingRule>) -> Self {
        self.metric_relabeling = rules;
        self
    }

    /// Load from a YAML (or JSON) document
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::serialization_for_kind("CompilerConfig", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::validation(format!("{name} must be set")))
        };
        let mut config = Self::new(
            required(PROJECT_ID_ENV)?,
            required(LOCATION_ENV)?,
            required(CLUSTER_ENV)?,
        );
        if let Some(env) = lookup(NODE_NAME_ENV_ENV).filter(|v| !v.is_empty()) {
            config.node_name_env = env;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that the identifiers are set and the node name variable is usable
    pub fn validate(&self) -> Result<(), Error> {
        for (field, value) in [
            ("projectId", &self.project_id),
            ("location", &self.location),
            ("cluster", &self.cluster),
        ] {
            if value.is_empty() {
                return Err(Error::validation(format!("{field} must not be empty")));
            }
        }
        if !is_valid_label_name(&self.node_name_env) {
            return Err(Error::validation(format!(
                "nodeNameEnv {:?} is not a valid environment variable name",
                self.node_name_env
            )));
        }
        if self.default_secret_namespace.is_empty() {
            return Err(Error::validation("defaultSecretNamespace must not be empty"));
        }
        Ok(())
    }
}
