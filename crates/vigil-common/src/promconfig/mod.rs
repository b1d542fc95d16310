//! Collector scrape configuration model
//!
//! Mirrors the subset of the Prometheus configuration file that vigil emits:
//! scrape configs, relabel rules, HTTP client settings and service discovery
//! stanzas. Like the collector itself, validation lives in the decoder:
//! [`load_scrape_config`] and [`load_config`] deserialize YAML and then apply
//! the same defaulting and validation rules the collector applies when it
//! loads its configuration file. The compiler round-trips every job through
//! this decoder so that anything the collector would reject is reported at
//! compile time.

mod duration;
mod http;
pub mod relabel;
mod scrape;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use duration::PromDuration;
pub use http::{Authorization, BasicAuth, HttpClientConfig, OAuth2, ProxyConfig, TlsConfig, TlsVersion};
pub use relabel::{RelabelAction, RelabelConfig};
pub use scrape::{KubernetesRole, KubernetesSdConfig, ScrapeConfig, SelectorConfig, StaticConfig};

/// Errors produced while decoding or validating collector configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A duration string does not follow the collector's duration grammar
    #[error("invalid duration {value:?}: {message}")]
    Duration {
        /// The offending input
        value: String,
        /// What is wrong with it
        message: String,
    },

    /// A relabel rule violates the collector's relabel rules
    #[error("invalid relabel config: {0}")]
    Relabel(String),

    /// HTTP client settings are inconsistent
    #[error("invalid HTTP client config: {0}")]
    HttpClient(String),

    /// A scrape config is invalid as a whole
    #[error("invalid scrape config for job {job:?}: {message}")]
    Scrape {
        /// Job name of the scrape config
        job: String,
        /// What is wrong with it
        message: String,
    },

    /// Two scrape configs in one file share a job name
    #[error("found multiple scrape configs with job name {0:?}")]
    DuplicateJob(String),

    /// YAML syntax or shape error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub(crate) fn duration(value: &str, message: impl Into<String>) -> Self {
        Self::Duration {
            value: value.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn scrape(job: &str, message: impl Into<String>) -> Self {
        Self::Scrape {
            job: job.to_string(),
            message: message.into(),
        }
    }
}

/// A complete collector configuration file (scrape section only)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Scrape jobs, in evaluation order
    #[serde(default)]
    pub scrape_configs: Vec<ScrapeConfig>,
}

impl PrometheusConfig {
    /// Serialize to the collector's YAML format
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate every scrape config and the uniqueness of job names
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for cfg in &mut self.scrape_configs {
            cfg.normalize();
            cfg.validate()?;
            if !seen.insert(cfg.job_name.clone()) {
                return Err(ConfigError::DuplicateJob(cfg.job_name.clone()));
            }
        }
        Ok(())
    }
}

/// Decode and validate a single scrape config the way the collector does
pub fn load_scrape_config(yaml: &str) -> Result<ScrapeConfig, ConfigError> {
    let mut cfg: ScrapeConfig = serde_yaml::from_str(yaml)?;
    cfg.normalize();
    cfg.validate()?;
    Ok(cfg)
}

/// Decode and validate a complete configuration file the way the collector does
pub fn load_config(yaml: &str) -> Result<PrometheusConfig, ConfigError> {
    let mut cfg: PrometheusConfig = serde_yaml::from_str(yaml)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Check a label name against the collector's label name grammar
/// (`[a-zA-Z_][a-zA-Z0-9_]*`)
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
