//! Scrape job configuration and service discovery stanzas

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ConfigError, HttpClientConfig, PromDuration, RelabelConfig};

/// Kubernetes discovery role
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KubernetesRole {
    /// One target per pod container port
    Pod,
    /// One target per node (kubelet address)
    Node,
}

/// Server-side selector narrowing what a discovery stanza watches
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Role the selector applies to
    pub role: KubernetesRole,
    /// Label selector expression
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    /// Field selector expression
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
}

/// Kubernetes service discovery stanza
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesSdConfig {
    /// Discovery role
    pub role: KubernetesRole,
    /// Server-side selectors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<SelectorConfig>,
}

impl KubernetesSdConfig {
    fn validate(&self) -> Result<(), String> {
        for selector in &self.selectors {
            if selector.role != self.role {
                return Err(format!(
                    "role {:?} is not supported in selectors for discovery role {:?}",
                    selector.role, self.role
                ));
            }
        }
        Ok(())
    }
}

/// Fixed list of targets
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticConfig {
    /// Target addresses
    #[serde(default)]
    pub targets: Vec<String>,
    /// Labels attached to every target
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// One scrape job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Unique job name
    pub job_name: String,
    /// Scrape interval
    pub scrape_interval: PromDuration,
    /// Scrape timeout
    pub scrape_timeout: PromDuration,
    /// HTTP path of the metrics endpoint
    pub metrics_path: String,
    /// `http` or `https`
    pub scheme: String,
    /// URL query parameters
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Vec<String>>,
    /// Kubernetes discovery
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kubernetes_sd_configs: Vec<KubernetesSdConfig>,
    /// Static targets
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub static_configs: Vec<StaticConfig>,
    /// HTTP client settings
    #[serde(flatten)]
    pub http_client_config: HttpClientConfig,
    /// Target relabeling, applied at discovery time
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relabel_configs: Vec<RelabelConfig>,
    /// Metric relabeling, applied to every scraped sample
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metric_relabel_configs: Vec<RelabelConfig>,
    /// Maximum samples per scrape (0 = unlimited)
    #[serde(skip_serializing_if = "is_zero")]
    pub sample_limit: u64,
    /// Maximum labels per sample (0 = unlimited)
    #[serde(skip_serializing_if = "is_zero")]
    pub label_limit: u64,
    /// Maximum label name length (0 = unlimited)
    #[serde(skip_serializing_if = "is_zero")]
    pub label_name_length_limit: u64,
    /// Maximum label value length (0 = unlimited)
    #[serde(skip_serializing_if = "is_zero")]
    pub label_value_length_limit: u64,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

/// Default scrape interval
pub const DEFAULT_SCRAPE_INTERVAL: PromDuration = PromDuration::from_secs(60);
/// Default scrape timeout
pub const DEFAULT_SCRAPE_TIMEOUT: PromDuration = PromDuration::from_secs(10);

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            job_name: String::new(),
            scrape_interval: DEFAULT_SCRAPE_INTERVAL,
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
            metrics_path: "/metrics".to_string(),
            scheme: "http".to_string(),
            params: BTreeMap::new(),
            kubernetes_sd_configs: Vec::new(),
            static_configs: Vec::new(),
            http_client_config: HttpClientConfig::default(),
            relabel_configs: Vec::new(),
            metric_relabel_configs: Vec::new(),
            sample_limit: 0,
            label_limit: 0,
            label_name_length_limit: 0,
            label_value_length_limit: 0,
        }
    }
}

impl ScrapeConfig {
    /// Apply the collector's defaults
    pub fn normalize(&mut self) {
        if self.metrics_path.is_empty() {
            self.metrics_path = "/metrics".to_string();
        }
        if self.scheme.is_empty() {
            self.scheme = "http".to_string();
        }
        self.http_client_config.normalize();
    }

    /// Validate the job the way the collector does when loading its config
    pub fn validate(&self) -> Result<(), ConfigError> {
        let job = self.job_name.as_str();
        if job.is_empty() {
            return Err(ConfigError::scrape(job, "job_name is empty"));
        }
        if self.scrape_interval.as_millis() == 0 {
            return Err(ConfigError::scrape(job, "scrape_interval must be greater than zero"));
        }
        if self.scrape_timeout.as_millis() == 0 {
            return Err(ConfigError::scrape(job, "scrape_timeout must be greater than zero"));
        }
        if self.scrape_timeout > self.scrape_interval {
            return Err(ConfigError::scrape(
                job,
                format!(
                    "scrape timeout greater than scrape interval for scrape config with job name {job:?}"
                ),
            ));
        }
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::scrape(
                job,
                format!("unsupported scheme {:?}", self.scheme),
            ));
        }
        if !self.metrics_path.starts_with('/') {
            return Err(ConfigError::scrape(
                job,
                format!("metrics_path {:?} must start with '/'", self.metrics_path),
            ));
        }
        for sd in &self.kubernetes_sd_configs {
            sd.validate().map_err(|m| ConfigError::scrape(job, m))?;
        }

        self.http_client_config.validate()?;
        for rule in self.relabel_configs.iter().chain(&self.metric_relabel_configs) {
            rule.validate()?;
        }
        Ok(())
    }

    /// Serialize to the collector's YAML format
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promconfig::load_scrape_config;

    fn job(name: &str) -> ScrapeConfig {
        ScrapeConfig {
            job_name: name.to_string(),
            scrape_interval: PromDuration::from_secs(30),
            scrape_timeout: PromDuration::from_secs(10),
            ..Default::default()
        }
    }

    #[test]
    fn test_timeout_must_not_exceed_interval() {
        let cfg = ScrapeConfig {
            scrape_timeout: PromDuration::from_secs(31),
            ..job("a")
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("scrape timeout greater than scrape interval"));
        assert!(ScrapeConfig {
            scrape_timeout: PromDuration::from_secs(30),
            ..job("a")
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let zero_timeout = ScrapeConfig {
            scrape_timeout: PromDuration::from_millis(0),
            ..job("a")
        };
        let err = zero_timeout.validate().unwrap_err();
        assert!(err.to_string().contains("scrape_timeout must be greater than zero"));

        let zero_interval = ScrapeConfig {
            scrape_interval: PromDuration::from_millis(0),
            scrape_timeout: PromDuration::from_millis(0),
            ..job("a")
        };
        let err = zero_interval.validate().unwrap_err();
        assert!(err.to_string().contains("scrape_interval must be greater than zero"));

        let yaml = "job_name: a\nscrape_interval: 30s\nscrape_timeout: 0s\n";
        assert!(load_scrape_config(yaml).is_err());
    }

    #[test]
    fn test_empty_job_name_rejected() {
        assert!(job("").validate().is_err());
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let cfg = ScrapeConfig {
            scheme: "ftp".to_string(),
            ..job("a")
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_selector_role_must_match() {
        let cfg = ScrapeConfig {
            kubernetes_sd_configs: vec![KubernetesSdConfig {
                role: KubernetesRole::Node,
                selectors: vec![SelectorConfig {
                    role: KubernetesRole::Pod,
                    label: String::new(),
                    field: "spec.nodeName=a".to_string(),
                }],
            }],
            ..job("a")
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_yaml_shape() {
        let cfg = ScrapeConfig {
            kubernetes_sd_configs: vec![KubernetesSdConfig {
                role: KubernetesRole::Pod,
                selectors: vec![SelectorConfig {
                    role: KubernetesRole::Pod,
                    label: String::new(),
                    field: "spec.nodeName=$(NODE_NAME)".to_string(),
                }],
            }],
            relabel_configs: vec![RelabelConfig::set("cluster", "c1")],
            sample_limit: 1000,
            ..job("PodMonitoring/ns/name/web")
        };
        let yaml = cfg.to_yaml().unwrap();
        assert!(yaml.contains("job_name: PodMonitoring/ns/name/web"));
        assert!(yaml.contains("scrape_interval: 30s"));
        assert!(yaml.contains("role: pod"));
        assert!(yaml.contains("sample_limit: 1000"));
        assert!(!yaml.contains("label_limit"));
        assert!(!yaml.contains("static_configs"));
    }

    #[test]
    fn test_decoder_round_trip_preserves_job() {
        let mut cfg = ScrapeConfig {
            static_configs: vec![StaticConfig {
                targets: vec!["example.com:443".to_string()],
                labels: BTreeMap::new(),
            }],
            params: BTreeMap::from([("module".to_string(), vec!["http_2xx".to_string()])]),
            ..job("ProbeMonitoring/ns/p/0")
        };
        cfg.normalize();
        let decoded = load_scrape_config(&cfg.to_yaml().unwrap()).unwrap();
        assert_eq!(decoded, cfg);
    }

    #[test]
    fn test_decoder_surfaces_relabel_errors() {
        let yaml = r#"
job_name: a
relabel_configs:
  - source_labels: [a]
    action: hashmod
    target_label: shard
"#;
        let err = load_scrape_config(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Relabel(_)));
    }
}
