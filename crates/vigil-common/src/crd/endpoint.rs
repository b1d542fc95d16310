//! Scrape endpoints and their HTTP client settings
//!
//! Credentials are never inlined in a monitoring resource. Every secret-bearing
//! field is a [`SecretKeySelector`] that the compiler resolves to a reference
//! token.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::RelabelingRule;

/// Reference to one key of a Kubernetes Secret
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Secret name
    pub name: String,

    /// Key within the secret
    pub key: String,

    /// Secret namespace
    ///
    /// Namespaced resources may only name their own namespace. Cluster-scoped
    /// resources default to `default`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SecretKeySelector {
    /// Reference a key of a secret without naming its namespace
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            namespace: None,
        }
    }

    /// Pin the secret's namespace
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// `Authorization` header settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationSpec {
    /// Authentication scheme, `Bearer` if unset
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,

    /// Credentials sent after the scheme
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<SecretKeySelector>,
}

/// HTTP basic authentication
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuthSpec {
    /// User name
    #[serde(default)]
    pub username: String,

    /// Password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<SecretKeySelector>,
}

/// TLS settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    /// Server name used for SNI and verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    /// Skip server certificate verification
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Minimum TLS version (`TLS10` .. `TLS13`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,

    /// Maximum TLS version (`TLS10` .. `TLS13`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,

    /// CA bundle used to verify the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<SecretKeySelector>,

    /// Client certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<SecretKeySelector>,

    /// Client key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<SecretKeySelector>,
}

/// OAuth2 client credentials settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Spec {
    /// Client ID
    #[serde(default)]
    pub client_id: String,

    /// Client secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<SecretKeySelector>,

    /// Requested scopes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    /// Token endpoint URL
    #[serde(default)]
    pub token_url: String,

    /// Extra parameters for the token request
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoint_params: BTreeMap<String, String>,

    /// TLS settings for the token endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSpec>,

    /// Proxy for the token endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

/// HTTP client settings of an endpoint
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HttpClientSpec {
    /// `Authorization` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationSpec>,

    /// Basic authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuthSpec>,

    /// OAuth2 client credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth2: Option<OAuth2Spec>,

    /// TLS settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSpec>,

    /// HTTP proxy URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

/// How to scrape one endpoint, independent of how the target is found
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeSettings {
    /// `http` or `https`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    /// HTTP path to scrape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// URL query parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Vec<String>>,

    /// Scrape interval, e.g. `30s`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Scrape timeout, defaults to the interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Relabeling applied to every scraped sample
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metric_relabeling: Vec<RelabelingRule>,

    /// HTTP client settings
    #[serde(flatten)]
    pub http: HttpClientSpec,
}

impl ScrapeSettings {
    /// Settings scraping every `interval`
    pub fn every(interval: impl Into<String>) -> Self {
        Self {
            interval: Some(interval.into()),
            ..Default::default()
        }
    }
}

/// A pod port to scrape
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeEndpoint {
    /// Container port name or number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<IntOrString>,

    /// Scrape settings
    #[serde(flatten)]
    pub scrape: ScrapeSettings,
}

impl ScrapeEndpoint {
    /// Scrape a named container port
    pub fn named(port: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            port: Some(IntOrString::String(port.into())),
            scrape: ScrapeSettings::every(interval),
        }
    }

    /// Scrape a numeric port
    pub fn numbered(port: i32, interval: impl Into<String>) -> Self {
        Self {
            port: Some(IntOrString::Int(port)),
            scrape: ScrapeSettings::every(interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_accepts_named_and_numeric_ports() {
        let named: ScrapeEndpoint =
            serde_json::from_str(r#"{"port":"web","interval":"10s"}"#).unwrap();
        assert_eq!(named.port, Some(IntOrString::String("web".to_string())));
        assert_eq!(named.scrape.interval.as_deref(), Some("10s"));

        let numeric: ScrapeEndpoint =
            serde_json::from_str(r#"{"port":9090,"interval":"10s"}"#).unwrap();
        assert_eq!(numeric.port, Some(IntOrString::Int(9090)));
    }

    #[test]
    fn test_http_settings_are_flattened() {
        let endpoint: ScrapeEndpoint = serde_json::from_str(
            r#"{
                "port": "metrics",
                "interval": "30s",
                "authorization": {"credentials": {"name": "token", "key": "value"}},
                "tls": {"insecureSkipVerify": true},
                "proxyUrl": "http://proxy:3128"
            }"#,
        )
        .unwrap();
        let http = &endpoint.scrape.http;
        let creds = http.authorization.as_ref().unwrap().credentials.as_ref().unwrap();
        assert_eq!(creds.name, "token");
        assert!(http.tls.as_ref().unwrap().insecure_skip_verify);
        assert_eq!(http.proxy_url.as_deref(), Some("http://proxy:3128"));
    }

    #[test]
    fn test_builders() {
        assert_eq!(
            ScrapeEndpoint::numbered(8080, "15s").port,
            Some(IntOrString::Int(8080))
        );
        let sel = SecretKeySelector::new("creds", "password").in_namespace("team-a");
        assert_eq!(sel.namespace.as_deref(), Some("team-a"));
    }
}
