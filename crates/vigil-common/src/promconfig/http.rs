//! HTTP client settings for a scrape job
//!
//! Secret material is never inlined by the compiler. Instead each credential
//! field has a `*_ref` sibling holding a `namespace/name/key` token that the
//! secret materializer resolves when it writes the collector's config.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::ConfigError;

/// Authorization type assumed when none is given
pub const DEFAULT_AUTHORIZATION_TYPE: &str = "Bearer";

/// HTTP client configuration of a scrape job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// HTTP basic authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    /// `Authorization` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Authorization>,
    /// OAuth2 client credentials flow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth2: Option<OAuth2>,
    /// TLS settings for the scrape connection
    #[serde(skip_serializing_if = "TlsConfig::is_empty")]
    pub tls_config: TlsConfig,
    /// Proxy settings
    #[serde(flatten)]
    pub proxy: ProxyConfig,
    /// Whether redirects are followed
    pub follow_redirects: bool,
    /// Whether HTTP/2 may be negotiated
    pub enable_http2: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            basic_auth: None,
            authorization: None,
            oauth2: None,
            tls_config: TlsConfig::default(),
            proxy: ProxyConfig::default(),
            follow_redirects: true,
            enable_http2: true,
        }
    }
}

/// HTTP basic authentication
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAuth {
    /// User name
    pub username: String,
    /// Inline password
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Password read from a file
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password_file: String,
    /// Password read from a secret reference
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password_ref: String,
}

/// `Authorization` header settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Authorization {
    /// Scheme placed before the credentials, `Bearer` if empty
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub auth_type: String,
    /// Inline credentials
    #[serde(skip_serializing_if = "String::is_empty")]
    pub credentials: String,
    /// Credentials read from a file
    #[serde(skip_serializing_if = "String::is_empty")]
    pub credentials_file: String,
    /// Credentials read from a secret reference
    #[serde(skip_serializing_if = "String::is_empty")]
    pub credentials_ref: String,
}

/// OAuth2 client credentials settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuth2 {
    /// Client ID
    pub client_id: String,
    /// Inline client secret
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_secret: String,
    /// Client secret read from a file
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_secret_file: String,
    /// Client secret read from a secret reference
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_secret_ref: String,
    /// Requested scopes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    /// Token endpoint
    pub token_url: String,
    /// Extra parameters sent to the token endpoint
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoint_params: BTreeMap<String, String>,
    /// TLS settings for the token endpoint
    #[serde(skip_serializing_if = "TlsConfig::is_empty")]
    pub tls_config: TlsConfig,
    /// Proxy settings for the token endpoint
    #[serde(flatten)]
    pub proxy: ProxyConfig,
}

/// TLS protocol version
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// The version's name in the configuration file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tls10 => "TLS10",
            Self::Tls11 => "TLS11",
            Self::Tls12 => "TLS12",
            Self::Tls13 => "TLS13",
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TlsVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TLS10" => Ok(Self::Tls10),
            "TLS11" => Ok(Self::Tls11),
            "TLS12" => Ok(Self::Tls12),
            "TLS13" => Ok(Self::Tls13),
            other => Err(ConfigError::HttpClient(format!("unknown TLS version: {other}"))),
        }
    }
}

impl Serialize for TlsVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TlsVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// TLS settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Inline CA certificate
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ca: String,
    /// CA certificate file
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ca_file: String,
    /// CA certificate secret reference
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ca_ref: String,
    /// Inline client certificate
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cert: String,
    /// Client certificate file
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cert_file: String,
    /// Client certificate secret reference
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cert_ref: String,
    /// Inline client key
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
    /// Client key file
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_file: String,
    /// Client key secret reference
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_ref: String,
    /// Server name for SNI and certificate verification
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_name: String,
    /// Disable server certificate verification
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub insecure_skip_verify: bool,
    /// Minimum accepted TLS version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<TlsVersion>,
    /// Maximum accepted TLS version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_version: Option<TlsVersion>,
}

impl TlsConfig {
    /// True when no TLS option is set
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn has_ca(&self) -> bool {
        !(self.ca.is_empty() && self.ca_file.is_empty() && self.ca_ref.is_empty())
    }

    fn has_cert(&self) -> bool {
        !(self.cert.is_empty() && self.cert_file.is_empty() && self.cert_ref.is_empty())
    }

    fn has_key(&self) -> bool {
        !(self.key.is_empty() && self.key_file.is_empty() && self.key_ref.is_empty())
    }

    /// Validate the TLS settings the way the collector does
    pub fn validate(&self) -> Result<(), ConfigError> {
        exclusive("ca", &[&self.ca, &self.ca_file, &self.ca_ref])?;
        exclusive("cert", &[&self.cert, &self.cert_file, &self.cert_ref])?;
        exclusive("key", &[&self.key, &self.key_file, &self.key_ref])?;

        if self.has_cert() && !self.has_key() {
            return Err(ConfigError::HttpClient(
                "exactly one of key or key_file must be configured when a client certificate is configured"
                    .to_string(),
            ));
        }
        if self.has_key() && !self.has_cert() {
            return Err(ConfigError::HttpClient(
                "exactly one of cert or cert_file must be configured when a client key is configured"
                    .to_string(),
            ));
        }

        if let (Some(min), Some(max)) = (self.min_version, self.max_version) {
            if min > max {
                return Err(ConfigError::HttpClient(format!(
                    "tls_config.max_version must be greater than or equal to tls_config.min_version if both are specified ({max} < {min})"
                )));
            }
        }
        Ok(())
    }

    /// True when a CA is configured by any means
    pub fn configures_ca(&self) -> bool {
        self.has_ca()
    }
}

/// Proxy settings shared by the scrape client and the OAuth2 token client
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    /// Comma-separated hosts that bypass the proxy
    #[serde(skip_serializing_if = "String::is_empty")]
    pub no_proxy: String,
    /// Use the proxy from the environment
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub proxy_from_environment: bool,
    /// Headers sent on proxy CONNECT requests
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub proxy_connect_header: BTreeMap<String, Vec<String>>,
}

impl ProxyConfig {
    /// Validate proxy settings the way the collector does
    pub fn validate(&self) -> Result<(), ConfigError> {
        let proxy_url = self.proxy_url.as_deref().filter(|u| !u.is_empty());
        if let Some(raw) = proxy_url {
            url::Url::parse(raw).map_err(|e| {
                ConfigError::HttpClient(format!("invalid proxy_url {raw:?}: {e}"))
            })?;
        }

        if self.proxy_from_environment && proxy_url.is_some() {
            return Err(ConfigError::HttpClient(
                "if proxy_from_environment is configured, proxy_url must not be configured"
                    .to_string(),
            ));
        }
        if self.proxy_from_environment && !self.no_proxy.is_empty() {
            return Err(ConfigError::HttpClient(
                "if proxy_from_environment is configured, no_proxy must not be configured"
                    .to_string(),
            ));
        }
        if proxy_url.is_none() && !self.no_proxy.is_empty() {
            return Err(ConfigError::HttpClient(
                "if no_proxy is configured, proxy_url must also be configured".to_string(),
            ));
        }
        if !self.proxy_connect_header.is_empty() && proxy_url.is_none() && !self.proxy_from_environment
        {
            return Err(ConfigError::HttpClient(
                "if proxy_connect_header is configured, proxy_url or proxy_from_environment must also be configured"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn exclusive(field: &str, sources: &[&String]) -> Result<(), ConfigError> {
    if sources.iter().filter(|s| !s.is_empty()).count() > 1 {
        return Err(ConfigError::HttpClient(format!(
            "at most one of {field}, {field}_file & {field}_ref must be configured"
        )));
    }
    Ok(())
}

impl HttpClientConfig {
    /// Apply the collector's defaults
    pub fn normalize(&mut self) {
        if let Some(auth) = &mut self.authorization {
            if auth.auth_type.is_empty() {
                auth.auth_type = DEFAULT_AUTHORIZATION_TYPE.to_string();
            }
        }
    }

    /// Validate the settings the way the collector does
    pub fn validate(&self) -> Result<(), ConfigError> {
        let configured = [
            self.basic_auth.is_some(),
            self.authorization.is_some(),
            self.oauth2.is_some(),
        ];
        if configured.iter().filter(|c| **c).count() > 1 {
            return Err(ConfigError::HttpClient(
                "at most one of basic_auth, oauth2 & authorization must be configured".to_string(),
            ));
        }

        if let Some(basic) = &self.basic_auth {
            exclusive("password", &[&basic.password, &basic.password_file, &basic.password_ref])?;
        }

        if let Some(auth) = &self.authorization {
            if auth.auth_type.eq_ignore_ascii_case("basic") {
                return Err(ConfigError::HttpClient(
                    "authorization type cannot be set to \"basic\", use \"basic_auth\" instead"
                        .to_string(),
                ));
            }
            exclusive(
                "credentials",
                &[&auth.credentials, &auth.credentials_file, &auth.credentials_ref],
            )?;
        }

        if let Some(oauth2) = &self.oauth2 {
            if oauth2.client_id.is_empty() {
                return Err(ConfigError::HttpClient("oauth2 client_id must be configured".to_string()));
            }
            if oauth2.token_url.is_empty() {
                return Err(ConfigError::HttpClient("oauth2 token_url must be configured".to_string()));
            }
            exclusive(
                "client_secret",
                &[&oauth2.client_secret, &oauth2.client_secret_file, &oauth2.client_secret_ref],
            )?;
            oauth2.tls_config.validate()?;
            oauth2.proxy.validate()?;
        }

        self.tls_config.validate()?;
        self.proxy.validate()
    }
}
