//! Endpoint HTTP client settings to collector HTTP client config

use vigil_common::crd::{HttpClientSpec, TlsSpec};
use vigil_common::promconfig::{
    Authorization, BasicAuth, HttpClientConfig, OAuth2, ProxyConfig, TlsConfig, TlsVersion,
};

use crate::error::CompileError;
use crate::secrets::{SecretRefPool, SecretScope};

/// Service-account CA bundle mounted into the collector pod
pub const SERVICE_ACCOUNT_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
/// Service-account token mounted into the collector pod
pub const SERVICE_ACCOUNT_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Build the collector HTTP client config for an endpoint, resolving every
/// secret reference through `pool`
pub fn compile_http_client(
    spec: &HttpClientSpec,
    pool: &mut SecretRefPool,
    scope: SecretScope<'_>,
) -> Result<HttpClientConfig, CompileError> {
    let mut config = HttpClientConfig::default();

    if let Some(auth) = &spec.authorization {
        config.authorization = Some(Authorization {
            auth_type: auth.auth_type.clone().unwrap_or_default(),
            credentials_ref: pool.resolve(auth.credentials.as_ref(), scope)?,
            ..Default::default()
        });
    }

    if let Some(basic) = &spec.basic_auth {
        config.basic_auth = Some(BasicAuth {
            username: basic.username.clone(),
            password_ref: pool.resolve(basic.password.as_ref(), scope)?,
            ..Default::default()
        });
    }

    if let Some(oauth2) = &spec.oauth2 {
        config.oauth2 = Some(OAuth2 {
            client_id: oauth2.client_id.clone(),
            client_secret_ref: pool.resolve(oauth2.client_secret.as_ref(), scope)?,
            scopes: oauth2.scopes.clone(),
            token_url: oauth2.token_url.clone(),
            endpoint_params: oauth2.endpoint_params.clone(),
            tls_config: compile_tls(oauth2.tls.as_ref(), pool, scope)?,
            proxy: proxy(oauth2.proxy_url.as_deref()),
            ..Default::default()
        });
    }

    config.tls_config = compile_tls(spec.tls.as_ref(), pool, scope)?;
    config.proxy = proxy(spec.proxy_url.as_deref());

    config.normalize();
    config
        .validate()
        .map_err(|e| CompileError::HttpClient(e.to_string()))?;
    Ok(config)
}

/// Authenticate to the kubelet with the collector's service account, unless
/// the endpoint brings its own CA or credentials
pub fn with_service_account_defaults(mut config: HttpClientConfig) -> HttpClientConfig {
    if !config.tls_config.configures_ca() && !config.tls_config.insecure_skip_verify {
        config.tls_config.ca_file = SERVICE_ACCOUNT_CA_FILE.to_string();
    }
    if config.authorization.is_none() && config.basic_auth.is_none() && config.oauth2.is_none() {
        config.authorization = Some(Authorization {
            auth_type: "Bearer".to_string(),
            credentials_file: SERVICE_ACCOUNT_TOKEN_FILE.to_string(),
            ..Default::default()
        });
    }
    config
}

fn compile_tls(
    spec: Option<&TlsSpec>,
    pool: &mut SecretRefPool,
    scope: SecretScope<'_>,
) -> Result<TlsConfig, CompileError> {
    let Some(spec) = spec else {
        return Ok(TlsConfig::default());
    };
    Ok(TlsConfig {
        ca_ref: pool.resolve(spec.ca.as_ref(), scope)?,
        cert_ref: pool.resolve(spec.cert.as_ref(), scope)?,
        key_ref: pool.resolve(spec.key.as_ref(), scope)?,
        server_name: spec.server_name.clone().unwrap_or_default(),
        insecure_skip_verify: spec.insecure_skip_verify,
        min_version: tls_version(spec.min_version.as_deref())?,
        max_version: tls_version(spec.max_version.as_deref())?,
        ..Default::default()
    })
}

fn tls_version(value: Option<&str>) -> Result<Option<TlsVersion>, CompileError> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<TlsVersion>()
                .map_err(|e| CompileError::HttpClient(e.to_string()))
        })
        .transpose()
}

fn proxy(url: Option<&str>) -> ProxyConfig {
    ProxyConfig {
        proxy_url: url.filter(|u| !u.is_empty()).map(str::to_string),
        ..Default::default()
    }
}
