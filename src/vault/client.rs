//! Blocking Vault HTTP client with retry, rate limiting and status mapping.

use super::config::VaultConfig;
use super::retry::{RateLimiter, RetryPolicy};
use crate::error::{VaultifyError, VaultifyResult};
use crate::secrets::Secret;
use crate::traits::Output;
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// HTTP method used against the Vault API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A request to the Vault API
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

/// Raw response from the Vault API
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// HTTP client trait for testing
pub trait HttpClient: Send + Sync {
    /// Send a request. `Err` means no response was received at all.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Real HTTP client using reqwest
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> VaultifyResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VaultifyError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(request.url.clone()),
            HttpMethod::Post => self.client.post(request.url.clone()),
        };

        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .with_context(|| format!("Failed to reach Vault at {}", request.url))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .with_context(|| format!("Failed to read response body from: {}", request.url))?;

        Ok(HttpResponse { status, body })
    }
}

/// Envelope of every Vault API response
#[derive(Default, Deserialize)]
struct VaultResponse {
    #[serde(default)]
    lease_id: String,
    #[serde(default)]
    lease_duration: u64,
    #[serde(default)]
    renewable: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    auth: Option<AuthInfo>,
}

#[derive(Deserialize)]
struct AuthInfo {
    client_token: String,
    #[serde(default)]
    accessor: String,
    #[serde(default)]
    lease_duration: u64,
    #[serde(default)]
    renewable: bool,
}

/// Token lookup data (`auth/token/lookup-self`)
#[derive(Debug, Default, Deserialize)]
struct TokenLookup {
    #[serde(default)]
    accessor: String,
    #[serde(default)]
    ttl: u64,
    #[serde(default)]
    renewable: bool,
}

/// Vault client.
///
/// Every request goes through the rate limiter and is retried with backoff
/// while Vault is unavailable.
pub struct VaultClient<H: HttpClient = ReqwestClient> {
    http: H,
    config: VaultConfig,
    token: Option<SecretString>,
    retry: RetryPolicy,
    limiter: RateLimiter,
    output: Arc<dyn Output>,
}

impl VaultClient<ReqwestClient> {
    /// Create a client talking to the configured Vault over HTTP.
    pub fn new(config: VaultConfig, output: Arc<dyn Output>) -> VaultifyResult<Self> {
        config.validate()?;
        let http = ReqwestClient::new(config.timeout)?;
        Ok(Self::with_client(config, http, output))
    }
}

impl<H: HttpClient> VaultClient<H> {
    /// Create a client with a custom HTTP client (useful for testing)
    pub fn with_client(config: VaultConfig, http: H, output: Arc<dyn Output>) -> Self {
        let retry = RetryPolicy::new(config.retry_config());
        let limiter = RateLimiter::new(config.rate_limit, config.rate_limit_burst);
        let token = config.token.clone();
        Self {
            http,
            config,
            token,
            retry,
            limiter,
            output,
        }
    }

    /// Replace the retry policy.
    #[cfg(test)]
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(SecretString::from(token.into()));
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Read the secret at `name` (an API path such as `database/creds/app`).
    pub fn read(&self, name: &str) -> VaultifyResult<Secret> {
        let path = secret_path(name)?;
        let response: VaultResponse = decode(self.request(HttpMethod::Get, path, None)?, name)?;

        let data = match response.data {
            Some(data) if !data.is_null() => data,
            _ => return Err(VaultifyError::NotFound(name.to_string())),
        };

        Ok(Secret::new(data).with_lease(
            Some(response.lease_id).filter(|id| !id.is_empty()),
            Some(response.lease_duration).filter(|d| *d > 0),
            response.renewable,
        ))
    }

    /// Log in with the Kubernetes auth method and adopt the issued token.
    ///
    /// Returns the auth secret describing the new token.
    pub fn login_kubernetes(&mut self, role: &str, jwt: &str) -> VaultifyResult<Secret> {
        let path = format!("auth/{}/login", self.config.auth_mount.trim_matches('/'));
        let body = json!({ "role": role, "jwt": jwt.trim() });

        self.output
            .debug(&format!("Logging in to Vault with role '{}'", role));

        let response: VaultResponse =
            decode(self.request(HttpMethod::Post, &path, Some(body))?, &path)?;
        let auth = response.auth.ok_or_else(|| {
            VaultifyError::Unauthorized(format!("Login with role '{}' returned no token", role))
        })?;

        let token = SecretString::from(auth.client_token);
        let secret = auth_secret(
            token.expose_secret(),
            &auth.accessor,
            auth.lease_duration,
            auth.renewable,
        );
        self.token = Some(token);
        Ok(secret)
    }

    /// Describe the current token as an auth secret.
    pub fn lookup_self(&self) -> VaultifyResult<Secret> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| VaultifyError::Unauthorized("No Vault token available".to_string()))?;

        let path = "auth/token/lookup-self";
        let response: VaultResponse = decode(self.request(HttpMethod::Get, path, None)?, path)?;
        let lookup: TokenLookup = match response.data {
            Some(data) => serde_json::from_value(data).map_err(|e| {
                VaultifyError::Serialization(format!("Unexpected token lookup response: {}", e))
            })?,
            None => TokenLookup::default(),
        };

        Ok(auth_secret(
            token.expose_secret(),
            &lookup.accessor,
            lookup.ttl,
            lookup.renewable,
        ))
    }

    fn request(&self, method: HttpMethod, path: &str, body: Option<Value>) -> VaultifyResult<Value> {
        let url = self.config.endpoint(path)?;

        self.retry.execute(
            || {
                let waited = self.limiter.acquire();
                if !waited.is_zero() {
                    self.output
                        .trace(&format!("Rate limited for {:?} before {}", waited, path));
                }
                self.send_once(method, &url, body.clone(), path)
            },
            |err, attempt, delay| {
                self.output.warning(&format!(
                    "Vault request to {} failed ({}), retry {}/{} in {:?}",
                    path,
                    err,
                    attempt,
                    self.retry.max_retries(),
                    delay
                ));
            },
        )
    }

    fn send_once(
        &self,
        method: HttpMethod,
        url: &Url,
        body: Option<Value>,
        path: &str,
    ) -> VaultifyResult<Value> {
        let mut headers = vec![("X-Vault-Request", "true".to_string())];
        if let Some(token) = &self.token {
            headers.push(("X-Vault-Token", token.expose_secret().to_string()));
        }
        if let Some(namespace) = &self.config.namespace {
            headers.push(("X-Vault-Namespace", namespace.clone()));
        }

        let request = HttpRequest {
            method,
            url: url.clone(),
            headers,
            body,
        };

        self.output.trace(&format!("{:?} {}", method, url));
        let response = self
            .http
            .send(&request)
            .map_err(|e| VaultifyError::Unavailable(format!("{:#}", e)))?;

        classify(response, path)
    }
}

/// Map an HTTP status to the error kinds callers can act on.
fn classify(response: HttpResponse, path: &str) -> VaultifyResult<Value> {
    match response.status {
        200..=299 => {
            if response.body.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&response.body).map_err(|e| {
                VaultifyError::Serialization(format!("Invalid JSON from Vault for {}: {}", path, e))
            })
        }
        404 => Err(VaultifyError::NotFound(path.to_string())),
        401 | 403 => Err(VaultifyError::Unauthorized(format!(
            "{}: {}",
            path,
            error_message(&response.body)
        ))),
        400 | 405 => Err(VaultifyError::InvalidArgument(format!(
            "{}: {}",
            path,
            error_message(&response.body)
        ))),
        status => Err(VaultifyError::Unavailable(format!(
            "{} returned status {}: {}",
            path,
            status,
            error_message(&response.body)
        ))),
    }
}

/// Extract Vault's `{"errors": [...]}` messages, falling back to the raw body.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Errors {
        errors: Vec<String>,
    }

    match serde_json::from_str::<Errors>(body) {
        Ok(errors) if !errors.errors.is_empty() => errors.errors.join("; "),
        _ if body.trim().is_empty() => "no details".to_string(),
        _ => body.trim().to_string(),
    }
}

fn decode<T: serde::de::DeserializeOwned + Default>(value: Value, path: &str) -> VaultifyResult<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| {
        VaultifyError::Serialization(format!("Unexpected Vault response for {}: {}", path, e))
    })
}

/// Validate a secret name and turn it into an API path.
fn secret_path(name: &str) -> VaultifyResult<&str> {
    let path = name.trim_start_matches('/');
    if path.is_empty() {
        return Err(VaultifyError::InvalidArgument(
            "Vault secret path cannot be empty".to_string(),
        ));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(VaultifyError::InvalidArgument(format!(
            "Vault secret path cannot contain '..': {}",
            name
        )));
    }

    if path.contains(['?', '#']) {
        return Err(VaultifyError::InvalidArgument(format!(
            "Vault secret path cannot contain '?' or '#': {}",
            name
        )));
    }

    Ok(path)
}

fn auth_secret(token: &str, accessor: &str, ttl: u64, renewable: bool) -> Secret {
    Secret::new(json!({ "client_token": token, "accessor": accessor })).with_lease(
        None,
        Some(ttl).filter(|ttl| *ttl > 0),
        renewable,
    )
}
