//! Vault client configuration.

use super::retry::RetryConfig;
use crate::error::{VaultifyError, VaultifyResult};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Service account token mounted into Kubernetes pods.
pub const DEFAULT_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Mount path of the Kubernetes auth method.
pub const DEFAULT_AUTH_MOUNT: &str = "kubernetes";

/// Connection, authentication and request policy for the Vault client.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Base address, always ending in `/`
    pub address: Url,
    /// Explicit client token (`VAULT_TOKEN`)
    pub token: Option<SecretString>,
    /// Token helper file consulted when no token or role is given
    pub token_file: Option<PathBuf>,
    /// Enterprise namespace (`VAULT_NAMESPACE`)
    pub namespace: Option<String>,
    /// Kubernetes auth role; when set, the client logs in instead of using a token
    pub role: Option<String>,
    pub auth_mount: String,
    pub jwt_path: PathBuf,
    /// Per-request timeout
    pub timeout: Duration,
    pub max_retries: u32,
    /// One request token is regained every `rate_limit`; zero disables limiting
    pub rate_limit: Duration,
    pub rate_limit_burst: u32,
}

impl VaultConfig {
    /// Create a config for the Vault server at `address` with default policy.
    pub fn new(address: &str) -> VaultifyResult<Self> {
        let mut address = Url::parse(address.trim()).map_err(|e| {
            VaultifyError::Config(format!("Invalid Vault address '{}': {}", address, e))
        })?;

        if address.scheme() != "http" && address.scheme() != "https" {
            return Err(VaultifyError::Config(format!(
                "Vault address must use http or https, got '{}'",
                address.scheme()
            )));
        }

        if !address.path().ends_with('/') {
            let path = format!("{}/", address.path());
            address.set_path(&path);
        }

        Ok(Self {
            address,
            token: None,
            token_file: dirs::home_dir().map(|home| home.join(".vault-token")),
            namespace: None,
            role: None,
            auth_mount: DEFAULT_AUTH_MOUNT.to_string(),
            jwt_path: PathBuf::from(DEFAULT_JWT_PATH),
            timeout: Duration::from_secs(60),
            max_retries: 20,
            rate_limit: Duration::from_millis(100),
            rate_limit_burst: 10,
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_token_file(mut self, token_file: Option<PathBuf>) -> Self {
        self.token_file = token_file;
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    #[must_use]
    pub fn with_auth_mount(mut self, mount: impl Into<String>) -> Self {
        self.auth_mount = mount.into();
        self
    }

    #[must_use]
    pub fn with_jwt_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.jwt_path = path.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, interval: Duration, burst: u32) -> Self {
        self.rate_limit = interval;
        self.rate_limit_burst = burst;
        self
    }

    /// Check values that cannot be expressed in the types.
    pub fn validate(&self) -> VaultifyResult<()> {
        if self.timeout.is_zero() {
            return Err(VaultifyError::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_burst == 0 {
            return Err(VaultifyError::Config(
                "Rate limit burst must be at least 1".to_string(),
            ));
        }

        if let Some(role) = &self.role {
            if role.trim().is_empty() {
                return Err(VaultifyError::Config("Vault role cannot be empty".to_string()));
            }
        }

        let mount = self.auth_mount.trim_matches('/');
        if mount.is_empty() || mount.contains("..") {
            return Err(VaultifyError::Config(format!(
                "Invalid auth mount '{}'",
                self.auth_mount
            )));
        }

        Ok(())
    }

    /// Resolve an API path (without the `v1/` prefix) against the address.
    pub fn endpoint(&self, path: &str) -> VaultifyResult<Url> {
        self.address
            .join(&format!("v1/{}", path.trim_start_matches('/')))
            .map_err(|e| VaultifyError::Config(format!("Invalid Vault path '{}': {}", path, e)))
    }

    /// Backoff policy derived from `max_retries`.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default().with_max_retries(self.max_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::new("https://vault.example.com:8200").unwrap();
        assert_eq!(config.address.as_str(), "https://vault.example.com:8200/");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 20);
        assert_eq!(config.auth_mount, "kubernetes");
        assert_eq!(config.jwt_path, PathBuf::from(DEFAULT_JWT_PATH));
        assert!(config.role.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            VaultConfig::new("not a url"),
            Err(VaultifyError::Config(_))
        ));
        assert!(matches!(
            VaultConfig::new("ftp://vault.example.com"),
            Err(VaultifyError::Config(_))
        ));
    }

    #[test]
    fn test_endpoint() {
        let config = VaultConfig::new("https://vault.example.com:8200").unwrap();
        assert_eq!(
            config.endpoint("secret/data/app").unwrap().as_str(),
            "https://vault.example.com:8200/v1/secret/data/app"
        );
        assert_eq!(
            config.endpoint("/auth/token/lookup-self").unwrap().as_str(),
            "https://vault.example.com:8200/v1/auth/token/lookup-self"
        );
    }

    #[test]
    fn test_endpoint_keeps_address_prefix() {
        let config = VaultConfig::new("https://proxy.example.com/vault").unwrap();
        assert_eq!(
            config.endpoint("secret/app").unwrap().as_str(),
            "https://proxy.example.com/vault/v1/secret/app"
        );
    }

    #[test]
    fn test_validate_rejects_bad_policy() {
        let base = VaultConfig::new("http://127.0.0.1:8200").unwrap();

        assert!(base.clone().with_timeout(Duration::ZERO).validate().is_err());
        assert!(base
            .clone()
            .with_rate_limit(Duration::from_secs(1), 0)
            .validate()
            .is_err());
        assert!(base.clone().with_role("  ").validate().is_err());
        assert!(base.clone().with_auth_mount("../x").validate().is_err());
        assert!(base.with_rate_limit(Duration::ZERO, 1).validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = VaultConfig::new("http://127.0.0.1:8200")
            .unwrap()
            .with_token("s.very-secret");

        let debug = format!("{:?}", config);
        assert!(!debug.contains("s.very-secret"));
        assert!(debug.contains("127.0.0.1"));
    }

    #[test]
    fn test_retry_config_uses_max_retries() {
        let config = VaultConfig::new("http://127.0.0.1:8200")
            .unwrap()
            .with_max_retries(3);
        assert_eq!(config.retry_config().max_retries, 3);
    }
}
