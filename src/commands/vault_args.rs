use crate::duration::parse_duration;
use crate::vault::VaultConfig;
use anyhow::{Context as AnyhowContext, Result};
use clap::Args;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Connection flags shared by every command that talks to Vault
#[derive(Debug, Clone, Args)]
pub struct VaultArgs {
    /// Address of the Vault server
    #[arg(long = "vault", env = "VAULT_ADDR", global = true)]
    pub address: Option<String>,

    /// Vault token (defaults to the contents of ~/.vault-token)
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true, value_parser = parse_token, global = true)]
    pub token: Option<SecretString>,

    /// Vault Enterprise namespace
    #[arg(long, env = "VAULT_NAMESPACE", global = true)]
    pub namespace: Option<String>,

    /// Timeout of a single Vault request (e.g. 30s, 1m)
    #[arg(long, env = "VAULT_CLIENT_TIMEOUT", default_value = "1m", value_parser = parse_duration, global = true)]
    pub timeout: Duration,

    /// Retries of a request while Vault is unavailable
    #[arg(long, env = "VAULT_MAX_RETRIES", default_value_t = 20, global = true)]
    pub max_retries: u32,

    /// Minimum spacing of Vault requests once the burst is spent (0 disables)
    #[arg(long, default_value = "100ms", value_parser = parse_duration, global = true)]
    pub rate_limit: Duration,

    /// Requests allowed back to back before rate limiting starts
    #[arg(long, default_value_t = 10, global = true)]
    pub rate_limit_burst: u32,
}

impl VaultArgs {
    /// Build the client configuration. Requires an address.
    pub fn to_config(&self) -> Result<VaultConfig> {
        let address = self
            .address
            .as_deref()
            .filter(|address| !address.trim().is_empty())
            .context("No Vault address: set VAULT_ADDR or pass --vault")?;

        let mut config = VaultConfig::new(address)?
            .with_timeout(self.timeout)
            .with_max_retries(self.max_retries)
            .with_rate_limit(self.rate_limit, self.rate_limit_burst);

        if let Some(token) = self
            .token
            .as_ref()
            .map(|token| token.expose_secret())
            .filter(|token| !token.is_empty())
        {
            config = config.with_token(token);
        }
        if let Some(namespace) = self.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            config = config.with_namespace(namespace);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_token(value: &str) -> Result<SecretString, String> {
    Ok(SecretString::from(value))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn vault_args(address: Option<&str>) -> VaultArgs {
        VaultArgs {
            address: address.map(str::to_string),
            token: None,
            namespace: None,
            timeout: Duration::from_secs(60),
            max_retries: 20,
            rate_limit: Duration::from_millis(100),
            rate_limit_burst: 10,
        }
    }

    #[test]
    fn test_to_config() {
        let mut args = vault_args(Some("https://vault.example.com"));
        args.token = Some(SecretString::from("s.abc"));
        args.namespace = Some("team-a".to_string());
        args.max_retries = 3;

        let config = args.to_config().unwrap();

        assert_eq!(config.address.as_str(), "https://vault.example.com/");
        assert_eq!(
            config.token.as_ref().map(|token| token.expose_secret()),
            Some("s.abc")
        );
        assert!(!format!("{:?}", args).contains("s.abc"));
        assert_eq!(config.namespace.as_deref(), Some("team-a"));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.rate_limit_burst, 10);
    }

    #[test]
    fn test_to_config_ignores_empty_token() {
        let mut args = vault_args(Some("http://127.0.0.1:8200"));
        args.token = Some(SecretString::from(""));
        assert!(args.to_config().unwrap().token.is_none());
    }

    #[test]
    fn test_to_config_requires_address() {
        let err = vault_args(None).to_config().unwrap_err();
        assert!(err.to_string().contains("VAULT_ADDR"));
        assert!(vault_args(Some("  ")).to_config().is_err());
    }

    #[test]
    fn test_to_config_rejects_invalid_values() {
        let mut args = vault_args(Some("http://127.0.0.1:8200"));
        args.rate_limit_burst = 0;
        assert!(args.to_config().is_err());

        let mut args = vault_args(Some("http://127.0.0.1:8200"));
        args.timeout = Duration::ZERO;
        assert!(args.to_config().is_err());
    }
}
