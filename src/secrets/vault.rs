//! HashiCorp Vault secret reader.

use super::provider::{Secret, SecretReader};
use crate::error::{VaultifyError, VaultifyResult};
use crate::traits::{FileSystem, Output};
use crate::vault::{HttpClient, ReqwestClient, VaultClient, VaultConfig};
use std::sync::Arc;

/// Secret reader that reads each secret name as a Vault API path.
///
/// Authentication happens once, when the reader is created; the resulting
/// credential is reported as the auth secret of every render.
pub struct VaultSecretReader<H: HttpClient = ReqwestClient> {
    client: VaultClient<H>,
    auth: Secret,
}

impl VaultSecretReader<ReqwestClient> {
    /// Connect to Vault and authenticate according to `config`.
    pub fn connect(
        config: VaultConfig,
        fs: &dyn FileSystem,
        output: Arc<dyn Output>,
    ) -> VaultifyResult<Self> {
        let client = VaultClient::new(config, output)?;
        Self::authenticate(client, fs)
    }
}

impl<H: HttpClient> VaultSecretReader<H> {
    /// Authenticate `client` and wrap it in a reader.
    ///
    /// A configured role logs in with the Kubernetes auth method using the
    /// service account JWT. Otherwise the explicit token is used, falling back
    /// to the token helper file.
    pub fn authenticate(mut client: VaultClient<H>, fs: &dyn FileSystem) -> VaultifyResult<Self> {
        let config = client.config().clone();

        let auth = if let Some(role) = &config.role {
            let jwt = fs
                .read_to_string(&config.jwt_path)
                .map_err(|e| VaultifyError::io(&config.jwt_path, e))?;
            if jwt.trim().is_empty() {
                return Err(VaultifyError::Unauthorized(format!(
                    "Service account token at {} is empty",
                    config.jwt_path.display()
                )));
            }
            client.login_kubernetes(role, &jwt)?
        } else {
            if !client.has_token() {
                let token = config
                    .token_file
                    .as_deref()
                    .and_then(|path| fs.read_to_string(path).ok())
                    .map(|token| token.trim().to_string())
                    .filter(|token| !token.is_empty())
                    .ok_or_else(|| {
                        VaultifyError::Unauthorized(
                            "No Vault token: set VAULT_TOKEN, pass --role, or log in with the vault CLI"
                                .to_string(),
                        )
                    })?;
                client.set_token(token);
            }
            client.lookup_self()?
        };

        Ok(Self { client, auth })
    }
}

impl<H: HttpClient> SecretReader for VaultSecretReader<H> {
    fn get_type(&self) -> &str {
        "vault"
    }

    fn get(&self, name: &str) -> VaultifyResult<Secret> {
        self.client.read(name)
    }

    fn auth_secret(&self) -> Secret {
        self.auth.clone()
    }
}
