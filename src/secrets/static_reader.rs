//! Secret reader backed by a fixed name to value mapping.
//!
//! Used for `--var` overrides: templates can be exercised without a running
//! Vault.

use super::provider::{Secret, SecretReader};
use crate::error::{VaultifyError, VaultifyResult};
use std::collections::HashMap;

/// Secret reader that serves secrets from memory.
pub struct StaticSecretReader {
    secrets: HashMap<String, Secret>,
}

impl StaticSecretReader {
    /// Create a reader serving exactly the given secrets.
    pub fn new(secrets: HashMap<String, Secret>) -> Self {
        Self { secrets }
    }

    /// Build a reader from `name -> JSON` overrides.
    ///
    /// Fails on the first override that is not a valid secret encoding.
    pub fn from_overrides<'a, I>(overrides: I) -> VaultifyResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut secrets = HashMap::new();
        for (name, json) in overrides {
            if name.is_empty() {
                return Err(VaultifyError::InvalidArgument(
                    "Override names cannot be empty".to_string(),
                ));
            }
            secrets.insert(name.to_string(), Secret::from_override(name, json)?);
        }
        Ok(Self::new(secrets))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.secrets.len()
    }
}

impl SecretReader for StaticSecretReader {
    fn get_type(&self) -> &str {
        "static"
    }

    fn get(&self, name: &str) -> VaultifyResult<Secret> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| VaultifyError::NotFound(name.to_string()))
    }

    fn auth_secret(&self) -> Secret {
        // No live credential exists behind static overrides
        Secret::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_type() {
        let reader = StaticSecretReader::new(HashMap::new());
        assert_eq!(reader.get_type(), "static");
    }

    #[test]
    fn test_from_overrides() {
        let reader = StaticSecretReader::from_overrides([
            ("user", r#"{"value":"alice"}"#),
            ("port", r#"{"value":5432}"#),
        ])
        .unwrap();

        assert_eq!(reader.len(), 2);
        assert_eq!(reader.get("user").unwrap(), Secret::new("alice"));
        assert_eq!(reader.get("port").unwrap().value, serde_json::json!(5432));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let reader = StaticSecretReader::from_overrides([("user", r#"{"value":"alice"}"#)]).unwrap();

        let err = reader.get("password").unwrap_err();
        assert!(matches!(err, VaultifyError::NotFound(ref name) if name == "password"));
    }

    #[test]
    fn test_auth_secret_is_empty() {
        let reader = StaticSecretReader::new(HashMap::new());
        let auth = reader.auth_secret();
        assert_eq!(auth, Secret::default());
        assert!(!auth.has_lease());
    }

    #[test]
    fn test_from_overrides_rejects_invalid_json() {
        let result = StaticSecretReader::from_overrides([("user", "{")]);
        assert!(matches!(result, Err(VaultifyError::Serialization(_))));
    }

    #[test]
    fn test_from_overrides_rejects_empty_name() {
        let result = StaticSecretReader::from_overrides([("", r#"{"value":"x"}"#)]);
        assert!(matches!(result, Err(VaultifyError::InvalidArgument(_))));
    }
}
