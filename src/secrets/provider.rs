//! SecretReader trait and the Secret type it produces.

use crate::error::{VaultifyError, VaultifyResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single fetched secret value plus its lease metadata.
///
/// Lease fields are omitted from the serialized form when the store reported
/// none, so a value-only secret serializes as `{"value": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    /// Secret payload: a plain string for simple secrets, the `data` object
    /// for Vault reads
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
    /// Lease identifier, for secrets backed by a dynamic engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,
    /// Lease duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_duration: Option<u64>,
    /// Whether the lease can be renewed
    #[serde(default, skip_serializing_if = "is_false")]
    pub renewable: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Secret {
    /// Create a secret without lease metadata.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Attach lease metadata.
    pub fn with_lease(
        mut self,
        lease_id: Option<String>,
        lease_duration: Option<u64>,
        renewable: bool,
    ) -> Self {
        self.lease_id = lease_id;
        self.lease_duration = lease_duration;
        self.renewable = renewable;
        self
    }

    /// Check whether the store attached a lease the renewal process must track.
    pub fn has_lease(&self) -> bool {
        self.lease_id.is_some() || self.lease_duration.is_some()
    }

    /// Decode a `--var` override.
    ///
    /// The override uses the same encoding as an entry of the secrets record
    /// (`{"value": ...}`). Overrides are value-only stand-ins: lease metadata,
    /// if present, is dropped since no live lease exists behind them.
    pub fn from_override(name: &str, json: &str) -> VaultifyResult<Self> {
        let secret: Secret = serde_json::from_str(json).map_err(|e| {
            VaultifyError::Serialization(format!(
                "Override for '{}' is not a valid secret encoding: {}",
                name, e
            ))
        })?;
        Ok(Secret::new(secret.value))
    }
}

/// Trait for secret reader implementations.
///
/// The renderer only talks to this trait; whether secrets come from Vault or
/// from a fixed mapping is decided by whoever constructs the reader.
pub trait SecretReader: Send + Sync {
    /// Get the reader type name (e.g., "vault", "static")
    fn get_type(&self) -> &str;

    /// Fetch a secret by name.
    fn get(&self, name: &str) -> VaultifyResult<Secret>;

    /// Metadata about the credential used to authenticate to the store.
    ///
    /// Captured into every secrets record, since the credential usually carries
    /// a lease of its own.
    fn auth_secret(&self) -> Secret;
}
