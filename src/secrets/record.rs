//! The secrets record: everything one render pass fetched.
//!
//! The record is what the external lease-renewal process consumes, so its
//! on-disk shape is kept independent of the renderer's internals:
//!
//! ```json
//! {
//!   "auth_secret": { "value": { "client_token": "...", "accessor": "..." }, "lease_duration": 2764800, "renewable": true },
//!   "secrets": {
//!     "database/creds/app": { "value": { "username": "...", "password": "..." }, "lease_id": "...", "lease_duration": 3600, "renewable": true }
//!   }
//! }
//! ```

use super::provider::Secret;
use crate::error::{VaultifyError, VaultifyResult};
use crate::traits::FileSystem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One render pass's accumulated secrets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretsRecord {
    /// The store credential itself, captured on every render
    pub auth_secret: Secret,
    /// Every secret the template looked up, keyed by the name it was requested with
    #[serde(default)]
    pub secrets: BTreeMap<String, Secret>,
}

/// File formats a record can be written in, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Yaml,
}

impl RecordFormat {
    /// `.yaml` and `.yml` select YAML; anything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                RecordFormat::Yaml
            }
            _ => RecordFormat::Json,
        }
    }
}

impl SecretsRecord {
    /// Start a record for a new render, seeded with the auth secret.
    pub fn new(auth_secret: Secret) -> Self {
        Self {
            auth_secret,
            secrets: BTreeMap::new(),
        }
    }

    /// Record a fetched secret, replacing any earlier fetch of the same name.
    pub fn insert(&mut self, name: impl Into<String>, secret: Secret) {
        self.secrets.insert(name.into(), secret);
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Secret> {
        self.secrets.get(name)
    }

    #[cfg(test)]
    /// Names of all recorded secrets, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Number of recorded entries, auth secret included, that carry a lease.
    pub fn leased_count(&self) -> usize {
        let auth = usize::from(self.auth_secret.has_lease());
        auth + self.secrets.values().filter(|s| s.has_lease()).count()
    }

    /// Serialize the record in the given format.
    pub fn to_string_as(&self, format: RecordFormat) -> VaultifyResult<String> {
        match format {
            RecordFormat::Json => serde_json::to_string_pretty(self)
                .map(|mut json| {
                    json.push('\n');
                    json
                })
                .map_err(|e| {
                    VaultifyError::Serialization(format!("Failed to encode secrets record: {}", e))
                }),
            RecordFormat::Yaml => serde_yaml::to_string(self).map_err(|e| {
                VaultifyError::Serialization(format!("Failed to encode secrets record: {}", e))
            }),
        }
    }

    #[cfg(test)]
    /// Parse a record previously produced by [`SecretsRecord::to_string_as`].
    pub fn from_str_as(contents: &str, format: RecordFormat) -> VaultifyResult<Self> {
        match format {
            RecordFormat::Json => serde_json::from_str(contents).map_err(|e| {
                VaultifyError::Serialization(format!("Failed to decode secrets record: {}", e))
            }),
            RecordFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| {
                VaultifyError::Serialization(format!("Failed to decode secrets record: {}", e))
            }),
        }
    }

    /// Write the record to `path` with owner-only permissions.
    pub fn write_to(&self, fs: &dyn FileSystem, path: &Path) -> VaultifyResult<()> {
        let contents = self.to_string_as(RecordFormat::from_path(path))?;
        fs.write_private(path, contents.as_bytes())
            .map_err(|e| VaultifyError::io(path, e))
    }

    #[cfg(test)]
    /// Read a record written by [`SecretsRecord::write_to`].
    pub fn read_from(fs: &dyn FileSystem, path: &Path) -> VaultifyResult<Self> {
        let contents = fs
            .read_to_string(path)
            .map_err(|e| VaultifyError::io(path, e))?;
        Self::from_str_as(&contents, RecordFormat::from_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockFileSystem;
    use serde_json::json;

    fn sample_record() -> SecretsRecord {
        let auth = Secret::new(json!({"client_token": "s.token", "accessor": "acc"}))
            .with_lease(None, Some(2764800), true);
        let mut record = SecretsRecord::new(auth);
        record.insert("user", Secret::new("alice"));
        record.insert(
            "database/creds/app",
            Secret::new(json!({"username": "v-app", "password": "pw"})).with_lease(
                Some("database/creds/app/xyz".to_string()),
                Some(3600),
                true,
            ),
        );
        record
    }

    #[test]
    fn test_record_format_from_path() {
        assert_eq!(RecordFormat::from_path(Path::new("secrets.json")), RecordFormat::Json);
        assert_eq!(RecordFormat::from_path(Path::new("secrets.yaml")), RecordFormat::Yaml);
        assert_eq!(RecordFormat::from_path(Path::new("secrets.YML")), RecordFormat::Yaml);
        assert_eq!(RecordFormat::from_path(Path::new("secrets")), RecordFormat::Json);
    }

    #[test]
    fn test_insert_overwrites_same_name() {
        let mut record = SecretsRecord::default();
        record.insert("user", Secret::new("alice"));
        record.insert("user", Secret::new("bob"));

        assert_eq!(record.len(), 1);
        assert_eq!(record.get("user"), Some(&Secret::new("bob")));
    }

    #[test]
    fn test_json_shape() {
        let mut record = SecretsRecord::default();
        record.insert("user", Secret::new("alice"));

        let encoded: serde_json::Value =
            serde_json::from_str(&record.to_string_as(RecordFormat::Json).unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({"auth_secret": {}, "secrets": {"user": {"value": "alice"}}})
        );
    }

    #[test]
    fn test_names_are_sorted() {
        let record = sample_record();
        let names: Vec<&str> = record.names().collect();
        assert_eq!(names, vec!["database/creds/app", "user"]);
    }

    #[test]
    fn test_leased_count() {
        assert_eq!(sample_record().leased_count(), 2);
        assert_eq!(SecretsRecord::default().leased_count(), 0);
    }

    #[test]
    fn test_write_and_read_json_file() {
        let fs = MockFileSystem::new();
        let path = Path::new("/run/vaultify/secrets.json");
        let record = sample_record();

        record.write_to(&fs, path).unwrap();

        assert_eq!(fs.get_file_mode(path), Some(0o600));
        let contents = fs.get_file_contents(path).unwrap();
        assert!(contents.trim_start().starts_with('{'));
        assert_eq!(SecretsRecord::read_from(&fs, path).unwrap(), record);
    }

    #[test]
    fn test_write_and_read_yaml_file() {
        let fs = MockFileSystem::new();
        let path = Path::new("/run/vaultify/secrets.yaml");
        let record = sample_record();

        record.write_to(&fs, path).unwrap();

        let contents = fs.get_file_contents(path).unwrap();
        assert!(contents.contains("auth_secret:"));
        assert_eq!(SecretsRecord::read_from(&fs, path).unwrap(), record);
    }

    #[test]
    fn test_write_failure_is_io_error() {
        let fs = MockFileSystem::new();
        fs.fail_writes_to("/readonly/secrets.json");

        let err = sample_record()
            .write_to(&fs, Path::new("/readonly/secrets.json"))
            .unwrap_err();
        assert!(matches!(err, VaultifyError::Io { .. }));
    }

    #[test]
    fn test_read_malformed_record() {
        let fs = MockFileSystem::new();
        fs.add_file("/run/secrets.json", "{not json");

        let err = SecretsRecord::read_from(&fs, Path::new("/run/secrets.json")).unwrap_err();
        assert!(matches!(err, VaultifyError::Serialization(_)));
    }
}
