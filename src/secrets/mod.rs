//! Secret readers and the record of secrets a render consumed.
//!
//! Templates fetch secrets through a [`SecretReader`]; every fetched secret is
//! captured into a [`SecretsRecord`] so a later process can renew or revoke
//! the leases behind it.

pub mod provider;
pub mod record;
mod static_reader;
mod vault;

pub use provider::{Secret, SecretReader};
pub use record::SecretsRecord;
pub use static_reader::StaticSecretReader;
pub use vault::VaultSecretReader;
