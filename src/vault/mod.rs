//! HashiCorp Vault API access.

pub mod client;
pub mod config;
pub mod retry;

pub use client::{HttpClient, ReqwestClient, VaultClient};
pub use config::VaultConfig;
