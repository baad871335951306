//! Error types for rendering templates against a secret store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while rendering a template or materializing its results.
#[derive(Error, Debug)]
pub enum VaultifyError {
    /// Malformed template syntax
    #[error("Template parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Template evaluation failed for a reason other than a secret lookup
    #[error("Template evaluation failed: {0}")]
    Render(String),

    /// Empty or otherwise invalid secret name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Secret does not exist
    #[error("Secret not found: {0}")]
    NotFound(String),

    /// Credential lacks access to the secret
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transport failure, timeout or server-side error against Vault
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Local file creation, read or write failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record or override value could not be encoded/decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for vaultify operations.
pub type VaultifyResult<T> = Result<T, VaultifyError>;

impl VaultifyError {
    /// Check if the failed operation may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly name of the error kind, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Render(_) => "render",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Unavailable(_) => "unavailable",
            Self::Io { .. } => "io",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
        }
    }
}
