//! Error types for token storage and the authorization flow.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TokenError>;

/// Everything that can go wrong while reading, inspecting or refreshing a token.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The token file could not be read, stat'ed or removed.
    #[error("cannot access token file {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The token file exists but does not contain valid JSON.
    #[error("token file {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required key is absent from an explicitly supplied token.
    #[error("token has no '{0}' field")]
    MissingField(String),

    /// A key is present but holds the wrong JSON type.
    #[error("token field '{field}' is not {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    /// Transport failure talking to the token endpoint.
    #[error("token refresh request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The token endpoint answered, but not with a usable token.
    #[error("token endpoint returned HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    /// The browser for the interactive login could not be started.
    #[error("failed to launch browser '{browser}': {source}")]
    Browser {
        browser: String,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl TokenError {
    /// True when the underlying I/O failure is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TokenError::FileAccess { source, .. } if source.kind() == io::ErrorKind::NotFound
        )
    }

    pub(crate) fn file_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TokenError::FileAccess {
            path: path.into(),
            source,
        }
    }
}
