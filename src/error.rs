//! Error types for registry assembly, composition and document loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors inserting schemas into a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate schema id '{id}'")]
    DuplicateSchema { id: String },

    #[error("invalid schema '{id}': {message}")]
    InvalidSchema { id: String, message: String },
}

/// Errors composing a caller's registry. No partial registry accompanies
/// any of these.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to build registry from builtin schemas: {source}")]
    Builtins {
        #[source]
        source: RegistryError,
    },

    #[error("failed to add base schemas: {source}")]
    BaseSchemas {
        #[source]
        source: RegistryError,
    },

    #[error("failed to add schema '{id}': {source}")]
    Insert {
        id: String,
        #[source]
        source: RegistryError,
    },
}

impl ComposeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors loading catalog, grant and template documents.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Document errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {document} document with {} error(s)", errors.len())]
    InvalidDocument {
        document: &'static str,
        errors: Vec<DocumentError>,
    },

    #[error("template '{key}' names unknown {slot} '{name}'")]
    UnknownBehavior {
        key: String,
        slot: String,
        name: String,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Single structural error in a document, with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentError {
    /// JSON Pointer (RFC 6901) to the offending value.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
