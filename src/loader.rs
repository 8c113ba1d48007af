//! Document loading from files, strings and HTTP URLs.
//!
//! Catalog, grant and template documents are JSON. Each is checked against
//! an embedded JSON Schema before it is deserialized, so structural mistakes
//! are reported with the path of every offending value.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::access::GrantAccessSet;
use crate::catalog::CatalogDocument;
use crate::error::{DocumentError, LoadError};
use crate::template::{Behaviors, TemplateConfig, TemplateRegistry};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// The document formats this crate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Catalog,
    Grants,
    Templates,
}

impl DocumentKind {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentKind::Catalog => "catalog",
            DocumentKind::Grants => "grants",
            DocumentKind::Templates => "templates",
        }
    }

    /// JSON Schema the document must satisfy.
    pub fn schema(&self) -> Value {
        match self {
            DocumentKind::Catalog => json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "base": { "type": "array", "items": resource_schema_shape() },
                    "schemas": { "type": "array", "items": resource_schema_shape() }
                }
            }),
            DocumentKind::Grants => json!({
                "type": "object",
                "required": ["grants"],
                "additionalProperties": false,
                "properties": {
                    "grants": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["verbs", "resource"],
                            "additionalProperties": false,
                            "properties": {
                                "verbs": {
                                    "type": "array",
                                    "minItems": 1,
                                    "items": { "type": "string", "minLength": 1 }
                                },
                                "group": { "type": "string" },
                                "resource": { "type": "string", "minLength": 1 },
                                "namespaces": { "type": "array", "items": { "type": "string" } },
                                "resourceNames": { "type": "array", "items": { "type": "string" } }
                            }
                        }
                    }
                }
            }),
            DocumentKind::Templates => json!({
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "mapper": { "type": "string" },
                        "formatter": { "type": "string" },
                        "store": { "type": "string" }
                    }
                }
            }),
        }
    }
}

fn resource_schema_shape() -> Value {
    let methods = json!({
        "type": "array",
        "items": { "enum": ["GET", "POST", "PUT", "DELETE"] }
    });
    json!({
        "type": "object",
        "required": ["id"],
        "additionalProperties": false,
        "properties": {
            "id": { "type": "string", "minLength": 1 },
            "group": { "type": "string" },
            "version": { "type": "string" },
            "kind": { "type": "string" },
            "resource": { "type": "string" },
            "namespaced": { "type": "boolean" },
            "verbs": { "type": "array", "items": { "type": "string" } },
            "collectionMethods": methods,
            "resourceMethods": methods
        }
    })
}

/// Load JSON from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_json_str(&content)
}

/// Load JSON from a string.
pub fn load_json_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load JSON from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, LoadError> {
    let network_error = |source: reqwest::Error| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network_error)?;

    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(network_error)?
        .json()
        .map_err(network_error)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load JSON from a file path or, with the `remote` feature, a URL.
pub fn load_json_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            return load_json_url(source);
        }
        #[cfg(not(feature = "remote"))]
        {
            return Err(LoadError::FileNotFound {
                path: source.into(),
            });
        }
    }
    load_json(Path::new(source))
}

/// Check `value` against the schema for `kind`.
///
/// # Errors
///
/// Returns `LoadError::InvalidDocument` listing every violation.
pub fn validate_document(kind: DocumentKind, value: &Value) -> Result<(), LoadError> {
    let schema = kind.schema();
    let validator = jsonschema::validator_for(&schema).map_err(|e| LoadError::InvalidDocument {
        document: kind.name(),
        errors: vec![DocumentError {
            path: String::new(),
            message: e.to_string(),
        }],
    })?;

    let errors: Vec<DocumentError> = validator
        .iter_errors(value)
        .map(|e| DocumentError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LoadError::InvalidDocument {
            document: kind.name(),
            errors,
        })
    }
}

fn parse_document<T: DeserializeOwned>(kind: DocumentKind, value: Value) -> Result<T, LoadError> {
    validate_document(kind, &value)?;
    serde_json::from_value(value).map_err(|source| LoadError::InvalidJson { source })
}

/// Parse an already-loaded catalog document.
pub fn parse_catalog(value: Value) -> Result<CatalogDocument, LoadError> {
    parse_document(DocumentKind::Catalog, value)
}

/// Parse an already-loaded grants document.
pub fn parse_grants(value: Value) -> Result<GrantAccessSet, LoadError> {
    parse_document(DocumentKind::Grants, value)
}

/// Parse an already-loaded template document into its config form.
pub fn parse_template_config(value: Value) -> Result<TemplateConfig, LoadError> {
    parse_document(DocumentKind::Templates, value)
}

/// Load a catalog document from a path or URL.
pub fn load_catalog(source: &str) -> Result<CatalogDocument, LoadError> {
    parse_catalog(load_json_auto(source)?)
}

/// Load a grants document from a path or URL.
pub fn load_grants(source: &str) -> Result<GrantAccessSet, LoadError> {
    parse_grants(load_json_auto(source)?)
}

/// Load a template document and resolve its behavior names.
pub fn load_templates(source: &str, behaviors: &Behaviors) -> Result<TemplateRegistry, LoadError> {
    let config = parse_template_config(load_json_auto(source)?)?;
    TemplateRegistry::from_config(&config, behaviors)
}
