//! Catalog linting - static analysis of catalog and template documents.
//!
//! Checks for:
//! - JSON syntax and document structure errors
//! - Duplicate schema ids (including collisions with builtin schemas)
//! - Unknown verbs and resource schemas no caller could ever see
//! - Template keys and behavior names that match nothing

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::CatalogDocument;
use crate::error::LoadError;
use crate::loader::{load_json, parse_catalog, parse_template_config};
use crate::registry::BUILTIN_SCHEMA_IDS;
use crate::template::{Behaviors, TemplateConfig, DEFAULT_TEMPLATE_KEY};
use crate::types::{ResourceSchema, KNOWN_VERBS};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON path to the issue (e.g., "/schemas/3/verbs/0")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a catalog and its templates.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a catalog file and, optionally, the template file used with it.
///
/// If `strict` is true, warnings fail a file.
pub fn lint(catalog_file: &Path, templates_file: Option<&Path>, strict: bool) -> LintResult {
    let mut results = Vec::new();

    let (catalog_result, catalog) = lint_catalog_file(catalog_file);
    results.push(catalog_result);

    if let Some(templates_file) = templates_file {
        results.push(lint_templates_file(templates_file, catalog.as_ref()));
    }

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        files_checked: results.len(),
        passed: results.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Lint a catalog file. Also returns the parsed catalog when it loaded.
pub fn lint_catalog_file(file: &Path) -> (FileResult, Option<CatalogDocument>) {
    let mut diagnostics = Vec::new();

    let catalog = match load_json(file).and_then(parse_catalog) {
        Ok(catalog) => catalog,
        Err(e) => {
            push_load_error(&e, file, &mut diagnostics);
            return (file_result(file, diagnostics), None);
        }
    };

    check_catalog(&catalog, file, &mut diagnostics);
    (file_result(file, diagnostics), Some(catalog))
}

/// Lint a template file, checking keys against `catalog` when available.
pub fn lint_templates_file(file: &Path, catalog: Option<&CatalogDocument>) -> FileResult {
    let mut diagnostics = Vec::new();

    match load_json(file).and_then(parse_template_config) {
        Ok(config) => check_templates(&config, catalog, file, &mut diagnostics),
        Err(e) => push_load_error(&e, file, &mut diagnostics),
    }

    file_result(file, diagnostics)
}

fn file_result(file: &Path, diagnostics: Vec<Diagnostic>) -> FileResult {
    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: file.to_path_buf(),
        status,
        diagnostics,
    }
}

fn push_load_error(err: &LoadError, file: &Path, diagnostics: &mut Vec<Diagnostic>) {
    match err {
        LoadError::InvalidDocument { errors, .. } => {
            for e in errors {
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    code: "E001".to_string(),
                    file: file.to_path_buf(),
                    path: if e.path.is_empty() { "/".to_string() } else { e.path.clone() },
                    message: e.message.clone(),
                });
            }
        }
        other => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code: "E001".to_string(),
            file: file.to_path_buf(),
            path: "/".to_string(),
            message: format!("cannot load: {}", other),
        }),
    }
}

fn check_catalog(catalog: &CatalogDocument, file: &Path, diagnostics: &mut Vec<Diagnostic>) {
    let mut seen: HashSet<&str> = BUILTIN_SCHEMA_IDS.iter().copied().collect();

    let sections: [(&str, &[ResourceSchema]); 2] =
        [("base", &catalog.base), ("schemas", &catalog.schemas)];

    for (section, schemas) in sections {
        for (i, schema) in schemas.iter().enumerate() {
            let path = format!("/{}/{}", section, i);

            if !seen.insert(schema.id.as_str()) {
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    code: "E002".to_string(),
                    file: file.to_path_buf(),
                    path: format!("{}/id", path),
                    message: format!("duplicate schema id '{}'", schema.id),
                });
            }

            if section == "schemas" {
                check_resource_schema(schema, file, &path, diagnostics);
            }
        }
    }
}

fn check_resource_schema(
    schema: &ResourceSchema,
    file: &Path,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if schema.is_meta() {
        return;
    }

    if schema.verbs.is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            code: "W002".to_string(),
            file: file.to_path_buf(),
            path: path.to_string(),
            message: format!("schema '{}' declares no verbs and is never served", schema.id),
        });
    }

    for (i, verb) in schema.verbs.iter().enumerate() {
        if !KNOWN_VERBS.contains(&verb.as_str()) {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                code: "W001".to_string(),
                file: file.to_path_buf(),
                path: format!("{}/verbs/{}", path, i),
                message: format!("unknown verb '{}'", verb),
            });
        }
    }

    if schema.kind.is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            code: "W004".to_string(),
            file: file.to_path_buf(),
            path: path.to_string(),
            message: format!("schema '{}' has no kind; group/kind templates cannot match", schema.id),
        });
    }
}

fn check_templates(
    config: &TemplateConfig,
    catalog: Option<&CatalogDocument>,
    file: &Path,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let behaviors = Behaviors::builtin();

    for (key, spec) in config {
        let path = format!("/{}", escape_pointer(key));

        let slots = [
            ("mapper", spec.mapper.as_deref(), behaviors.mapper_names()),
            ("formatter", spec.formatter.as_deref(), behaviors.formatter_names()),
            ("store", spec.store.as_deref(), behaviors.store_names()),
        ];
        for (slot, name, known) in slots {
            if let Some(name) = name {
                if !known.contains(&name) {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Error,
                        code: "E003".to_string(),
                        file: file.to_path_buf(),
                        path: format!("{}/{}", path, slot),
                        message: format!("unknown {} '{}'", slot, name),
                    });
                }
            }
        }

        if key == DEFAULT_TEMPLATE_KEY {
            continue;
        }
        if let Some(catalog) = catalog {
            let matches = catalog
                .schemas
                .iter()
                .any(|s| s.id == *key || s.group_kind_key() == *key);
            if !matches {
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    code: "W003".to_string(),
                    file: file.to_path_buf(),
                    path,
                    message: format!("template key '{}' matches no schema id or group/kind", key),
                });
            }
        }
    }
}

/// Escape a key for use as a JSON Pointer segment (`~` → `~0`, `/` → `~1`).
fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
