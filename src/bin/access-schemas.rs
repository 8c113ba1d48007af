//! Access schemas CLI
//!
//! Command-line interface for composing and checking per-caller schema
//! registries.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use access_schemas::{
    compose, lint, load_catalog, load_grants, load_json_auto, load_templates, validate_document,
    Behaviors, CatalogSnapshot, DocumentKind, FileStatus, LoadError, Severity, TemplateRegistry,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "access-schemas")]
#[command(about = "Compose access-controlled schema registries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Catalog,
    Grants,
    Templates,
}

impl From<Kind> for DocumentKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Catalog => DocumentKind::Catalog,
            Kind::Grants => DocumentKind::Grants,
            Kind::Templates => DocumentKind::Templates,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compose the schema registry a caller with the given grants may see
    Compose {
        /// Catalog source: file path or URL (http:// or https://)
        #[arg(long)]
        catalog: String,

        /// Caller grants source: file path or URL
        #[arg(long)]
        grants: String,

        /// Template document source: file path or URL
        #[arg(long)]
        templates: Option<String>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check a document's structure
    Validate {
        /// Document source: file path or URL
        document: String,

        /// Document kind
        #[arg(long, value_enum)]
        kind: Kind,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Lint a catalog (and optionally its templates) for errors
    Lint {
        /// Catalog file to lint
        catalog: PathBuf,

        /// Template file to lint against the catalog
        #[arg(long)]
        templates: Option<PathBuf>,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compose {
            catalog,
            grants,
            templates,
            output,
            pretty,
        } => run_compose(&catalog, &grants, templates.as_deref(), output, pretty),

        Commands::Validate {
            document,
            kind,
            json,
        } => run_validate(&document, kind.into(), json),

        Commands::Lint {
            catalog,
            templates,
            format,
            strict,
            quiet,
        } => run_lint(&catalog, templates.as_deref(), &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_error(context: &str, e: LoadError) -> u8 {
    eprintln!("Error loading {}: {}", context, e);
    if let LoadError::InvalidDocument { errors, .. } = &e {
        for error in errors {
            eprintln!("  {}", error);
        }
    }
    e.exit_code() as u8
}

fn run_compose(
    catalog_source: &str,
    grants_source: &str,
    templates_source: Option<&str>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let catalog = load_catalog(catalog_source).map_err(|e| load_error("catalog", e))?;
    let access = load_grants(grants_source).map_err(|e| load_error("grants", e))?;
    let templates = match templates_source {
        Some(source) => load_templates(source, &Behaviors::builtin())
            .map_err(|e| load_error("templates", e))?,
        None => TemplateRegistry::new(),
    };

    let snapshot = CatalogSnapshot::from_document(1, catalog);
    let registry = compose(&snapshot, &templates, &access).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let json_output = registry
        .to_json()
        .and_then(|view| {
            if pretty {
                serde_json::to_string_pretty(&view)
            } else {
                serde_json::to_string(&view)
            }
        })
        .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_validate(source: &str, kind: DocumentKind, json_output: bool) -> Result<(), u8> {
    let document = load_json_auto(source).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;

    match validate_document(kind, &document) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(LoadError::InvalidDocument { errors, .. }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(
    catalog: &Path,
    templates: Option<&Path>,
    format: &str,
    strict: bool,
    quiet: bool,
) -> Result<(), u8> {
    if !catalog.exists() {
        eprintln!("Error: path not found: {}", catalog.display());
        return Err(2);
    }

    let result = lint(catalog, templates, strict);

    if format == "json" {
        let rendered = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", rendered);
    } else {
        if !quiet {
            println!("Linting {} ...\n", catalog.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
