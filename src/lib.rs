//! Access-controlled schema registries
//!
//! Composes, for one caller, the registry of resource schemas that caller
//! may act on, from a shared catalog and the caller's access set.
//!
//! A resource schema is served only if the caller holds at least one of its
//! verbs. Served schemas are annotated with exactly the permitted verbs,
//! get the methods those verbs allow, and have their mapper, formatter and
//! store filled from templates.
//!
//! # Example
//!
//! ```
//! use access_schemas::{
//!     compose, CatalogSnapshot, Grant, GrantAccessSet, Method, ResourceSchema, TemplateRegistry,
//! };
//!
//! let deployments = ResourceSchema::resource("apps.deployment", "apps", "Deployment", "deployments")
//!     .with_verbs(&["list", "get", "create", "update", "delete"]);
//! let jobs = ResourceSchema::resource("batch.job", "batch", "Job", "jobs")
//!     .with_verbs(&["list", "get"]);
//! let snapshot = CatalogSnapshot::new(1, vec![], vec![deployments, jobs]);
//!
//! let access = GrantAccessSet::new(vec![Grant::new(&["get"], "apps", "deployments")]);
//! let registry = compose(&snapshot, &TemplateRegistry::new(), &access).unwrap();
//!
//! let served = registry.get("apps.deployment").unwrap();
//! assert_eq!(served.resource_methods, vec![Method::Get]);
//! assert_eq!(served.collection_methods, vec![Method::Get]);
//! assert!(registry.get("batch.job").is_none());
//! ```
//!
//! # Template precedence
//!
//! | Priority | Template key |
//! |----------|--------------|
//! | 1 | exact schema id |
//! | 2 | `group/kind` |
//! | 3 | `""` (global default) |
//!
//! Each behavior slot takes the first template with a value for it.

mod access;
mod catalog;
mod compose;
mod error;
mod linter;
mod loader;
mod registry;
mod template;
mod types;

pub use access::{
    Access, AccessList, AccessSet, Grant, GrantAccessSet, PermissionResolver, StaticResolver,
    UserInfo, WILDCARD,
};
pub use catalog::{CatalogDocument, CatalogHandle, CatalogSnapshot};
pub use compose::{compose, derive_methods, verb_access_for, Collection};
pub use error::{ComposeError, DocumentError, LoadError, RegistryError};
pub use linter::{
    lint, lint_catalog_file, lint_templates_file, Diagnostic, FileResult, FileStatus, LintResult,
    Severity,
};
pub use loader::{
    load_catalog, load_grants, load_json, load_json_auto, load_json_str, load_templates,
    parse_catalog, parse_grants, parse_template_config, validate_document, DocumentKind,
};
pub use registry::{builtin_schemas, SchemaRegistry, BUILTIN_SCHEMA_IDS};
pub use template::{
    Behaviors, DefaultMapper, Formatter, LinksFormatter, Mapper, MemoryStore, Store, Template,
    TemplateConfig, TemplateRegistry, TemplateSpec, DEFAULT_TEMPLATE_KEY,
};
pub use types::{
    BehaviorNames, GroupResource, Method, ResourceSchema, VerbAccess, KNOWN_VERBS, VERB_CREATE,
    VERB_DELETE, VERB_GET, VERB_LIST, VERB_UPDATE,
};

#[cfg(feature = "remote")]
pub use loader::load_json_url;
