//! Access-controlled schema composition.
//!
//! Builds a fresh registry for one caller from a shared catalog snapshot:
//!
//! 1. Meta schemas (no resource) pass through unmodified.
//! 2. Every verb a schema supports is checked against the caller's access set;
//!    verbs with no grants are dropped.
//! 3. Schemas left with no permitted verb are omitted.
//! 4. The rest are cloned, annotated with the permitted verbs, given the
//!    methods those verbs allow, and have their behavior slots filled from
//!    templates.
//!
//! # Verb to method mapping
//!
//! | Permitted verb | Resource methods | Collection methods |
//! |----------------|------------------|--------------------|
//! | `list` or `get` | `GET` | `GET` |
//! | `delete` | `DELETE` | |
//! | `update` | `PUT` | |
//! | `create` | | `POST` |
//!
//! `list` and `get` both grant read at both levels.
//!
//! Derived methods are appended to the catalog's method lists only when not
//! already listed, so a catalog entry that presets `GET` does not end up
//! with it twice. Appending unconditionally would duplicate it.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::access::{AccessSet, PermissionResolver, UserInfo};
use crate::catalog::{CatalogHandle, CatalogSnapshot};
use crate::error::ComposeError;
use crate::registry::{builtin_schemas, SchemaRegistry};
use crate::template::TemplateRegistry;
use crate::types::{
    Method, ResourceSchema, VerbAccess, VERB_CREATE, VERB_DELETE, VERB_GET, VERB_LIST,
    VERB_UPDATE,
};

/// Compose the registry `access` may see.
///
/// The snapshot and templates are only read; every adapted schema is a
/// clone. Registry assembly failures abort the whole composition.
///
/// # Errors
///
/// Returns `ComposeError` if the builtin or base schemas cannot be added or
/// a catalog schema collides with one already in the registry.
#[instrument(skip_all, fields(version = snapshot.version()))]
pub fn compose(
    snapshot: &CatalogSnapshot,
    templates: &TemplateRegistry,
    access: &dyn AccessSet,
) -> Result<SchemaRegistry, ComposeError> {
    let mut registry = SchemaRegistry::new(&builtin_schemas())
        .map_err(|source| ComposeError::Builtins { source })?;

    registry
        .add_schemas(snapshot.base_schemas().iter().cloned())
        .map_err(|source| ComposeError::BaseSchemas { source })?;

    let mut omitted = 0usize;
    for schema in snapshot.schemas() {
        let adapted = if schema.is_meta() {
            schema.clone()
        } else {
            let verb_access = verb_access_for(schema, access);
            if verb_access.is_empty() {
                debug!(schema = %schema.id, "no permitted verbs, omitting schema");
                omitted += 1;
                continue;
            }
            adapt_schema(schema, verb_access, templates)
        };

        registry
            .add_schema(adapted)
            .map_err(|source| ComposeError::Insert {
                id: schema.id.clone(),
                source,
            })?;
    }

    debug!(
        schemas = registry.len(),
        omitted, "composed caller schema registry"
    );
    Ok(registry)
}

/// Collect grants for each verb `schema` supports, keeping permitted verbs only.
pub fn verb_access_for(schema: &ResourceSchema, access: &dyn AccessSet) -> VerbAccess {
    let gr = schema.group_resource();
    let mut verb_access = VerbAccess::new();
    for verb in &schema.verbs {
        verb_access.insert(verb.clone(), access.access_list_for(verb, &gr));
    }
    verb_access
}

/// Clone `schema` and apply the caller's view to the clone.
fn adapt_schema(
    schema: &ResourceSchema,
    verb_access: VerbAccess,
    templates: &TemplateRegistry,
) -> ResourceSchema {
    let mut adapted = schema.clone();
    let (resource_methods, collection_methods) = derive_methods(&verb_access);
    append_methods(&mut adapted.resource_methods, &resource_methods);
    append_methods(&mut adapted.collection_methods, &collection_methods);
    adapted.access = verb_access;
    templates.apply(&mut adapted);
    adapted
}

/// Methods permitted verbs allow, as `(resource, collection)`.
///
/// Each rule is independent; the result depends only on `verb_access`.
pub fn derive_methods(verb_access: &VerbAccess) -> (Vec<Method>, Vec<Method>) {
    let mut resource = Vec::new();
    let mut collection = Vec::new();

    if verb_access.any_verb(&[VERB_LIST, VERB_GET]) {
        resource.push(Method::Get);
        collection.push(Method::Get);
    }
    if verb_access.any_verb(&[VERB_DELETE]) {
        resource.push(Method::Delete);
    }
    if verb_access.any_verb(&[VERB_UPDATE]) {
        resource.push(Method::Put);
    }
    if verb_access.any_verb(&[VERB_CREATE]) {
        collection.push(Method::Post);
    }

    (resource, collection)
}

fn append_methods(methods: &mut Vec<Method>, extra: &[Method]) {
    for method in extra {
        if !methods.contains(method) {
            methods.push(*method);
        }
    }
}

/// Catalog, templates and permission resolver for serving many callers.
///
/// Cheap to clone; clones share the catalog publication slot.
#[derive(Clone)]
pub struct Collection {
    catalog: CatalogHandle,
    templates: Arc<TemplateRegistry>,
    resolver: Arc<dyn PermissionResolver>,
}

impl Collection {
    pub fn new(
        catalog: CatalogHandle,
        templates: Arc<TemplateRegistry>,
        resolver: Arc<dyn PermissionResolver>,
    ) -> Self {
        Self {
            catalog,
            templates,
            resolver,
        }
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Registry for `user` against the current catalog snapshot.
    pub fn schemas(&self, user: &UserInfo) -> Result<SchemaRegistry, ComposeError> {
        let access = self.resolver.access_for(user);
        self.schemas_for_access(access.as_ref())
    }

    /// Registry for an already-resolved access set.
    pub fn schemas_for_access(&self, access: &dyn AccessSet) -> Result<SchemaRegistry, ComposeError> {
        let snapshot = self.catalog.snapshot();
        compose(&snapshot, &self.templates, access)
    }
}
