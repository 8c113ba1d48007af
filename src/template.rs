//! Pluggable schema behaviors and the template fallback chain.
//!
//! A template bundles optional behaviors and is keyed by an exact schema
//! id, by `group/kind`, or by the empty string (global default). Each
//! behavior slot on a schema is resolved independently: the first template
//! in priority order with a value for that slot wins.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LoadError;
use crate::types::{Method, ResourceSchema};

/// Key of the global default template.
pub const DEFAULT_TEMPLATE_KEY: &str = "";

/// Rewrites stored objects into their API representation.
pub trait Mapper: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    fn from_internal(&self, object: &mut Map<String, Value>);
}

/// Decorates API objects for output, given the caller's view of the schema.
pub trait Formatter: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    fn format(&self, schema: &ResourceSchema, object: &mut Map<String, Value>);
}

/// Storage backend serving objects of a schema.
pub trait Store: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    fn list(&self, schema: &ResourceSchema) -> Vec<Value>;
    fn by_id(&self, schema: &ResourceSchema, id: &str) -> Option<Value>;
}

/// Derives `id` from `metadata.namespace` and `metadata.name`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMapper;

impl Mapper for DefaultMapper {
    fn name(&self) -> &str {
        "default"
    }

    fn from_internal(&self, object: &mut Map<String, Value>) {
        let metadata = object.get("metadata");
        let name = metadata
            .and_then(|m| m.get("name"))
            .and_then(|n| n.as_str());
        let namespace = metadata
            .and_then(|m| m.get("namespace"))
            .and_then(|n| n.as_str())
            .filter(|ns| !ns.is_empty());

        let id = match (namespace, name) {
            (Some(ns), Some(name)) => format!("{}/{}", ns, name),
            (None, Some(name)) => name.to_string(),
            _ => return,
        };
        object.insert("id".to_string(), Value::String(id));
    }
}

/// Adds `links` reflecting the methods the caller may use on the object.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinksFormatter;

impl Formatter for LinksFormatter {
    fn name(&self) -> &str {
        "links"
    }

    fn format(&self, schema: &ResourceSchema, object: &mut Map<String, Value>) {
        let Some(id) = object.get("id").and_then(|v| v.as_str()) else {
            return;
        };
        let self_link = format!("/v1/{}/{}", schema.id, id);

        let mut links = Map::new();
        links.insert("self".to_string(), Value::String(self_link.clone()));
        if schema.allows_resource_method(Method::Put) {
            links.insert("update".to_string(), Value::String(self_link.clone()));
        }
        if schema.allows_resource_method(Method::Delete) {
            links.insert("remove".to_string(), Value::String(self_link));
        }
        object.insert("links".to_string(), Value::Object(links));
    }
}

/// In-memory objects keyed by schema id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, schema_id: impl Into<String>, object: Value) {
        self.objects
            .write()
            .entry(schema_id.into())
            .or_default()
            .push(object);
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn list(&self, schema: &ResourceSchema) -> Vec<Value> {
        self.objects
            .read()
            .get(&schema.id)
            .cloned()
            .unwrap_or_default()
    }

    fn by_id(&self, schema: &ResourceSchema, id: &str) -> Option<Value> {
        self.objects.read().get(&schema.id).and_then(|objects| {
            objects
                .iter()
                .find(|o| o.get("id").and_then(|v| v.as_str()) == Some(id))
                .cloned()
        })
    }
}

/// Named behavior instances that template documents may refer to.
///
/// Every template naming the same behavior shares one instance.
#[derive(Debug, Clone, Default)]
pub struct Behaviors {
    mappers: HashMap<String, Arc<dyn Mapper>>,
    formatters: HashMap<String, Arc<dyn Formatter>>,
    stores: HashMap<String, Arc<dyn Store>>,
}

impl Behaviors {
    /// The built-in `default` mapper, `links` formatter and `memory` store.
    pub fn builtin() -> Self {
        Self::default()
            .with_mapper(Arc::new(DefaultMapper))
            .with_formatter(Arc::new(LinksFormatter))
            .with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn Mapper>) -> Self {
        self.mappers.insert(mapper.name().to_string(), mapper);
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatters
            .insert(formatter.name().to_string(), formatter);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.stores.insert(store.name().to_string(), store);
        self
    }

    pub fn mapper(&self, name: &str) -> Option<Arc<dyn Mapper>> {
        self.mappers.get(name).cloned()
    }

    pub fn formatter(&self, name: &str) -> Option<Arc<dyn Formatter>> {
        self.formatters.get(name).cloned()
    }

    pub fn store(&self, name: &str) -> Option<Arc<dyn Store>> {
        self.stores.get(name).cloned()
    }

    pub fn mapper_names(&self) -> Vec<&str> {
        self.mappers.keys().map(String::as_str).collect()
    }

    pub fn formatter_names(&self) -> Vec<&str> {
        self.formatters.keys().map(String::as_str).collect()
    }

    pub fn store_names(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }
}

/// A bundle of optional behaviors applied to schemas matching its key.
#[derive(Debug, Clone, Default)]
pub struct Template {
    pub mapper: Option<Arc<dyn Mapper>>,
    pub formatter: Option<Arc<dyn Formatter>>,
    pub store: Option<Arc<dyn Store>>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn Mapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }
}

/// Template document entry: behavior names per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

/// Template document: key → slot names.
pub type TemplateConfig = BTreeMap<String, TemplateSpec>;

/// Read-only mapping from template key to template.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register `template` under `key`, replacing any previous one.
    pub fn with(mut self, key: impl Into<String>, template: Template) -> Self {
        self.templates.insert(key.into(), template);
        self
    }

    /// Build from a template document, resolving behavior names.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::UnknownBehavior` for a name `behaviors` lacks.
    pub fn from_config(config: &TemplateConfig, behaviors: &Behaviors) -> Result<Self, LoadError> {
        let mut registry = TemplateRegistry::new();
        for (key, spec) in config {
            let unknown = |slot: &str, name: &str| LoadError::UnknownBehavior {
                key: key.clone(),
                slot: slot.to_string(),
                name: name.to_string(),
            };

            let mut template = Template::new();
            if let Some(name) = &spec.mapper {
                template.mapper = Some(behaviors.mapper(name).ok_or_else(|| unknown("mapper", name))?);
            }
            if let Some(name) = &spec.formatter {
                template.formatter =
                    Some(behaviors.formatter(name).ok_or_else(|| unknown("formatter", name))?);
            }
            if let Some(name) = &spec.store {
                template.store = Some(behaviors.store(name).ok_or_else(|| unknown("store", name))?);
            }
            registry.templates.insert(key.clone(), template);
        }
        Ok(registry)
    }

    pub fn lookup(&self, key: &str) -> Option<&Template> {
        self.templates.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Candidate templates for `schema`, highest priority first: exact id,
    /// then `group/kind`, then the global default. Missing keys are skipped.
    pub fn candidates(&self, schema: &ResourceSchema) -> Vec<&Template> {
        [
            schema.id.clone(),
            schema.group_kind_key(),
            DEFAULT_TEMPLATE_KEY.to_string(),
        ]
        .iter()
        .filter_map(|key| self.lookup(key))
        .collect()
    }

    /// Fill the empty behavior slots of `schema`.
    ///
    /// Slots already set are never overwritten. Each slot takes the first
    /// candidate with a value for it; templates are not merged.
    pub fn apply(&self, schema: &mut ResourceSchema) {
        let candidates = self.candidates(schema);

        if schema.mapper.is_none() {
            schema.mapper = candidates.iter().find_map(|t| t.mapper.clone());
        }
        if schema.formatter.is_none() {
            schema.formatter = candidates.iter().find_map(|t| t.formatter.clone());
        }
        if schema.store.is_none() {
            schema.store = candidates.iter().find_map(|t| t.store.clone());
        }
    }
}
