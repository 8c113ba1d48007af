//! Per-caller schema registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::RegistryError;
use crate::template::{DefaultMapper, Mapper};
use crate::types::ResourceSchema;

/// Ids of the builtin meta schemas every registry starts with.
pub const BUILTIN_SCHEMA_IDS: &[&str] = &["schema", "error", "collection"];

/// The builtin meta schemas: no resource kind, no access filtering.
pub fn builtin_schemas() -> Vec<ResourceSchema> {
    BUILTIN_SCHEMA_IDS
        .iter()
        .map(|id| ResourceSchema::meta(*id))
        .collect()
}

/// An ordered collection of schemas with unique ids.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<ResourceSchema>,
    index: HashMap<String, usize>,
    default_mapper: Arc<dyn Mapper>,
}

impl SchemaRegistry {
    /// Create a registry holding `builtins`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if any builtin is invalid or duplicated.
    pub fn new(builtins: &[ResourceSchema]) -> Result<Self, RegistryError> {
        let mut registry = Self {
            schemas: Vec::new(),
            index: HashMap::new(),
            default_mapper: Arc::new(DefaultMapper),
        };
        registry.add_schemas(builtins.iter().cloned())?;
        Ok(registry)
    }

    /// Insert one schema.
    ///
    /// # Errors
    ///
    /// `InvalidSchema` for an empty id, `DuplicateSchema` if the id is taken.
    pub fn add_schema(&mut self, schema: ResourceSchema) -> Result<(), RegistryError> {
        if schema.id.is_empty() {
            return Err(RegistryError::InvalidSchema {
                id: schema.id,
                message: "schema id must not be empty".to_string(),
            });
        }
        if self.index.contains_key(&schema.id) {
            return Err(RegistryError::DuplicateSchema { id: schema.id });
        }
        self.index.insert(schema.id.clone(), self.schemas.len());
        self.schemas.push(schema);
        Ok(())
    }

    /// Insert schemas in order, stopping at the first failure.
    ///
    /// Returns the number of schemas inserted.
    pub fn add_schemas(
        &mut self,
        schemas: impl IntoIterator<Item = ResourceSchema>,
    ) -> Result<usize, RegistryError> {
        let mut count = 0;
        for schema in schemas {
            self.add_schema(schema)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn get(&self, id: &str) -> Option<&ResourceSchema> {
        self.index.get(id).map(|&i| &self.schemas[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Schemas in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceSchema> {
        self.schemas.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|s| s.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registry-wide mapper for schemas whose mapper slot stayed empty.
    pub fn default_mapper(&self) -> &Arc<dyn Mapper> {
        &self.default_mapper
    }

    /// Mapper effective for `schema`: its own, else the registry default.
    pub fn mapper_for<'a>(&'a self, schema: &'a ResourceSchema) -> &'a Arc<dyn Mapper> {
        schema.mapper.as_ref().unwrap_or(&self.default_mapper)
    }

    /// JSON view of the registry: each schema plus its behavior names.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if a schema cannot be rendered.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        let schemas = self
            .schemas
            .iter()
            .map(|schema| -> Result<Value, serde_json::Error> {
                let mut view = match serde_json::to_value(schema)? {
                    Value::Object(map) => map,
                    other => {
                        return Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                            "schema '{}' rendered as {} instead of an object",
                            schema.id, other
                        )))
                    }
                };
                let names = schema.behavior_names();
                if names != Default::default() {
                    view.insert("behaviors".to_string(), serde_json::to_value(&names)?);
                }
                Ok(Value::Object(view))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(schemas))
    }
}
