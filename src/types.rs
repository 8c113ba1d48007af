//! Core types for access-controlled schema composition.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::access::AccessList;
use crate::template::{Formatter, Mapper, Store};

pub const VERB_LIST: &str = "list";
pub const VERB_GET: &str = "get";
pub const VERB_CREATE: &str = "create";
pub const VERB_UPDATE: &str = "update";
pub const VERB_DELETE: &str = "delete";

/// Verbs a resource schema may declare. Anything else is flagged by the linter.
pub const KNOWN_VERBS: &[&str] = &[
    "get",
    "list",
    "watch",
    "create",
    "update",
    "patch",
    "delete",
    "deletecollection",
];

/// The (group, resource) pair identifying a category of manageable object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }

    /// Meta schemas carry no resource. The core API group is empty, so
    /// only the resource decides.
    pub fn is_empty(&self) -> bool {
        self.resource.is_empty()
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

/// Transport-level interaction method exposed for a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read a collection or a single resource.
    Get,
    /// Create a resource in a collection.
    Post,
    /// Replace a single resource.
    Put,
    /// Delete a single resource.
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permitted verbs for one caller on one schema, each mapped to the
/// non-empty list of grants that permit it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerbAccess(BTreeMap<String, AccessList>);

impl VerbAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `list` for `verb`. Empty lists mean "no access" and are dropped.
    pub fn insert(&mut self, verb: impl Into<String>, list: AccessList) {
        if !list.is_empty() {
            self.0.insert(verb.into(), list);
        }
    }

    pub fn get(&self, verb: &str) -> Option<&AccessList> {
        self.0.get(verb)
    }

    /// True if any of `verbs` is permitted.
    pub fn any_verb(&self, verbs: &[&str]) -> bool {
        verbs.iter().any(|v| self.0.contains_key(*v))
    }

    pub fn verbs(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One resource kind as served by the gateway.
///
/// Catalog entries are never mutated after publication; per-caller
/// annotations are applied to clones. Behavior slots hold shared
/// immutable trait objects, so cloning a schema never aliases mutable
/// state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSchema {
    pub id: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub namespaced: bool,
    /// Verbs the underlying resource kind supports.
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default)]
    pub collection_methods: Vec<Method>,
    #[serde(default)]
    pub resource_methods: Vec<Method>,
    /// Caller-visible access metadata. Always empty in the catalog, so it
    /// is never read from documents.
    #[serde(default, skip_deserializing, skip_serializing_if = "VerbAccess::is_empty")]
    pub access: VerbAccess,
    #[serde(skip)]
    pub mapper: Option<Arc<dyn Mapper>>,
    #[serde(skip)]
    pub formatter: Option<Arc<dyn Formatter>>,
    #[serde(skip)]
    pub store: Option<Arc<dyn Store>>,
}

impl ResourceSchema {
    /// Create a meta schema with no backing resource kind.
    pub fn meta(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Create a resource schema for `group`/`resource` of the given `kind`.
    pub fn resource(
        id: impl Into<String>,
        group: impl Into<String>,
        kind: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            group: group.into(),
            kind: kind.into(),
            resource: resource.into(),
            ..Default::default()
        }
    }

    /// Builder: set supported verbs.
    pub fn with_verbs(mut self, verbs: &[&str]) -> Self {
        self.verbs = verbs.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(self.group.clone(), self.resource.clone())
    }

    /// Template key of the form `group/kind`.
    pub fn group_kind_key(&self) -> String {
        format!("{}/{}", self.group, self.kind)
    }

    pub fn is_meta(&self) -> bool {
        self.resource.is_empty()
    }

    pub fn allows_resource_method(&self, method: Method) -> bool {
        self.resource_methods.contains(&method)
    }

    pub fn allows_collection_method(&self, method: Method) -> bool {
        self.collection_methods.contains(&method)
    }

    /// Names of the behaviors filling each slot, for display and output.
    pub fn behavior_names(&self) -> BehaviorNames {
        BehaviorNames {
            mapper: self.mapper.as_ref().map(|m| m.name().to_string()),
            formatter: self.formatter.as_ref().map(|f| f.name().to_string()),
            store: self.store.as_ref().map(|s| s.name().to_string()),
        }
    }
}

/// Slot → behavior name summary of a schema's pluggable behaviors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BehaviorNames {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapper: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}
