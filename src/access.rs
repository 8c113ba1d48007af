//! Caller access sets.
//!
//! Turning an identity into permissions is someone else's job; this module
//! only defines the query interface the composer consumes, plus a static,
//! grant-list implementation used by the CLI and tests.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::GroupResource;

/// Matches any verb, group, resource, namespace or resource name.
pub const WILDCARD: &str = "*";

/// A single access grant entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    pub namespace: String,
    pub resource_name: String,
}

impl Access {
    pub fn new(namespace: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            resource_name: resource_name.into(),
        }
    }

    /// Access to every object in every namespace.
    pub fn all() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }
}

/// Ordered grants permitting one verb on one resource kind.
///
/// Opaque to the composer beyond emptiness: an empty list means no access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessList(Vec<Access>);

impl AccessList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless an identical entry is already present.
    pub fn push(&mut self, access: Access) {
        if !self.0.contains(&access) {
            self.0.push(access);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Access> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Access>> for AccessList {
    fn from(entries: Vec<Access>) -> Self {
        let mut list = AccessList::new();
        for access in entries {
            list.push(access);
        }
        list
    }
}

/// Answers "which grants apply to verb V on resource kind R" for one caller.
pub trait AccessSet: Send + Sync {
    /// Grants permitting `verb` on `gr`. Empty means no access; there is no
    /// error case.
    fn access_list_for(&self, verb: &str, gr: &GroupResource) -> AccessList;
}

/// A grant rule: the verbs allowed on a group/resource, optionally limited
/// to namespaces and resource names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub verbs: Vec<String>,
    #[serde(default)]
    pub group: String,
    pub resource: String,
    /// Empty means every namespace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    /// Empty means every object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
}

impl Grant {
    pub fn new(verbs: &[&str], group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            verbs: verbs.iter().map(|v| v.to_string()).collect(),
            group: group.into(),
            resource: resource.into(),
            namespaces: Vec::new(),
            resource_names: Vec::new(),
        }
    }

    /// Builder: restrict the grant to the given namespaces.
    pub fn in_namespaces(mut self, namespaces: &[&str]) -> Self {
        self.namespaces = namespaces.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Builder: restrict the grant to the given object names.
    pub fn for_names(mut self, names: &[&str]) -> Self {
        self.resource_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    fn matches(&self, verb: &str, gr: &GroupResource) -> bool {
        self.verbs.iter().any(|v| v == WILDCARD || v == verb)
            && (self.group == WILDCARD || self.group == gr.group)
            && (self.resource == WILDCARD || self.resource == gr.resource)
    }

    fn entries(&self) -> impl Iterator<Item = Access> + '_ {
        let namespaces = scope_or_wildcard(&self.namespaces);
        let names = scope_or_wildcard(&self.resource_names);
        namespaces.into_iter().flat_map(move |ns| {
            names
                .clone()
                .into_iter()
                .map(move |name| Access::new(ns.clone(), name))
        })
    }
}

fn scope_or_wildcard(values: &[String]) -> Vec<String> {
    if values.is_empty() {
        vec![WILDCARD.to_string()]
    } else {
        values.to_vec()
    }
}

/// Access set backed by a flat list of grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantAccessSet {
    pub grants: Vec<Grant>,
}

impl GrantAccessSet {
    pub fn new(grants: Vec<Grant>) -> Self {
        Self { grants }
    }

    /// Access set that permits nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl AccessSet for GrantAccessSet {
    fn access_list_for(&self, verb: &str, gr: &GroupResource) -> AccessList {
        let mut list = AccessList::new();
        for grant in self.grants.iter().filter(|g| g.matches(verb, gr)) {
            for access in grant.entries() {
                list.push(access);
            }
        }
        list
    }
}

/// Authenticated caller identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub groups: Vec<String>,
}

impl UserInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }
}

/// Computes a caller's access set from their identity.
pub trait PermissionResolver: Send + Sync {
    fn access_for(&self, user: &UserInfo) -> Arc<dyn AccessSet>;
}

/// Resolver with fixed grants per user name and per group name.
///
/// A caller receives the union of their own grants and those of every
/// group they belong to.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    users: HashMap<String, Vec<Grant>>,
    groups: HashMap<String, Vec<Grant>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_grants(mut self, user: impl Into<String>, grants: Vec<Grant>) -> Self {
        self.users.entry(user.into()).or_default().extend(grants);
        self
    }

    pub fn with_group_grants(mut self, group: impl Into<String>, grants: Vec<Grant>) -> Self {
        self.groups.entry(group.into()).or_default().extend(grants);
        self
    }
}

impl PermissionResolver for StaticResolver {
    fn access_for(&self, user: &UserInfo) -> Arc<dyn AccessSet> {
        let mut grants = self.users.get(&user.name).cloned().unwrap_or_default();
        for group in &user.groups {
            if let Some(group_grants) = self.groups.get(group) {
                grants.extend(group_grants.iter().cloned());
            }
        }
        Arc::new(GrantAccessSet::new(grants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployments() -> GroupResource {
        GroupResource::new("apps", "deployments")
    }

    #[test]
    fn exact_grant_matches() {
        let set = GrantAccessSet::new(vec![Grant::new(&["get"], "apps", "deployments")]);
        let list = set.access_list_for("get", &deployments());
        assert_eq!(list, AccessList::from(vec![Access::all()]));
        assert!(set.access_list_for("list", &deployments()).is_empty());
        assert!(set
            .access_list_for("get", &GroupResource::new("batch", "jobs"))
            .is_empty());
    }

    #[test]
    fn wildcards_match_any_verb_group_resource() {
        let set = GrantAccessSet::new(vec![Grant::new(&["*"], "*", "*")]);
        assert!(!set.access_list_for("delete", &deployments()).is_empty());
        assert!(!set
            .access_list_for("list", &GroupResource::new("", "pods"))
            .is_empty());
    }

    #[test]
    fn scoped_grants_expand_to_entries() {
        let set = GrantAccessSet::new(vec![Grant::new(&["get"], "apps", "deployments")
            .in_namespaces(&["dev", "prod"])
            .for_names(&["web"])]);
        let list = set.access_list_for("get", &deployments());
        let entries: Vec<&Access> = list.iter().collect();
        assert_eq!(
            entries,
            vec![&Access::new("dev", "web"), &Access::new("prod", "web")]
        );
    }

    #[test]
    fn overlapping_grants_are_deduplicated() {
        let set = GrantAccessSet::new(vec![
            Grant::new(&["get", "list"], "apps", "deployments"),
            Grant::new(&["get"], "apps", "*"),
        ]);
        assert_eq!(set.access_list_for("get", &deployments()).len(), 1);
    }

    #[test]
    fn empty_set_permits_nothing() {
        let set = GrantAccessSet::empty();
        assert!(set.access_list_for("get", &deployments()).is_empty());
    }

    #[test]
    fn static_resolver_unions_user_and_group_grants() {
        let resolver = StaticResolver::new()
            .with_user_grants("alice", vec![Grant::new(&["get"], "apps", "deployments")])
            .with_group_grants("ops", vec![Grant::new(&["delete"], "apps", "deployments")]);

        let alice = UserInfo::new("alice").with_groups(&["ops"]);
        let access = resolver.access_for(&alice);
        assert!(!access.access_list_for("get", &deployments()).is_empty());
        assert!(!access.access_list_for("delete", &deployments()).is_empty());

        let bob = UserInfo::new("bob");
        let access = resolver.access_for(&bob);
        assert!(access.access_list_for("get", &deployments()).is_empty());
    }

    #[test]
    fn grant_deserializes_camel_case() {
        let grant: Grant = serde_json::from_str(
            r#"{"verbs":["get"],"group":"apps","resource":"deployments","resourceNames":["web"]}"#,
        )
        .unwrap();
        assert_eq!(grant.resource_names, vec!["web".to_string()]);
        assert!(grant.namespaces.is_empty());
    }
}
