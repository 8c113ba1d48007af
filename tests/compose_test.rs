//! Integration tests for per-caller schema composition.

use std::sync::Arc;
use std::thread;

use access_schemas::{
    compose, Access, AccessList, AccessSet, CatalogDocument, CatalogHandle, CatalogSnapshot,
    Collection, Formatter, Grant, GrantAccessSet, GroupResource, Mapper, Method, ResourceSchema,
    SchemaRegistry, StaticResolver, Store, Template, TemplateRegistry, UserInfo,
};
use serde_json::{Map, Value};

const ALL_VERBS: &[&str] = &["list", "get", "create", "update", "delete"];

fn deployment() -> ResourceSchema {
    ResourceSchema::resource("apps.deployment", "apps", "Deployment", "deployments")
        .with_verbs(ALL_VERBS)
}

fn job() -> ResourceSchema {
    ResourceSchema::resource("batch.job", "batch", "Job", "jobs").with_verbs(ALL_VERBS)
}

fn pod() -> ResourceSchema {
    ResourceSchema::resource("pod", "", "Pod", "pods").with_verbs(ALL_VERBS)
}

fn catalog() -> CatalogSnapshot {
    CatalogSnapshot::new(
        1,
        vec![ResourceSchema::meta("apiRoot")],
        vec![
            ResourceSchema::meta("subscribe"),
            deployment(),
            job(),
            pod(),
        ],
    )
}

fn grants(grants: Vec<Grant>) -> GrantAccessSet {
    GrantAccessSet::new(grants)
}

/// Comparable summary of a registry: ids, verbs, methods and behaviors.
fn summary(registry: &SchemaRegistry) -> Vec<(String, Vec<String>, Vec<Method>, Vec<Method>, String)> {
    registry
        .iter()
        .map(|s| {
            (
                s.id.clone(),
                s.access.verbs().map(String::from).collect(),
                s.resource_methods.clone(),
                s.collection_methods.clone(),
                format!("{:?}", s.behavior_names()),
            )
        })
        .collect()
}

#[derive(Debug)]
struct Named(&'static str);

impl Mapper for Named {
    fn name(&self) -> &str {
        self.0
    }
    fn from_internal(&self, _object: &mut Map<String, Value>) {}
}

impl Formatter for Named {
    fn name(&self) -> &str {
        self.0
    }
    fn format(&self, _schema: &ResourceSchema, _object: &mut Map<String, Value>) {}
}

impl Store for Named {
    fn name(&self) -> &str {
        self.0
    }
    fn list(&self, _schema: &ResourceSchema) -> Vec<Value> {
        Vec::new()
    }
    fn by_id(&self, _schema: &ResourceSchema, _id: &str) -> Option<Value> {
        None
    }
}

// === Filtering ===

mod filtering {
    use super::*;

    #[test]
    fn get_only_on_deployment() {
        let access = grants(vec![Grant::new(&["get"], "apps", "deployments")]);
        let registry = compose(&catalog(), &TemplateRegistry::new(), &access).unwrap();

        let schema = registry.get("apps.deployment").unwrap();
        assert_eq!(schema.resource_methods, vec![Method::Get]);
        assert_eq!(schema.collection_methods, vec![Method::Get]);
        assert_eq!(schema.access.verbs().collect::<Vec<_>>(), vec!["get"]);
        assert!(!schema.allows_resource_method(Method::Delete));
        assert!(!schema.allows_resource_method(Method::Put));
        assert!(!schema.allows_collection_method(Method::Post));
    }

    #[test]
    fn no_permission_omits_schema() {
        let access = grants(vec![Grant::new(&["get"], "apps", "deployments")]);
        let registry = compose(&catalog(), &TemplateRegistry::new(), &access).unwrap();
        assert!(registry.get("batch.job").is_none());
        assert!(registry.get("pod").is_none());
    }

    #[test]
    fn meta_schemas_always_present() {
        let registry =
            compose(&catalog(), &TemplateRegistry::new(), &GrantAccessSet::empty()).unwrap();
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(ids, vec!["schema", "error", "collection", "apiRoot", "subscribe"]);
    }

    #[test]
    fn catalog_cannot_preset_meta_access() {
        let document: CatalogDocument = serde_json::from_value(serde_json::json!({
            "schemas": [{
                "id": "subscribe",
                "access": { "delete": [{ "namespace": "*", "resourceName": "*" }] }
            }]
        }))
        .unwrap();
        let snapshot = CatalogSnapshot::from_document(1, document);
        let registry =
            compose(&snapshot, &TemplateRegistry::new(), &GrantAccessSet::empty()).unwrap();

        assert!(registry.get("subscribe").unwrap().access.is_empty());
        let view = registry.to_json().unwrap();
        assert!(view.as_array().unwrap().iter().all(|s| s.get("access").is_none()));
    }

    #[test]
    fn core_group_resource_is_filtered() {
        let access = grants(vec![Grant::new(&["list"], "", "pods")]);
        let registry = compose(&catalog(), &TemplateRegistry::new(), &access).unwrap();
        let schema = registry.get("pod").unwrap();
        assert_eq!(schema.access.verbs().collect::<Vec<_>>(), vec!["list"]);
    }

    #[test]
    fn presence_iff_some_verb_permitted() {
        let cases: Vec<(Vec<Grant>, &str, bool)> = vec![
            (vec![], "batch.job", false),
            (vec![Grant::new(&["delete"], "batch", "jobs")], "batch.job", true),
            (vec![Grant::new(&["watch"], "batch", "jobs")], "batch.job", false),
            (vec![Grant::new(&["get"], "batch", "cronjobs")], "batch.job", false),
            (vec![Grant::new(&["*"], "*", "*")], "batch.job", true),
        ];
        for (grant_list, id, expected) in cases {
            let access = grants(grant_list.clone());
            let registry = compose(&catalog(), &TemplateRegistry::new(), &access).unwrap();
            assert_eq!(
                registry.contains(id),
                expected,
                "grants {:?} on {}",
                grant_list,
                id
            );
        }
    }

    #[test]
    fn full_access_gets_every_method() {
        let access = grants(vec![Grant::new(&["*"], "apps", "deployments")]);
        let registry = compose(&catalog(), &TemplateRegistry::new(), &access).unwrap();
        let schema = registry.get("apps.deployment").unwrap();
        assert_eq!(
            schema.resource_methods,
            vec![Method::Get, Method::Delete, Method::Put]
        );
        assert_eq!(schema.collection_methods, vec![Method::Get, Method::Post]);
        assert_eq!(schema.access.len(), 5);
    }

    #[test]
    fn access_map_keeps_grant_entries() {
        let access = grants(vec![
            Grant::new(&["get"], "apps", "deployments").in_namespaces(&["dev"])
        ]);
        let registry = compose(&catalog(), &TemplateRegistry::new(), &access).unwrap();
        let list = registry.get("apps.deployment").unwrap().access.get("get").unwrap();
        assert_eq!(list, &AccessList::from(vec![Access::new("dev", "*")]));
    }

    // list alone grants single-resource read too; pinned until tightened.
    #[test]
    fn list_only_grants_resource_read() {
        let access = grants(vec![Grant::new(&["list"], "apps", "deployments")]);
        let registry = compose(&catalog(), &TemplateRegistry::new(), &access).unwrap();
        let schema = registry.get("apps.deployment").unwrap();
        assert_eq!(schema.resource_methods, vec![Method::Get]);
        assert_eq!(schema.collection_methods, vec![Method::Get]);
    }

    #[test]
    fn unsupported_verbs_are_not_queried() {
        struct Recording;
        impl AccessSet for Recording {
            fn access_list_for(&self, verb: &str, _gr: &GroupResource) -> AccessList {
                assert_ne!(verb, "patch", "queried a verb the schema does not support");
                AccessList::from(vec![Access::all()])
            }
        }

        let snapshot = CatalogSnapshot::new(
            1,
            vec![],
            vec![ResourceSchema::resource("pod", "", "Pod", "pods").with_verbs(&["get"])],
        );
        let registry = compose(&snapshot, &TemplateRegistry::new(), &Recording).unwrap();
        assert!(registry.contains("pod"));
    }
}

// === Isolation and idempotence ===

mod isolation {
    use super::*;

    #[test]
    fn composing_twice_is_identical() {
        let snapshot = catalog();
        let access = grants(vec![Grant::new(&["get", "delete"], "apps", "deployments")]);
        let first = compose(&snapshot, &TemplateRegistry::new(), &access).unwrap();
        let second = compose(&snapshot, &TemplateRegistry::new(), &access).unwrap();
        assert_eq!(summary(&first), summary(&second));
        assert_eq!(
            first.get("apps.deployment").unwrap().resource_methods,
            vec![Method::Get, Method::Delete]
        );
    }

    #[test]
    fn catalog_is_not_mutated() {
        let snapshot = catalog();
        let templates = TemplateRegistry::new()
            .with("", Template::new().with_mapper(Arc::new(Named("global"))));
        let access = grants(vec![Grant::new(&["*"], "*", "*")]);
        compose(&snapshot, &templates, &access).unwrap();

        let original = snapshot.get("apps.deployment").unwrap();
        assert!(original.resource_methods.is_empty());
        assert!(original.collection_methods.is_empty());
        assert!(original.access.is_empty());
        assert!(original.mapper.is_none());
    }

    #[test]
    fn other_callers_do_not_interfere() {
        let snapshot = catalog();
        let templates = TemplateRegistry::new();
        let reader = grants(vec![Grant::new(&["get"], "apps", "deployments")]);
        let admin = grants(vec![Grant::new(&["*"], "*", "*")]);

        let before = summary(&compose(&snapshot, &templates, &reader).unwrap());
        let admin_view = summary(&compose(&snapshot, &templates, &admin).unwrap());
        let after = summary(&compose(&snapshot, &templates, &reader).unwrap());

        assert_eq!(before, after);
        assert_ne!(before, admin_view);
    }

    #[test]
    fn concurrent_callers_see_their_own_view() {
        let snapshot = Arc::new(catalog());
        let templates = Arc::new(
            TemplateRegistry::new()
                .with("apps/Deployment", Template::new().with_mapper(Arc::new(Named("gk")))),
        );
        let reader = Arc::new(grants(vec![Grant::new(&["get"], "apps", "deployments")]));
        let admin = Arc::new(grants(vec![Grant::new(&["*"], "*", "*")]));

        let expected_reader = summary(&compose(&snapshot, &templates, reader.as_ref()).unwrap());
        let expected_admin = summary(&compose(&snapshot, &templates, admin.as_ref()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let snapshot = Arc::clone(&snapshot);
                let templates = Arc::clone(&templates);
                let access = if i % 2 == 0 {
                    Arc::clone(&reader)
                } else {
                    Arc::clone(&admin)
                };
                thread::spawn(move || {
                    (0..50)
                        .map(|_| summary(&compose(&snapshot, &templates, access.as_ref()).unwrap()))
                        .last()
                        .unwrap()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let view = handle.join().unwrap();
            if i % 2 == 0 {
                assert_eq!(view, expected_reader);
            } else {
                assert_eq!(view, expected_admin);
            }
        }
        assert!(snapshot.get("apps.deployment").unwrap().mapper.is_none());
    }

    #[test]
    fn preset_catalog_methods_are_not_duplicated() {
        let mut schema = deployment();
        schema.collection_methods = vec![Method::Get];
        let snapshot = CatalogSnapshot::new(1, vec![], vec![schema]);
        let access = grants(vec![Grant::new(&["get", "create"], "apps", "deployments")]);

        let registry = compose(&snapshot, &TemplateRegistry::new(), &access).unwrap();
        assert_eq!(
            registry.get("apps.deployment").unwrap().collection_methods,
            vec![Method::Get, Method::Post]
        );
    }
}

// === Template resolution ===

mod templates {
    use super::*;

    fn compose_with(templates: &TemplateRegistry) -> SchemaRegistry {
        let access = grants(vec![Grant::new(&["*"], "*", "*")]);
        compose(&catalog(), templates, &access).unwrap()
    }

    #[test]
    fn group_kind_beats_global_default() {
        let templates = TemplateRegistry::new()
            .with("", Template::new().with_mapper(Arc::new(Named("global"))))
            .with("apps/Deployment", Template::new().with_mapper(Arc::new(Named("gk"))));

        let registry = compose_with(&templates);
        let names = registry.get("apps.deployment").unwrap().behavior_names();
        assert_eq!(names.mapper.as_deref(), Some("gk"));

        let names = registry.get("batch.job").unwrap().behavior_names();
        assert_eq!(names.mapper.as_deref(), Some("global"));
    }

    #[test]
    fn partial_templates_compose_per_slot() {
        let templates = TemplateRegistry::new()
            .with(
                "",
                Template::new()
                    .with_mapper(Arc::new(Named("global-mapper")))
                    .with_formatter(Arc::new(Named("global-formatter")))
                    .with_store(Arc::new(Named("global-store"))),
            )
            .with(
                "apps/Deployment",
                Template::new().with_formatter(Arc::new(Named("gk-formatter"))),
            )
            .with(
                "apps.deployment",
                Template::new().with_mapper(Arc::new(Named("exact-mapper"))),
            );

        let registry = compose_with(&templates);
        let names = registry.get("apps.deployment").unwrap().behavior_names();
        assert_eq!(names.mapper.as_deref(), Some("exact-mapper"));
        assert_eq!(names.formatter.as_deref(), Some("gk-formatter"));
        assert_eq!(names.store.as_deref(), Some("global-store"));
    }

    #[test]
    fn meta_schemas_are_not_templated() {
        let templates = TemplateRegistry::new()
            .with("", Template::new().with_mapper(Arc::new(Named("global"))));
        let registry = compose_with(&templates);
        assert!(registry.get("subscribe").unwrap().mapper.is_none());
        assert_eq!(registry.mapper_for(registry.get("subscribe").unwrap()).name(), "default");
    }
}

// === Collection ===

mod collection {
    use super::*;

    fn collection() -> Collection {
        let resolver = StaticResolver::new()
            .with_user_grants("alice", vec![Grant::new(&["get"], "apps", "deployments")])
            .with_group_grants("batch-admins", vec![Grant::new(&["*"], "batch", "jobs")]);
        let document = CatalogDocument {
            base: vec![],
            schemas: vec![deployment(), job()],
        };
        let handle = CatalogHandle::new(CatalogSnapshot::from_document(1, document));
        Collection::new(handle, Arc::new(TemplateRegistry::new()), Arc::new(resolver))
    }

    #[test]
    fn schemas_for_user_follow_resolver() {
        let collection = collection();

        let alice = collection.schemas(&UserInfo::new("alice")).unwrap();
        assert!(alice.contains("apps.deployment"));
        assert!(!alice.contains("batch.job"));

        let bob = collection
            .schemas(&UserInfo::new("bob").with_groups(&["batch-admins"]))
            .unwrap();
        assert!(!bob.contains("apps.deployment"));
        assert!(bob.contains("batch.job"));
    }

    #[test]
    fn refresh_is_seen_by_later_compositions() {
        let collection = collection();
        let alice = UserInfo::new("alice");
        assert!(collection.schemas(&alice).unwrap().contains("apps.deployment"));

        collection.catalog().publish(CatalogDocument {
            base: vec![],
            schemas: vec![job()],
        });

        let registry = collection.schemas(&alice).unwrap();
        assert!(!registry.contains("apps.deployment"));
        assert_eq!(collection.catalog().snapshot().version(), 2);
    }

    #[test]
    fn concurrent_refresh_keeps_views_consistent() {
        let collection = collection();
        let admin = GrantAccessSet::new(vec![Grant::new(&["*"], "*", "*")]);

        let publisher = {
            let collection = collection.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    let schemas = if i % 2 == 0 { vec![job()] } else { vec![deployment(), job()] };
                    collection.catalog().publish(CatalogDocument {
                        base: vec![],
                        schemas,
                    });
                }
            })
        };

        for _ in 0..100 {
            let registry = collection.schemas_for_access(&admin).unwrap();
            assert!(registry.contains("batch.job"));
            let resource_schemas = registry.iter().filter(|s| !s.is_meta()).count();
            assert!(resource_schemas == 1 || resource_schemas == 2);
        }

        publisher.join().unwrap();
    }
}
