// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `group.rs`

#[cfg(test)]
mod tests {
    use crate::config::ControllerConfig;
    use crate::ingress::group::{
        all_groups, group_of, groups_of_ingress_event, groups_referencing_service, load, GroupId,
    };
    use crate::labels::{ANNOTATION_GROUP_NAME, ANNOTATION_GROUP_ORDER};
    use k8s_openapi::api::networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
        IngressServiceBackend, IngressSpec, ServiceBackendPort,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct IngressBuilder {
        namespace: String,
        name: String,
        annotations: BTreeMap<String, String>,
        finalizers: Vec<String>,
        class: Option<String>,
        service: Option<String>,
        deleting: bool,
    }

    impl IngressBuilder {
        fn new(namespace: &str, name: &str) -> Self {
            Self {
                namespace: namespace.to_string(),
                name: name.to_string(),
                annotations: BTreeMap::new(),
                finalizers: Vec::new(),
                class: Some("alb".to_string()),
                service: Some("svc".to_string()),
                deleting: false,
            }
        }

        fn group(mut self, group: &str) -> Self {
            self.annotations
                .insert(ANNOTATION_GROUP_NAME.to_string(), group.to_string());
            self
        }

        fn order(mut self, order: i64) -> Self {
            self.annotations
                .insert(ANNOTATION_GROUP_ORDER.to_string(), order.to_string());
            self
        }

        fn finalizer(mut self, finalizer: &str) -> Self {
            self.finalizers.push(finalizer.to_string());
            self
        }

        fn class(mut self, class: Option<&str>) -> Self {
            self.class = class.map(str::to_string);
            self
        }

        fn service(mut self, service: &str) -> Self {
            self.service = Some(service.to_string());
            self
        }

        fn deleting(mut self) -> Self {
            self.deleting = true;
            self
        }

        fn build(self) -> Arc<Ingress> {
            let rules = self.service.map(|service| {
                vec![IngressRule {
                    host: None,
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            backend: IngressBackend {
                                resource: None,
                                service: Some(IngressServiceBackend {
                                    name: service,
                                    port: Some(ServiceBackendPort {
                                        name: None,
                                        number: Some(80),
                                    }),
                                }),
                            },
                            path: Some("/".to_string()),
                            path_type: "Prefix".to_string(),
                        }],
                    }),
                }]
            });
            Arc::new(Ingress {
                metadata: ObjectMeta {
                    namespace: Some(self.namespace),
                    name: Some(self.name),
                    annotations: Some(self.annotations),
                    finalizers: Some(self.finalizers),
                    deletion_timestamp: self.deleting.then(|| Time(k8s_openapi::chrono::Utc::now())),
                    ..Default::default()
                },
                spec: Some(IngressSpec {
                    ingress_class_name: self.class,
                    rules,
                    ..Default::default()
                }),
                status: None,
            })
        }
    }

    fn config() -> ControllerConfig {
        ControllerConfig::default()
    }

    #[test]
    fn test_group_identity_explicit_vs_implicit() {
        let explicit = IngressBuilder::new("default", "a").group("shared").build();
        let implicit = IngressBuilder::new("default", "b").build();

        assert_eq!(
            group_of(&explicit, &config()),
            Some(GroupId::explicit("shared"))
        );
        assert_eq!(
            group_of(&implicit, &config()),
            Some(GroupId::implicit("default", "b"))
        );

        let out_of_scope = IngressBuilder::new("default", "c").class(Some("nginx")).build();
        assert_eq!(group_of(&out_of_scope, &config()), None);
    }

    #[test]
    fn test_finalizer_names() {
        assert_eq!(
            GroupId::explicit("shared").finalizer(),
            "group.alby.firestoned.io/shared"
        );
        assert_eq!(
            GroupId::implicit("default", "b").finalizer(),
            "alby.firestoned.io/resources"
        );
    }

    #[test]
    fn test_load_sorts_members_by_order_then_name() {
        let group = GroupId::explicit("shared");
        let all = vec![
            IngressBuilder::new("default", "zulu").group("shared").build(),
            IngressBuilder::new("default", "alpha").group("shared").build(),
            IngressBuilder::new("aaa", "omega").group("shared").build(),
            IngressBuilder::new("default", "last").group("shared").order(10).build(),
            IngressBuilder::new("default", "first").group("shared").order(-1).build(),
        ];

        let loaded = load(&all, &group, &config()).unwrap();
        let names: Vec<String> = loaded.members.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["first", "omega", "alpha", "zulu", "last"]);
        assert!(loaded.inactive_members.is_empty());
        assert!(!loaded.is_teardown());
    }

    #[test]
    fn test_member_leaving_group_becomes_inactive() {
        let group = GroupId::explicit("shared");
        let finalizer = group.finalizer();
        let all = vec![
            IngressBuilder::new("default", "stays")
                .group("shared")
                .finalizer(&finalizer)
                .build(),
            // Moved to another group, still carries our finalizer
            IngressBuilder::new("default", "moved")
                .group("elsewhere")
                .finalizer(&finalizer)
                .build(),
            // Being deleted; no longer active but still held
            IngressBuilder::new("default", "dying")
                .group("shared")
                .finalizer(&finalizer)
                .deleting()
                .build(),
        ];

        let loaded = load(&all, &group, &config()).unwrap();
        assert_eq!(loaded.members.len(), 1);
        assert_eq!(loaded.members[0].name(), "stays");

        let mut inactive: Vec<String> = loaded
            .inactive_members
            .iter()
            .map(|i| i.metadata.name.clone().unwrap())
            .collect();
        inactive.sort();
        assert_eq!(inactive, vec!["dying", "moved"]);
    }

    #[test]
    fn test_empty_active_set_is_teardown() {
        let group = GroupId::explicit("shared");
        let finalizer = group.finalizer();
        let all = vec![IngressBuilder::new("default", "gone")
            .group("shared")
            .finalizer(&finalizer)
            .deleting()
            .build()];

        let loaded = load(&all, &group, &config()).unwrap();
        assert!(loaded.is_teardown());
        assert_eq!(loaded.inactive_members.len(), 1);
    }

    #[test]
    fn test_implicit_finalizer_only_binds_its_own_ingress() {
        let group = GroupId::implicit("default", "mine");
        let all = vec![
            // Same finalizer string on an unrelated ingress
            IngressBuilder::new("default", "other")
                .class(Some("nginx"))
                .finalizer("alby.firestoned.io/resources")
                .build(),
        ];
        let loaded = load(&all, &group, &config()).unwrap();
        assert!(loaded.members.is_empty());
        assert!(loaded.inactive_members.is_empty());
    }

    #[test]
    fn test_invalid_order_annotation_is_validation_error() {
        let group = GroupId::explicit("shared");
        let all = vec![IngressBuilder::new("default", "bad")
            .group("shared")
            .order(0)
            .build()];
        // Overwrite with a non-integer value
        let mut ingress = (*all[0]).clone();
        ingress
            .metadata
            .annotations
            .as_mut()
            .unwrap()
            .insert(ANNOTATION_GROUP_ORDER.to_string(), "first".to_string());

        let err = load(&[Arc::new(ingress)], &group, &config()).unwrap_err();
        assert!(err.to_string().contains("group.order"));
    }

    #[test]
    fn test_reverse_index_by_service() {
        let all = vec![
            IngressBuilder::new("default", "a").group("shared").service("svc-a").build(),
            IngressBuilder::new("default", "b").service("svc-b").build(),
            IngressBuilder::new("other", "c").service("svc-a").build(),
        ];

        let groups = groups_referencing_service(&all, "default", "svc-a", &config());
        assert_eq!(
            groups.into_iter().collect::<Vec<_>>(),
            vec![GroupId::explicit("shared")]
        );

        let groups = groups_referencing_service(&all, "default", "svc-b", &config());
        assert_eq!(
            groups.into_iter().collect::<Vec<_>>(),
            vec![GroupId::implicit("default", "b")]
        );

        assert!(groups_referencing_service(&all, "default", "svc-x", &config()).is_empty());
    }

    #[test]
    fn test_ingress_event_maps_to_current_and_finalizer_groups() {
        let ingress = IngressBuilder::new("default", "mover")
            .group("new-home")
            .finalizer("group.alby.firestoned.io/old-home")
            .build();

        let groups = groups_of_ingress_event(&ingress, &config());
        assert!(groups.contains(&GroupId::explicit("new-home")));
        assert!(groups.contains(&GroupId::explicit("old-home")));
    }

    #[test]
    fn test_all_groups_includes_finalizer_holders() {
        let all = vec![
            IngressBuilder::new("default", "a").group("shared").build(),
            IngressBuilder::new("default", "b").build(),
            IngressBuilder::new("default", "c")
                .class(Some("nginx"))
                .finalizer("group.alby.firestoned.io/orphaned")
                .build(),
        ];

        let groups = all_groups(&all, &config());
        assert!(groups.contains(&GroupId::explicit("shared")));
        assert!(groups.contains(&GroupId::implicit("default", "b")));
        assert!(groups.contains(&GroupId::explicit("orphaned")));
    }
}
