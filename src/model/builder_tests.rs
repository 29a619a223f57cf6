// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the desired-state builder.

#[cfg(test)]
mod tests {
    use crate::annotations::IngressAnnotations;
    use crate::aws::types::{Condition, Protocol, RulePriority, Scheme, TargetType};
    use crate::errors::ReconcileError;
    use crate::ingress::group::{GroupId, Member};
    use crate::model::builder::{
        build_stack, merge_lb_attributes, BuildContext, MemberConfig, ResolvedLbConfig,
    };
    use crate::model::{Resource, ResourceKind, RuleTarget, SecurityGroupAttachment, Stack};
    use k8s_openapi::api::networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
        IngressServiceBackend, IngressSpec, ServiceBackendPort,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn backend(service: &str, port: u16) -> IngressBackend {
        IngressBackend {
            resource: None,
            service: Some(IngressServiceBackend {
                name: service.to_string(),
                port: Some(ServiceBackendPort {
                    name: None,
                    number: Some(i32::from(port)),
                }),
            }),
        }
    }

    /// Build an Ingress with `(host, path, service, port)` rules.
    fn make_ingress(
        namespace: &str,
        name: &str,
        rules: &[(Option<&str>, &str, &str, u16)],
    ) -> Arc<Ingress> {
        let ingress_rules = rules
            .iter()
            .map(|(host, path, service, port)| IngressRule {
                host: host.map(str::to_string),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        backend: backend(service, *port),
                        path: Some((*path).to_string()),
                        path_type: "Prefix".to_string(),
                    }],
                }),
            })
            .collect();

        Arc::new(Ingress {
            metadata: ObjectMeta {
                namespace: Some(namespace.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                rules: Some(ingress_rules),
                ..Default::default()
            }),
            status: None,
        })
    }

    fn member_config(ingress: Arc<Ingress>, annotations: IngressAnnotations) -> MemberConfig {
        MemberConfig {
            member: Member { ingress, order: 0 },
            annotations,
        }
    }

    fn internet_facing() -> IngressAnnotations {
        IngressAnnotations {
            scheme: Some(Scheme::InternetFacing),
            subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
            ..Default::default()
        }
    }

    fn resolved_lb() -> ResolvedLbConfig {
        ResolvedLbConfig {
            scheme: Scheme::InternetFacing,
            subnet_ids: vec!["subnet-a".to_string(), "subnet-b".to_string()],
            security_group_ids: Vec::new(),
            tags: BTreeMap::new(),
            wafacl_id: None,
            inbound_cidrs: vec!["0.0.0.0/0".to_string()],
        }
    }

    fn build(configs: &[MemberConfig], lb: &ResolvedLbConfig) -> Result<Stack, ReconcileError> {
        let group = GroupId::implicit("default", "echo");
        let ctx = BuildContext {
            group_id: &group,
            controller_id: "alby",
            vpc_id: "vpc-1",
        };
        build_stack(&ctx, configs, lb)
    }

    fn count(stack: &Stack, kind: ResourceKind) -> usize {
        stack.of_kind(kind).count()
    }

    #[test]
    fn test_single_member_stack_shape() {
        let ingress = make_ingress(
            "default",
            "echo",
            &[(Some("foo.example.com"), "/", "svc-a", 80)],
        );
        let stack = build(&[member_config(ingress, internet_facing())], &resolved_lb()).unwrap();

        assert_eq!(count(&stack, ResourceKind::LoadBalancer), 1);
        assert_eq!(count(&stack, ResourceKind::Listener), 1);
        assert_eq!(count(&stack, ResourceKind::TargetGroup), 1);
        assert_eq!(count(&stack, ResourceKind::TargetGroupBinding), 1);
        assert_eq!(count(&stack, ResourceKind::SecurityGroup), 1);
        assert_eq!(count(&stack, ResourceKind::SecurityGroupRule), 1);
        // One routing rule plus the default rule
        assert_eq!(count(&stack, ResourceKind::ListenerRule), 2);

        let (_, lb) = stack.load_balancer().unwrap();
        assert_eq!(lb.scheme, Scheme::InternetFacing);
        assert_eq!(lb.subnet_ids, vec!["subnet-a", "subnet-b"]);
        assert!(matches!(
            lb.security_groups.as_slice(),
            [SecurityGroupAttachment::Managed(_)]
        ));

        let listeners = stack.listeners();
        let (listener_id, listener) = listeners.first().unwrap();
        assert_eq!(listener.port, 80);
        assert_eq!(listener.protocol, Protocol::Http);

        let rules = stack.rules_of_listener(listener_id);
        let routed = rules
            .iter()
            .find(|(_, r)| r.priority == RulePriority::At(1))
            .unwrap();
        assert_eq!(
            routed.1.conditions,
            vec![
                Condition::HostHeader("foo.example.com".to_string()),
                Condition::PathPattern("/".to_string()),
            ]
        );
        assert!(matches!(routed.1.target, RuleTarget::TargetGroup(_)));

        let default = rules
            .iter()
            .find(|(_, r)| r.priority == RulePriority::Default)
            .unwrap();
        assert!(default.1.conditions.is_empty());
        assert_eq!(default.1.target, RuleTarget::FixedNotFound);
    }

    #[test]
    fn test_two_members_share_listener_with_member_ordered_priorities() {
        let first = make_ingress(
            "default",
            "echo",
            &[(Some("foo.example.com"), "/", "svc-a", 80)],
        );
        let second = make_ingress(
            "default",
            "vone",
            &[(Some("bar.example.com"), "/v1/*", "svc-b", 80)],
        );
        let stack = build(
            &[
                member_config(first, internet_facing()),
                member_config(second, IngressAnnotations::default()),
            ],
            &resolved_lb(),
        )
        .unwrap();

        assert_eq!(count(&stack, ResourceKind::Listener), 1);
        assert_eq!(count(&stack, ResourceKind::TargetGroup), 2);

        let listeners = stack.listeners();
        let (listener_id, _) = listeners.first().unwrap();
        let rules = stack.rules_of_listener(listener_id);
        let host_of = |priority: u32| {
            rules
                .iter()
                .find(|(_, r)| r.priority == RulePriority::At(priority))
                .and_then(|(_, r)| {
                    r.conditions.iter().find_map(|c| match c {
                        Condition::HostHeader(h) => Some(h.clone()),
                        Condition::PathPattern(_) => None,
                    })
                })
                .unwrap()
        };
        assert_eq!(host_of(1), "foo.example.com");
        assert_eq!(host_of(2), "bar.example.com");
    }

    #[test]
    fn test_certificate_promotes_listener_to_https() {
        let ingress = make_ingress(
            "default",
            "echo",
            &[(Some("foo.example.com"), "/", "svc-a", 80)],
        );
        let mut annotations = internet_facing();
        annotations.certificate_arn = Some("arn:aws:acm:cert/1".to_string());

        let stack = build(&[member_config(ingress, annotations)], &resolved_lb()).unwrap();

        let listeners = stack.listeners();
        assert_eq!(listeners.len(), 1);
        let (_, listener) = listeners.first().unwrap();
        assert_eq!(listener.port, 443);
        assert_eq!(listener.protocol, Protocol::Https);
        assert_eq!(listener.certificate_arn.as_deref(), Some("arn:aws:acm:cert/1"));
    }

    #[test]
    fn test_empty_member_list_is_teardown() {
        let stack = build(&[], &resolved_lb()).unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn test_conflicting_scheme_across_members_is_error() {
        let first = member_config(
            make_ingress("default", "a", &[(None, "/", "svc-a", 80)]),
            internet_facing(),
        );
        let mut internal = internet_facing();
        internal.scheme = Some(Scheme::Internal);
        let second = member_config(
            make_ingress("default", "b", &[(None, "/", "svc-b", 80)]),
            internal,
        );

        let err = merge_lb_attributes(&[first, second]).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation { .. }));
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_first_member_wins_when_others_are_silent() {
        let first = member_config(
            make_ingress("default", "a", &[(None, "/", "svc-a", 80)]),
            internet_facing(),
        );
        let second = member_config(
            make_ingress("default", "b", &[(None, "/", "svc-b", 80)]),
            IngressAnnotations::default(),
        );

        let merged = merge_lb_attributes(&[first, second]).unwrap();
        assert_eq!(merged.scheme, Scheme::InternetFacing);
        assert_eq!(merged.subnet_tokens, vec!["subnet-a", "subnet-b"]);
        assert_eq!(merged.inbound_cidrs, vec!["0.0.0.0/0"]);
    }

    #[test]
    fn test_explicit_security_groups_suppress_managed_group() {
        let ingress = make_ingress("default", "echo", &[(None, "/", "svc-a", 80)]);
        let mut lb = resolved_lb();
        lb.security_group_ids = vec!["sg-1".to_string()];

        let stack = build(&[member_config(ingress, internet_facing())], &lb).unwrap();

        assert_eq!(count(&stack, ResourceKind::SecurityGroup), 0);
        assert_eq!(count(&stack, ResourceKind::SecurityGroupRule), 0);
        let (_, lb_spec) = stack.load_balancer().unwrap();
        assert_eq!(
            lb_spec.security_groups,
            vec![SecurityGroupAttachment::Id("sg-1".to_string())]
        );
    }

    #[test]
    fn test_managed_group_gets_one_inbound_rule_per_port() {
        let ingress = make_ingress("default", "echo", &[(None, "/", "svc-a", 80)]);
        let mut annotations = internet_facing();
        annotations.listen_ports = Some(vec![80, 443]);
        annotations.certificate_arn = Some("arn:aws:acm:cert/1".to_string());

        let stack = build(&[member_config(ingress, annotations)], &resolved_lb()).unwrap();
        assert_eq!(count(&stack, ResourceKind::SecurityGroupRule), 2);
    }

    #[test]
    fn test_paths_order_by_descending_literal_prefix() {
        let ingress = make_ingress(
            "default",
            "echo",
            &[
                (Some("foo.example.com"), "/", "svc-a", 80),
                (Some("foo.example.com"), "/static/*", "svc-b", 80),
            ],
        );
        let stack = build(&[member_config(ingress, internet_facing())], &resolved_lb()).unwrap();

        let listeners = stack.listeners();
        let (listener_id, _) = listeners.first().unwrap();
        let rules = stack.rules_of_listener(listener_id);
        let path_of = |priority: u32| {
            rules
                .iter()
                .find(|(_, r)| r.priority == RulePriority::At(priority))
                .and_then(|(_, r)| {
                    r.conditions.iter().find_map(|c| match c {
                        Condition::PathPattern(p) => Some(p.clone()),
                        Condition::HostHeader(_) => None,
                    })
                })
                .unwrap()
        };
        // `/static/*` has the longer literal prefix and outranks `/`
        assert_eq!(path_of(1), "/static/*");
        assert_eq!(path_of(2), "/");
    }

    #[test]
    fn test_default_backend_forwards_instead_of_404() {
        let mut ingress = (*make_ingress(
            "default",
            "echo",
            &[(Some("foo.example.com"), "/", "svc-a", 80)],
        ))
        .clone();
        ingress.spec.as_mut().unwrap().default_backend = Some(backend("fallback", 8080));

        let stack = build(
            &[member_config(Arc::new(ingress), internet_facing())],
            &resolved_lb(),
        )
        .unwrap();

        // The fallback service gets its own target group
        assert_eq!(count(&stack, ResourceKind::TargetGroup), 2);

        let listeners = stack.listeners();
        let (listener_id, _) = listeners.first().unwrap();
        let rules = stack.rules_of_listener(listener_id);
        let default = rules
            .iter()
            .find(|(_, r)| r.priority == RulePriority::Default)
            .unwrap();
        assert!(matches!(default.1.target, RuleTarget::TargetGroup(_)));
    }

    #[test]
    fn test_named_service_port_is_validation_error() {
        let mut ingress = (*make_ingress("default", "echo", &[(None, "/", "svc-a", 80)])).clone();
        if let Some(rules) = ingress.spec.as_mut().unwrap().rules.as_mut() {
            rules[0].http.as_mut().unwrap().paths[0]
                .backend
                .service
                .as_mut()
                .unwrap()
                .port = Some(ServiceBackendPort {
                name: Some("http".to_string()),
                number: None,
            });
        }

        let err = build(
            &[member_config(Arc::new(ingress), internet_facing())],
            &resolved_lb(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation { .. }));
        assert!(err.to_string().contains("numeric port"));
    }

    #[test]
    fn test_conflicting_health_checks_on_shared_backend_are_rejected() {
        let first = make_ingress("default", "a", &[(Some("a.example.com"), "/", "svc-a", 80)]);
        let second = make_ingress("default", "b", &[(Some("b.example.com"), "/", "svc-a", 80)]);
        let mut second_annotations = IngressAnnotations::default();
        second_annotations.health_check.path = "/healthz".to_string();

        let err = build(
            &[
                member_config(first, internet_facing()),
                member_config(second, second_annotations),
            ],
            &resolved_lb(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation { .. }));
        let message = err.to_string();
        assert!(message.contains("health check"));
        assert!(message.contains("default/a"));
        assert!(message.contains("default/b"));
    }

    #[test]
    fn test_shared_backend_tuple_emits_one_target_group() {
        let first = make_ingress("default", "a", &[(Some("a.example.com"), "/", "svc-a", 80)]);
        let second = make_ingress("default", "b", &[(Some("b.example.com"), "/", "svc-a", 80)]);
        let stack = build(
            &[
                member_config(first, internet_facing()),
                member_config(second, IngressAnnotations::default()),
            ],
            &resolved_lb(),
        )
        .unwrap();

        assert_eq!(count(&stack, ResourceKind::TargetGroup), 1);
        assert_eq!(count(&stack, ResourceKind::TargetGroupBinding), 1);
        assert_eq!(count(&stack, ResourceKind::ListenerRule), 3);
    }

    #[test]
    fn test_ownership_tags_always_present() {
        let ingress = make_ingress("default", "echo", &[(None, "/", "svc-a", 80)]);
        let mut lb = resolved_lb();
        // A user tag must not displace the ownership pair
        lb.tags.insert("managed-by".to_string(), "someone-else".to_string());
        lb.tags.insert("team".to_string(), "infra".to_string());

        let stack = build(&[member_config(ingress, internet_facing())], &lb).unwrap();
        let (_, lb_spec) = stack.load_balancer().unwrap();
        assert_eq!(lb_spec.tags.get("managed-by"), Some(&"alby".to_string()));
        assert_eq!(lb_spec.tags.get("group"), Some(&"default/echo".to_string()));
        assert_eq!(lb_spec.tags.get("team"), Some(&"infra".to_string()));

        for (_, resource) in stack.of_kind(ResourceKind::TargetGroup) {
            if let Resource::TargetGroup(tg) = resource {
                assert_eq!(tg.tags.get("managed-by"), Some(&"alby".to_string()));
            }
        }
    }
}
