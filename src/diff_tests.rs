// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the diff engine.

#[cfg(test)]
mod tests {
    use crate::assembler::{ObservedListener, ObservedLoadBalancer, ObservedTargetGroup, Topology};
    use crate::aws::types::{
        Condition, ForwardAction, HealthCheck, IpPermission, ListenerData, LoadBalancerData,
        Protocol, RuleData, RulePriority, Scheme, SecurityGroupData, TargetDescription,
        TargetGroupData, TargetHealth, TargetHealthState, TargetType, UserIdGroupPair,
    };
    use crate::diff::{
        diff, diff_ip_permissions, diff_tags, diff_targets, ip_permission_equals, Action,
    };
    use crate::model::{
        ListenerRuleSpec, ListenerSpec, LoadBalancerSpec, LogicalId, Reference, Resource,
        RuleTarget, SecurityGroupAttachment, SecurityGroupRuleSpec, SecurityGroupSpec, ServiceRef,
        Stack, TargetGroupBindingSpec, TargetGroupSpec,
    };
    use std::collections::BTreeMap;

    fn tags(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ownership() -> BTreeMap<String, String> {
        tags(&[("managed-by", "alby"), ("group", "default/echo")])
    }

    /// Desired stack: LB + HTTP:80 listener + one routed rule + managed SG.
    fn desired_stack() -> Stack {
        let mut stack = Stack::new();
        stack
            .add(
                LogicalId::new("SecurityGroup"),
                Resource::SecurityGroup(SecurityGroupSpec {
                    name: "alby-default-echo".to_string(),
                    description: "managed by alby".to_string(),
                    vpc_id: "vpc-1".to_string(),
                    tags: {
                        let mut t = ownership();
                        t.insert("Name".to_string(), "default/echo".to_string());
                        t
                    },
                }),
            )
            .unwrap();
        stack
            .add(
                LogicalId::new("SecurityGroup/Rule/80"),
                Resource::SecurityGroupRule(SecurityGroupRuleSpec {
                    security_group: Reference::group_id(LogicalId::new("SecurityGroup")),
                    protocol: "tcp".to_string(),
                    port: 80,
                    cidrs: vec!["0.0.0.0/0".to_string()],
                }),
            )
            .unwrap();
        stack
            .add(
                LogicalId::new("TargetGroup/default/svc-a:80"),
                Resource::TargetGroup(TargetGroupSpec {
                    name: "alby-g-svca".to_string(),
                    service: ServiceRef {
                        namespace: "default".to_string(),
                        name: "svc-a".to_string(),
                        port: 80,
                    },
                    port: 80,
                    protocol: Protocol::Http,
                    target_type: TargetType::Instance,
                    vpc_id: "vpc-1".to_string(),
                    health_check: HealthCheck::default(),
                    attributes: BTreeMap::new(),
                    tags: ownership(),
                }),
            )
            .unwrap();
        stack
            .add(
                LogicalId::new("TargetGroupBinding/default/svc-a:80"),
                Resource::TargetGroupBinding(TargetGroupBindingSpec {
                    target_group: Reference::arn(LogicalId::new("TargetGroup/default/svc-a:80")),
                    service: ServiceRef {
                        namespace: "default".to_string(),
                        name: "svc-a".to_string(),
                        port: 80,
                    },
                    target_type: TargetType::Instance,
                }),
            )
            .unwrap();
        stack
            .add(
                LogicalId::new("LoadBalancer"),
                Resource::LoadBalancer(LoadBalancerSpec {
                    name: "alby-lb".to_string(),
                    scheme: Scheme::InternetFacing,
                    subnet_ids: vec!["subnet-a".to_string(), "subnet-b".to_string()],
                    security_groups: vec![SecurityGroupAttachment::Managed(Reference::group_id(
                        LogicalId::new("SecurityGroup"),
                    ))],
                    tags: ownership(),
                    wafacl_id: None,
                }),
            )
            .unwrap();
        stack
            .add(
                LogicalId::new("Listener/80"),
                Resource::Listener(ListenerSpec {
                    load_balancer: Reference::arn(LogicalId::new("LoadBalancer")),
                    port: 80,
                    protocol: Protocol::Http,
                    certificate_arn: None,
                }),
            )
            .unwrap();
        stack
            .add(
                LogicalId::new("Listener/80/Rule/1"),
                Resource::ListenerRule(ListenerRuleSpec {
                    listener: Reference::arn(LogicalId::new("Listener/80")),
                    priority: RulePriority::At(1),
                    conditions: vec![
                        Condition::HostHeader("foo.example.com".to_string()),
                        Condition::PathPattern("/".to_string()),
                    ],
                    target: RuleTarget::TargetGroup(Reference::arn(LogicalId::new(
                        "TargetGroup/default/svc-a:80",
                    ))),
                }),
            )
            .unwrap();
        stack
            .add(
                LogicalId::new("Listener/80/Rule/default"),
                Resource::ListenerRule(ListenerRuleSpec {
                    listener: Reference::arn(LogicalId::new("Listener/80")),
                    priority: RulePriority::Default,
                    conditions: Vec::new(),
                    target: RuleTarget::FixedNotFound,
                }),
            )
            .unwrap();
        stack.validate().unwrap();
        stack
    }

    /// The topology the desired stack would deploy to.
    fn matching_topology() -> Topology {
        Topology {
            load_balancer: Some(ObservedLoadBalancer {
                data: LoadBalancerData {
                    arn: "arn:lb".to_string(),
                    name: "alby-lb".to_string(),
                    dns_name: "alby-lb.elb.example.com".to_string(),
                    scheme: Scheme::InternetFacing,
                    subnet_ids: vec!["subnet-b".to_string(), "subnet-a".to_string()],
                    security_group_ids: vec!["sg-1".to_string()],
                },
                tags: ownership(),
                wafacl_id: None,
            }),
            listeners: vec![ObservedListener {
                data: ListenerData {
                    arn: "arn:listener80".to_string(),
                    load_balancer_arn: "arn:lb".to_string(),
                    port: 80,
                    protocol: Protocol::Http,
                    certificate_arn: None,
                    default_action: ForwardAction::FixedResponse { status_code: 404 },
                },
                rules: vec![RuleData {
                    arn: "arn:rule1".to_string(),
                    listener_arn: "arn:listener80".to_string(),
                    priority: RulePriority::At(1),
                    conditions: vec![
                        Condition::PathPattern("/".to_string()),
                        Condition::HostHeader("foo.example.com".to_string()),
                    ],
                    action: ForwardAction::Forward {
                        target_group_arn: "ARN:TG".to_string(),
                    },
                }],
            }],
            target_groups: vec![ObservedTargetGroup {
                data: TargetGroupData {
                    arn: "arn:tg".to_string(),
                    name: "alby-g-svca".to_string(),
                    port: 80,
                    protocol: Protocol::Http,
                    target_type: TargetType::Instance,
                    vpc_id: "vpc-1".to_string(),
                    health_check: HealthCheck::default(),
                },
                tags: ownership(),
                attributes: BTreeMap::new(),
                targets: Vec::new(),
            }],
            security_group: Some(SecurityGroupData {
                id: "sg-1".to_string(),
                name: "alby-default-echo".to_string(),
                description: "managed by alby".to_string(),
                inbound: vec![IpPermission {
                    protocol: "tcp".to_string(),
                    from_port: 80,
                    to_port: 80,
                    cidrs: vec!["0.0.0.0/0".to_string()],
                    group_pairs: Vec::new(),
                }],
                tags: {
                    let mut t = ownership();
                    t.insert("Name".to_string(), "default/echo".to_string());
                    t
                },
            }),
        }
    }

    #[test]
    fn test_fresh_stack_against_empty_cloud_is_all_creates() {
        let plan = diff(&desired_stack(), &Topology::default()).unwrap();

        assert!(matches!(plan.security_groups.as_slice(), [Action::Create { .. }]));
        assert_eq!(plan.permission_grants.len(), 1);
        assert!(plan.permission_revokes.is_empty());
        assert!(matches!(plan.target_groups.as_slice(), [Action::Create { .. }]));
        assert!(matches!(plan.load_balancers.as_slice(), [Action::Create { .. }]));
        assert!(matches!(plan.listeners.as_slice(), [Action::Create { .. }]));
        assert_eq!(plan.listener_rules.len(), 1);
        assert_eq!(plan.listener_rules[0].creates.len(), 1);
        assert_eq!(plan.bindings.len(), 1);
        assert!(plan.pairings.is_empty());
    }

    #[test]
    fn test_matching_topology_diffs_to_empty_plan() {
        let plan = diff(&desired_stack(), &matching_topology()).unwrap();
        assert!(plan.is_empty(), "expected empty plan, got {plan:?}");
        // Bindings still reconcile registrations every pass
        assert_eq!(plan.bindings.len(), 1);
        // Pairings seed the resolution table for every current resource
        assert!(plan
            .pairings
            .iter()
            .any(|(id, _, value)| id.as_str() == "LoadBalancer" && value == "arn:lb"));
        assert!(plan
            .pairings
            .iter()
            .any(|(id, _, value)| id.as_str() == "Listener/80" && value == "arn:listener80"));
    }

    #[test]
    fn test_teardown_is_deletes_only() {
        let plan = diff(&Stack::new(), &matching_topology()).unwrap();

        assert!(matches!(plan.security_groups.as_slice(), [Action::Delete { .. }]));
        assert!(matches!(plan.target_groups.as_slice(), [Action::Delete { .. }]));
        assert!(matches!(plan.load_balancers.as_slice(), [Action::Delete { .. }]));
        assert!(matches!(plan.listeners.as_slice(), [Action::Delete { .. }]));
        assert!(plan.bindings.is_empty());
        // No revokes on a group that is going away entirely
        assert!(plan.permission_revokes.is_empty());
    }

    #[test]
    fn test_certificate_on_same_port_surfaces_as_listener_replace() {
        let mut stack = desired_stack();
        // Rebuild the listener as HTTPS:80 with a certificate
        let mut https = Stack::new();
        for (id, resource) in stack.iter() {
            let resource = match resource {
                Resource::Listener(spec) => Resource::Listener(ListenerSpec {
                    protocol: Protocol::Https,
                    certificate_arn: Some("arn:aws:acm:cert/1".to_string()),
                    ..spec.clone()
                }),
                other => other.clone(),
            };
            https.add(id.clone(), resource).unwrap();
        }
        stack = https;

        let plan = diff(&stack, &matching_topology()).unwrap();

        // Pairing is by (protocol, port): the HTTP listener is unpaired and
        // deleted, the HTTPS one created, and its rules re-created under it
        let mut kinds: Vec<&str> = plan
            .listeners
            .iter()
            .map(|a| match a {
                Action::Create { .. } => "create",
                Action::Delete { .. } => "delete",
                Action::Modify { .. } => "modify",
                Action::Replace { .. } => "replace",
            })
            .collect();
        kinds.sort_unstable();
        assert_eq!(kinds, vec!["create", "delete"]);
        assert_eq!(plan.listener_rules[0].creates.len(), 1);
    }

    #[test]
    fn test_condition_change_modifies_rule_and_keeps_priority() {
        let mut topology = matching_topology();
        topology.listeners[0].rules[0].conditions = vec![
            Condition::HostHeader("old.example.com".to_string()),
            Condition::PathPattern("/".to_string()),
        ];

        let plan = diff(&desired_stack(), &topology).unwrap();

        assert!(plan.listeners.is_empty());
        let batch = &plan.listener_rules[0];
        assert!(batch.creates.is_empty());
        assert!(batch.deletes.is_empty());
        assert_eq!(batch.modifies.len(), 1);
        let (_, arn, changes) = &batch.modifies[0];
        assert_eq!(arn, "arn:rule1");
        assert!(changes
            .conditions
            .contains(&Condition::HostHeader("foo.example.com".to_string())));
    }

    #[test]
    fn test_extra_current_rule_is_deleted() {
        let mut topology = matching_topology();
        topology.listeners[0].rules.push(RuleData {
            arn: "arn:rule-stale".to_string(),
            listener_arn: "arn:listener80".to_string(),
            priority: RulePriority::At(2),
            conditions: vec![Condition::PathPattern("/old".to_string())],
            action: ForwardAction::Forward {
                target_group_arn: "arn:tg".to_string(),
            },
        });

        let plan = diff(&desired_stack(), &topology).unwrap();
        assert_eq!(plan.listener_rules[0].deletes, vec!["arn:rule-stale"]);
    }

    #[test]
    fn test_target_group_arns_compare_case_insensitively() {
        // The observed rule forwards to "ARN:TG" while the group's arn is
        // "arn:tg"; semantically equal
        let plan = diff(&desired_stack(), &matching_topology()).unwrap();
        assert!(plan.listener_rules[0].modifies.is_empty());
    }

    #[test]
    fn test_subnets_compare_order_insensitively() {
        // matching_topology lists subnets as [b, a]
        let plan = diff(&desired_stack(), &matching_topology()).unwrap();
        assert!(plan.load_balancers.is_empty());
    }

    #[test]
    fn test_scheme_change_escalates_to_replace() {
        let mut topology = matching_topology();
        topology.load_balancer.as_mut().unwrap().data.scheme = Scheme::Internal;

        let plan = diff(&desired_stack(), &topology).unwrap();
        assert!(matches!(plan.load_balancers.as_slice(), [Action::Replace { .. }]));
    }

    #[test]
    fn test_health_check_change_modifies_paired_target_group() {
        let mut topology = matching_topology();
        topology.target_groups[0].data.health_check.path = "/old-health".to_string();

        let plan = diff(&desired_stack(), &topology).unwrap();
        match plan.target_groups.as_slice() {
            [Action::Modify { changes, .. }] => {
                assert_eq!(changes.health_check.as_ref().unwrap().path, "/");
            }
            other => panic!("expected a single modify, got {other:?}"),
        }
    }

    #[test]
    fn test_wafacl_association_changes() {
        // Desired adds an ACL the cloud does not have
        let mut stack = desired_stack();
        let mut with_acl = Stack::new();
        for (id, resource) in stack.iter() {
            let resource = match resource {
                Resource::LoadBalancer(spec) => Resource::LoadBalancer(LoadBalancerSpec {
                    wafacl_id: Some("acl-1".to_string()),
                    ..spec.clone()
                }),
                other => other.clone(),
            };
            with_acl.add(id.clone(), resource).unwrap();
        }
        stack = with_acl;

        let plan = diff(&stack, &matching_topology()).unwrap();
        match plan.load_balancers.as_slice() {
            [Action::Modify { changes, .. }] => {
                assert_eq!(changes.wafacl, Some(Some("acl-1".to_string())));
            }
            other => panic!("expected a single modify, got {other:?}"),
        }

        // Current has an ACL the desired spec dropped
        let mut topology = matching_topology();
        topology.load_balancer.as_mut().unwrap().wafacl_id = Some("acl-stale".to_string());
        let plan = diff(&desired_stack(), &topology).unwrap();
        match plan.load_balancers.as_slice() {
            [Action::Modify { changes, .. }] => assert_eq!(changes.wafacl, Some(None)),
            other => panic!("expected a single modify, got {other:?}"),
        }
    }

    #[test]
    fn test_tag_diff_protects_ownership_keys() {
        let desired = tags(&[("managed-by", "alby"), ("group", "g"), ("team", "infra")]);
        let current = tags(&[
            ("managed-by", "alby"),
            ("group", "g"),
            ("team", "legacy"),
            ("stale", "yes"),
        ]);

        let changes = diff_tags(&desired, &current);
        assert_eq!(changes.set, tags(&[("team", "infra")]));
        assert_eq!(changes.remove, vec!["stale".to_string()]);

        // Even a desired map missing the ownership pair never removes it
        let changes = diff_tags(&BTreeMap::new(), &current);
        assert!(!changes.remove.contains(&"managed-by".to_string()));
        assert!(!changes.remove.contains(&"group".to_string()));
    }

    #[test]
    fn test_ip_permission_equality_is_set_semantic() {
        let a = IpPermission {
            protocol: "tcp".to_string(),
            from_port: 80,
            to_port: 80,
            cidrs: vec!["10.0.0.0/8".to_string(), "0.0.0.0/0".to_string()],
            group_pairs: vec![UserIdGroupPair {
                group_id: "sg-x".to_string(),
                user_id: Some("111111111111".to_string()),
            }],
        };
        let b = IpPermission {
            protocol: "tcp".to_string(),
            from_port: 80,
            to_port: 80,
            cidrs: vec!["0.0.0.0/0".to_string(), "10.0.0.0/8".to_string()],
            group_pairs: vec![UserIdGroupPair {
                group_id: "sg-x".to_string(),
                // Different account; equality is by group id only
                user_id: Some("222222222222".to_string()),
            }],
        };
        assert!(ip_permission_equals(&a, &b));

        let mut c = b.clone();
        c.from_port = 443;
        assert!(!ip_permission_equals(&a, &c));
    }

    #[test]
    fn test_permission_grant_and_revoke_sets() {
        let permission = |port: u16| IpPermission {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidrs: vec!["0.0.0.0/0".to_string()],
            group_pairs: Vec::new(),
        };

        let desired = vec![permission(80), permission(443)];
        let current = vec![permission(80), permission(8080)];

        let grants = diff_ip_permissions(&desired, &current);
        let revokes = diff_ip_permissions(&current, &desired);
        assert_eq!(grants, vec![permission(443)]);
        assert_eq!(revokes, vec![permission(8080)]);
    }

    #[test]
    fn test_target_diff_pairs_by_id_and_port() {
        let target = |id: &str, port: u16| TargetDescription {
            id: id.to_string(),
            port,
        };
        let health = |id: &str, port: u16, state: TargetHealthState| TargetHealth {
            target: target(id, port),
            state,
        };

        let desired = vec![target("i-1", 30080), target("i-2", 30080)];
        let current = vec![
            health("i-1", 30080, TargetHealthState::Healthy),
            health("i-3", 30080, TargetHealthState::Healthy),
            // Same instance, different port: a distinct registration
            health("i-2", 31000, TargetHealthState::Healthy),
        ];

        let reconcile = diff_targets(&desired, &current);
        assert_eq!(reconcile.register, vec![target("i-2", 30080)]);
        assert_eq!(
            reconcile.deregister,
            vec![target("i-3", 30080), target("i-2", 31000)]
        );
    }

    #[test]
    fn test_draining_targets_are_present_but_terminal() {
        let target = |id: &str| TargetDescription {
            id: id.to_string(),
            port: 30080,
        };

        let desired = vec![target("i-1")];
        let current = vec![
            // Desired and draining: not re-registered
            TargetHealth {
                target: target("i-1"),
                state: TargetHealthState::Draining,
            },
            // Undesired and draining: not deregistered again
            TargetHealth {
                target: target("i-2"),
                state: TargetHealthState::Draining,
            },
        ];

        let reconcile = diff_targets(&desired, &current);
        assert!(reconcile.is_empty());
    }
}
