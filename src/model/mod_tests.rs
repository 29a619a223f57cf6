// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the stack model and its invariants.

#[cfg(test)]
mod tests {
    use crate::aws::types::{Condition, HealthCheck, Protocol, RulePriority, Scheme, TargetType};
    use crate::model::{
        ListenerRuleSpec, ListenerSpec, LoadBalancerSpec, LogicalId, Reference, Resource,
        RuleTarget, SecurityGroupAttachment, ServiceRef, Stack, StackError, TargetGroupSpec,
    };
    use std::collections::BTreeMap;

    fn lb_spec() -> Resource {
        Resource::LoadBalancer(LoadBalancerSpec {
            name: "alby-abc".to_string(),
            scheme: Scheme::InternetFacing,
            subnet_ids: vec!["subnet-a".to_string()],
            security_groups: vec![SecurityGroupAttachment::Id("sg-1".to_string())],
            tags: BTreeMap::new(),
            wafacl_id: None,
        })
    }

    fn listener_spec(lb: &str) -> Resource {
        Resource::Listener(ListenerSpec {
            load_balancer: Reference::arn(LogicalId::new(lb)),
            port: 80,
            protocol: Protocol::Http,
            certificate_arn: None,
        })
    }

    fn tg_spec(name: &str) -> Resource {
        Resource::TargetGroup(TargetGroupSpec {
            name: name.to_string(),
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
            tags: BTreeMap::new(),
        })
    }

    fn rule_spec(listener: &str, priority: RulePriority, target: RuleTarget) -> Resource {
        let conditions = match priority {
            RulePriority::Default => Vec::new(),
            RulePriority::At(_) => vec![Condition::PathPattern("/".to_string())],
        };
        Resource::ListenerRule(ListenerRuleSpec {
            listener: Reference::arn(LogicalId::new(listener)),
            priority,
            conditions,
            target,
        })
    }

    /// A minimal valid stack: LB, one listener, one TG, rule 1 + default.
    fn valid_stack() -> Stack {
        let mut stack = Stack::new();
        stack.add(LogicalId::new("LoadBalancer"), lb_spec()).unwrap();
        stack
            .add(LogicalId::new("Listener/80"), listener_spec("LoadBalancer"))
            .unwrap();
        stack
            .add(LogicalId::new("TargetGroup/default/svc-a:80"), tg_spec("alby-tg"))
            .unwrap();
        stack
            .add(
                LogicalId::new("Listener/80/Rule/1"),
                rule_spec(
                    "Listener/80",
                    RulePriority::At(1),
                    RuleTarget::TargetGroup(Reference::arn(LogicalId::new(
                        "TargetGroup/default/svc-a:80",
                    ))),
                ),
            )
            .unwrap();
        stack
            .add(
                LogicalId::new("Listener/80/Rule/default"),
                rule_spec("Listener/80", RulePriority::Default, RuleTarget::FixedNotFound),
            )
            .unwrap();
        stack
    }

    #[test]
    fn test_valid_stack_passes_validation() {
        valid_stack().validate().unwrap();
    }

    #[test]
    fn test_empty_stack_is_valid_teardown() {
        let stack = Stack::new();
        assert!(stack.is_empty());
        stack.validate().unwrap();
    }

    #[test]
    fn test_duplicate_logical_id_rejected() {
        let mut stack = Stack::new();
        stack.add(LogicalId::new("LoadBalancer"), lb_spec()).unwrap();
        let err = stack.add(LogicalId::new("LoadBalancer"), lb_spec()).unwrap_err();
        assert!(matches!(err, StackError::DuplicateLogicalId(_)));
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut stack = Stack::new();
        stack.add(LogicalId::new("LoadBalancer"), lb_spec()).unwrap();
        stack
            .add(LogicalId::new("Listener/80"), listener_spec("Ghost"))
            .unwrap();
        let err = stack.validate().unwrap_err();
        assert!(matches!(err, StackError::DanglingReference { .. }));
    }

    #[test]
    fn test_reference_cycle_rejected() {
        let mut stack = Stack::new();
        stack.add(LogicalId::new("LoadBalancer"), lb_spec()).unwrap();
        // A listener referencing itself closes a cycle
        stack
            .add(LogicalId::new("Listener/80"), listener_spec("Listener/80"))
            .unwrap();
        let err = stack.validate().unwrap_err();
        assert!(matches!(err, StackError::CyclicReference(_)));
    }

    #[test]
    fn test_exactly_one_load_balancer_enforced() {
        let mut stack = Stack::new();
        stack.add(LogicalId::new("A"), lb_spec()).unwrap();
        stack.add(LogicalId::new("B"), lb_spec()).unwrap();
        let err = stack.validate().unwrap_err();
        assert_eq!(err, StackError::LoadBalancerCount(2));
    }

    #[test]
    fn test_duplicate_rule_priority_rejected() {
        let mut stack = valid_stack();
        stack
            .add(
                LogicalId::new("Listener/80/Rule/1-bis"),
                rule_spec(
                    "Listener/80",
                    RulePriority::At(1),
                    RuleTarget::TargetGroup(Reference::arn(LogicalId::new(
                        "TargetGroup/default/svc-a:80",
                    ))),
                ),
            )
            .unwrap();
        let err = stack.validate().unwrap_err();
        assert!(matches!(err, StackError::DuplicatePriority { priority: 1, .. }));
    }

    #[test]
    fn test_non_dense_priorities_rejected() {
        let mut stack = valid_stack();
        stack
            .add(
                LogicalId::new("Listener/80/Rule/3"),
                rule_spec(
                    "Listener/80",
                    RulePriority::At(3),
                    RuleTarget::TargetGroup(Reference::arn(LogicalId::new(
                        "TargetGroup/default/svc-a:80",
                    ))),
                ),
            )
            .unwrap();
        let err = stack.validate().unwrap_err();
        assert!(matches!(err, StackError::NonDensePriorities { .. }));
    }

    #[test]
    fn test_missing_default_rule_rejected() {
        let mut stack = Stack::new();
        stack.add(LogicalId::new("LoadBalancer"), lb_spec()).unwrap();
        stack
            .add(LogicalId::new("Listener/80"), listener_spec("LoadBalancer"))
            .unwrap();
        let err = stack.validate().unwrap_err();
        assert!(matches!(err, StackError::DefaultRuleCount { count: 0, .. }));
    }

    #[test]
    fn test_default_rule_with_conditions_rejected() {
        let mut stack = Stack::new();
        stack.add(LogicalId::new("LoadBalancer"), lb_spec()).unwrap();
        stack
            .add(LogicalId::new("Listener/80"), listener_spec("LoadBalancer"))
            .unwrap();
        stack
            .add(
                LogicalId::new("Listener/80/Rule/default"),
                Resource::ListenerRule(ListenerRuleSpec {
                    listener: Reference::arn(LogicalId::new("Listener/80")),
                    priority: RulePriority::Default,
                    conditions: vec![Condition::PathPattern("/".to_string())],
                    target: RuleTarget::FixedNotFound,
                }),
            )
            .unwrap();
        let err = stack.validate().unwrap_err();
        assert!(matches!(err, StackError::DefaultRuleConditions(_)));
    }

    #[test]
    fn test_fixed_response_only_on_default_rule() {
        let mut stack = valid_stack();
        stack
            .add(
                LogicalId::new("Listener/80/Rule/2"),
                Resource::ListenerRule(ListenerRuleSpec {
                    listener: Reference::arn(LogicalId::new("Listener/80")),
                    priority: RulePriority::At(2),
                    conditions: vec![Condition::PathPattern("/x".to_string())],
                    target: RuleTarget::FixedNotFound,
                }),
            )
            .unwrap();
        let err = stack.validate().unwrap_err();
        assert!(matches!(err, StackError::InvalidEdge { .. }));
    }

    #[test]
    fn test_marshal_round_trip_preserves_stack() {
        let stack = valid_stack();
        let json = stack.marshal().unwrap();
        let back: Stack = serde_json::from_str(&json).unwrap();
        assert_eq!(stack, back);
        back.validate().unwrap();
    }
}
