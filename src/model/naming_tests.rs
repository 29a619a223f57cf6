// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `naming.rs`

#[cfg(test)]
mod tests {
    use crate::aws::types::{Protocol, TargetType};
    use crate::constants::{CLOUD_NAME_MAX_LEN, SECURITY_GROUP_NAME_MAX_LEN};
    use crate::model::naming::{load_balancer_name, security_group_name, target_group_name};
    use crate::model::ServiceRef;

    fn svc(name: &str, port: u16) -> ServiceRef {
        ServiceRef {
            namespace: "default".to_string(),
            name: name.to_string(),
            port,
        }
    }

    #[test]
    fn test_load_balancer_name_is_stable_and_bounded() {
        let a = load_balancer_name("team/shared");
        let b = load_balancer_name("team/shared");
        assert_eq!(a, b);
        assert!(a.len() <= CLOUD_NAME_MAX_LEN);
        assert!(a.starts_with("alby-"));

        assert_ne!(load_balancer_name("team/shared"), load_balancer_name("team/other"));
    }

    #[test]
    fn test_long_group_id_still_fits_the_cap() {
        let group = "a-namespace-with-a-very-long-name/an-ingress-with-an-even-longer-name";
        assert!(load_balancer_name(group).len() <= CLOUD_NAME_MAX_LEN);
    }

    #[test]
    fn test_target_group_name_covers_identity_tuple() {
        let base = target_group_name("g", &svc("svc-a", 80), TargetType::Instance, Protocol::Http);
        assert!(base.len() <= CLOUD_NAME_MAX_LEN);

        // Every component of the tuple changes the name
        assert_ne!(
            base,
            target_group_name("g", &svc("svc-b", 80), TargetType::Instance, Protocol::Http)
        );
        assert_ne!(
            base,
            target_group_name("g", &svc("svc-a", 8080), TargetType::Instance, Protocol::Http)
        );
        assert_ne!(
            base,
            target_group_name("g", &svc("svc-a", 80), TargetType::Ip, Protocol::Http)
        );
        assert_ne!(
            base,
            target_group_name("g", &svc("svc-a", 80), TargetType::Instance, Protocol::Https)
        );
        assert_ne!(
            base,
            target_group_name("g2", &svc("svc-a", 80), TargetType::Instance, Protocol::Http)
        );
    }

    #[test]
    fn test_security_group_name_truncates_long_group_ids() {
        let short = security_group_name("shared");
        assert_eq!(short, "alby-shared");

        let long_group = "x".repeat(300);
        let name = security_group_name(&long_group);
        assert_eq!(name.len(), SECURITY_GROUP_NAME_MAX_LEN);
    }
}
