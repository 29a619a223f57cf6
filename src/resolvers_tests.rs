// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resolvers.rs`

#[cfg(test)]
mod tests {
    use crate::aws::fake::InMemoryCloud;
    use crate::aws::types::SecurityGroupData;
    use crate::aws::Cloud;
    use crate::errors::ReconcileError;
    use crate::resolvers::ResourceResolvers;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn seeded_cloud() -> (Arc<InMemoryCloud>, Cloud) {
        let fake = Arc::new(InMemoryCloud::new());
        fake.add_subnet("subnet-a", "us-east-1a", Some("apps-a"));
        fake.add_subnet("subnet-b", "us-east-1b", Some("apps-b"));
        fake.add_subnet("subnet-c", "us-east-1a", None);
        let cloud = Cloud::new(fake.clone());
        (fake, cloud)
    }

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[tokio::test]
    async fn test_ids_pass_through_and_names_resolve() {
        let (_fake, cloud) = seeded_cloud();
        let mut resolvers = ResourceResolvers::new(&cloud);

        let ids = resolvers
            .resolve_subnets(&tokens(&["subnet-a", "apps-b"]))
            .await
            .unwrap();
        assert_eq!(ids, vec!["subnet-a", "subnet-b"]);
    }

    #[tokio::test]
    async fn test_unresolved_names_are_named_in_the_error() {
        let (_fake, cloud) = seeded_cloud();
        let mut resolvers = ResourceResolvers::new(&cloud);

        let err = resolvers
            .resolve_subnets(&tokens(&["apps-a", "no-such", "also-missing"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Resolution { .. }));
        let message = err.to_string();
        assert!(message.contains("no-such"));
        assert!(message.contains("also-missing"));
    }

    #[tokio::test]
    async fn test_same_availability_zone_rejected() {
        let (_fake, cloud) = seeded_cloud();
        let mut resolvers = ResourceResolvers::new(&cloud);

        // subnet-a and subnet-c share us-east-1a
        let err = resolvers
            .resolve_subnets(&tokens(&["subnet-a", "subnet-c"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation { .. }));
        assert!(err.to_string().contains("availability zone"));
    }

    #[tokio::test]
    async fn test_empty_subnet_list_rejected() {
        let (_fake, cloud) = seeded_cloud();
        let mut resolvers = ResourceResolvers::new(&cloud);
        let err = resolvers.resolve_subnets(&[]).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_nonexistent_subnet_id_rejected() {
        let (_fake, cloud) = seeded_cloud();
        let mut resolvers = ResourceResolvers::new(&cloud);
        let err = resolvers
            .resolve_subnets(&tokens(&["subnet-a", "subnet-ffff"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("subnet-ffff"));
    }

    #[tokio::test]
    async fn test_name_lookups_are_memoized_for_the_reconcile() {
        let (fake, cloud) = seeded_cloud();
        let mut resolvers = ResourceResolvers::new(&cloud);

        resolvers
            .resolve_subnets(&tokens(&["apps-a", "apps-b"]))
            .await
            .unwrap();
        resolvers
            .resolve_subnets(&tokens(&["apps-a", "apps-b"]))
            .await
            .unwrap();

        // The second resolution hits the memo, not the cloud
        assert_eq!(fake.call_count("describe_subnets_by_name_tags"), 1);
    }

    #[tokio::test]
    async fn test_security_groups_resolve_by_name_tag() {
        let fake = Arc::new(InMemoryCloud::new());
        let mut tags = BTreeMap::new();
        tags.insert("Name".to_string(), "lb-shared".to_string());
        fake.add_security_group(SecurityGroupData {
            id: "sg-12345".to_string(),
            name: "lb-shared-sg".to_string(),
            description: String::new(),
            inbound: Vec::new(),
            tags,
        });
        let cloud = Cloud::new(fake.clone());
        let mut resolvers = ResourceResolvers::new(&cloud);

        let ids = resolvers
            .resolve_security_groups(&tokens(&["lb-shared"]))
            .await
            .unwrap();
        assert_eq!(ids, vec!["sg-12345"]);

        let err = resolvers
            .resolve_security_groups(&tokens(&["missing-tag"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing-tag"));
    }

    #[tokio::test]
    async fn test_nonexistent_security_group_id_rejected() {
        let fake = Arc::new(InMemoryCloud::new());
        let cloud = Cloud::new(fake);
        let mut resolvers = ResourceResolvers::new(&cloud);

        let err = resolvers
            .resolve_security_groups(&tokens(&["sg-deadbeef"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sg-deadbeef"));
    }
}
