// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `class.rs`

#[cfg(test)]
mod tests {
    use crate::config::ControllerConfig;
    use crate::ingress::class::is_in_scope;
    use crate::labels::ANNOTATION_INGRESS_CLASS;
    use k8s_openapi::api::networking::v1::{Ingress, IngressSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn ingress(spec_class: Option<&str>, annotation_class: Option<&str>) -> Ingress {
        let annotations: BTreeMap<String, String> = annotation_class
            .map(|c| {
                [(ANNOTATION_INGRESS_CLASS.to_string(), c.to_string())]
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default();
        Ingress {
            metadata: ObjectMeta {
                name: Some("echo".to_string()),
                namespace: Some("default".to_string()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: spec_class.map(str::to_string),
                ..Default::default()
            }),
            status: None,
        }
    }

    #[test]
    fn test_spec_class_match() {
        let config = ControllerConfig::default();
        assert!(is_in_scope(&ingress(Some("alb"), None), &config));
        assert!(!is_in_scope(&ingress(Some("nginx"), None), &config));
    }

    #[test]
    fn test_legacy_annotation_wins_over_spec_class() {
        let config = ControllerConfig::default();
        assert!(is_in_scope(&ingress(Some("nginx"), Some("alb")), &config));
        assert!(!is_in_scope(&ingress(Some("alb"), Some("nginx")), &config));
    }

    #[test]
    fn test_unclassed_falls_to_default_controller() {
        let mut config = ControllerConfig::default();
        assert!(!is_in_scope(&ingress(None, None), &config));

        config.default_class = true;
        assert!(is_in_scope(&ingress(None, None), &config));
    }

    #[test]
    fn test_empty_class_strings_count_as_unset() {
        let mut config = ControllerConfig::default();
        config.default_class = true;
        assert!(is_in_scope(&ingress(Some(""), Some("")), &config));
    }
}
