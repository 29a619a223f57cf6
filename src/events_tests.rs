// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `events.rs`

#[cfg(test)]
mod tests {
    use crate::events::{reasons, EventPublisher, NoopEventPublisher};
    use k8s_openapi::api::core::v1::ObjectReference;
    use kube::runtime::events::EventType;

    #[test]
    fn test_noop_publisher_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopEventPublisher>();
    }

    #[test]
    fn test_reason_constants_are_pascal_case() {
        assert_eq!(reasons::SUCCESSFULLY_RECONCILED, "SuccessfullyReconciled");
        assert_eq!(reasons::VALIDATION_FAILED, "ValidationFailed");
        assert_eq!(reasons::RECONCILE_FAILED, "ReconcileFailed");
        assert_eq!(reasons::TEARDOWN_COMPLETE, "TeardownComplete");
    }

    #[tokio::test]
    async fn test_noop_publisher_does_not_panic() {
        let publisher = NoopEventPublisher;
        let reference = ObjectReference::default();
        publisher
            .publish(
                &reference,
                EventType::Normal,
                reasons::SUCCESSFULLY_RECONCILED,
                Some("group default/echo".to_string()),
            )
            .await;
    }
}
