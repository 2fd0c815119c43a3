//! Per-connection map of managed operation -> live subscriber ids.

use crate::errors::GatewayError;
use crate::operations::{Cardinality, ManagedOperation};

use parking_lot::RwLock;
use std::collections::HashMap;

/// Subscriber ids registered on one connection, keyed by operation.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<ManagedOperation, Vec<String>>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber_id` for `operation`.
    ///
    /// Registering an id that is already present is a no-op. The check and
    /// the insert happen under one write lock, so two racing registrations
    /// on a single-cardinality operation cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::DuplicateSubscription` if `operation` is
    /// single-cardinality and a different id already holds it.
    pub fn try_register(
        &self,
        operation: ManagedOperation,
        subscriber_id: &str,
    ) -> Result<(), GatewayError> {
        let mut entries = self.entries.write();
        let ids = entries.entry(operation).or_default();

        if ids.iter().any(|id| id == subscriber_id) {
            return Ok(());
        }

        if operation.cardinality() == Cardinality::Single {
            if let Some(active) = ids.first() {
                return Err(GatewayError::DuplicateSubscription {
                    operation: operation.operation_name(),
                    active_subscriber_id: active.clone(),
                });
            }
        }

        ids.push(subscriber_id.to_string());
        Ok(())
    }

    /// Subscriber ids for `operation`, in registration order. `None` if the
    /// connection has no live subscriber for it.
    #[must_use]
    pub fn lookup(&self, operation: ManagedOperation) -> Option<Vec<String>> {
        self.entries
            .read()
            .get(&operation)
            .filter(|ids| !ids.is_empty())
            .cloned()
    }

    /// Unregister one id from one operation. Returns whether it was present.
    pub fn remove(&self, operation: ManagedOperation, subscriber_id: &str) -> bool {
        let mut entries = self.entries.write();
        let Some(ids) = entries.get_mut(&operation) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|id| id != subscriber_id);
        let removed = ids.len() != before;
        if ids.is_empty() {
            entries.remove(&operation);
        }
        removed
    }

    /// Unregister `subscriber_id` from every operation holding it.
    ///
    /// Ids are not checked for uniqueness across operations, so a client
    /// that reused one has all of its registrations dropped. Returns one of
    /// the operations the id was removed from.
    pub fn remove_subscriber(&self, subscriber_id: &str) -> Option<ManagedOperation> {
        let mut entries = self.entries.write();
        let mut removed_from = None;
        entries.retain(|operation, ids| {
            let before = ids.len();
            ids.retain(|id| id != subscriber_id);
            if ids.len() != before {
                removed_from.get_or_insert(*operation);
            }
            !ids.is_empty()
        });
        removed_from
    }

    /// Total subscriber ids across all operations.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_single_cardinality_rejects_second_subscriber() {
        let registry = SubscriptionRegistry::new();
        registry
            .try_register(ManagedOperation::ChatMessageStream, "a")
            .unwrap();

        let err = registry
            .try_register(ManagedOperation::ChatMessageStream, "b")
            .unwrap_err();

        assert!(matches!(
            &err,
            GatewayError::DuplicateSubscription { operation, active_subscriber_id }
                if *operation == "getChatMessageStream" && active_subscriber_id == "a"
        ));
        assert_eq!(
            registry.lookup(ManagedOperation::ChatMessageStream),
            Some(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_reregistering_same_id_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        registry
            .try_register(ManagedOperation::ChatMessageStream, "a")
            .unwrap();
        registry
            .try_register(ManagedOperation::ChatMessageStream, "a")
            .unwrap();
        registry
            .try_register(ManagedOperation::NotificationStream, "n")
            .unwrap();
        registry
            .try_register(ManagedOperation::NotificationStream, "n")
            .unwrap();

        assert_eq!(registry.subscriber_count(), 2);
    }

    #[test]
    fn test_multi_cardinality_keeps_every_id() {
        let registry = SubscriptionRegistry::new();
        for id in ["n1", "n2", "n3"] {
            registry
                .try_register(ManagedOperation::NotificationStream, id)
                .unwrap();
        }

        assert_eq!(
            registry.lookup(ManagedOperation::NotificationStream),
            Some(vec!["n1".to_string(), "n2".to_string(), "n3".to_string()])
        );
    }

    #[test]
    fn test_lookup_without_registration_is_none() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.lookup(ManagedOperation::UserVoiceStateStream).is_none());
    }

    #[test]
    fn test_remove_frees_single_slot() {
        let registry = SubscriptionRegistry::new();
        registry
            .try_register(ManagedOperation::ChatMessageStream, "a")
            .unwrap();

        assert!(registry.remove(ManagedOperation::ChatMessageStream, "a"));
        assert!(!registry.remove(ManagedOperation::ChatMessageStream, "a"));
        assert!(registry.lookup(ManagedOperation::ChatMessageStream).is_none());

        registry
            .try_register(ManagedOperation::ChatMessageStream, "b")
            .unwrap();
    }

    #[test]
    fn test_remove_subscriber_finds_operation() {
        let registry = SubscriptionRegistry::new();
        registry
            .try_register(ManagedOperation::UserMutedStateStream, "m1")
            .unwrap();
        registry
            .try_register(ManagedOperation::UserMutedStateStream, "m2")
            .unwrap();

        assert_eq!(
            registry.remove_subscriber("m1"),
            Some(ManagedOperation::UserMutedStateStream)
        );
        assert_eq!(registry.remove_subscriber("unknown"), None);
        assert_eq!(
            registry.lookup(ManagedOperation::UserMutedStateStream),
            Some(vec!["m2".to_string()])
        );
    }

    #[test]
    fn test_remove_subscriber_drops_reused_id_everywhere() {
        let registry = SubscriptionRegistry::new();
        registry
            .try_register(ManagedOperation::UserMutedStateStream, "x")
            .unwrap();
        registry
            .try_register(ManagedOperation::UserTalkingStateStream, "x")
            .unwrap();
        registry
            .try_register(ManagedOperation::UserTalkingStateStream, "t")
            .unwrap();

        let removed = registry.remove_subscriber("x");

        assert!(matches!(
            removed,
            Some(ManagedOperation::UserMutedStateStream | ManagedOperation::UserTalkingStateStream)
        ));
        assert!(registry.lookup(ManagedOperation::UserMutedStateStream).is_none());
        assert_eq!(
            registry.lookup(ManagedOperation::UserTalkingStateStream),
            Some(vec!["t".to_string()])
        );
        assert_eq!(registry.remove_subscriber("x"), None);
    }

    #[test]
    fn test_clear_drops_everything() {
        let registry = SubscriptionRegistry::new();
        registry
            .try_register(ManagedOperation::ChatMessageStream, "a")
            .unwrap();
        registry
            .try_register(ManagedOperation::NotificationStream, "n")
            .unwrap();
        registry.clear();
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[test]
    fn test_concurrent_single_registration_admits_one() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .try_register(ManagedOperation::ChatMessageStream, &format!("s{i}"))
                        .is_ok()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().expect("thread should finish"))
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
