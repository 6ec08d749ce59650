// src/feed/registry.rs

//! The `FeedRegistry`, owner of every live subscription.
//!
//! One registry instance is scoped to the consuming view (a dashboard page,
//! a service); tearing the view down means calling
//! [`unsubscribe_all`](FeedRegistry::unsubscribe_all). There is no ambient
//! global connection map.

use crate::feed::handler::FeedHandler;
use crate::feed::subscription::Subscription;
use crate::feed::transport::Connector;
use crate::feed::types::{FeedConfig, SubscriptionKey, SubscriptionState};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Tracks one logical subscription per key and owns each one's lifecycle.
///
/// `DashMap` is used for high-performance concurrent access without `async`
/// locks, exactly as the connection state of the underlying service layer.
#[derive(Debug)]
pub struct FeedRegistry<H: FeedHandler> {
    subscriptions: DashMap<SubscriptionKey, Arc<Subscription>>,
    handler: Arc<H>,
    config: FeedConfig,
}

impl<H: FeedHandler> FeedRegistry<H> {
    /// Creates a registry with default [`FeedConfig`].
    pub fn new(handler: H) -> Arc<Self> {
        Self::with_config(handler, FeedConfig::default())
    }

    /// Creates a registry with explicit tuning knobs.
    pub fn with_config(handler: H, config: FeedConfig) -> Arc<Self> {
        Arc::new(Self {
            subscriptions: DashMap::new(),
            handler: Arc::new(handler),
            config,
        })
    }

    /// Subscribes to `key`, constructing the transport via `connector`.
    ///
    /// Idempotent for active keys: if a subscription for `key` is currently
    /// CONNECTING, OPEN or RECONNECTING, the existing one is returned and no
    /// second transport is created. A FAILED or CLOSED leftover is replaced
    /// by a fresh subscription.
    #[instrument(skip_all, fields(key = %key))]
    pub fn subscribe<C: Connector>(
        &self,
        key: SubscriptionKey,
        connector: C,
    ) -> Arc<Subscription> {
        match self.subscriptions.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().state().is_active() {
                    debug!("Subscription already active, returning existing");
                    return Arc::clone(entry.get());
                }
                // The prior driver task has already stopped; only the handle
                // remains to be swapped out.
                info!(prior = %entry.get().state(), "Replacing terminal subscription");
                let sub =
                    Subscription::spawn(key, connector, Arc::clone(&self.handler), self.config);
                entry.insert(Arc::clone(&sub));
                sub
            }
            Entry::Vacant(entry) => {
                info!("Creating subscription");
                let sub =
                    Subscription::spawn(key, connector, Arc::clone(&self.handler), self.config);
                entry.insert(Arc::clone(&sub));
                sub
            }
        }
    }

    /// Closes and removes the subscription for `key`. Sends the disconnect
    /// notification if the transport is open. Unknown keys are a logged
    /// no-op; calling twice has no additional effect.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn unsubscribe(&self, key: &SubscriptionKey) {
        match self.subscriptions.remove(key) {
            Some((_, sub)) => {
                info!("Unsubscribing");
                sub.close().await;
            }
            None => {
                debug!("Unsubscribe for unknown key, ignoring");
            }
        }
    }

    /// Full teardown: closes and removes every subscription.
    pub async fn unsubscribe_all(&self) {
        let keys: Vec<SubscriptionKey> = self
            .subscriptions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        info!(count = keys.len(), "Tearing down all subscriptions");
        for key in keys {
            self.unsubscribe(&key).await;
        }
    }

    /// The subscription currently registered for `key`, if any.
    pub fn get(&self, key: &SubscriptionKey) -> Option<Arc<Subscription>> {
        self.subscriptions.get(key).map(|entry| entry.value().clone())
    }

    /// Snapshot of every registered key and its state, for status views.
    pub fn states(&self) -> Vec<(SubscriptionKey, SubscriptionState)> {
        self.subscriptions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    /// Number of registered subscriptions (including FAILED leftovers).
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::handler::testing::{FeedEvent, RecordingHandler};
    use crate::feed::transport::testing::FakeConnector;
    use once_cell::sync::Lazy;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    static TRACING: Lazy<()> = Lazy::new(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });

    fn fast_config() -> FeedConfig {
        FeedConfig {
            reconnect_delay: Duration::from_millis(10),
            max_reconnect_attempts: 3,
            idle_timeout: Duration::from_secs(60),
        }
    }

    async fn wait_for_state(
        events: &mut mpsc::UnboundedReceiver<FeedEvent>,
        wanted: SubscriptionState,
    ) {
        timeout(Duration::from_secs(2), async {
            loop {
                match events.recv().await.expect("event channel closed") {
                    FeedEvent::State(_, state) if state == wanted => return,
                    _ => continue,
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for state {wanted}"));
    }

    #[tokio::test]
    async fn duplicate_subscribe_creates_one_transport() {
        Lazy::force(&TRACING);
        let (connector, mut remotes) = FakeConnector::new();
        let (handler, mut events) = RecordingHandler::new();
        let registry = FeedRegistry::with_config(handler, fast_config());
        let key = SubscriptionKey::instrument(3);

        let first = registry.subscribe(key.clone(), connector.clone());
        let second = registry.subscribe(key.clone(), connector.clone());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        let _remote = timeout(Duration::from_secs(2), remotes.recv())
            .await
            .unwrap()
            .unwrap();
        wait_for_state(&mut events, SubscriptionState::Open).await;
        assert_eq!(connector.connect_attempts(), 1);

        registry.unsubscribe_all().await;
    }

    #[tokio::test]
    async fn unsubscribe_unknown_key_is_a_noop() {
        Lazy::force(&TRACING);
        let (handler, _events) = RecordingHandler::new();
        let registry = FeedRegistry::with_config(handler, fast_config());

        registry
            .unsubscribe(&SubscriptionKey::instrument(99))
            .await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        Lazy::force(&TRACING);
        let (connector, _remotes) = FakeConnector::new();
        let (handler, mut events) = RecordingHandler::new();
        let registry = FeedRegistry::with_config(handler, fast_config());
        let key = SubscriptionKey::instrument(3);

        registry.subscribe(key.clone(), connector.clone());
        wait_for_state(&mut events, SubscriptionState::Open).await;

        registry.unsubscribe(&key).await;
        assert!(registry.is_empty());
        registry.unsubscribe(&key).await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn resubscribing_after_unsubscribe_builds_a_new_transport() {
        Lazy::force(&TRACING);
        let (connector, _remotes) = FakeConnector::new();
        let (handler, mut events) = RecordingHandler::new();
        let registry = FeedRegistry::with_config(handler, fast_config());
        let key = SubscriptionKey::instrument(3);

        registry.subscribe(key.clone(), connector.clone());
        wait_for_state(&mut events, SubscriptionState::Open).await;
        registry.unsubscribe(&key).await;

        registry.subscribe(key.clone(), connector.clone());
        wait_for_state(&mut events, SubscriptionState::Open).await;
        assert_eq!(connector.connect_attempts(), 2);

        registry.unsubscribe_all().await;
    }

    #[tokio::test]
    async fn failed_subscription_is_replaced_on_resubscribe() {
        Lazy::force(&TRACING);
        let config = FeedConfig {
            max_reconnect_attempts: 1,
            ..fast_config()
        };
        let (handler, mut events) = RecordingHandler::new();
        let registry = FeedRegistry::with_config(handler, config);
        let key = SubscriptionKey::instrument(3);

        let (broken, _remotes) = FakeConnector::new();
        broken.fail_next_connects(100).await;
        let failed = registry.subscribe(key.clone(), broken);
        wait_for_state(&mut events, SubscriptionState::Failed).await;
        assert_eq!(failed.state(), SubscriptionState::Failed);
        // The FAILED entry stays visible for the caller to act on.
        assert_eq!(registry.len(), 1);

        let (working, _remotes) = FakeConnector::new();
        let fresh = registry.subscribe(key.clone(), working.clone());
        assert!(!Arc::ptr_eq(&failed, &fresh));
        wait_for_state(&mut events, SubscriptionState::Open).await;
        assert_eq!(working.connect_attempts(), 1);

        registry.unsubscribe_all().await;
    }

    #[tokio::test]
    async fn unsubscribe_all_closes_every_feed() {
        Lazy::force(&TRACING);
        let (connector, _remotes) = FakeConnector::new();
        let (handler, mut events) = RecordingHandler::new();
        let registry = FeedRegistry::with_config(handler, fast_config());

        let a = registry.subscribe(SubscriptionKey::instrument(1), connector.clone());
        let b = registry.subscribe(SubscriptionKey::instrument(2), connector.clone());
        wait_for_state(&mut events, SubscriptionState::Open).await;
        wait_for_state(&mut events, SubscriptionState::Open).await;

        registry.unsubscribe_all().await;
        assert!(registry.is_empty());
        assert_eq!(a.state(), SubscriptionState::Closed);
        assert_eq!(b.state(), SubscriptionState::Closed);
    }
}
