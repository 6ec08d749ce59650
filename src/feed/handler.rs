// src/feed/handler.rs

//! Defines the `FeedHandler` trait, the contract between the subscription
//! machinery and whatever renders the telemetry (a terminal view, a web
//! view-model, a test recorder).

use crate::decode::Reading;
use crate::feed::types::{SubscriptionKey, SubscriptionState};
use async_trait::async_trait;

/// The central trait a consumer of the feed kit implements.
///
/// One handler instance serves every subscription in a
/// [`FeedRegistry`](crate::feed::registry::FeedRegistry); the key identifies
/// which feed an event belongs to. All hooks run on the subscription's own
/// task, in the order the transport delivered the messages for that key.
#[async_trait]
pub trait FeedHandler: Send + Sync + 'static {
    /// Called for every successfully decoded reading.
    ///
    /// A new reading fully replaces the previous one for its
    /// sensor/channel key; consumers should overwrite, never merge.
    async fn on_reading(&self, key: &SubscriptionKey, reading: Reading);

    /// Called on every lifecycle transition, so a view can distinguish
    /// "still trying" from "gave up, action required".
    ///
    /// The default implementation does nothing.
    async fn on_state_change(&self, _key: &SubscriptionKey, _state: SubscriptionState) {
        // Default is a no-op
    }

    /// Called when the peer reports an error inside a valid payload (e.g. a
    /// sensor gone offline). This is informational: the transport is fine
    /// and no reconnect is triggered.
    ///
    /// The default implementation does nothing.
    async fn on_server_error(&self, _key: &SubscriptionKey, _message: &str) {
        // Default is a no-op
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::mpsc;

    /// Everything a handler can observe, in delivery order.
    #[derive(Debug)]
    pub(crate) enum FeedEvent {
        Reading(SubscriptionKey, Reading),
        State(SubscriptionKey, SubscriptionState),
        ServerError(SubscriptionKey, String),
    }

    /// Handler that forwards every hook invocation onto a channel so tests
    /// can await and assert on the exact sequence.
    pub(crate) struct RecordingHandler {
        tx: mpsc::UnboundedSender<FeedEvent>,
    }

    impl RecordingHandler {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { tx }, rx)
        }
    }

    #[async_trait]
    impl FeedHandler for RecordingHandler {
        async fn on_reading(&self, key: &SubscriptionKey, reading: Reading) {
            let _ = self.tx.send(FeedEvent::Reading(key.clone(), reading));
        }

        async fn on_state_change(&self, key: &SubscriptionKey, state: SubscriptionState) {
            let _ = self.tx.send(FeedEvent::State(key.clone(), state));
        }

        async fn on_server_error(&self, key: &SubscriptionKey, message: &str) {
            let _ = self
                .tx
                .send(FeedEvent::ServerError(key.clone(), message.to_string()));
        }
    }
}
