// src/feed/subscription.rs

//! A single auto-reconnecting telemetry subscription.
//!
//! Each subscription owns one background task driving the lifecycle: it
//! connects, stays open while messages flow, and on loss of the transport
//! reconnects until either the feed recovers or the retry budget is spent
//! and the subscription fails. `Closed` is reachable from any non-terminal
//! state via [`Subscription::close`].
//! At most one live transport exists per subscription at any time; a
//! reconnect always discards the previous transport first.

use crate::decode::{DecodeError, decode};
use crate::feed::handler::FeedHandler;
use crate::feed::transport::Connector;
use crate::feed::transport::Transport;
use crate::feed::types::{FeedConfig, SubscriptionKey, SubscriptionState};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// The notification sent to the peer before an intentional close, so the
/// backend can release the instrument.
pub fn disconnect_command() -> String {
    serde_json::json!({ "command": "disconnect" }).to_string()
}

/// Handle to one logical feed connection.
///
/// Cheap to clone through its `Arc`; the background task keeps running until
/// it fails terminally or [`close`](Self::close) is called.
#[derive(Debug)]
pub struct Subscription {
    key: SubscriptionKey,
    cancel: CancellationToken,
    state_rx: watch::Receiver<SubscriptionState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    /// Spawns the driver task for `key`. Used by the registry; consumers go
    /// through [`FeedRegistry::subscribe`](crate::feed::registry::FeedRegistry::subscribe).
    pub(crate) fn spawn<C, H>(
        key: SubscriptionKey,
        connector: C,
        handler: Arc<H>,
        config: FeedConfig,
    ) -> Arc<Self>
    where
        C: Connector,
        H: FeedHandler,
    {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SubscriptionState::Connecting);

        let driver = Driver {
            key: key.clone(),
            connector,
            handler,
            config,
            cancel: cancel.clone(),
            state_tx,
            last_notified: None,
        };
        let task = tokio::spawn(driver.run());

        Arc::new(Self {
            key,
            cancel,
            state_rx,
            task: Mutex::new(Some(task)),
        })
    }

    /// The key this subscription is registered under.
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        *self.state_rx.borrow()
    }

    /// A watch receiver for observing state transitions.
    pub fn state_watch(&self) -> watch::Receiver<SubscriptionState> {
        self.state_rx.clone()
    }

    /// Closes the subscription: cancels any pending reconnect timer, sends
    /// the disconnect notification if the transport is open, and waits for
    /// the driver task to finish. Idempotent; a second call is a no-op.
    ///
    /// Messages racing with the close are discarded; a closed subscription
    /// never resurrects.
    pub async fn close(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(key = %self.key, "Subscription driver task panicked: {}", e);
            }
        }
    }
}

/// Outcome of one established-transport read loop.
enum ReadOutcome {
    /// Explicit close requested.
    Cancelled,
    /// The idle watchdog fired; rebuild from scratch without consuming the
    /// retry budget.
    IdleTimeout,
    /// Transport error or unexpected closure; counts against the budget.
    TransportLost,
}

struct Driver<C: Connector, H: FeedHandler> {
    key: SubscriptionKey,
    connector: C,
    handler: Arc<H>,
    config: FeedConfig,
    cancel: CancellationToken,
    state_tx: watch::Sender<SubscriptionState>,
    last_notified: Option<SubscriptionState>,
}

impl<C: Connector, H: FeedHandler> Driver<C, H> {
    #[instrument(skip(self), fields(key = %self.key))]
    async fn run(mut self) {
        let mut attempt: u32 = 0;

        loop {
            self.set_state(SubscriptionState::Connecting).await;

            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.set_state(SubscriptionState::Closed).await;
                    return;
                }
                res = self.connector.connect() => res,
            };

            let mut transport = match connected {
                Ok(transport) => transport,
                Err(e) => {
                    warn!("Transport handshake failed: {}", e);
                    if !self.schedule_retry(&mut attempt).await {
                        return;
                    }
                    continue;
                }
            };

            attempt = 0;
            info!("Feed open");
            self.set_state(SubscriptionState::Open).await;

            match self.read_loop(&mut transport).await {
                ReadOutcome::Cancelled => {
                    // Graceful close: notify the peer, then release the
                    // transport.
                    if transport.send(disconnect_command()).await.is_err() {
                        debug!("Peer gone before disconnect notification");
                    }
                    transport.close().await;
                    self.set_state(SubscriptionState::Closed).await;
                    return;
                }
                ReadOutcome::IdleTimeout => {
                    warn!(
                        idle_timeout = ?self.config.idle_timeout,
                        "No telemetry within idle timeout, rebuilding connection"
                    );
                    transport.close().await;
                }
                ReadOutcome::TransportLost => {
                    if !self.schedule_retry(&mut attempt).await {
                        return;
                    }
                }
            }
        }
    }

    /// Processes inbound messages until the transport dies, the idle
    /// watchdog fires, or the subscription is cancelled. The watchdog is
    /// re-armed only on successfully decoded messages.
    async fn read_loop(&mut self, transport: &mut C::Transport) -> ReadOutcome {
        let mut idle = Box::pin(time::sleep(self.config.idle_timeout));

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ReadOutcome::Cancelled,
                _ = &mut idle => return ReadOutcome::IdleTimeout,
                inbound = transport.recv() => match inbound {
                    Some(Ok(text)) => match decode(&text) {
                        Ok(reading) => {
                            idle = Box::pin(time::sleep(self.config.idle_timeout));
                            debug!(reading_key = %reading.key(), "Decoded reading");
                            self.handler.on_reading(&self.key, reading).await;
                        }
                        Err(DecodeError::ServerReported(message)) => {
                            info!("Server-reported feed error: {}", message);
                            self.handler.on_server_error(&self.key, &message).await;
                        }
                        Err(e) => {
                            warn!("Dropping undecodable message: {}", e);
                        }
                    },
                    Some(Err(e)) => {
                        warn!("Transport error: {}", e);
                        return ReadOutcome::TransportLost;
                    }
                    None => {
                        debug!("Transport closed by peer");
                        return ReadOutcome::TransportLost;
                    }
                }
            }
        }
    }

    /// Increments the retry counter and waits out the reconnect delay.
    /// Returns `false` when the budget is exhausted (state set to `Failed`)
    /// or the subscription was closed while waiting.
    async fn schedule_retry(&mut self, attempt: &mut u32) -> bool {
        *attempt += 1;
        if *attempt > self.config.max_reconnect_attempts {
            error!(
                attempts = self.config.max_reconnect_attempts,
                "Retry budget exhausted, giving up on feed"
            );
            self.set_state(SubscriptionState::Failed).await;
            return false;
        }

        info!(
            attempt = *attempt,
            max = self.config.max_reconnect_attempts,
            delay = ?self.config.reconnect_delay,
            "Scheduling reconnect"
        );
        self.set_state(SubscriptionState::Reconnecting { attempt: *attempt })
            .await;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.set_state(SubscriptionState::Closed).await;
                false
            }
            _ = time::sleep(self.config.reconnect_delay) => true,
        }
    }

    async fn set_state(&mut self, state: SubscriptionState) {
        self.state_tx.send_replace(state);
        if self.last_notified != Some(state) {
            self.last_notified = Some(state);
            self.handler.on_state_change(&self.key, state).await;
        }
    }
}
