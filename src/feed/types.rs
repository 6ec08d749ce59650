// src/feed/types.rs

//! Core types shared by the subscription machinery.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Opaque identifier naming one physical instrument.
pub type InstrumentId = i64;

/// Identifier of a sub-measurement point within an instrument.
pub type SensorId = i64;

/// A unique key for one logical telemetry subscription.
///
/// The backend exposes feeds at three granularities, so keys come in three
/// shapes: a whole instrument, one sensor of an instrument, or one
/// sensor/channel pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    /// Key for the full feed of one instrument.
    pub fn instrument(id: InstrumentId) -> Self {
        Self(id.to_string())
    }

    /// Key for one sensor of an instrument.
    pub fn sensor(instrument_id: InstrumentId, sensor_id: SensorId) -> Self {
        Self(format!("{instrument_id}-sensor{sensor_id}"))
    }

    /// Key for one sensor/channel pair, the granularity the measurement
    /// view keys its boxes by.
    pub fn channel(sensor_id: SensorId, channel: i64) -> Self {
        Self(format!("{sensor_id}-ch{channel}"))
    }

    /// The raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a [`Subscription`](crate::feed::subscription::Subscription).
///
/// A subscription starts out `Connecting`, becomes `Open`, and on loss of
/// the transport moves through `Reconnecting` back to `Open` or, once the
/// retry budget is spent, to `Failed`. `Closed` is reachable from any
/// non-terminal state via explicit unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Transport handshake in flight.
    Connecting,
    /// Transport active; messages are flowing to the decoder.
    Open,
    /// Unexpected closure; a retry is scheduled. `attempt` is 1-based so a
    /// view can render "Attempt 1 of 3".
    Reconnecting { attempt: u32 },
    /// Retry budget exhausted. No further automatic attempts; the caller
    /// must re-subscribe or remove the entry.
    Failed,
    /// Explicitly unsubscribed. Terminal.
    Closed,
}

impl SubscriptionState {
    /// Whether the subscription is still working towards (or holding) a live
    /// transport. Active entries are returned idempotently by the registry.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Open | Self::Reconnecting { .. }
        )
    }

    /// Whether the state machine has stopped for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::Open => f.write_str("open"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed => f.write_str("failed"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Tuning knobs for the reconnecting subscription.
///
/// The defaults match the dashboard this crate was built for: a fixed 5 s
/// delay between retries, 3 retries before giving up, and a 15 minute idle
/// watchdog on the message stream.
#[derive(Debug, Clone, Copy)]
pub struct FeedConfig {
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Number of automatic reconnect attempts before the subscription is
    /// marked [`SubscriptionState::Failed`].
    pub max_reconnect_attempts: u32,
    /// If no message decodes successfully for this long while `Open`, the
    /// transport is torn down and rebuilt from scratch. This path does not
    /// consume the retry budget.
    pub idle_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(5000),
            max_reconnect_attempts: 3,
            idle_timeout: Duration::from_secs(15 * 60),
        }
    }
}
