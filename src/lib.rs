//! # Instrument Feed Kit
//!
//! A toolkit for consuming live instrument telemetry (thermo-hygrometers and
//! similar networked sensors) over WebSockets. This crate provides the
//! building blocks a monitoring view needs so you can focus on rendering
//! instead of the boilerplate for keeping feeds alive.
//!
//! ## Core Features
//!
//! - **`FeedRegistry`**: one logical subscription per instrument/sensor key,
//!   idempotent subscribe, clean teardown.
//! - **Auto-reconnection**: bounded retries with a fixed delay, an idle
//!   watchdog that rebuilds silent connections, and an explicit FAILED state
//!   so the user can tell "still trying" from "gave up".
//! - **Telemetry decoding**: tolerant JSON decoding into a canonical
//!   [`Reading`](decode::Reading), accepting both enveloped and flat payloads.
//! - **Limit evaluation**: per-field in-range/out-of-range classification
//!   against per-instrument bounds.
//! - **Pluggable rendering**: implement the `FeedHandler` trait to project
//!   readings and connection states into your view.
//! - **Roster fetch (optional)**: a typed HTTP client for the instrument
//!   list endpoints, enabled by the `roster` feature.
//!
//! ## Getting Started
//!
//! See the documentation for the `feed` module, or the `dashboard` example
//! for a complete fetch-roster/subscribe/render loop.
//!
//! ---

// The `feed` module contains all subscription-lifecycle logic.
pub mod feed;

// Decoding raw feed messages into canonical readings.
pub mod decode;

// Classifying readings against per-instrument limits.
pub mod limits;

// It will only be part of the crate if the "roster" feature is enabled.
#[cfg(feature = "roster")]
pub mod roster;

/// Public prelude for convenience.
///
/// This allows users to import the most common types with a single `use`
/// statement: `use instrument_feed_kit::prelude::*;`
pub mod prelude {
    pub use crate::decode::{DecodeError, Reading, decode};
    pub use crate::feed::{
        handler::FeedHandler,
        registry::FeedRegistry,
        subscription::Subscription,
        transport::{Connector, Transport, TransportError, WsConnector},
        types::{FeedConfig, InstrumentId, SensorId, SubscriptionKey, SubscriptionState},
    };
    pub use crate::limits::{RangeStatus, ReadingEvaluation, classify, evaluate};

    // Re-export the roster client if the feature is enabled.
    #[cfg(feature = "roster")]
    pub use crate::roster::{InstrumentDescriptor, RosterClient};
}
