// src/feed/mod.rs

//! Auto-reconnecting telemetry subscriptions: the registry, the per-feed
//! state machine, the transport seam, and the consumer-facing handler trait.

pub mod handler;
pub mod registry;
pub mod subscription;
pub mod transport;
pub mod types;
