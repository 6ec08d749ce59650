// src/roster.rs

//! Fetches the instrument roster from the backend HTTP API.
//!
//! A view typically calls this once at startup to decide which feeds to
//! open: the full list when offering instruments to connect, the connected
//! subset when mirroring what is already live.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::feed::types::InstrumentId;

/// One instrument as described by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstrumentDescriptor {
    pub id: InstrumentId,
    pub instrument_name: String,
    /// Part number.
    pub pn: String,
    /// Serial number.
    pub sn: String,
}

impl InstrumentDescriptor {
    /// The display label the dashboard uses in its instrument picker.
    pub fn label(&self) -> String {
        format!("{} - PN: {}, SN: {}", self.instrument_name, self.pn, self.sn)
    }
}

/// Errors from the roster endpoints.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("roster request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Typed client for the instrument list endpoints.
#[derive(Debug, Clone)]
pub struct RosterClient {
    http: reqwest::Client,
    base_url: String,
}

impl RosterClient {
    /// `base_url` is the backend origin, e.g. `http://dash.local`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Every registered instrument (`/api/thermohygrometers/`).
    pub async fn all_instruments(&self) -> Result<Vec<InstrumentDescriptor>, RosterError> {
        self.fetch("/api/thermohygrometers/").await
    }

    /// Only instruments with a live acquisition connection
    /// (`/api/v1/thermohygrometers/connected/`).
    pub async fn connected_instruments(&self) -> Result<Vec<InstrumentDescriptor>, RosterError> {
        self.fetch("/api/v1/thermohygrometers/connected/").await
    }

    async fn fetch(&self, path: &str) -> Result<Vec<InstrumentDescriptor>, RosterError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Fetching instrument roster");
        let instruments = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<InstrumentDescriptor>>()
            .await?;
        debug!(count = instruments.len(), "Roster fetched");
        Ok(instruments)
    }
}
