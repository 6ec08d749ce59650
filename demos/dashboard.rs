//! Terminal analogue of a live measurement dashboard: fetch the connected
//! instruments, open one listener feed per instrument, and print each
//! reading with its out-of-range flags until Ctrl-C.
//!
//! Usage: `cargo run --example dashboard -- dash.local:8000`

use anyhow::Context;
use instrument_feed_kit::prelude::*;
use tracing::info;

struct PrintingView;

fn fmt_value(value: Option<f64>, status: Option<RangeStatus>) -> String {
    let flag = match status {
        Some(RangeStatus::OutOfRange) => "!",
        _ => "",
    };
    match value {
        Some(v) => format!("{v:.1}{flag}"),
        None => "--".to_string(),
    }
}

#[async_trait::async_trait]
impl FeedHandler for PrintingView {
    async fn on_reading(&self, key: &SubscriptionKey, reading: Reading) {
        let eval = evaluate(&reading);
        println!(
            "[{key}] {} CH {} ({}) | T {} °C corr {} °C | RH {} % corr {} % | {}",
            reading.sensor_name,
            reading.channel,
            reading.location,
            fmt_value(reading.temperature, eval.temperature),
            fmt_value(reading.corrected_temperature, eval.corrected_temperature),
            fmt_value(reading.humidity, eval.humidity),
            fmt_value(reading.corrected_humidity, eval.corrected_humidity),
            reading.timestamp.as_deref().unwrap_or("no timestamp"),
        );
    }

    async fn on_state_change(&self, key: &SubscriptionKey, state: SubscriptionState) {
        println!("[{key}] connection {state}");
    }

    async fn on_server_error(&self, key: &SubscriptionKey, message: &str) {
        println!("[{key}] instrument reported: {message}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dashboard=info".parse()?)
                .add_directive("instrument_feed_kit=info".parse()?),
        )
        .init();

    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8000".to_string());

    let roster = RosterClient::new(format!("http://{host}"));
    let instruments = roster
        .connected_instruments()
        .await
        .context("fetching connected instruments")?;

    if instruments.is_empty() {
        println!("No instruments connected. Connect one on the main dashboard first.");
        return Ok(());
    }

    let registry = FeedRegistry::new(PrintingView);
    for instrument in &instruments {
        info!("Subscribing to {}", instrument.label());
        registry.subscribe(
            SubscriptionKey::instrument(instrument.id),
            WsConnector::listener_feed(&host, instrument.id),
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    registry.unsubscribe_all().await;
    Ok(())
}
