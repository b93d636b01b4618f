//! Local event runner
//!
//! Reads an event JSON from a file and dispatches it to the ingestion or
//! query pipeline, printing the response envelope. Ingestion events are
//! recognized by their `Records` field.

use anyhow::Context;
use ragforge::{handler, App, AppConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let event_path = args
        .next()
        .context("usage: ragforge <event.json> [config.{json,toml}]")?;
    let config = match args.next() {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env(),
    };

    let app = App::new(config).await?;

    let raw = std::fs::read_to_string(&event_path)
        .with_context(|| format!("reading event file {event_path}"))?;
    let event: serde_json::Value = serde_json::from_str(&raw)?;

    let response = if event.get("Records").is_some() {
        handler::handle_ingestion(&app.ingestion, event).await
    } else {
        handler::handle_query(&app.query, event).await
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
