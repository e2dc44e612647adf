use anyhow::{bail, Context};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use meter_engine::{
    config::{AppArgs, AppConfig},
    replay::{read_capture, render_table, run_replay},
    MeterEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => AppConfig::default(),
    };
    config.load_from_env()?;
    args.apply_to(&mut config);

    let filter = config.logging.filter(std::env::var("RUST_LOG").ok());
    env_logger::Builder::new().parse_filters(&filter).init();

    log::info!("Starting Meter Engine replay");

    if let Err(errors) = config.validate() {
        log::error!("Configuration validation failed:");
        for error in &errors {
            log::error!("  - {}", error);
        }
        bail!("Configuration validation failed: {}", errors.join("; "));
    }

    let engine = Arc::new(MeterEngine::new(&config)?);
    let input = read_capture(&args.input)
        .with_context(|| format!("Failed to read capture {:?}", args.input))?;

    let stats = run_replay(
        engine.clone(),
        input.envelopes,
        config.replay.producers,
        Duration::from_millis(config.replay.report_interval_ms),
    )
    .await;
    log::info!(
        "{} messages handled, {} unknown, {} dropped, {} lines skipped",
        stats.handled,
        stats.unknown,
        stats.dropped,
        input.skipped_lines
    );

    let session = engine.export_snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        print!("{}", render_table(&session));
    }

    Ok(())
}
