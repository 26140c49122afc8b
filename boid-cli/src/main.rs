use anyhow::{Context, Result};
use boid_cli::{build_flock, load_settings, Args, Driver};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    log::info!("Boid simulation starting...");

    let settings = load_settings(&args)?;
    log::debug!("Settings: {:?}", settings);

    let flock = build_flock(settings.to_config(), args.seed)?;

    let out: Box<dyn Write> = match &args.output {
        Some(path) => {
            log::info!("Writing snapshots to {}", path.display());
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let mut driver = Driver::new(flock, out)
        .ticks(args.ticks)
        .interval(Duration::from_millis(args.interval_ms))
        .snapshot_every(args.snapshot_every);

    driver.run().await.context("Simulation error")?;

    Ok(())
}
