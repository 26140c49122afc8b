//! Headless driver for the flock simulation.
//!
//! Resolves settings from defaults, an optional JSON file and command line
//! overrides, then ticks a [`Flock`] at a fixed cadence and writes snapshots
//! as JSON lines.

use anyhow::{bail, Context, Result};
use boid_core::{Flock, SimulationConfig};
use boid_shared::{FlockSettings, FlockSnapshot, UpdateOrder};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Ticks run when no count is given
pub const DEFAULT_TICKS: u64 = 500;

/// Frame cadence in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 20;

pub const DEFAULT_SNAPSHOT_EVERY: u64 = 1;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Headless flocking simulation", long_about = None)]
pub struct Args {
    /// JSON settings file (camelCase keys, missing keys keep their defaults)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of agents
    #[arg(long)]
    pub population: Option<usize>,

    /// Distance travelled per tick
    #[arg(long)]
    pub speed: Option<f64>,

    #[arg(long)]
    pub collision_radius: Option<f64>,

    #[arg(long)]
    pub vision_radius: Option<f64>,

    /// Separation weight at zero distance, in [0, 1]
    #[arg(long)]
    pub max_repulsion: Option<f64>,

    #[arg(long)]
    pub heading_strength: Option<f64>,

    #[arg(long)]
    pub cohesion_strength: Option<f64>,

    /// Side length of the square arena
    #[arg(long)]
    pub arena_size: Option<f64>,

    /// How agents observe each other during a tick
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Seed for the initial population (random if omitted)
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Number of ticks to run
    #[arg(short = 'n', long, default_value_t = DEFAULT_TICKS)]
    pub ticks: u64,

    /// Milliseconds between ticks, 0 runs as fast as possible
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MS)]
    pub interval_ms: u64,

    /// Write a snapshot every N ticks, 0 disables snapshots
    #[arg(long, default_value_t = DEFAULT_SNAPSHOT_EVERY)]
    pub snapshot_every: u64,

    /// Snapshot output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sequential,
    Snapshot,
}

impl From<Mode> for UpdateOrder {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Sequential => UpdateOrder::Sequential,
            Mode::Snapshot => UpdateOrder::Snapshot,
        }
    }
}

/// Reads the settings file named by `args`, if any, and applies overrides.
pub fn load_settings(args: &Args) -> Result<FlockSettings> {
    if args.ticks == 0 {
        bail!("--ticks must be at least 1");
    }

    let settings = match &args.config {
        Some(path) => {
            log::info!("Loading settings from {}", path.display());
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings file {}", path.display()))?;
            parse_settings(&text)
                .with_context(|| format!("Failed to parse settings file {}", path.display()))?
        }
        None => FlockSettings::default(),
    };

    Ok(apply_overrides(settings, args))
}

pub fn parse_settings(text: &str) -> Result<FlockSettings> {
    Ok(serde_json::from_str(text)?)
}

pub fn apply_overrides(mut settings: FlockSettings, args: &Args) -> FlockSettings {
    if let Some(population) = args.population {
        settings.population_size = population;
    }
    if let Some(speed) = args.speed {
        settings.speed = speed;
    }
    if let Some(radius) = args.collision_radius {
        settings.collision_radius = radius;
    }
    if let Some(radius) = args.vision_radius {
        settings.vision_radius = radius;
    }
    if let Some(repulsion) = args.max_repulsion {
        settings.max_repulsion = repulsion;
    }
    if let Some(strength) = args.heading_strength {
        settings.heading_strength = strength;
    }
    if let Some(strength) = args.cohesion_strength {
        settings.cohesion_strength = strength;
    }
    if let Some(size) = args.arena_size {
        settings.arena_size = size;
    }
    if let Some(mode) = args.mode {
        settings.update_order = mode.into();
    }
    settings
}

pub fn build_flock(config: SimulationConfig, seed: Option<u64>) -> Result<Flock> {
    let flock = match seed {
        Some(seed) => Flock::with_seed(config, seed),
        None => Flock::new(config),
    };
    flock.context("Invalid simulation settings")
}

pub fn snapshot(flock: &Flock) -> FlockSnapshot {
    FlockSnapshot::from_flock(flock)
}

/// Plays the role of the frame timer: ticks the flock and reports what it sees.
pub struct Driver<W: Write> {
    flock: Flock,
    out: W,
    ticks: u64,
    interval: Duration,
    snapshot_every: u64,
}

impl<W: Write> Driver<W> {
    pub fn new(flock: Flock, out: W) -> Self {
        Self {
            flock,
            out,
            ticks: DEFAULT_TICKS,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            snapshot_every: DEFAULT_SNAPSHOT_EVERY,
        }
    }

    pub fn ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn snapshot_every(mut self, every: u64) -> Self {
        self.snapshot_every = every;
        self
    }

    pub fn flock(&self) -> &Flock {
        &self.flock
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs all ticks and returns the final snapshot.
    pub async fn run(&mut self) -> Result<FlockSnapshot> {
        log::info!(
            "Running {} ticks of {} agents",
            self.ticks,
            self.flock.agents().len()
        );

        let mut cadence = if self.interval.is_zero() {
            None
        } else {
            let mut cadence = tokio::time::interval(self.interval);
            cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(cadence)
        };

        for _ in 0..self.ticks {
            if let Some(cadence) = cadence.as_mut() {
                cadence.tick().await;
            }

            self.flock.tick();

            if self.snapshot_every > 0 && self.flock.tick_count() % self.snapshot_every == 0 {
                self.emit()?;
            }
        }

        self.out.flush().context("Failed to flush snapshot output")?;

        let last = snapshot(&self.flock);
        if let Some(centroid) = last.centroid() {
            log::info!(
                "Finished after {} ticks: centroid ({:.1}, {:.1}), spread {:.1}, polarization {:.3}",
                last.tick,
                centroid.x,
                centroid.y,
                last.spread(),
                last.polarization()
            );
        }
        Ok(last)
    }

    fn emit(&mut self) -> Result<()> {
        let current = snapshot(&self.flock);
        let line = current.to_json().context("Failed to encode snapshot")?;
        writeln!(self.out, "{}", line).context("Failed to write snapshot")?;
        log::debug!("Wrote snapshot for tick {}", current.tick);
        Ok(())
    }
}
