//! Headless curve consumer.
//!
//! Connects to a curve channel and runs a fixed-rate frame loop that samples
//! the latest curve exactly like a renderer would, logging what it sees.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crow::{ChannelConfig, ChannelState, Crow, CrowConfig};
use futures::StreamExt;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SERVER: &str = "ws://127.0.0.1:8000";
const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Parser, Clone)]
#[command(name = "crow-tail")]
#[command(about = "Follow a live curve channel and log sampled frames")]
struct Cli {
    /// YAML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Server base URL, overrides the config file.
    #[arg(long)]
    server: Option<String>,

    /// Channel number, overrides the config file.
    #[arg(long)]
    channel: Option<u32>,

    /// Frame loop rate.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Samples per frame, overrides the config file.
    #[arg(long)]
    samples: Option<usize>,
}

impl Cli {
    fn resolve_config(&self) -> Result<CrowConfig> {
        let mut config = match &self.config {
            Some(path) => CrowConfig::load(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None => {
                let mut config = CrowConfig::new(ChannelConfig::new(DEFAULT_SERVER, 0));
                config.apply_env();
                config
            }
        };

        if let Some(server) = &self.server {
            config.channel.base_url = server.clone();
        }
        if let Some(channel) = self.channel {
            config.channel.channel_id = channel;
        }
        if let Some(samples) = self.samples {
            config.sampling.count = samples;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,crow=debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    let fps = cli.fps.max(1);

    info!(channel = %config.channel, fps, samples = config.sampling.count, "Starting crow-tail");
    let connection = Crow::connect(&config).context("start connection")?;

    let mut states = connection.watch_state();
    let mut frames = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(fps)));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats_tick = tokio::time::interval(STATS_INTERVAL);
    stats_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_version = 0u64;
    let mut frame_count = 0u64;

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Ctrl-C received");
                break;
            }
            Some(state) = states.next() => {
                info!(%state, "Channel state");
                if state == ChannelState::Failed {
                    warn!("Connection failed; last curve stays visible");
                }
            }
            _ = frames.tick() => {
                frame_count += 1;
                let samples = connection.sample();
                let version = connection.store().version();
                if version != last_version {
                    last_version = version;
                    let curve = connection.curve();
                    let (timestamp, control_points, length) = curve
                        .as_ref()
                        .map(|c| (c.timestamp(), c.points().len(), c.length()))
                        .unwrap_or_default();
                    info!(
                        version,
                        timestamp,
                        control_points,
                        samples = samples.len(),
                        length,
                        first = ?samples.first(),
                        last = ?samples.last(),
                        "New curve"
                    );
                }
            }
            _ = stats_tick.tick() => {
                let stats = connection.stats();
                debug!(frames = frame_count, ?stats, "Frame loop stats");
            }
        }
    }

    connection.shutdown().await;
    let stats = connection.stats();
    info!(
        frames = frame_count,
        received = stats.messages_received,
        applied = stats.updates_applied,
        decode_failures = stats.decode_failures,
        "Stopped"
    );
    Ok(())
}
