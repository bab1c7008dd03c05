//! Headless live viewer: follows the snapshot stream, lays the topology out
//! and renders it to the log and, at exit, to an SVG file.

mod config;
mod render;
mod stats;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use graphview::{PinError, PinState, RenderAdapter, Scene};
use stream_client::{Endpoint, StreamClient, StreamEvent};
use swanradar_layout::Position;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, PinRequest};
use crate::render::{LogAdapter, SvgAdapter};
use crate::stats::StreamStats;

/// Live access point topology viewer
#[derive(Parser, Debug)]
#[command(name = "swanradar", version, about, long_about = None)]
struct Args {
    /// Snapshot server host
    #[arg(long)]
    host: Option<String>,

    /// Snapshot server port
    #[arg(short, long)]
    port: Option<u16>,

    /// KDL configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the last frame to this SVG file on exit
    #[arg(long)]
    svg_out: Option<PathBuf>,

    /// Exit after rendering this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Frames per second
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    fps: Option<u32>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = &args.svg_out {
        config.render.svg_out = Some(path.clone());
    }
    if let Some(frames) = args.frames {
        config.render.frames = Some(frames);
    }
    if let Some(fps) = args.fps {
        config.render.fps = fps;
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = load_config(&args)?;
    run(config).await
}

async fn run(config: AppConfig) -> Result<()> {
    let mut scene = Scene::new(config.scene.clone()).context("invalid scene configuration")?;
    let mut client = StreamClient::websocket(config.stream.clone());
    let mut events = client.subscribe();
    client.connect(Endpoint::new(config.host.clone(), config.port));

    let mut stats = StreamStats::default();
    let mut pending_pins = config.pins.clone();
    let mut log = LogAdapter::new(config.render.log_every);
    let mut svg = SvgAdapter::new();

    let period = Duration::from_secs_f64(1.0 / f64::from(config.render.fps.max(1)));
    let mut frames = tokio::time::interval(period);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut rendered = 0u64;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ctrl_c_armed = true;

    loop {
        tokio::select! {
            res = &mut ctrl_c, if ctrl_c_armed => match res {
                Ok(()) => {
                    info!("interrupted");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "cannot listen for ctrl-c");
                    ctrl_c_armed = false;
                }
            },
            event = events.recv() => match event {
                Ok(event) => handle_event(event, &mut scene, &mut stats, &mut pending_pins),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "viewer fell behind the stream");
                }
                Err(RecvError::Closed) => break,
            },
            _ = frames.tick() => {
                if let Err(err) = scene.tick(Instant::now()) {
                    warn!(error = %err, "layout step failed");
                }
                let frame = scene.frame();
                log.present(&frame);
                svg.present(&frame);
                rendered += 1;
                if config.render.frames.is_some_and(|limit| rendered >= limit) {
                    info!(frames = rendered, "frame limit reached");
                    break;
                }
            }
        }
    }

    scene.shutdown();
    client.close().await;

    if let Some(path) = &config.render.svg_out {
        let written = svg
            .write_to(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        if written {
            info!(path = %path.display(), "wrote svg snapshot");
        } else {
            warn!("no frame was rendered; svg not written");
        }
    }
    stats.log_summary();
    Ok(())
}

fn handle_event(
    event: StreamEvent,
    scene: &mut Scene,
    stats: &mut StreamStats,
    pending_pins: &mut Vec<PinRequest>,
) {
    match event {
        StreamEvent::Connected => stats.record_connect(),
        StreamEvent::Snapshot(snapshot) => {
            stats.record_snapshot(&snapshot, Local::now());
            scene.apply_snapshot(&snapshot);
            apply_pending_pins(scene, pending_pins);
        }
        StreamEvent::Status { connected_clients } => {
            debug!(connected_clients, "server status");
            stats.record_status(connected_clients);
        }
        StreamEvent::Disconnected { reason } => {
            info!(%reason, "keeping last known topology");
        }
        StreamEvent::Error { cause } => {
            warn!(%cause, "keeping last known topology");
        }
    }
}

/// Pin configured nodes the first time they show up.
fn apply_pending_pins(scene: &mut Scene, pending: &mut Vec<PinRequest>) {
    pending.retain(|pin| {
        if scene.node(&pin.id).is_none() {
            return true;
        }
        match pin_at(scene, pin) {
            Ok(state) => info!(id = %pin.id, ?state, "applied configured pin"),
            Err(err) => warn!(id = %pin.id, error = %err, "could not apply configured pin"),
        }
        false
    });
}

fn pin_at(scene: &mut Scene, pin: &PinRequest) -> Result<PinState, PinError> {
    scene.begin_drag(&pin.id)?;
    scene.drag_to(&pin.id, Position::new(pin.x, pin.y))?;
    scene.end_drag(&pin.id, Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphview::{AccessPoint, SceneConfig, Snapshot};

    #[test]
    fn test_cli_overrides_defaults() {
        let args = Args::parse_from(["swanradar", "--port", "9001", "--frames", "10", "-vv"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.render.frames, Some(10));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_zero_fps_rejected() {
        assert!(Args::try_parse_from(["swanradar", "--fps", "0"]).is_err());
    }

    #[test]
    fn test_configured_pin_applies_once_node_appears() {
        let mut scene = Scene::new(SceneConfig::default()).unwrap();
        let mut stats = StreamStats::default();
        let mut pending = vec![PinRequest {
            id: "BB".into(),
            x: 10.0,
            y: 20.0,
        }];

        let first = Snapshot {
            aps: vec![AccessPoint::new("AA")],
            ..Default::default()
        };
        handle_event(
            StreamEvent::Snapshot(first.into()),
            &mut scene,
            &mut stats,
            &mut pending,
        );
        assert_eq!(pending.len(), 1);

        let second = Snapshot {
            aps: vec![AccessPoint::new("AA"), AccessPoint::new("BB")],
            ..Default::default()
        };
        handle_event(
            StreamEvent::Snapshot(second.into()),
            &mut scene,
            &mut stats,
            &mut pending,
        );
        assert!(pending.is_empty());
        let bb = scene.node("BB").unwrap();
        assert!(bb.pinned());
        assert_eq!(bb.position(), Position::new(10.0, 20.0));
        assert_eq!(stats.messages, 2);
    }
}
