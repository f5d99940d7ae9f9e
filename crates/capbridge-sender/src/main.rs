//! CapBridge demo sender.
//!
//! Renders a moving test pattern and pushes every frame through a
//! [`CaptureSession`] into an in-process loopback virtual camera, with a
//! consumer thread on the other side playing the part of a video app.
//!
//! ```text
//! render loop (blocking task)            consumer thread
//! ───────────────────────────            ─────────────────────────
//! TestPattern::draw                       LoopbackConsumer::receive
//!   │                                       ▲
//!   ▼                                       │
//! CaptureSession::render ──► LoopbackTransport (slots 0/1)
//! ```
//!
//! # Environment
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `CAPBRIDGE_CONFIG` | JSON settings file (optional) |
//! | `CAPBRIDGE_CHANNEL`, `CAPBRIDGE_TIMEOUT_MS`, … | overrides, see `CaptureSettings::apply_env` |
//! | `CAPBRIDGE_RUN_SECS` | stop after this many seconds instead of waiting for Ctrl-C |
//! | `RUST_LOG` | log filter, default `info` |

mod pattern;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use capbridge_core::{
    CaptureSettings, ColorSpace, FrameDescriptor, GraphicsBackend, PixelFormat, Resolution,
};
use capbridge_transport::{CaptureSession, LoopbackConfig, LoopbackConsumer, LoopbackTransport};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::pattern::TestPattern;

const RENDER_SIZE: Resolution = Resolution::HD;
const CONSUMER_SIZE: Resolution = Resolution::HD;
const STATS_EVERY: Duration = Duration::from_secs(5);
/// Pacing used when vsync is on and nothing else paces the loop.
const VSYNC_FALLBACK: Duration = Duration::from_millis(16);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("CapBridge Sender v{}", env!("CARGO_PKG_VERSION"));

    let settings = load_settings()?;
    let Some(channel) = settings.capture_device.index() else {
        warn!("No capture channel selected (set CAPBRIDGE_CHANNEL); nothing to do.");
        return Ok(());
    };

    let transport = Arc::new(LoopbackTransport::new(LoopbackConfig::default()));
    let consumer = transport
        .attach_consumer(channel, CONSUMER_SIZE)
        .with_context(|| format!("cannot attach a consumer to channel {}", channel))?;

    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let stop = stop.clone();
        thread::Builder::new()
            .name("capbridge-consumer".into())
            .spawn(move || consume(consumer, stop))
            .context("spawning consumer thread")?
    };

    let render = {
        let stop = stop.clone();
        let transport = transport.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = CaptureSession::setup(transport, settings);
            render_loop(&mut session, &stop);
            session.cleanup();
            *session.stats()
        })
    };

    let run_for = std::env::var("CAPBRIDGE_RUN_SECS")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    match run_for {
        Some(limit) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Ctrl-C received, stopping"),
                _ = tokio::time::sleep(limit) => info!("Run time of {:?} elapsed, stopping", limit),
            }
        }
        None => {
            tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
            info!("Ctrl-C received, stopping");
        }
    }
    stop.store(true, Ordering::Relaxed);

    let stats = render.await.context("render task panicked")?;
    let received = reader
        .join()
        .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?;

    info!(
        "Done: {} frames rendered, {} delivered, {} skipped, {} inactive, {} errors; consumer saw {}",
        stats.frames, stats.delivered, stats.skipped, stats.inactive, stats.errors, received
    );
    Ok(())
}

fn load_settings() -> Result<CaptureSettings> {
    let mut settings = match std::env::var("CAPBRIDGE_CONFIG") {
        Ok(path) => {
            info!("Loading settings from {}", path);
            CaptureSettings::load(&path).with_context(|| format!("loading settings from {}", path))?
        }
        Err(_) => CaptureSettings::default(),
    };
    settings.apply_env();
    debug!("Effective settings: {:?}", settings);
    Ok(settings)
}

fn render_loop(session: &mut CaptureSession, stop: &AtomicBool) {
    let mut pattern = TestPattern::new(RENDER_SIZE);
    let size = pattern.resolution();
    let interval = session.frame_interval().unwrap_or(VSYNC_FALLBACK);
    let mut last_stats = Instant::now();
    let mut tick = 0u64;

    while !stop.load(Ordering::Relaxed) {
        let started = Instant::now();
        pattern.draw(tick);
        let frame = FrameDescriptor::new(
            size.width,
            size.height,
            PixelFormat::Rgba8,
            GraphicsBackend::Direct3D11,
            pattern.pixels(),
        );
        session.render(&frame, ColorSpace::Gamma);
        tick += 1;

        if last_stats.elapsed() >= STATS_EVERY {
            let stats = session.stats();
            info!(
                "Capture: {} frames, {:.1}% delivered, {} skipped",
                stats.frames,
                stats.delivery_ratio() * 100.0,
                stats.skipped
            );
            last_stats = Instant::now();
        }

        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }
}

fn consume(consumer: LoopbackConsumer, stop: Arc<AtomicBool>) -> u64 {
    let mut received = 0u64;
    while !stop.load(Ordering::Relaxed) {
        if let Some(frame) = consumer.receive(Duration::from_millis(100)) {
            received += 1;
            debug!(
                "Channel[{}] consumer got frame {} ({})",
                consumer.channel(),
                frame.seq,
                frame.resolution()
            );
        }
    }
    received
}
