//! RDC viewer harness — entry point.
//!
//! ```text
//! rdc-viewer                     Run the loopback demo with defaults
//! rdc-viewer --config <path>     Use custom config TOML
//! rdc-viewer --gen-config        Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rdc_core::session;
use rdc_viewer::config::ViewerConfig;
use rdc_viewer::engine::{self, LoopbackEngine};
use rdc_viewer::sink::TraceSink;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rdc-viewer", about = "RDC frame-sync loopback viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "rdc-viewer.toml")]
    config: PathBuf,

    /// Stop after this many deliveries.
    #[arg(short, long, default_value_t = 300)]
    frames: u64,

    /// Mid-run, request a resize to WxH (e.g. 1280x720).
    #[arg(short, long)]
    resize: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

fn parse_extent(text: &str) -> Option<(u32, u32)> {
    let (w, h) = text.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = ViewerConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("rdc-viewer v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Wire engine, producer, consumer ──────────────────────

    let engine = LoopbackEngine::new(rdc_core::Extent::new(
        config.display.width,
        config.display.height,
    ));
    let (producer, mut consumer) = session(config.session_config(), engine.clone());

    let stop = Arc::new(AtomicBool::new(false));
    let engine_thread = engine::spawn(engine, producer, Arc::clone(&stop));

    // ── 2. Consumer loop on the render schedule ─────────────────

    let mut sink = TraceSink::default();
    let mut ticker =
        tokio::time::interval(Duration::from_millis(config.sync.poll_interval_ms.max(1)));
    let resize_at = cli.frames / 2;
    let mut resize_request = cli.resize.as_deref().and_then(parse_extent);

    while sink.deliveries() < cli.frames && !consumer.is_closed() {
        ticker.tick().await;

        consumer.poll_into(&mut sink);

        if sink.deliveries() >= resize_at
            && let Some((w, h)) = resize_request.take()
        {
            info!(width = w, height = h, "requesting resize");
            consumer.request_resize(w, h)?;
        }
        consumer.pump_resize(Instant::now());
    }

    // ── 3. Teardown ─────────────────────────────────────────────

    stop.store(true, Ordering::Relaxed);
    engine_thread.join().expect("engine thread panicked");

    info!(
        deliveries = sink.deliveries(),
        repainted_px = sink.repainted_px(),
        generation = consumer.generation(),
        "session finished"
    );
    Ok(())
}
