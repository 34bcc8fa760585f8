//! Headless scene runner.
//!
//! Loads a configuration and a state snapshot, reconciles them against the
//! headless backend and logs what each frame would draw.
//!
//! ```text
//! diorama-studio scenes/living_room.json --state scenes/state.json --frames 30
//! ```

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use diorama_engine::backend::HeadlessBackend;
use diorama_engine::coords::Viewport;
use diorama_engine::logging::{init_logging, LoggingConfig};
use diorama_engine::resource::{DiskCache, NoCache, ResourceLoader, SchemeFetcher};
use diorama_expr::Value;
use diorama_scene::{CardElement, CardFactory, FrameOutcome, StateSnapshot, Visual, VisualConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scene configuration (JSON)
    config: PathBuf,

    /// Entity state snapshot (JSON)
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Frames to render before exiting
    #[arg(short, long, default_value_t = 60)]
    frames: u64,

    /// Milliseconds between frames
    #[arg(short, long, default_value_t = 16)]
    interval: u64,

    /// Reconcile every N frames
    #[arg(long, default_value_t = 10)]
    reconcile_every: u64,

    /// Root for relative and file:// model URLs (defaults to the config's directory)
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Persist fetched models here; no cache when omitted
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 1280.0)]
    width: f32,

    #[arg(long, default_value_t = 720.0)]
    height: f32,

    /// env_logger filter, e.g. "info,diorama_scene=debug"
    #[arg(long)]
    log: Option<String>,
}

// ── Cards ─────────────────────────────────────────────────────────────────

/// Stands in for real UI elements: logs what a host would display.
struct LoggedElement {
    name: String,
}

impl CardElement for LoggedElement {
    fn set_config(&mut self, config: &Value) {
        log::info!("card {}: config {config:?}", self.name);
    }

    fn set_state(&mut self, state: &StateSnapshot) {
        log::trace!("card {}: state with {} entities", self.name, state.len());
    }
}

struct LoggedElements;

#[async_trait(?Send)]
impl CardFactory for LoggedElements {
    async fn create(&self, element: &str) -> Option<Box<dyn CardElement>> {
        Some(Box::new(LoggedElement { name: element.to_string() }))
    }
}

// ── Main ──────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(match &args.log {
        Some(filter) => LoggingConfig::with_filter(filter.clone()),
        None => LoggingConfig::default(),
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let assets = match &args.assets {
        Some(dir) => dir.clone(),
        None => args.config.parent().map(PathBuf::from).unwrap_or_default(),
    };
    let fetcher = SchemeFetcher::new(assets);
    let loader = match &args.cache_dir {
        Some(dir) => ResourceLoader::new(fetcher, DiskCache::new(dir)),
        None => ResourceLoader::new(fetcher, NoCache),
    };

    let config = VisualConfig {
        reconcile_every: args.reconcile_every.max(1),
        viewport: Viewport::new(args.width, args.height),
        ..VisualConfig::default()
    };
    let mut visual = Visual::new(HeadlessBackend::new(), loader, config)
        .with_card_factory(Rc::new(LoggedElements));

    visual.load_configuration_file(&args.config)?;
    if let Some(state) = &args.state {
        visual.load_state_file(state)?;
    }

    log::info!(
        "studio: {} scene(s), {} frame(s) every {}ms",
        visual.configuration().scenes.len(),
        args.frames,
        args.interval
    );
    visual
        .run(args.frames, Duration::from_millis(args.interval), report)
        .await;

    let stats = visual.loader().stats();
    log::info!("studio: loader fetched {} resource(s), {} from cache", stats.fetches, stats.cache_hits);
    visual.dispose();
    Ok(())
}

fn report(outcome: &FrameOutcome) {
    if let Some(report) = &outcome.reconciled {
        for path in &report.failed {
            log::warn!("studio: {path} kept its previous values");
        }
    }
    let Some(stats) = &outcome.stats else {
        log::debug!("studio: frame {} has nothing to draw", outcome.time.frame_index);
        return;
    };
    log::info!(
        "frame {:>4} scene={} camera={} meshes={} triangles={} lights={} cards={}",
        stats.frame,
        outcome.scene.as_deref().unwrap_or("-"),
        outcome.camera.as_deref().unwrap_or("-"),
        stats.meshes,
        stats.triangles,
        stats.lights,
        stats.cards
    );
}
