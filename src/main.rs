//! Deals Viewer - live sorted view over a stream of trades
//!
//! Usage:
//!   deals-viewer                        # terminal UI, logs to deals_viewer.log
//!   deals-viewer --headless             # no terminal, logs page summaries to stderr
//!   deals-viewer --headless --json      # page summaries as JSON lines on stdout
//!
//! Keyboard (terminal UI):
//!   Tab/←/→ or 1-5  - Sort column
//!   d / Space       - Toggle direction
//!   ↓ ↑ / j k       - Scroll (reaching the end loads more rows)
//!   Q/Esc           - Quit

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deals_viewer::{
    config::DealsConfig,
    controller::{DealsController, ViewEvent},
    feed::SimulatedFeed,
    models::SortKey,
    render::RenderSession,
    store::DealStore,
    tui,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSortKey {
    Date,
    Name,
    Price,
    Amount,
    Side,
}

impl From<CliSortKey> for SortKey {
    fn from(key: CliSortKey) -> Self {
        match key {
            CliSortKey::Date => SortKey::Date,
            CliSortKey::Name => SortKey::Name,
            CliSortKey::Price => SortKey::Price,
            CliSortKey::Amount => SortKey::Amount,
            CliSortKey::Side => SortKey::Side,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "deals-viewer", version, about = "Live sorted view over a stream of deals")]
struct Cli {
    /// TOML config file
    #[arg(long, env = "DEALS_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Run without the terminal UI
    #[arg(long)]
    headless: bool,

    /// Stop a headless run after this many seconds
    #[arg(long, requires = "headless")]
    duration_secs: Option<u64>,

    /// Print each refreshed page as a JSON line (headless only)
    #[arg(long, requires = "headless")]
    json: bool,

    /// Seed for the simulated feed
    #[arg(long)]
    seed: Option<u64>,

    /// Initial sort column
    #[arg(long, value_enum)]
    sort_key: Option<CliSortKey>,

    /// Start with the direction flag set
    #[arg(long)]
    reversed: bool,
}

fn main() -> Result<()> {
    load_env();
    let cli = Cli::parse();

    let mut config = DealsConfig::resolve(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        config.feed.seed = Some(seed);
    }

    let log_file = (!cli.headless).then(|| PathBuf::from(&config.tui.log_file));
    init_tracing(log_file.as_deref())?;

    info!(
        page_size = config.store.initial_page_size,
        page_step = config.store.page_step,
        refresh_ms = config.refresh.interval_ms,
        headless = cli.headless,
        "🚀 Deals viewer starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("deals-worker")
        .build()
        .context("Failed to build tokio runtime")?;

    let store = DealStore::new(config.store.clone());
    if let Some(key) = cli.sort_key {
        store.set_sort_key(key.into());
    }
    if cli.reversed {
        store.toggle_direction();
    }

    let feed = SimulatedFeed::new(config.feed.clone());
    let (controller, events) = DealsController::new(store, runtime.handle().clone());
    controller.start(&feed, config.refresh.interval());

    let result = if cli.headless {
        let duration = cli.duration_secs.map(Duration::from_secs);
        runtime.block_on(run_headless(controller.clone(), events, duration, cli.json))
    } else {
        let tick_rate = Duration::from_millis(config.tui.tick_rate_ms);
        tui::renderer::run(controller.clone(), events, tick_rate)
    };

    runtime.block_on(controller.shutdown());
    result
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "deals_viewer=info".into());

    match log_file {
        // The alternate screen owns stdout/stderr while the UI runs
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Also try the crate root, for runs with --manifest-path from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

async fn run_headless(
    controller: Arc<DealsController>,
    mut events: mpsc::UnboundedReceiver<ViewEvent>,
    duration: Option<Duration>,
    json: bool,
) -> Result<()> {
    info!(?duration, json, "Running headless");

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break;
            }
            event = events.recv() => match event {
                Some(ViewEvent::DataChanged) => report_page(&controller.render_session(), json)?,
                Some(_) => {}
                None => break,
            },
        }
    }

    Ok(())
}

fn report_page(session: &RenderSession, json: bool) -> Result<()> {
    if json {
        let line = serde_json::json!({
            "generation": session.generation(),
            "total": session.total_count(),
            "page_size": session.page_size(),
            "sort_key": session.sort_key(),
            "direction": session.header().direction.label(),
            "top": session.rows().iter().take(10).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    let top = session.row_at(0).map(|d| {
        format!(
            "#{} {} {} {} {}",
            d.id,
            d.instrument_name,
            deals_viewer::render::format::format_price(d.price),
            deals_viewer::render::format::format_amount(d.amount),
            d.side.as_str()
        )
    });
    info!(
        total = session.total_count(),
        rows = session.row_count(),
        sort_key = session.sort_key().label(),
        direction = session.header().direction.label(),
        top = top.as_deref().unwrap_or("-"),
        "📊 Page refreshed"
    );
    Ok(())
}
