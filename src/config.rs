//! Viewer configuration
//!
//! Loaded from TOML (every field optional), then overridden by `DEALS_*`
//! environment variables.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "deals_viewer.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealsConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub tui: TuiConfig,
}

impl DealsConfig {
    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config.validated())
    }

    /// Resolve the config source and apply env overrides.
    ///
    /// An explicit path must exist; the implicit ones (`DEALS_CONFIG_PATH`,
    /// `deals_viewer.toml` in cwd) fall back to defaults when missing.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let path = std::env::var("DEALS_CONFIG_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
                if path.exists() {
                    Self::load(&path)?
                } else {
                    tracing::debug!("No config at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };
        config.apply_env();
        Ok(config.validated())
    }

    pub fn apply_env(&mut self) {
        if let Some(ms) = env_parse::<u64>("DEALS_REFRESH_INTERVAL_MS") {
            self.refresh.interval_ms = ms;
        }
        if let Some(size) = env_parse::<usize>("DEALS_PAGE_SIZE") {
            self.store.initial_page_size = size;
        }
        if let Some(step) = env_parse::<usize>("DEALS_PAGE_STEP") {
            self.store.page_step = step;
        }
        if let Some(seed) = env_parse::<u64>("DEALS_FEED_SEED") {
            self.feed.seed = Some(seed);
        }
        if let Some(max) = env_parse::<usize>("DEALS_FEED_MAX_BATCH") {
            self.feed.max_batch_size = max;
        }
        if let Ok(v) = std::env::var("DEALS_LOG_FILE") {
            if !v.is_empty() {
                self.tui.log_file = v;
            }
        }
    }

    /// Replace values that would stall the viewer with their defaults
    pub fn validated(mut self) -> Self {
        if self.store.initial_page_size == 0 {
            self.store.initial_page_size = default_page_size();
        }
        if self.store.page_step == 0 {
            self.store.page_step = default_page_step();
        }
        if self.refresh.interval_ms == 0 {
            self.refresh.interval_ms = default_refresh_interval_ms();
        }
        if self.feed.max_batch_size == 0 {
            self.feed.max_batch_size = default_max_batch_size();
        }
        if self.feed.min_interval_ms > self.feed.max_interval_ms {
            std::mem::swap(&mut self.feed.min_interval_ms, &mut self.feed.max_interval_ms);
        }
        if self.feed.instruments.is_empty() {
            self.feed.instruments = default_instruments();
        }
        if self.tui.tick_rate_ms == 0 {
            self.tui.tick_rate_ms = default_tick_rate_ms();
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::debug!(key, value = %raw, "Ignoring unparsable env override");
            None
        }
    }
}

/// Deal store sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Rows exposed before the first page growth
    #[serde(default = "default_page_size")]
    pub initial_page_size: usize,

    /// Rows added each time the last visible row is displayed
    #[serde(default = "default_page_step")]
    pub page_step: usize,

    /// Collections at least this large are resorted with rayon
    #[serde(default = "default_parallel_sort_threshold")]
    pub parallel_sort_threshold: usize,
}

fn default_page_size() -> usize {
    100
}
fn default_page_step() -> usize {
    100
}
fn default_parallel_sort_threshold() -> usize {
    50_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_page_size: default_page_size(),
            page_step: default_page_step(),
            parallel_sort_threshold: default_parallel_sort_threshold(),
        }
    }
}

/// Periodic resort cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval_ms")]
    pub interval_ms: u64,
}

fn default_refresh_interval_ms() -> u64 {
    2_500
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_refresh_interval_ms(),
        }
    }
}

/// Simulated deal server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Lower bound of the pause between batches (ms)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Upper bound of the pause between batches (ms)
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    #[serde(default = "default_instruments")]
    pub instruments: Vec<String>,

    #[serde(default = "default_min_price")]
    pub min_price: f64,

    #[serde(default = "default_max_price")]
    pub max_price: f64,

    #[serde(default = "default_max_amount")]
    pub max_amount: f64,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_min_interval_ms() -> u64 {
    200
}
fn default_max_interval_ms() -> u64 {
    1_200
}
fn default_max_batch_size() -> usize {
    50
}
fn default_instruments() -> Vec<String> {
    [
        "EUR/USD_TOD",
        "GBP/USD_SPOT",
        "USD/JPY_TOM",
        "USD/CHF_SPOT",
        "USD/GBP_SPOT",
        "USD/CAD_TOM",
        "USD/RUB_TOM",
        "EUR/RUB_TOD",
        "CHF/RUB_TOM",
        "USD/AMD_SPOT",
        "EUR/GEL_SPOT",
        "UAH/RUB_SPOT",
        "USD/RUB_ON",
        "EUR/USD_TOM",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_min_price() -> f64 {
    60.0
}
fn default_max_price() -> f64 {
    70.0
}
fn default_max_amount() -> f64 {
    1_000_000.0
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_batch_size: default_max_batch_size(),
            instruments: default_instruments(),
            min_price: default_min_price(),
            max_price: default_max_price(),
            max_amount: default_max_amount(),
            seed: None,
        }
    }
}

/// Terminal renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuiConfig {
    /// Input poll / redraw period (ms)
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,

    /// Log destination while the alternate screen is active
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_tick_rate_ms() -> u64 {
    50
}
fn default_log_file() -> String {
    "deals_viewer.log".to_string()
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: default_tick_rate_ms(),
            log_file: default_log_file(),
        }
    }
}
