//! `wp-scout` command line.
//!
//! Settings are layered: built-in defaults, then the JSON `--config` file,
//! then flags (each flag can also come from a `WP_SCOUT_*` variable, and
//! `.env` is loaded first).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wp_scout::{
    load_names, CrawlCoordinator, CsvMissLog, CsvResultStore, DetectionMode, HttpTransport,
    ProbePath, ScoutConfig,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Content,
    RestApi,
    Combined,
}

impl From<ModeArg> for DetectionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Content => DetectionMode::Content,
            ModeArg::RestApi => DetectionMode::RestApi,
            ModeArg::Combined => DetectionMode::Combined,
        }
    }
}

/// Find which organizations run a WordPress site.
#[derive(Debug, Parser)]
#[command(name = "wp-scout", version, about)]
struct Cli {
    /// CSV or text file with one organization name per row
    #[arg(short, long, env = "WP_SCOUT_INPUT")]
    input: PathBuf,

    /// Result file (`name,domain`); appended to and used to resume
    #[arg(short, long, env = "WP_SCOUT_OUTPUT", default_value = "wordpress_sites.csv")]
    output: PathBuf,

    /// Also record names without a match (`name,reason`) and skip them on restart
    #[arg(long, env = "WP_SCOUT_MISSES")]
    misses: Option<PathBuf>,

    /// JSON file with any `ScoutConfig` fields
    #[arg(short, long, env = "WP_SCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Candidate hostnames taken from each search
    #[arg(short = 'k', long, env = "WP_SCOUT_MAX_CANDIDATES")]
    max_candidates: Option<usize>,

    #[arg(long, env = "WP_SCOUT_SEARCH_URL")]
    search_url: Option<String>,

    #[arg(long, env = "WP_SCOUT_QUERY_SUFFIX")]
    query_suffix: Option<String>,

    /// Subdomain prefixes, replacing the defaults (repeat or comma-separate)
    #[arg(long = "prefix", env = "WP_SCOUT_PREFIXES", value_delimiter = ',')]
    prefixes: Vec<String>,

    /// Probe paths: `/blog`, `head:/wp-login.php`, `api:/wp-json/`
    #[arg(long = "path", env = "WP_SCOUT_PATHS", value_delimiter = ',')]
    paths: Vec<ProbePath>,

    /// Default path table when no `--path` is given
    #[arg(long, env = "WP_SCOUT_MODE", value_enum)]
    mode: Option<ModeArg>,

    #[arg(long, env = "WP_SCOUT_SEARCH_DELAY_MS")]
    search_delay_ms: Option<u64>,

    #[arg(long, env = "WP_SCOUT_SEARCH_ESCALATED_MS")]
    search_escalated_ms: Option<u64>,

    #[arg(long, env = "WP_SCOUT_FETCH_DELAY_MS")]
    fetch_delay_ms: Option<u64>,

    #[arg(long, env = "WP_SCOUT_FETCH_ESCALATED_MS")]
    fetch_escalated_ms: Option<u64>,

    /// Per-request timeout
    #[arg(long, env = "WP_SCOUT_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Names processed concurrently
    #[arg(short = 'j', long, env = "WP_SCOUT_PARALLELISM")]
    parallelism: Option<usize>,

    /// Concurrent requests to one host
    #[arg(long, env = "WP_SCOUT_PER_HOST")]
    per_host: Option<usize>,

    /// Log progress every N names
    #[arg(long, env = "WP_SCOUT_PROGRESS_EVERY")]
    progress_every: Option<usize>,

    /// Global requests-per-second ceiling
    #[arg(long, env = "WP_SCOUT_MAX_RPS")]
    max_rps: Option<u32>,

    /// Require REST site names to share a word with the organization name
    #[arg(long, env = "WP_SCOUT_REQUIRE_NAME_MATCH")]
    require_name_match: bool,

    #[arg(long, env = "WP_SCOUT_ACCEPT_INVALID_CERTS")]
    accept_invalid_certs: bool,

    /// Probe loopback and private addresses too
    #[arg(long, env = "WP_SCOUT_ALLOW_PRIVATE_HOSTS")]
    allow_private_hosts: bool,
}

impl Cli {
    fn scout_config(&self) -> Result<ScoutConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str::<ScoutConfig>(&text)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => ScoutConfig::default(),
        };

        if let Some(k) = self.max_candidates {
            config.max_candidates = k;
        }
        if let Some(url) = &self.search_url {
            config.search_url = url.clone();
        }
        if let Some(suffix) = &self.query_suffix {
            config.query_suffix = suffix.clone();
        }
        if !self.prefixes.is_empty() {
            config.prefixes = self.prefixes.clone();
        }
        if !self.paths.is_empty() {
            config.paths = self.paths.clone();
        }
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(ms) = self.search_delay_ms {
            config.search_delay.base_ms = ms;
        }
        if let Some(ms) = self.search_escalated_ms {
            config.search_delay.escalated_ms = ms;
        }
        if let Some(ms) = self.fetch_delay_ms {
            config.fetch_delay.base_ms = ms;
        }
        if let Some(ms) = self.fetch_escalated_ms {
            config.fetch_delay.escalated_ms = ms;
        }
        if let Some(ms) = self.timeout_ms {
            config.request_timeout_ms = ms;
        }
        if let Some(n) = self.parallelism {
            config.parallelism = n;
        }
        if let Some(n) = self.per_host {
            config.per_host_limit = n;
        }
        if let Some(n) = self.progress_every {
            config.progress_every = n;
        }
        if let Some(rps) = self.max_rps {
            config.max_requests_per_second = Some(rps);
        }
        if self.require_name_match {
            config.require_name_match = true;
        }
        if self.accept_invalid_certs {
            config.accept_invalid_certs = true;
        }
        if self.allow_private_hosts {
            config.block_private_hosts = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before flags read them
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wp_scout=info,reqwest=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let config = cli.scout_config()?;

    let names = load_names(&cli.input)
        .with_context(|| format!("failed to load names from {}", cli.input.display()))?;

    let transport =
        Arc::new(HttpTransport::from_config(&config).context("failed to build HTTP client")?);
    let store = CsvResultStore::open(&cli.output)
        .await
        .with_context(|| format!("failed to open {}", cli.output.display()))?;

    let mut coordinator = CrawlCoordinator::from_config(&config, transport, store)?;
    if let Some(path) = &cli.misses {
        let misses = CsvMissLog::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        coordinator = coordinator.with_miss_log(misses);
    }

    let handle = coordinator.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, letting in-flight names finish");
            handle.stop();
        }
    });

    info!(
        input = %cli.input.display(),
        output = %cli.output.display(),
        names = names.len(),
        "wp-scout starting"
    );
    let summary = coordinator.run(names).await.context("crawl aborted")?;

    info!(
        total_input = summary.total_input,
        already_done = summary.already_done,
        processed = summary.processed,
        found = summary.found,
        exhausted = summary.exhausted,
        interrupted = summary.interrupted,
        elapsed = ?summary.elapsed,
        "summary"
    );
    if summary.interrupted {
        info!("run was interrupted; rerun with the same output file to resume");
    }

    Ok(())
}
