//! A tool to estimate what fraction of artifacts in a Maven-style repository
//! published a version in a given calendar month, and whether the primary
//! jars of those versions are signed.
//!
//! # Overview
//!
//! `sigsurvey` recursively walks the repository's directory-listing pages,
//! picks out version directories whose last-modified date falls in the target
//! month, downloads the conventional primary binary (`name-version.jar` or
//! `name-version.aar`), and inspects it for signature markers. Every listing
//! page fetch goes through a persistent SQLite-backed response cache so that
//! re-runs over the (effectively immutable) repository are cheap.
//!
//! # Usage
//!
//! ```bash
//! sigsurvey --month 2023-10
//! ```
//!
//! Paths at the reporting depth (group-identifier level by default) that
//! contained at least one qualifying artifact are printed one per line.
//!
//! Useful options:
//!
//! - `--root-url` — repository root (defaults to Maven Central)
//! - `--freshness verify` — revalidate cached pages with conditional GETs
//!   instead of trusting them outright
//! - `--max-per-group` / `--report-depth` — traversal tuning
//! - `--state-dir` — where the page cache and downloaded artifacts live
//!
//! Unreachable pages prune their subtree and the run continues; there are no
//! retries anywhere — re-running the tool is the retry mechanism, and the
//! cache plus local artifact storage make re-runs cheap.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, ValueEnum};
use directories::BaseDirs;
use ohno::IntoAppError;
use sigsurvey::Result;
use sigsurvey::cache::{FetchMode, ResponseCache};
use sigsurvey::crawler::{CrawlSettings, HierarchyCrawler};
use sigsurvey::fetcher::ArtifactFetcher;
use sigsurvey::listing::TargetMonth;
use std::path::PathBuf;

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

#[derive(Parser, Debug)]
#[command(name = "sigsurvey", version, about)]
#[command(styles = CLAP_STYLES)]
struct Args {
    /// Repository root URL
    #[arg(long, value_name = "URL", default_value = "https://repo1.maven.org/maven2/")]
    root_url: String,

    /// Target publication month, as YYYY-MM
    #[arg(long, value_name = "MONTH", value_parser = parse_target_month)]
    month: TargetMonth,

    /// Directory holding the page cache and downloaded artifacts [default: platform cache dir]
    #[arg(long, value_name = "PATH")]
    state_dir: Option<PathBuf>,

    /// How cached listing pages are reconciled against the remote repository
    #[arg(long, value_name = "MODE", default_value = "bypass")]
    freshness: FetchMode,

    /// Maximum qualifying artifacts resolved under a single parent directory
    #[arg(long, value_name = "COUNT", default_value_t = 5)]
    max_per_group: usize,

    /// Hierarchy depth at which qualifying subtrees are reported
    #[arg(long, value_name = "DEPTH", default_value_t = 2)]
    report_depth: usize,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    log_level: LogLevel,
}

/// Parse a `--month` value via `TargetMonth`'s `FromStr`, boxing the error so
/// clap can consume it (`ohno::AppError` does not implement `std::error::Error`).
fn parse_target_month(s: &str) -> Result<TargetMonth, Box<dyn std::error::Error + Send + Sync>> {
    s.parse::<TargetMonth>().map_err(ohno::AppError::into_std_error)
}

/// Initialize logger based on log level
fn init_logging(log_level: LogLevel) {
    if log_level == LogLevel::None {
        return;
    }

    let level = match log_level {
        LogLevel::None => return, // Already checked above, but being explicit
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug) || matches!(log_level, LogLevel::Trace))
        .init();
}

/// Determine the state directory: use the provided path or the platform default.
fn state_dir(args: &Args) -> Result<PathBuf> {
    if let Some(dir) = &args.state_dir {
        return Ok(dir.clone());
    }

    Ok(BaseDirs::new()
        .into_app_err("unable to determine state directory")?
        .cache_dir()
        .join("sigsurvey"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level);

    let state_dir = state_dir(&args)?;

    let mut root_url = args.root_url.clone();
    if !root_url.ends_with('/') {
        root_url.push('/');
    }

    let cache = ResponseCache::open(&state_dir.join("pages.db"), args.freshness)?;
    let fetcher = ArtifactFetcher::new()?;

    let crawler = HierarchyCrawler::new(
        cache,
        fetcher,
        CrawlSettings {
            root_url,
            month: args.month,
            max_per_group: args.max_per_group,
            report_depth: args.report_depth,
            artifact_dir: state_dir.join("artifacts"),
        },
    );

    let reported = crawler.run().await?;
    for path in &reported {
        println!("{path}");
    }

    println!("{} path(s) contained at least one artifact published in {}", reported.len(), args.month);

    Ok(())
}
