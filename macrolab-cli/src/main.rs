//! MacroLab CLI: run the analysis pipeline and manage the raw-data cache.
//!
//! Commands:
//! - `run`: collect, prepare, test, model and report
//! - `download`: fetch every configured remote indicator into the cache
//! - `cache status`: list cached indicators and their date ranges
//! - `config`: print the default configuration as TOML

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use macrolab_core::data::{
    CircuitBreaker, CollectProgress, FredProvider, LogProgress, SeriesCache, SeriesProvider, YahooProvider,
};
use macrolab_runner::{download_all, run_pipeline, AnalysisConfig, Providers, RunOptions, RunSummary, SourceSpec};

#[derive(Parser)]
#[command(name = "macrolab", about = "MacroLab: macroeconomic time-series analysis pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write plots and reports.
    Run {
        /// Path to a TOML config file. Defaults to the built-in configuration.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Offline mode: read only from the cache and local CSV files.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Substitute deterministic synthetic series for indicators that fail to load.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Output directory (overrides the config).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Data directory (overrides the config).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Download every configured remote indicator into the cache.
    Download {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Print the default configuration as TOML.
    Config,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached indicators with date ranges and observation counts.
    Status {
        /// Also list configured indicators that are not cached yet.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            offline,
            synthetic,
            force,
            output_dir,
            data_dir,
        } => {
            let cfg = load_config(config.as_deref(), output_dir, data_dir)?;
            let opts = RunOptions {
                offline,
                synthetic,
                force,
            };
            run_cmd(&cfg, opts)
        }
        Commands::Download {
            config,
            force,
            data_dir,
        } => {
            let cfg = load_config(config.as_deref(), None, data_dir)?;
            download_cmd(&cfg, force)
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { config, data_dir } => {
                let cfg = load_config(config.as_deref(), None, data_dir)?;
                cache_status_cmd(&cfg, config.is_some())
            }
        },
        Commands::Config => {
            print!("{}", AnalysisConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, output_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<AnalysisConfig> {
    let mut cfg = match path {
        Some(p) => AnalysisConfig::from_file(p).with_context(|| format!("loading {}", p.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(dir) = output_dir {
        cfg.paths.output_dir = dir;
    }
    if let Some(dir) = data_dir {
        cfg.paths.data_dir = dir;
    }
    Ok(cfg)
}

/// Remote providers sharing one circuit breaker. FRED is left out without an API key.
struct RemoteProviders {
    yahoo: YahooProvider,
    fred: Option<FredProvider>,
}

impl RemoteProviders {
    fn build(cfg: &AnalysisConfig) -> Result<Self> {
        let breaker = Arc::new(CircuitBreaker::default_provider());
        let yahoo = YahooProvider::new(Arc::clone(&breaker))?;
        let fred = FredProvider::from_env(breaker, &cfg.fred_api_key_env)?;

        let wants_fred = cfg
            .indicators
            .iter()
            .any(|i| matches!(i.source, SourceSpec::Fred { .. }));
        let fred = if fred.has_api_key() {
            Some(fred)
        } else {
            if wants_fred {
                tracing::warn!(var = %cfg.fred_api_key_env, "FRED indicators configured but no API key set");
            }
            None
        };
        Ok(Self { yahoo, fred })
    }

    fn as_providers(&self) -> Providers<'_> {
        Providers {
            yahoo: Some(&self.yahoo as &dyn SeriesProvider),
            fred: self.fred.as_ref().map(|f| f as &dyn SeriesProvider),
        }
    }
}

fn run_cmd(cfg: &AnalysisConfig, opts: RunOptions) -> Result<()> {
    let remotes = RemoteProviders::build(cfg)?;
    let summary = run_pipeline(cfg, opts, remotes.as_providers(), Some(&LogProgress as &dyn CollectProgress))?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(s: &RunSummary) {
    println!();
    println!("=== MacroLab Run ===");
    if let (Some(first), Some(last)) = (s.start_date, s.end_date) {
        println!("Period:      {first} to {last} ({} months)", s.n_rows);
    }
    println!("Indicators:  {}", s.indicators.join(", "));
    if !s.failed_indicators.is_empty() {
        println!("Failed:      {}", s.failed_indicators.len());
        for (name, err) in &s.failed_indicators {
            println!("  {name}: {err}");
        }
    }
    if s.has_synthetic {
        println!("WARNING: synthetic data used; results are not meaningful");
    }
    println!("Dataset:     {}", &s.dataset_hash[..s.dataset_hash.len().min(16)]);
    println!();
    println!("ADF tested:      {}", s.adf_tested);
    println!("Granger pairs:   {}", s.granger_pairs);
    println!("SARIMA fitted:   {}", s.sarima_fitted);
    println!("ML baselines:    {}", s.ml_fitted);
    if s.model_failures > 0 {
        println!("Model failures:  {}", s.model_failures);
    }
    let structural = if s.structural.is_empty() {
        "none".to_string()
    } else {
        s.structural.join(", ")
    };
    println!("Structural:      {structural}");
    println!("Plots:           {}", s.plots);
    println!();
    println!("Report:   {}", s.report.markdown.display());
    println!("Summary:  {}", s.report.json.display());
}

fn download_cmd(cfg: &AnalysisConfig, force: bool) -> Result<()> {
    let remotes = RemoteProviders::build(cfg)?;
    let summary = download_all(cfg, force, remotes.as_providers(), Some(&LogProgress as &dyn CollectProgress))?;

    println!("Downloaded {} indicator(s) into {}", summary.loaded.len(), cfg.paths.raw_dir().display());
    if !summary.failures.is_empty() {
        for (name, err) in &summary.failures {
            eprintln!("Error for {name}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn cache_status_cmd(cfg: &AnalysisConfig, include_configured: bool) -> Result<()> {
    let raw_dir = cfg.paths.raw_dir();
    if !raw_dir.exists() {
        println!("Cache directory does not exist: {}", raw_dir.display());
        return Ok(());
    }

    let cache = SeriesCache::new(&raw_dir);
    let mut names = cache.cached_names();
    if include_configured {
        for ind in &cfg.indicators {
            if !matches!(ind.source, SourceSpec::Csv { .. }) && !names.contains(&ind.name) {
                names.push(ind.name.clone());
            }
        }
    }
    if names.is_empty() {
        println!("Cache is empty: {}", raw_dir.display());
        return Ok(());
    }

    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let rows = cache.status(&refs);

    println!("Cache: {}", raw_dir.display());
    println!("Indicators: {}", rows.iter().filter(|r| r.cached).count());
    println!();
    println!("{:<16} {:<26} {:>8}", "Indicator", "Date Range", "Months");
    println!("{}", "-".repeat(52));
    for row in &rows {
        match (row.start_date, row.end_date, row.count) {
            (Some(start), Some(end), Some(count)) => {
                println!("{:<16} {:<26} {:>8}", row.name, format!("{start} to {end}"), count);
            }
            _ => println!("{:<16} {:<26} {:>8}", row.name, "(not cached)", "-"),
        }
    }
    Ok(())
}
