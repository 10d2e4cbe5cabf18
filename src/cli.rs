//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::markdown_report_adapter::MarkdownReportAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestResult};
use crate::domain::config::DislocationConfig;
use crate::domain::error::DislocationError;
use crate::domain::loader::{DataSources, load_store};
use crate::domain::monitor::run_monitor;
use crate::domain::sweep::{ThresholdGrid, run_sweep};
use crate::domain::universe::{Universe, load_universe, parse_tickers, universe_path};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "dislocator", about = "ETF dislocation monitor and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score every instrument as of a date and print recommendations
    Monitor {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        as_of: NaiveDate,
        /// Comma-separated tickers, overriding the configured universe
        #[arg(long)]
        tickers: Option<String>,
        /// Named universe from [universe_files]
        #[arg(long)]
        profile: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a vectorized backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        tickers: Option<String>,
        #[arg(long)]
        profile: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Backtest a grid of buy/sell action thresholds
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated buy thresholds
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        buy: Vec<f64>,
        /// Comma-separated sell thresholds
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        sell: Vec<f64>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        tickers: Option<String>,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Monitor {
            config,
            as_of,
            tickers,
            profile,
            output,
        } => {
            let selection = UniverseSelection::new(tickers.as_deref(), profile.as_deref());
            run_monitor_command(&config, as_of, selection, output.as_deref())
        }
        Command::Backtest {
            config,
            start,
            end,
            tickers,
            profile,
            output,
        } => {
            let selection = UniverseSelection::new(tickers.as_deref(), profile.as_deref());
            run_backtest_command(&config, start, end, selection, output.as_deref())
        }
        Command::Sweep {
            config,
            buy,
            sell,
            start,
            end,
            tickers,
            profile,
        } => {
            let grid = ThresholdGrid {
                buys: buy,
                sells: sell,
            };
            let selection = UniverseSelection::new(tickers.as_deref(), profile.as_deref());
            run_sweep_command(&config, grid, start, end, selection)
        }
        Command::Validate { config } => run_validate(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: &Path) -> Result<DislocationConfig, DislocationError> {
    let adapter =
        FileConfigAdapter::from_file(path).map_err(|e| DislocationError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;
    DislocationConfig::from_port(&adapter)
}

/// Command-line universe overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniverseSelection<'a> {
    /// Comma-separated tickers; wins over any file.
    pub tickers: Option<&'a str>,
    pub profile: Option<&'a str>,
}

impl<'a> UniverseSelection<'a> {
    pub fn new(tickers: Option<&'a str>, profile: Option<&'a str>) -> Self {
        UniverseSelection { tickers, profile }
    }
}

/// Resolves the instrument universe: explicit tickers win over the
/// configured universe file or profile. Static exclusions apply to all.
pub fn resolve_universe(
    config: &DislocationConfig,
    selection: UniverseSelection<'_>,
) -> Result<Universe, DislocationError> {
    let universe = match selection.tickers {
        Some(list) => {
            let tickers = parse_tickers(list)
                .map_err(|e| DislocationError::config_invalid("universe", "tickers", e.to_string()))?;
            Universe::from_tickers(tickers)
        }
        None => {
            let file = universe_path(&config.universe, selection.profile)?.ok_or_else(|| {
                DislocationError::ConfigMissing {
                    section: "universe".into(),
                    key: "file".into(),
                }
            })?;
            load_universe(Path::new(file))?
        }
    };
    universe.filtered(&config.universe)
}

fn resolve_range(
    config: &DislocationConfig,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), DislocationError> {
    let start = start
        .or(config.backtest.start_date)
        .ok_or_else(|| DislocationError::ConfigMissing {
            section: "backtest".into(),
            key: "start_date".into(),
        })?;
    let end = end
        .or(config.backtest.end_date)
        .ok_or_else(|| DislocationError::ConfigMissing {
            section: "backtest".into(),
            key: "end_date".into(),
        })?;
    if start >= end {
        return Err(DislocationError::config_invalid(
            "backtest",
            "start_date",
            format!("start {start} must be before end {end}"),
        ));
    }
    Ok((start, end))
}

fn output_dir(config: &DislocationConfig, output: Option<&Path>) -> PathBuf {
    output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.reporting.out_dir))
}

fn report_writers() -> [&'static dyn ReportPort; 2] {
    [&CsvReportAdapter, &MarkdownReportAdapter]
}

fn run_monitor_command(
    config_path: &Path,
    as_of: NaiveDate,
    selection: UniverseSelection<'_>,
    output: Option<&Path>,
) -> Result<(), DislocationError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let universe = resolve_universe(&config, selection)?;
    eprintln!("Monitoring {} instruments as of {}", universe.count(), as_of);

    let data = CsvAdapter::new(PathBuf::from(&config.data.dir));
    let sources = DataSources {
        prices: &data,
        navs: &data,
        macros: &data,
    };
    let store = load_store(&sources, &universe, &config, as_of, as_of)?.truncated_to(as_of);
    let recommendations = run_monitor(&store, &config);

    eprintln!("\n=== Recommendations ===");
    for r in &recommendations {
        eprintln!("  {}", r.rationale);
    }

    let out = output_dir(&config, output);
    for writer in report_writers() {
        writer.write_recommendations(as_of, &recommendations, &out)?;
    }
    eprintln!("\nReports written to: {}", out.display());
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("CAGR:             {:.2}%", m.cagr * 100.0);
    eprintln!("Volatility:       {:.2}%", m.volatility * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Max Drawdown:     {:.1}%", m.max_drawdown * 100.0);
    eprintln!("Calmar Ratio:     {:.2}", m.calmar_ratio);
    eprintln!("Mean Turnover:    {:.4}", m.mean_turnover);
}

fn run_backtest_command(
    config_path: &Path,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    selection: UniverseSelection<'_>,
    output: Option<&Path>,
) -> Result<(), DislocationError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let (start, end) = resolve_range(&config, start, end)?;
    let universe = resolve_universe(&config, selection)?;

    let data = CsvAdapter::new(PathBuf::from(&config.data.dir));
    let sources = DataSources {
        prices: &data,
        navs: &data,
        macros: &data,
    };
    let store = load_store(&sources, &universe, &config, start, end)?;

    eprintln!(
        "Running backtest: {} instruments, {} to {}",
        store.instruments().len(),
        start,
        end
    );
    let result = backtest_engine::run_backtest(&store, &config, start, end)?;
    eprintln!("  Processed: {} dates", result.dates.len());
    print_summary(&result);

    let out = output_dir(&config, output);
    for writer in report_writers() {
        writer.write_backtest(&result, &out)?;
    }
    eprintln!("\nReports written to: {}", out.display());
    Ok(())
}

fn run_sweep_command(
    config_path: &Path,
    grid: ThresholdGrid,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    selection: UniverseSelection<'_>,
) -> Result<(), DislocationError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let (start, end) = resolve_range(&config, start, end)?;
    let universe = resolve_universe(&config, selection)?;

    let configs = grid.generate_configs(&config);
    if configs.is_empty() {
        return Err(DislocationError::config_invalid(
            "composite_to_action",
            "buy",
            format!("none of the {} threshold pairs is valid", grid.size()),
        ));
    }

    let data = CsvAdapter::new(PathBuf::from(&config.data.dir));
    let sources = DataSources {
        prices: &data,
        navs: &data,
        macros: &data,
    };
    let store = load_store(&sources, &universe, &config, start, end)?;

    eprintln!(
        "Sweeping {} of {} threshold pairs, {} to {}",
        configs.len(),
        grid.size(),
        start,
        end
    );
    let outcomes = run_sweep(&store, &configs, start, end);

    eprintln!("\n=== Sweep Results ===");
    for outcome in &outcomes {
        match &outcome.result {
            Ok(result) => eprintln!(
                "  {:<24} return {:>8.2}%  sharpe {:>6.2}  max dd {:>6.1}%",
                outcome.label,
                result.metrics.total_return * 100.0,
                result.metrics.sharpe_ratio,
                result.metrics.max_drawdown * 100.0
            ),
            Err(e) => eprintln!("  {:<24} failed: {e}", outcome.label),
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), DislocationError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    eprintln!("Config validated successfully");

    eprintln!("\nWindows:");
    eprintln!(
        "  premdisc={} volume={} range={} divergence={} cross_asset={}",
        config.windows.premdisc,
        config.windows.volume,
        config.windows.range,
        config.windows.divergence,
        config.windows.cross_asset
    );
    eprintln!("\nComposite weights:");
    eprintln!(
        "  premdisc={:.2} divergence={:.2} volume={:.2} cross_asset={:.2}",
        config.weights.premdisc,
        config.weights.divergence,
        config.weights.volume,
        config.weights.cross_asset
    );
    eprintln!(
        "\nActions: buy <= {:.2}, sell >= {:.2}, neutral band {:.2}",
        config.actions.buy, config.actions.sell, config.actions.neutral
    );
    if !config.macros.series.is_empty() {
        let ids: Vec<&str> = config.macros.series.iter().map(|(id, _)| id.as_str()).collect();
        eprintln!("Macro series: {}", ids.join(", "));
    }
    Ok(())
}
