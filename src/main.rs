mod chart;
mod config;
mod error;
mod export;
mod indicator;
mod model;
mod source;
#[cfg(test)]
mod test_util;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use futures::future::try_join_all;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use chart::{ChartData, OutputFormat};
use config::AppConfig;
use indicator::Indicator;
use source::{Period, PriceSource};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("price source error")]
    Source,
    #[display("chart error")]
    Chart,
    #[display("export error")]
    Export,
}

#[derive(Parser)]
#[command(
    name = "ta-charts",
    about = "Candlestick charts with technical indicators"
)]
struct Cli {
    /// Path to the TOML configuration file; when omitted, built-in defaults
    /// draw an SMA(50) overlay and an RSI(14) panel
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chart one ticker with the configured overlay and below indicators
    Plot {
        symbol: String,
        /// Defaults to `{output_dir}/{SYMBOL}.{format}`
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,
        /// Lookback such as `10y`, `6mo`, `30d` or `max`
        #[arg(short, long)]
        period: Option<String>,
    },
    /// Chart several tickers side by side
    Grid {
        #[arg(required = true)]
        symbols: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,
        #[arg(short, long)]
        period: Option<String>,
    },
    /// Write bars and indicator values as CSV (stdout when no output is given)
    Export {
        symbol: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        period: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load(path).change_context(AppError::Config)?,
        None => AppConfig::builtin(),
    };

    init_tracing(&config);

    let overlays = indicator::build_all(&config.overlay).change_context(AppError::Config)?;
    let below = indicator::build_all(&config.below).change_context(AppError::Config)?;
    let source = source::build_source(&config.source);

    for indicator in overlays.iter().chain(&below) {
        let descriptor = indicator.descriptor();
        debug!(
            kind = descriptor.name,
            label = %descriptor.label,
            outputs = descriptor.arity(),
            "indicator configured"
        );
    }
    info!(
        provider = source.provider(),
        overlays = overlays.len(),
        below = below.len(),
        "ta-charts starting"
    );

    match cli.command {
        Command::Plot {
            symbol,
            output,
            format,
            period,
        } => {
            let period = resolve_period(&config, period.as_deref())?;
            let history = source
                .fetch_history(&symbol, period)
                .await
                .change_context(AppError::Source)?;
            let data = ChartData::compute(history, &overlays, &below);
            let figure = chart::build_figure(&data, &config.chart).change_context(AppError::Chart)?;

            let path = output.unwrap_or_else(|| default_output(&config, &symbol, format.extension()));
            chart::write(&figure, &path, format).change_context(AppError::Chart)?;
        }
        Command::Grid {
            symbols,
            output,
            format,
            period,
        } => {
            let period = resolve_period(&config, period.as_deref())?;
            let panels = fetch_panels(source.as_ref(), &symbols, period, &overlays, &below).await?;
            let figure = chart::grid::build_grid(&panels, &config.chart).change_context(AppError::Chart)?;

            let path = output
                .unwrap_or_else(|| default_output(&config, &symbols.join("-"), format.extension()));
            chart::write(&figure, &path, format).change_context(AppError::Chart)?;
        }
        Command::Export {
            symbol,
            output,
            period,
        } => {
            let period = resolve_period(&config, period.as_deref())?;
            let history = source
                .fetch_history(&symbol, period)
                .await
                .change_context(AppError::Source)?;
            let data = ChartData::compute(history, &overlays, &below);
            let outputs: Vec<_> = data.overlays.into_iter().chain(data.below).collect();

            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .change_context(AppError::Export)
                        .attach_with(|| format!("path: {}", path.display()))?;
                    export::write_csv(&data.history, &outputs, BufWriter::new(file))
                        .change_context(AppError::Export)?;
                    info!(path = %path.display(), "export written");
                }
                None => {
                    export::write_csv(&data.history, &outputs, std::io::stdout().lock())
                        .change_context(AppError::Export)?;
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    // stdout may carry CSV output
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn resolve_period(config: &AppConfig, flag: Option<&str>) -> Result<Period, Report<AppError>> {
    match flag {
        Some(period) => Period::parse(period).change_context(AppError::Config),
        None => config.source.period().change_context(AppError::Config),
    }
}

fn default_output(config: &AppConfig, stem: &str, extension: &str) -> PathBuf {
    Path::new(&config.general.output_dir).join(format!("{stem}.{extension}"))
}

/// Fetch every symbol concurrently; the source's rate limiter paces requests.
async fn fetch_panels(
    source: &dyn PriceSource,
    symbols: &[String],
    period: Period,
    overlays: &[Box<dyn Indicator>],
    below: &[Box<dyn Indicator>],
) -> Result<Vec<ChartData>, Report<AppError>> {
    let histories = try_join_all(symbols.iter().map(|symbol| source.fetch_history(symbol, period)))
        .await
        .change_context(AppError::Source)?;

    Ok(histories
        .into_iter()
        .map(|history| ChartData::compute(history, overlays, below))
        .collect())
}
