use std::collections::HashSet;
use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::chart::Theme;
use crate::error::ConfigError;
use crate::indicator::IndicatorConfig;
use crate::indicator::ma::SmaParams;
use crate::indicator::rsi::RsiParams;
use crate::source::Period;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_output_dir() -> String {
    "./charts".into()
}

fn default_provider() -> String {
    "yahoo".into()
}

fn default_period() -> String {
    "10y".into()
}

fn default_csv_dir() -> String {
    "./data".into()
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_title() -> String {
    "Stock Candlestick Chart with Technical Indicators".into()
}

fn default_height() -> u32 {
    900
}

fn default_vertical_spacing() -> f64 {
    0.1
}

fn default_columns() -> usize {
    3
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    /// Indicators drawn on top of the candlesticks.
    #[serde(default)]
    pub overlay: Vec<IndicatorConfig>,
    /// Indicators drawn in their own panel below the price chart.
    #[serde(default)]
    pub below: Vec<IndicatorConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// Accepted values: `"yahoo"` | `"csv"`
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_period")]
    pub period: String,
    #[serde(default = "default_csv_dir")]
    pub csv_dir: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            period: default_period(),
            csv_dir: default_csv_dir(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_vertical_spacing")]
    pub vertical_spacing: f64,
    /// Tickers per row in grid charts.
    #[serde(default = "default_columns")]
    pub columns: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            theme: Theme::default(),
            height: default_height(),
            vertical_spacing: default_vertical_spacing(),
            columns: default_columns(),
        }
    }
}

impl AppConfig {
    /// Configuration used when no file is given: an SMA(50) overlay with
    /// RSI(14) below the price chart.
    pub fn builtin() -> Self {
        Self {
            overlay: vec![IndicatorConfig::Sma(SmaParams::default())],
            below: vec![IndicatorConfig::Rsi(RsiParams::default())],
            ..Self::default()
        }
    }
}

impl SourceConfig {
    /// The configured lookback; valid after [`load`].
    pub fn period(&self) -> Result<Period, Report<ConfigError>> {
        Period::parse(&self.period).change_context(ConfigError::Validation {
            field: format!("source.period \"{}\" is not a valid period", self.period),
        })
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_PROVIDERS: &[&str] = &["yahoo", "csv"];
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_source(config)?;
    validate_chart(config)?;
    validate_indicators("overlay", &config.overlay)?;
    validate_indicators("below", &config.below)?;
    Ok(())
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "general.log_format \"{}\" is not valid",
                config.general.log_format
            ),
        }));
    }
    Ok(())
}

fn validate_source(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let source = &config.source;
    if !VALID_PROVIDERS.contains(&source.provider.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!("source.provider \"{}\" is not valid", source.provider),
        }));
    }
    source.period()?;
    if source.requests_per_second == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "source.requests_per_second must be > 0".into(),
        }));
    }
    Ok(())
}

fn validate_chart(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let chart = &config.chart;
    if chart.height == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "chart.height must be > 0".into(),
        }));
    }
    if chart.columns == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "chart.columns must be > 0".into(),
        }));
    }
    if !(0.0..1.0).contains(&chart.vertical_spacing) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "chart.vertical_spacing {} must be in [0, 1)",
                chart.vertical_spacing
            ),
        }));
    }
    Ok(())
}

fn validate_indicators(
    section: &str,
    configs: &[IndicatorConfig],
) -> Result<(), Report<ConfigError>> {
    let mut seen = HashSet::new();
    for (i, config) in configs.iter().enumerate() {
        let indicator = config
            .build()
            .change_context(ConfigError::Validation {
                field: format!("{section}[{i}] has invalid parameters"),
            })?;

        let label = indicator.label();
        if !seen.insert(label.clone()) {
            return Err(Report::new(ConfigError::Validation {
                field: format!("{section}: duplicate indicator \"{label}\""),
            }));
        }
    }
    Ok(())
}
