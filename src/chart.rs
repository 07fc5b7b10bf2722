pub mod grid;
pub mod menu;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ChartConfig;
use crate::error::ChartError;
use crate::indicator::Indicator;
use crate::model::{IndicatorOutput, PriceHistory};

use menu::UpdateMenu;

const PRICE_ROW_WEIGHT: f64 = 0.7;
const PANEL_ROW_WEIGHT: f64 = 0.2;
const VOLUME_COLOR: &str = "#ff7f0e";
const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

struct Palette {
    paper: &'static str,
    plot: &'static str,
    font: &'static str,
    grid: &'static str,
}

impl Theme {
    fn palette(self) -> Palette {
        match self {
            Self::Dark => Palette {
                paper: "#111111",
                plot: "#111111",
                font: "#f2f5fa",
                grid: "#283442",
            },
            Self::Light => Palette {
                paper: "#ffffff",
                plot: "#e5ecf6",
                font: "#2a3f5f",
                grid: "#ffffff",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Standalone page that loads plotly.js from the CDN
    Html,
    /// Raw figure (`data` + `layout`)
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
        }
    }
}

/// A price history together with the indicator outputs drawn over and below
/// it.
pub struct ChartData {
    pub history: PriceHistory,
    pub overlays: Vec<IndicatorOutput>,
    pub below: Vec<IndicatorOutput>,
}

impl ChartData {
    pub fn compute(
        history: PriceHistory,
        overlays: &[Box<dyn Indicator>],
        below: &[Box<dyn Indicator>],
    ) -> Self {
        if history.is_empty() {
            warn!(symbol = %history.symbol, "no bars to chart");
        }
        let run = |indicators: &[Box<dyn Indicator>]| -> Vec<IndicatorOutput> {
            indicators
                .iter()
                .map(|indicator| {
                    if history.len() < indicator.required_bars() {
                        debug!(
                            symbol = %history.symbol,
                            indicator = %indicator.label(),
                            bars = history.len(),
                            required = indicator.required_bars(),
                            "history shorter than indicator lookback"
                        );
                    }
                    indicator.calculate(&history)
                })
                .collect()
        };
        let overlays = run(overlays);
        let below = run(below);
        Self {
            history,
            overlays,
            below,
        }
    }
}

// ── Figure model (plotly.js JSON schema subset) ──────────────────────────────

#[derive(Debug, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Candlestick(CandlestickTrace),
    Scatter(ScatterTrace),
    Bar(BarTrace),
}

impl Trace {
    pub fn name(&self) -> &str {
        match self {
            Self::Candlestick(t) => &t.name,
            Self::Scatter(t) => &t.name,
            Self::Bar(t) => &t.name,
        }
    }

    #[cfg(test)]
    pub fn axes(&self) -> (&str, &str) {
        match self {
            Self::Candlestick(t) => (&t.xaxis, &t.yaxis),
            Self::Scatter(t) => (&t.xaxis, &t.yaxis),
            Self::Bar(t) => (&t.xaxis, &t.yaxis),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CandlestickTrace {
    pub name: String,
    pub x: Vec<NaiveDate>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub increasing: CandleStyle,
    pub decreasing: CandleStyle,
    pub xaxis: String,
    pub yaxis: String,
}

#[derive(Debug, Serialize)]
pub struct CandleStyle {
    pub line: Line,
}

#[derive(Debug, Serialize)]
pub struct ScatterTrace {
    pub name: String,
    pub x: Vec<NaiveDate>,
    /// Undefined indicator positions are `null` so the line shows a gap.
    pub y: Vec<Option<f64>>,
    pub mode: &'static str,
    pub line: Line,
    pub xaxis: String,
    pub yaxis: String,
}

#[derive(Debug, Serialize)]
pub struct BarTrace {
    pub name: String,
    pub x: Vec<NaiveDate>,
    pub y: Vec<f64>,
    pub marker: Marker,
    pub xaxis: String,
    pub yaxis: String,
}

#[derive(Debug, Default, Serialize)]
pub struct Line {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct Marker {
    pub color: String,
}

#[derive(Debug, Serialize)]
pub struct Text {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct Font {
    pub color: String,
}

#[derive(Debug, Default, Serialize)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Text>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickformat: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rangeslider: Option<RangeSlider>,
    pub showgrid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gridcolor: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct RangeSlider {
    pub visible: bool,
}

#[derive(Debug, Serialize)]
pub struct Annotation {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub xref: &'static str,
    pub yref: &'static str,
    pub xanchor: &'static str,
    pub yanchor: &'static str,
    pub showarrow: bool,
}

#[derive(Debug, Serialize)]
pub struct Layout {
    pub title: Text,
    pub showlegend: bool,
    pub height: u32,
    pub paper_bgcolor: &'static str,
    pub plot_bgcolor: &'static str,
    pub font: Font,
    /// `xaxis`, `yaxis2`, ... keyed the way plotly.js expects.
    #[serde(flatten)]
    pub axes: BTreeMap<String, Axis>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub updatemenus: Vec<UpdateMenu>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl Layout {
    fn new(title: &str, config: &ChartConfig) -> Self {
        let palette = config.theme.palette();
        Self {
            title: Text {
                text: title.to_owned(),
            },
            showlegend: true,
            height: config.height,
            paper_bgcolor: palette.paper,
            plot_bgcolor: palette.plot,
            font: Font {
                color: palette.font.to_owned(),
            },
            axes: BTreeMap::new(),
            updatemenus: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

// ── Axis helpers ─────────────────────────────────────────────────────────────

/// Trace-side axis reference: `"x"`, `"x2"`, `"y3"`...
pub(crate) fn axis_ref(letter: char, id: usize) -> String {
    if id == 1 {
        letter.to_string()
    } else {
        format!("{letter}{id}")
    }
}

/// Layout-side axis key: `"xaxis"`, `"yaxis2"`...
pub(crate) fn axis_key(letter: char, id: usize) -> String {
    if id == 1 {
        format!("{letter}axis")
    } else {
        format!("{letter}axis{id}")
    }
}

/// Split `[lo, hi]` into consecutive segments proportional to `weights`,
/// separated by `spacing`. Segments are returned in ascending order.
pub(crate) fn split_span(
    lo: f64,
    hi: f64,
    weights: &[f64],
    spacing: f64,
) -> Result<Vec<[f64; 2]>, Report<ChartError>> {
    let gaps = weights.len().saturating_sub(1) as f64;
    let available = (hi - lo) - spacing * gaps;
    let total: f64 = weights.iter().sum();
    if available <= 0.0 || total <= 0.0 {
        bail!(ChartError::Layout {
            reason: format!(
                "spacing {spacing} leaves no room for {} panels",
                weights.len()
            ),
        });
    }

    let mut start = lo;
    let segments = weights
        .iter()
        .map(|w| {
            let end = (start + available * w / total).min(hi);
            let segment = [start, end];
            start = end + spacing;
            segment
        })
        .collect();
    Ok(segments)
}

/// Vertical domains for stacked rows, top row first.
pub(crate) fn row_domains(
    lo: f64,
    hi: f64,
    weights: &[f64],
    spacing: f64,
) -> Result<Vec<[f64; 2]>, Report<ChartError>> {
    let reversed: Vec<f64> = weights.iter().rev().copied().collect();
    let mut domains = split_span(lo, hi, &reversed, spacing)?;
    domains.reverse();
    Ok(domains)
}

fn value_axis(title: &str, domain: [f64; 2], anchor: &str, config: &ChartConfig) -> Axis {
    Axis {
        title: Some(Text {
            text: title.to_owned(),
        }),
        domain: Some(domain),
        anchor: Some(anchor.to_owned()),
        showgrid: true,
        gridcolor: Some(config.theme.palette().grid),
        ..Axis::default()
    }
}

fn date_axis(anchor: String, domain: Option<[f64; 2]>, config: &ChartConfig) -> Axis {
    Axis {
        title: Some(Text {
            text: "Date".into(),
        }),
        domain,
        anchor: Some(anchor),
        kind: Some("date"),
        tickformat: Some("%b %d"),
        rangeslider: Some(RangeSlider { visible: false }),
        showgrid: true,
        gridcolor: Some(config.theme.palette().grid),
    }
}

// ── Trace builders ───────────────────────────────────────────────────────────

pub(crate) fn candlestick_trace(name: String, history: &PriceHistory, x: &str, y: &str) -> Trace {
    let style = |color: &str| CandleStyle {
        line: Line {
            color: Some(color.to_owned()),
            width: None,
        },
    };
    Trace::Candlestick(CandlestickTrace {
        name,
        x: history.dates(),
        open: history.opens(),
        high: history.highs(),
        low: history.lows(),
        close: history.closes(),
        increasing: style("green"),
        decreasing: style("red"),
        xaxis: x.to_owned(),
        yaxis: y.to_owned(),
    })
}

pub(crate) fn volume_trace(name: String, history: &PriceHistory, x: &str, y: &str) -> Trace {
    Trace::Bar(BarTrace {
        name,
        x: history.dates(),
        y: history.volumes(),
        marker: Marker {
            color: VOLUME_COLOR.to_owned(),
        },
        xaxis: x.to_owned(),
        yaxis: y.to_owned(),
    })
}

/// One line trace per indicator output, named `prefix` + the output's trace
/// name.
pub(crate) fn line_traces(output: &IndicatorOutput, prefix: &str, x: &str, y: &str) -> Vec<Trace> {
    output
        .series
        .iter()
        .enumerate()
        .map(|(i, series)| {
            Trace::Scatter(ScatterTrace {
                name: format!("{prefix}{}", output.trace_name(i)),
                x: output.dates.clone(),
                y: series.defined(),
                mode: "lines",
                line: Line {
                    color: None,
                    width: Some(2.0),
                },
                xaxis: x.to_owned(),
                yaxis: y.to_owned(),
            })
        })
        .collect()
}

// ── Single-ticker figure ─────────────────────────────────────────────────────

/// Candlestick panel with overlays, one panel per below indicator and a
/// volume panel at the bottom, plus the visibility menu.
pub fn build_figure(data: &ChartData, config: &ChartConfig) -> Result<Figure, Report<ChartError>> {
    let rows = data.below.len() + 2;
    let mut weights = vec![PANEL_ROW_WEIGHT; rows];
    weights[0] = PRICE_ROW_WEIGHT;
    let domains = row_domains(0.0, 1.0, &weights, config.vertical_spacing)
        .attach_with(|| format!("rows: {rows}"))?;

    let x = axis_ref('x', 1);
    let price_y = axis_ref('y', 1);
    let volume_id = rows;
    let volume_y = axis_ref('y', volume_id);

    let mut layout = Layout::new(&config.title, config);
    layout
        .axes
        .insert(axis_key('x', 1), date_axis(volume_y.clone(), None, config));
    layout.axes.insert(
        axis_key('y', 1),
        value_axis("Price", domains[0], &x, config),
    );

    let mut traces = vec![candlestick_trace("OHLC".into(), &data.history, &x, &price_y)];
    for output in &data.overlays {
        traces.extend(line_traces(output, "", &x, &price_y));
    }

    traces.push(volume_trace("Volume".into(), &data.history, &x, &volume_y));
    layout.axes.insert(
        axis_key('y', volume_id),
        value_axis("Volume", domains[rows - 1], &x, config),
    );

    for (i, output) in data.below.iter().enumerate() {
        let id = i + 2;
        let y = axis_ref('y', id);
        traces.extend(line_traces(output, "", &x, &y));
        layout.axes.insert(
            axis_key('y', id),
            value_axis(&output.name, domains[i + 1], &x, config),
        );
    }

    let names: Vec<String> = traces.iter().map(|t| t.name().to_owned()).collect();
    layout.updatemenus.push(UpdateMenu::visibility(&names));

    debug!(
        symbol = %data.history.symbol,
        traces = traces.len(),
        rows,
        "figure assembled"
    );

    Ok(Figure {
        data: traces,
        layout,
    })
}

// ── Output ───────────────────────────────────────────────────────────────────

pub fn to_json(figure: &Figure) -> Result<String, Report<ChartError>> {
    serde_json::to_string(figure).change_context(ChartError::Serialize)
}

/// Standalone HTML page rendering the figure with plotly.js.
pub fn to_html(figure: &Figure) -> Result<String, Report<ChartError>> {
    // A literal "</script>" inside the JSON would end the script block.
    let json = to_json(figure)?.replace("</", "<\\/");
    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_CDN}"></script>
</head>
<body style="margin:0;background:{background}">
<div id="chart"></div>
<script>
const figure = {json};
Plotly.newPlot("chart", figure.data, figure.layout, {{responsive: true}});
</script>
</body>
</html>
"#,
        title = html_escape(&figure.layout.title.text),
        background = figure.layout.paper_bgcolor,
    ))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Write the figure to `path`, creating parent directories as needed.
pub fn write(figure: &Figure, path: &Path, format: OutputFormat) -> Result<(), Report<ChartError>> {
    let content = match format {
        OutputFormat::Html => to_html(figure)?,
        OutputFormat::Json => to_json(figure)?,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .change_context(ChartError::Write)
            .attach_with(|| format!("dir: {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .change_context(ChartError::Write)
        .attach_with(|| format!("path: {}", path.display()))?;

    info!(path = %path.display(), traces = figure.data.len(), "chart written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::IndicatorConfig;
    use crate::indicator::bollinger::BollingerParams;
    use crate::indicator::macd::MacdParams;
    use crate::indicator::rsi::RsiParams;
    use crate::test_util::wavy_history;

    fn chart_data(below: Vec<IndicatorConfig>) -> ChartData {
        let overlays = vec![IndicatorConfig::BollingerBands(BollingerParams::default())];
        ChartData::compute(
            wavy_history(40),
            &crate::indicator::build_all(&overlays).unwrap(),
            &crate::indicator::build_all(&below).unwrap(),
        )
    }

    #[test]
    fn empty_history_computes_empty_outputs() {
        let below = vec![IndicatorConfig::Rsi(RsiParams::default())];
        let data = ChartData::compute(
            crate::test_util::history_from_closes(&[]),
            &[],
            &crate::indicator::build_all(&below).unwrap(),
        );
        assert!(data.history.is_empty());
        assert!(data.below[0].series[0].values.is_empty());
    }

    #[test]
    fn split_span_respects_weights_and_spacing() {
        let segments = split_span(0.0, 1.0, &[3.0, 1.0], 0.2).unwrap();
        assert_eq!(segments.len(), 2);
        assert!((segments[0][1] - 0.6).abs() < 1e-12);
        assert!((segments[1][0] - 0.8).abs() < 1e-12);
        assert!((segments[1][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn row_domains_put_first_row_on_top() {
        let domains = row_domains(0.0, 1.0, &[0.7, 0.2, 0.2], 0.1).unwrap();
        assert!(domains[0][0] > domains[1][1]);
        assert!(domains[1][0] > domains[2][1]);
        assert!((domains[0][1] - 1.0).abs() < 1e-12);
        assert!(domains[2][0].abs() < 1e-12);
    }

    #[test]
    fn too_many_rows_for_spacing_rejected() {
        assert!(row_domains(0.0, 1.0, &[1.0; 12], 0.1).is_err());
    }

    #[test]
    fn axis_names() {
        assert_eq!(axis_ref('x', 1), "x");
        assert_eq!(axis_ref('y', 3), "y3");
        assert_eq!(axis_key('x', 1), "xaxis");
        assert_eq!(axis_key('y', 2), "yaxis2");
    }

    #[test]
    fn figure_trace_order_and_panels() {
        let data = chart_data(vec![
            IndicatorConfig::Rsi(RsiParams::default()),
            IndicatorConfig::Macd(MacdParams::default()),
        ]);
        let figure = build_figure(&data, &ChartConfig::default()).unwrap();
        let names: Vec<&str> = figure.data.iter().map(Trace::name).collect();
        assert_eq!(
            names,
            vec![
                "OHLC",
                "BB(20, 2) upper",
                "BB(20, 2) lower",
                "Volume",
                "RSI(14)",
                "MACD(12, 26, 9) macd",
                "MACD(12, 26, 9) signal",
                "MACD(12, 26, 9) histogram",
            ]
        );
        // price, two indicator panels, volume
        assert_eq!(figure.data[3].axes(), ("x", "y4"));
        assert_eq!(figure.data[4].axes(), ("x", "y2"));
        assert_eq!(figure.data[7].axes(), ("x", "y3"));
        assert!(figure.layout.axes.contains_key("yaxis4"));
        assert_eq!(
            figure.layout.axes["xaxis"].anchor.as_deref(),
            Some("y4")
        );
    }

    #[test]
    fn menu_masks_cover_every_trace() {
        let data = chart_data(vec![IndicatorConfig::Rsi(RsiParams::default())]);
        let figure = build_figure(&data, &ChartConfig::default()).unwrap();
        let menu = &figure.layout.updatemenus[0];
        for button in &menu.buttons {
            assert_eq!(button.args.0.visible.len(), figure.data.len());
        }
    }

    #[test]
    fn figure_json_uses_plotly_keys() {
        let data = chart_data(vec![]);
        let figure = build_figure(&data, &ChartConfig::default()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&to_json(&figure).unwrap()).unwrap();

        assert_eq!(json["data"][0]["type"], "candlestick");
        assert_eq!(json["data"][1]["type"], "scatter");
        assert_eq!(json["data"][3]["type"], "bar");
        assert_eq!(json["data"][0]["x"][0], "2024-01-01");
        // bollinger warm-up renders as gaps
        assert!(json["data"][1]["y"][0].is_null());
        assert_eq!(json["layout"]["xaxis"]["rangeslider"]["visible"], false);
        assert_eq!(json["layout"]["yaxis"]["title"]["text"], "Price");
        assert_eq!(json["layout"]["yaxis2"]["title"]["text"], "Volume");
    }

    #[test]
    fn html_escapes_script_terminator() {
        let data = chart_data(vec![]);
        let config = ChartConfig {
            title: "</script><b>".into(),
            ..ChartConfig::default()
        };
        let figure = build_figure(&data, &config).unwrap();
        let html = to_html(&figure).unwrap();
        assert_eq!(html.matches("</script>").count(), 2);
        assert!(html.contains("<title>&lt;/script&gt;&lt;b&gt;</title>"));
    }
}
