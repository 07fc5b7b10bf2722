use error_stack::{Report, ResultExt, bail};
use tracing::debug;

use crate::config::ChartConfig;
use crate::error::ChartError;

use super::{
    Annotation, ChartData, Figure, Layout, axis_key, axis_ref, candlestick_trace, date_axis,
    line_traces, row_domains, split_span, value_axis, volume_trace,
};

const PRICE_CELL_WEIGHT: f64 = 0.8;
const VOLUME_CELL_WEIGHT: f64 = 0.2;
const COLUMN_SPACING: f64 = 0.05;
/// Gap between a ticker's price and volume cells, as a share of the block.
const CELL_SPACING: f64 = 0.02;

/// One block per ticker: a price cell over a volume cell, laid out
/// `config.columns` blocks per row and titled with the symbol.
pub fn build_grid(panels: &[ChartData], config: &ChartConfig) -> Result<Figure, Report<ChartError>> {
    if panels.is_empty() {
        bail!(ChartError::Layout {
            reason: "grid needs at least one ticker".into(),
        });
    }

    let columns = config.columns.min(panels.len()).max(1);
    let block_rows = panels.len().div_ceil(columns);

    let rows = row_domains(0.0, 1.0, &vec![1.0; block_rows], config.vertical_spacing)
        .attach_with(|| format!("grid rows: {block_rows}"))?;
    let cols = split_span(0.0, 1.0, &vec![1.0; columns], COLUMN_SPACING)
        .attach_with(|| format!("grid columns: {columns}"))?;

    let mut layout = Layout::new(&config.title, config);
    let mut traces = Vec::new();

    for (k, panel) in panels.iter().enumerate() {
        let block = rows[k / columns];
        let column = cols[k % columns];
        let cells = row_domains(
            block[0],
            block[1],
            &[PRICE_CELL_WEIGHT, VOLUME_CELL_WEIGHT],
            CELL_SPACING * (block[1] - block[0]),
        )?;

        let x_id = k + 1;
        let price_id = 2 * k + 1;
        let volume_id = 2 * k + 2;
        let x = axis_ref('x', x_id);
        let price_y = axis_ref('y', price_id);
        let volume_y = axis_ref('y', volume_id);
        let symbol = &panel.history.symbol;

        traces.push(candlestick_trace(symbol.clone(), &panel.history, &x, &price_y));
        for output in panel.overlays.iter().chain(&panel.below) {
            traces.extend(line_traces(output, &format!("{symbol} "), &x, &price_y));
        }
        traces.push(volume_trace(
            format!("{symbol} Volume"),
            &panel.history,
            &x,
            &volume_y,
        ));

        layout.axes.insert(
            axis_key('x', x_id),
            date_axis(volume_y.clone(), Some(column), config),
        );
        layout
            .axes
            .insert(axis_key('y', price_id), value_axis("Price", cells[0], &x, config));
        layout.axes.insert(
            axis_key('y', volume_id),
            value_axis("Volume", cells[1], &x, config),
        );

        layout.annotations.push(Annotation {
            text: symbol.clone(),
            x: (column[0] + column[1]) / 2.0,
            y: block[1],
            xref: "paper",
            yref: "paper",
            xanchor: "center",
            yanchor: "bottom",
            showarrow: false,
        });
    }

    debug!(
        tickers = panels.len(),
        columns,
        block_rows,
        traces = traces.len(),
        "grid assembled"
    );

    Ok(Figure {
        data: traces,
        layout,
    })
}
