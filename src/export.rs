use std::io::Write;

use error_stack::{Report, ResultExt};
use tracing::debug;

use crate::error::ExportError;
use crate::model::{IndicatorOutput, PriceHistory};

const PRICE_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Write the bars and every indicator output as one CSV table, one row per
/// bar. Undefined indicator values are written as empty cells.
pub fn write_csv<W: Write>(
    history: &PriceHistory,
    outputs: &[IndicatorOutput],
    writer: W,
) -> Result<(), Report<ExportError>> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = PRICE_COLUMNS.iter().map(|c| c.to_string()).collect();
    for output in outputs {
        header.extend((0..output.series.len()).map(|i| output.trace_name(i)));
    }
    csv.write_record(&header).change_context(ExportError::Write)?;

    for (row, bar) in history.bars.iter().enumerate() {
        let mut record = vec![
            bar.date.to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ];
        for series in outputs.iter().flat_map(|o| &o.series) {
            let cell = series
                .values
                .get(row)
                .filter(|v| v.is_finite())
                .map(f64::to_string)
                .unwrap_or_default();
            record.push(cell);
        }
        csv.write_record(&record)
            .change_context(ExportError::Write)
            .attach_with(|| format!("date: {}", bar.date))?;
    }

    csv.flush().change_context(ExportError::Write)?;

    debug!(
        symbol = %history.symbol,
        rows = history.len(),
        columns = header.len(),
        "csv export written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::Indicator;
    use crate::indicator::bollinger::{BollingerBands, BollingerParams};
    use crate::indicator::ma::{Sma, SmaParams};
    use crate::test_util::history_from_closes;

    fn export(history: &PriceHistory, outputs: &[IndicatorOutput]) -> String {
        let mut buf = Vec::new();
        write_csv(history, outputs, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn header_names_every_output() {
        let history = history_from_closes(&[1.0, 2.0, 3.0]);
        let sma = Sma::new(SmaParams { window: 2 }).unwrap();
        let bb = BollingerBands::new(BollingerParams {
            window: 2,
            num_std: 2.0,
        })
        .unwrap();
        let text = export(&history, &[sma.calculate(&history), bb.calculate(&history)]);
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let header: Vec<&str> = reader.headers().unwrap().iter().collect();
        assert_eq!(
            header,
            vec![
                "date",
                "open",
                "high",
                "low",
                "close",
                "volume",
                "SMA(2)",
                "BB(2, 2) upper",
                "BB(2, 2) lower",
            ]
        );
        // labels with commas are quoted
        assert!(text.lines().next().unwrap().ends_with(",\"BB(2, 2) upper\",\"BB(2, 2) lower\""));
    }

    #[test]
    fn undefined_values_are_empty_cells() {
        let history = history_from_closes(&[1.0, 2.0, 3.0]);
        let sma = Sma::new(SmaParams { window: 2 }).unwrap();
        let text = export(&history, &[sma.calculate(&history)]);
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("2024-01-01,"));
        assert!(rows[0].ends_with(','));
        assert!(rows[1].ends_with(",1.5"));
        assert!(rows[2].ends_with(",2.5"));
    }

    #[test]
    fn empty_history_writes_header_only() {
        let history = history_from_closes(&[]);
        let text = export(&history, &[]);
        assert_eq!(text, "date,open,high,low,close,volume\n");
    }
}
