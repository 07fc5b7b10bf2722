use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum SourceError {
    #[display("request to {provider} failed")]
    Request { provider: String },
    #[display("failed to parse response from {provider}")]
    ResponseParse { provider: String },
    #[display("failed to read price file")]
    ReadFile,
    #[display("no price data for {symbol}")]
    Empty { symbol: String },
    #[display("invalid period: {period}")]
    InvalidPeriod { period: String },
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Display, Error)]
pub enum ChartError {
    #[display("invalid chart layout: {reason}")]
    Layout { reason: String },
    #[display("failed to serialize figure")]
    Serialize,
    #[display("failed to write output")]
    Write,
}

#[derive(Debug, Display, Error)]
pub enum ExportError {
    #[display("failed to write csv export")]
    Write,
}
