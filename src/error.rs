use thiserror::Error;

/// Contract violations the core refuses to default around.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("risk score must be a finite non-negative number, got {0}")]
    InvalidScore(f64),

    #[error("histogram count for value {value} is negative ({count})")]
    NegativeHistogramCount { value: f64, count: i64 },

    #[error("histogram population exceeds {}", i64::MAX)]
    HistogramOverflow,

    #[error("risk bands do not partition [0, inf): {0}")]
    InvalidBands(String),

    #[error("source catalog is invalid: {0}")]
    InvalidCatalog(String),

    #[error("date arithmetic out of range near {0}")]
    DateOutOfRange(String),
}
