use thiserror::Error;

/// Upstream fetch failures. Scoped to a single refresh cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request error: {0}")]
    Request(String),

    #[error("Non-JSON response: {0}")]
    NonJsonResponse(String),

    #[error("Retryable error: {0}")]
    Retryable(String),

    #[error("Client error {status}: {preview}")]
    Client { status: u16, preview: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No valid expiry found (all past or after cutoff)")]
    NoValidExpiry,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

/// Malformed or incomplete data at the ingestion boundary.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("option chain has no strikes")]
    EmptyChain,

    #[error("strike entry #{index} has no strikePrice")]
    MissingStrike { index: usize },

    #[error("strike {strike} {side} is missing field '{field}'")]
    MissingField {
        strike: f64,
        side: &'static str,
        field: &'static str,
    },

    #[error("missing one or more required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("unknown signal label '{0}'")]
    UnknownLabel(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// History export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Screener input and model failures.
#[derive(Debug, Error)]
pub enum ScreenerError {
    #[error("insufficient data: need {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("missing one or more required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
