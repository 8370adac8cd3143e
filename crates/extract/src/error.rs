use std::time::Duration;
use thiserror::Error;

/// Failure of a single oracle call.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("response contained no text")]
    EmptyResponse,

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("call cancelled")]
    Cancelled,

    #[error("oracle misconfigured: {0}")]
    Config(String),
}

impl OracleError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OracleError::Cancelled)
    }
}

/// Oracle output that could not be decoded into structured data.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is missing the `{0}` object")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
