use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T, E = SconeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SconeError {
    #[error("request to {url} failed after {attempts} attempt(s)")]
    Http {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with {status} after {attempts} attempt(s)")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        attempts: u32,
    },

    /// The body is kept so that a changed API can be diagnosed from the error alone.
    #[error("didn't receive a JSON response from {url}\n{body}")]
    NonJson {
        url: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected calendar entries from {url}: {source}")]
    Schema {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("timestamp {0} ms is out of range")]
    Timestamp(i64),

    #[error(
        "illegal start/end date: start ({start}) must not be before {floor} and end ({end}) must not be after {ceiling}"
    )]
    InvalidRange {
        start: NaiveDate,
        end: NaiveDate,
        floor: NaiveDate,
        ceiling: NaiveDate,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid aggregate file: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("'{summary}' is already in the calendar as {uid}")]
    Duplicate { summary: String, uid: String },

    #[error("failed to publish '{summary}'")]
    Publish {
        summary: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SconeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
