use std::io;

use thiserror::Error;

/// Failure to retrieve a dataset from its source. Fatal to the dataset; the
/// caller decides whether that aborts the run or degrades to no rows.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("dataset '{dataset}': transport failure: {source}")]
    Transport {
        dataset: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("dataset '{dataset}': HTTP status {status}: {body}")]
    Status {
        dataset: String,
        status: u16,
        body: String,
    },
    #[error("dataset '{dataset}': response is not a JSON array of records: {source}")]
    Decode {
        dataset: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("dataset '{dataset}': {source}")]
    Io {
        dataset: String,
        #[source]
        source: io::Error,
    },
    #[error("dataset '{dataset}': invalid request URL '{url}'")]
    InvalidUrl { dataset: String, url: String },
}

impl RetrievalError {
    pub fn dataset(&self) -> &str {
        match self {
            RetrievalError::Transport { dataset, .. }
            | RetrievalError::Status { dataset, .. }
            | RetrievalError::Decode { dataset, .. }
            | RetrievalError::Io { dataset, .. }
            | RetrievalError::InvalidUrl { dataset, .. } => dataset,
        }
    }
}

/// Rejected distance-band declaration.
#[derive(Debug, Error, PartialEq)]
pub enum BandError {
    #[error("at least one distance band is required")]
    Empty,
    #[error("band radius {0} m is not a positive finite number")]
    InvalidRadius(f64),
    #[error("band radii must be strictly ascending ({previous} m then {next} m)")]
    NotAscending { previous: f64, next: f64 },
    #[error("band weights must not grow with radius ({previous} then {next})")]
    WeightIncreases { previous: f64, next: f64 },
}
