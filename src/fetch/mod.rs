//! Dataset retrieval.
//!
//! [`DataSource`] turns a dataset id and a row limit into records, either
//! from the open data portal ([`SocrataSource`]) or from a directory of JSON
//! snapshots ([`DirectorySource`]). [`DatasetLoader`] sits on top and applies
//! the per-call-site [`FetchPolicy`].

mod basic;
mod client;
pub mod auth;
mod directory;
mod loader;
mod socrata;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use directory::DirectorySource;
pub use loader::{DatasetLoader, FetchPolicy};
pub use socrata::SocrataSource;

use crate::errors::RetrievalError;
use crate::record::Record;
use async_trait::async_trait;

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetches at most `limit` records of `dataset_id`. No retries.
    async fn fetch(&self, dataset_id: &str, limit: usize) -> Result<Vec<Record>, RetrievalError>;
}

/// Parses a JSON array of flat objects.
pub fn decode_records(dataset_id: &str, bytes: &[u8]) -> Result<Vec<Record>, RetrievalError> {
    serde_json::from_slice(bytes).map_err(|source| RetrievalError::Decode {
        dataset: dataset_id.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_records() {
        let records = decode_records(
            "c2es-76ed",
            br#"[{"communityname":"BELTLINE","estprojectcost":"100000"},{}]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].number("estprojectcost"), Some(100000.0));
        assert!(records[1].is_empty());
    }

    #[test]
    fn test_decode_rejects_non_array() {
        let err = decode_records("c2es-76ed", br#"{"error":true}"#).unwrap_err();
        assert!(matches!(err, RetrievalError::Decode { .. }));
        assert_eq!(err.dataset(), "c2es-76ed");
    }
}
