use super::{DataSource, decode_records};
use crate::errors::RetrievalError;
use crate::record::Record;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Reads datasets from `{root}/{dataset_id}.json` snapshots, as saved from
/// the portal. The row limit truncates the snapshot.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DataSource for DirectorySource {
    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    async fn fetch(&self, dataset_id: &str, limit: usize) -> Result<Vec<Record>, RetrievalError> {
        let path = self.root.join(format!("{dataset_id}.json"));
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| RetrievalError::Io {
                dataset: dataset_id.to_string(),
                source,
            })?;

        let mut records = decode_records(dataset_id, &bytes)?;
        records.truncate(limit);
        info!(records = records.len(), path = %path.display(), "Loaded dataset snapshot");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_reads_and_truncates_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("rkfr-buzb.json"),
            r#"[{"name":"A"},{"name":"B"},{"name":"C"}]"#,
        )
        .unwrap();

        let source = DirectorySource::new(dir.path());
        let records = source.fetch("rkfr-buzb", 2).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text("name").as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectorySource::new(dir.path())
            .fetch("78gh-n26t", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Io { .. }));
        assert_eq!(err.dataset(), "78gh-n26t");
    }
}
