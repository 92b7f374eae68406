use super::DataSource;
use crate::config::{Dataset, DatasetsConfig};
use crate::record::Record;
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// What a call site does when its dataset cannot be retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Propagate the failure and end the run.
    Abort,
    /// Log a warning and continue with zero rows.
    Degrade,
}

/// Fetches each dataset at most once per run and hands out shared copies.
///
/// A failure is remembered too: later requests for the same dataset get the
/// same outcome under their own policy without hitting the source again.
pub struct DatasetLoader<'a> {
    source: &'a dyn DataSource,
    datasets: &'a DatasetsConfig,
    loaded: BTreeMap<Dataset, Arc<Vec<Record>>>,
    failed: BTreeMap<Dataset, String>,
}

impl<'a> DatasetLoader<'a> {
    pub fn new(source: &'a dyn DataSource, datasets: &'a DatasetsConfig) -> Self {
        Self {
            source,
            datasets,
            loaded: BTreeMap::new(),
            failed: BTreeMap::new(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn load(&mut self, dataset: Dataset, policy: FetchPolicy) -> Result<Arc<Vec<Record>>> {
        if let Some(records) = self.loaded.get(&dataset) {
            return Ok(Arc::clone(records));
        }
        if let Some(reason) = self.failed.get(&dataset) {
            return match policy {
                FetchPolicy::Abort => Err(anyhow!("{dataset} dataset unavailable: {reason}")),
                FetchPolicy::Degrade => Ok(Arc::new(Vec::new())),
            };
        }

        let spec = self.datasets.get(dataset);
        match self.source.fetch(&spec.id, spec.limit).await {
            Ok(records) => {
                let records = Arc::new(records);
                self.loaded.insert(dataset, Arc::clone(&records));
                Ok(records)
            }
            Err(err) => {
                self.failed.insert(dataset, err.to_string());
                match policy {
                    FetchPolicy::Abort => {
                        Err(anyhow::Error::new(err).context(format!("fetching {dataset} dataset")))
                    }
                    FetchPolicy::Degrade => {
                        warn!(error = %err, "Dataset unavailable, continuing with no rows");
                        Ok(Arc::new(Vec::new()))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RetrievalError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves one record per dataset id, failing for ids in `broken`.
    struct CountingSource {
        calls: AtomicUsize,
        broken: &'static [&'static str],
    }

    #[async_trait]
    impl DataSource for CountingSource {
        async fn fetch(&self, dataset_id: &str, _limit: usize) -> Result<Vec<Record>, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.broken.iter().any(|b| *b == dataset_id) {
                return Err(RetrievalError::Status {
                    dataset: dataset_id.to_string(),
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(vec![Record::new().with("id", dataset_id)])
        }
    }

    #[tokio::test]
    async fn test_each_dataset_fetched_once() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            broken: &[],
        };
        let datasets = DatasetsConfig::default();
        let mut loader = DatasetLoader::new(&source, &datasets);

        let first = loader.load(Dataset::Permits, FetchPolicy::Abort).await.unwrap();
        let again = loader.load(Dataset::Permits, FetchPolicy::Degrade).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first[0].text("id").as_deref(), Some("c2es-76ed"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abort_propagates_and_degrade_is_empty() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            broken: &["78gh-n26t"],
        };
        let datasets = DatasetsConfig::default();
        let mut loader = DatasetLoader::new(&source, &datasets);

        let degraded = loader.load(Dataset::Crime, FetchPolicy::Degrade).await.unwrap();
        assert!(degraded.is_empty());

        let err = loader.load(Dataset::Crime, FetchPolicy::Abort).await.unwrap_err();
        assert!(err.to_string().contains("crime dataset unavailable"));
        assert!(err.to_string().contains("503"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abort_keeps_retrieval_error_as_source() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            broken: &["4bsw-nn7w"],
        };
        let datasets = DatasetsConfig::default();
        let mut loader = DatasetLoader::new(&source, &datasets);

        let err = loader
            .load(Dataset::Assessments, FetchPolicy::Abort)
            .await
            .unwrap_err();
        let retrieval = err.downcast_ref::<RetrievalError>().unwrap();
        assert_eq!(retrieval.dataset(), "4bsw-nn7w");
    }
}
