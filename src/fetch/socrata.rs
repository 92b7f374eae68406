use super::{DataSource, HttpClient, decode_records};
use crate::errors::RetrievalError;
use crate::record::Record;
use async_trait::async_trait;
use tracing::{debug, info};

/// Characters of an error body kept in a [`RetrievalError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Reads datasets from a Socrata resource endpoint,
/// `{base_url}/{dataset_id}.json?$limit={limit}`.
pub struct SocrataSource<C> {
    client: C,
    base_url: String,
}

impl<C: HttpClient> SocrataSource<C> {
    pub fn new(client: C, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dataset_url(&self, dataset_id: &str, limit: usize) -> String {
        format!("{}/{}.json?$limit={}", self.base_url, dataset_id, limit)
    }
}

#[async_trait]
impl<C: HttpClient> DataSource for SocrataSource<C> {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, dataset_id: &str, limit: usize) -> Result<Vec<Record>, RetrievalError> {
        let url = self.dataset_url(dataset_id, limit);
        let parsed = url.parse().map_err(|_| RetrievalError::InvalidUrl {
            dataset: dataset_id.to_string(),
            url: url.clone(),
        })?;
        let req = reqwest::Request::new(reqwest::Method::GET, parsed);

        let transport = |source| RetrievalError::Transport {
            dataset: dataset_id.to_string(),
            source,
        };

        let resp = self.client.execute(req).await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            let body: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(RetrievalError::Status {
                dataset: dataset_id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(transport)?;
        debug!(bytes = bytes.len(), "Dataset body received");

        let records = decode_records(dataset_id, &bytes)?;
        info!(records = records.len(), "Fetched dataset");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use std::time::Duration;

    #[test]
    fn test_dataset_url() {
        let source = SocrataSource::new(
            BasicClient::new(Duration::from_secs(5)).unwrap(),
            "https://data.calgary.ca/resource/",
        );
        assert_eq!(
            source.dataset_url("c2es-76ed", 50000),
            "https://data.calgary.ca/resource/c2es-76ed.json?$limit=50000"
        );
    }
}
