use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for dataset requests. Wrappers such as
/// [`AppToken`](super::auth::AppToken) decorate an inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
