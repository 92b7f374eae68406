use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, InvalidHeaderValue};

/// An [`HttpClient`] wrapper that sends a Socrata app token with every
/// request. Without one the portal still answers, at a lower rate limit.
pub struct AppToken<C> {
    inner: C,
    value: HeaderValue,
}

impl<C> AppToken<C> {
    pub const HEADER: HeaderName = HeaderName::from_static("x-app-token");

    pub fn new(inner: C, token: &str) -> Result<Self, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(token.trim())?;
        value.set_sensitive(true);
        Ok(Self { inner, value })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for AppToken<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut().insert(Self::HEADER, self.value.clone());
        self.inner.execute(req).await
    }
}
