//! Page fetching over the run's [`Transport`].
//!
//! [`PageFetcher`] is the seam used by strategies, the domain resolver and
//! the email discoverer. Tests substitute fixture implementations.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};

use crate::error::{Result, SearchError};
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// A successfully fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// Fetches pages and probes reachability.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`. Non-2xx answers are errors classified as transient or
    /// permanent.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;

    /// Single-attempt reachability check: `true` when the server answers
    /// with any status below 500.
    async fn probe(&self, url: &str) -> Result<bool>;
}

/// [`PageFetcher`] backed by the real network.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    transport: Transport,
}

impl HttpFetcher {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        tracing::trace!(url, "fetching page");
        let response = self
            .transport
            .send(url, |client| {
                client
                    .get(url)
                    .header(ACCEPT, "text/html,application/xhtml+xml")
                    .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            })
            .await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = self.transport.read_text(response).await?;
        tracing::trace!(url, bytes = body.len(), "page fetched");
        Ok(FetchedPage {
            url: url.to_owned(),
            final_url,
            status,
            body,
        })
    }

    async fn probe(&self, url: &str) -> Result<bool> {
        let outcome = self
            .transport
            .send_with_policy(&RetryPolicy::single_attempt(), url, |client| {
                client.head(url)
            })
            .await;
        match outcome {
            Ok(_) => Ok(true),
            // The server answered; a 4xx still proves the site exists.
            Err(SearchError::Permanent {
                status: Some(_), ..
            }) => Ok(true),
            Err(SearchError::Cancelled) => Err(SearchError::Cancelled),
            Err(err) => {
                tracing::debug!(url, error = %err, "reachability probe failed");
                Ok(false)
            }
        }
    }
}
