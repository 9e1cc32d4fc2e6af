//! Run-scoped HTTP transport.
//!
//! A [`Transport`] bundles the client, request budget, per-host cool-down,
//! retry policy and the run's cancellation token. Every network call of a
//! run goes through [`Transport::send`], so all policies apply uniformly.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::HostCooldown;
use crate::config::NetworkConfig;
use crate::error::{Result, SearchError};
use crate::http;
use crate::limiter::RequestLimiter;
use crate::retry::RetryPolicy;

#[derive(Debug)]
struct Inner {
    client: reqwest::Client,
    limiter: RequestLimiter,
    cooldown: HostCooldown,
    retry: RetryPolicy,
    cancel: CancellationToken,
    request_timeout: Duration,
    max_body_bytes: usize,
}

/// Cheaply cloneable handle; clones share limits and cool-down state.
#[derive(Debug, Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    /// Build the transport for one run.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid budget or if the
    /// HTTP client cannot be built.
    pub fn new(
        config: &NetworkConfig,
        user_agent: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = http::build_client(request_timeout, user_agent)?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                limiter: RequestLimiter::new(config.global_in_flight, config.per_host),
                cooldown: HostCooldown::new(config.cooldown.clone()),
                retry: RetryPolicy::from_config(&config.retry),
                cancel,
                request_timeout,
                max_body_bytes: config.max_body_bytes,
            }),
        })
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn cooldown(&self) -> &HostCooldown {
        &self.inner.cooldown
    }

    pub fn limiter(&self) -> &RequestLimiter {
        &self.inner.limiter
    }

    pub fn max_body_bytes(&self) -> usize {
        self.inner.max_body_bytes
    }

    /// Send a request built by `build`, retrying per the run's policy.
    ///
    /// `build` is called once per attempt.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the last attempt, or
    /// [`SearchError::Cancelled`] once the run is cancelled.
    pub async fn send<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        self.send_with_policy(&self.inner.retry, url, build).await
    }

    /// Like [`Transport::send`] but with an explicit retry policy.
    pub async fn send_with_policy<F>(
        &self,
        policy: &RetryPolicy,
        url: &str,
        build: F,
    ) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let host = http::host_of(url)?;
        let host = host.as_str();
        let build = &build;
        policy
            .run(&self.inner.cancel, move |attempt| {
                self.attempt(host, attempt, build)
            })
            .await
    }

    async fn attempt<F>(&self, host: &str, attempt: u32, build: &F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        if !self.inner.cooldown.should_attempt(host) {
            return Err(SearchError::CoolingDown(host.to_owned()));
        }
        let _permit = self.inner.limiter.acquire(host, &self.inner.cancel).await?;

        tracing::trace!(host, attempt, "sending request");
        let request = build(&self.inner.client).timeout(self.inner.request_timeout);
        let response = tokio::select! {
            _ = self.inner.cancel.cancelled() => return Err(SearchError::Cancelled),
            sent = request.send() => sent.map_err(|e| http::classify_reqwest(host, &e))?,
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            if self.inner.cooldown.record_rate_limited(host) {
                tracing::warn!(host, "host rate limited, cooling down");
            }
        } else {
            self.inner.cooldown.record_success(host);
        }

        match http::classify_status(host, status) {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }

    /// Read a response body as text, truncated to the configured cap.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Transient`] if the body stream fails.
    pub async fn read_text(&self, response: Response) -> Result<String> {
        let host = response
            .url()
            .host_str()
            .unwrap_or_default()
            .to_owned();
        let body = tokio::select! {
            _ = self.inner.cancel.cancelled() => return Err(SearchError::Cancelled),
            text = response.text() => text.map_err(|e| {
                SearchError::transient(&host, format!("response read failed: {e}"))
            })?,
        };
        Ok(truncate_at_char_boundary(body, self.inner.max_body_bytes))
    }
}

fn truncate_at_char_boundary(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text
}
