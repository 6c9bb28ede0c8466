//! # Outbound HTTP
//!
//! Every outbound call the engine makes (DID documents, remote manifests,
//! revocation endpoints) goes through the [`HttpFetch`] trait under an
//! explicit [`FetchBudget`]: a deadline, a byte cap and a redirect cap.
//!
//! The trait is injected at handler construction so deployments can swap
//! in a caching or policy-wrapping client. [`WebFetcher`] is the reqwest
//! reference implementation.

use std::future::Future;
use std::time::Duration;

use anyhow::bail;

/// Budget applied to a single outbound request.
#[derive(Clone, Copy, Debug)]
pub struct FetchBudget {
    /// Total time allowed for the request, including body read.
    pub timeout: Duration,

    /// Maximum number of response bytes read.
    pub max_bytes: usize,

    /// Maximum number of redirect hops followed.
    pub max_redirects: usize,
}

impl FetchBudget {
    /// Build a budget, clamping the timeout to 500..=10000 ms and the
    /// redirect cap to 0..=5 hops.
    #[must_use]
    pub fn new(timeout_ms: u64, max_bytes: usize, max_redirects: usize) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms.clamp(500, 10_000)),
            max_bytes,
            max_redirects: max_redirects.min(5),
        }
    }

    /// Default budget for DID documents and remote manifests: 2 s, 100 KiB,
    /// 3 redirects.
    #[must_use]
    pub fn documents() -> Self {
        Self::new(2000, 100 * 1024, 3)
    }

    /// Default budget for revocation endpoints: 2 s, 10 KiB, 3 redirects.
    #[must_use]
    pub fn revocation() -> Self {
        Self::new(2000, 10 * 1024, 3)
    }
}

impl Default for FetchBudget {
    fn default() -> Self {
        Self::documents()
    }
}

/// `HttpFetch` performs a budgeted HTTPS GET and returns the response
/// body.
///
/// Implementers must honor the budget: abort once the deadline passes,
/// stop reading at the byte cap, refuse to leave `https` across
/// redirects, and follow no more hops than the cap allows.
pub trait HttpFetch: Send + Sync {
    /// Fetch the URL and return the response body.
    ///
    /// # Errors
    ///
    /// Returns an error on any network, status, redirect or budget
    /// failure. Callers collapse the cause before it reaches a client.
    fn fetch(
        &self, url: &str, budget: FetchBudget,
    ) -> impl Future<Output = anyhow::Result<Vec<u8>>> + Send;
}

/// Reference `HttpFetch` backed by reqwest.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebFetcher;

impl HttpFetch for WebFetcher {
    async fn fetch(&self, url: &str, budget: FetchBudget) -> anyhow::Result<Vec<u8>> {
        let parsed = reqwest::Url::parse(url)?;
        if parsed.scheme() != "https" {
            bail!("only https URLs may be fetched");
        }

        let max_redirects = budget.max_redirects;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.error("too many redirects")
            } else if attempt.url().scheme() != "https" {
                attempt.error("redirect left https")
            } else {
                attempt.follow()
            }
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(policy)
            .timeout(budget.timeout)
            .build()?;

        let mut response = client.get(parsed).send().await?;
        if !response.status().is_success() {
            bail!("unexpected response status: {}", response.status());
        }

        if let Some(length) = response.content_length() {
            if length > budget.max_bytes as u64 {
                bail!("response exceeds byte budget");
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > budget.max_bytes {
                bail!("response exceeds byte budget");
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_clamps() {
        let budget = FetchBudget::new(50, 1024, 9);
        assert_eq!(budget.timeout, Duration::from_millis(500));
        assert_eq!(budget.max_redirects, 5);

        let budget = FetchBudget::new(60_000, 1024, 0);
        assert_eq!(budget.timeout, Duration::from_millis(10_000));
        assert_eq!(budget.max_redirects, 0);
    }

    #[tokio::test]
    async fn rejects_non_https() {
        let result = WebFetcher.fetch("http://example.com/did.json", FetchBudget::documents()).await;
        assert!(result.is_err());
    }
}
