//! Byte acquisition: fetch a signed URL and sanity-check PDF bytes.
//!
//! Fetching sits behind the [`Fetcher`] trait so the resource cache can be
//! exercised without a network. [`HttpFetcher`] is the production
//! implementation. Pre-signed URLs carry their own credentials, so requests
//! are plain unauthenticated `GET`s.

use crate::error::FolioError;
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, info};

/// Fetches the bytes behind a URL.
pub trait Fetcher: Send + Sync {
    /// `Err(FolioError::FetchFailed)` on transport error or non-2xx status.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FolioError>>;
}

/// `reqwest`-backed fetcher with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, FolioError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FolioError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FolioError>> {
        Box::pin(async move {
            info!("Fetching {}", url);

            let response = self.client.get(url).send().await.map_err(|e| {
                if e.is_timeout() {
                    FolioError::FetchTimeout {
                        url: url.to_string(),
                        secs: self.timeout_secs,
                    }
                } else {
                    FolioError::FetchFailed {
                        url: url.to_string(),
                        status: None,
                        reason: e.to_string(),
                    }
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FolioError::FetchFailed {
                    url: url.to_string(),
                    status: Some(status.as_u16()),
                    reason: format!("HTTP {status}"),
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| FolioError::FetchFailed {
                    url: url.to_string(),
                    status: Some(status.as_u16()),
                    reason: e.to_string(),
                })?;

            debug!("Fetched {} bytes from {}", bytes.len(), url);
            Ok(bytes.to_vec())
        })
    }
}

/// Reject bytes that do not start with `%PDF`.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), FolioError> {
    if bytes.len() >= 4 && &bytes[..4] == b"%PDF" {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(FolioError::NotAPdf { magic })
}
