//! Storage collaborator: signed URL issuance and object upload.
//!
//! Binary object storage lives outside this crate. Everything the viewer
//! needs from it is captured by [`StorageClient`]: exchange a logical path
//! for a time-limited URL, and store an object. Methods return boxed futures
//! so the client can be shared as `Arc<dyn StorageClient>`.
//!
//! [`PublicBucketStorage`] is the bundled implementation for a public-read
//! HTTP bucket that accepts `PUT` uploads.

use crate::error::FolioError;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// A time-limited URL granting read access to one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: SystemTime,
}

impl SignedUrl {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

/// Bytes moved so far in one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub transferred_bytes: u64,
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Whole-number percentage, if the total is known.
    pub fn percent(&self) -> Option<u8> {
        match self.total_bytes {
            Some(0) => Some(100),
            Some(total) => Some(((self.transferred_bytes.min(total) * 100) / total) as u8),
            None => None,
        }
    }
}

/// Sink for upload progress reports.
pub type ProgressFn = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// External object storage.
pub trait StorageClient: Send + Sync {
    /// Exchange a logical path for a signed URL valid for `expires_in`.
    fn sign_url<'a>(
        &'a self,
        path: &'a str,
        expires_in: Duration,
    ) -> BoxFuture<'a, Result<SignedUrl, FolioError>>;

    /// Store `data` under `path`. Returns the stored path.
    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Vec<u8>,
        content_type: &'a str,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'a, Result<String, FolioError>>;
}

const UPLOAD_CHUNK: usize = 64 * 1024;

/// A public-read bucket reachable over HTTP.
///
/// Signed URLs are `<base>/<path>?expires=<unix-seconds>`. The bucket does
/// not enforce the expiry; it only makes each issued URL distinct per expiry
/// window, which is what the resource cache keys on.
#[derive(Debug, Clone)]
pub struct PublicBucketStorage {
    base_url: reqwest::Url,
    client: reqwest::Client,
}

impl PublicBucketStorage {
    pub fn new(base_url: &str) -> Result<Self, FolioError> {
        let mut base = reqwest::Url::parse(base_url).map_err(|e| {
            FolioError::InvalidConfig(format!("storage URL '{base_url}' is invalid: {e}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base_url: base,
            client: reqwest::Client::new(),
        })
    }

    /// Construct from an optional endpoint, failing with a hint when absent.
    pub fn from_endpoint(endpoint: Option<&str>) -> Result<Self, FolioError> {
        match endpoint {
            Some(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Err(FolioError::StorageNotConfigured {
                hint: "Pass --storage-url or set FLIPFOLIO_STORAGE_URL.".into(),
            }),
        }
    }

    fn object_url(&self, path: &str) -> Result<reqwest::Url, FolioError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| FolioError::SigningFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }
}

impl StorageClient for PublicBucketStorage {
    fn sign_url<'a>(
        &'a self,
        path: &'a str,
        expires_in: Duration,
    ) -> BoxFuture<'a, Result<SignedUrl, FolioError>> {
        Box::pin(async move {
            let expires_at = SystemTime::now().checked_add(expires_in).ok_or_else(|| {
                FolioError::SigningFailed {
                    path: path.to_string(),
                    reason: format!("expiry of {}s is out of range", expires_in.as_secs()),
                }
            })?;
            let expiry = expires_at
                .duration_since(UNIX_EPOCH)
                .map_err(|e| FolioError::SigningFailed {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?
                .as_secs();
            let mut url = self.object_url(path)?;
            url.query_pairs_mut()
                .append_pair("expires", &expiry.to_string());
            debug!("Signed {} → {}", path, url);
            Ok(SignedUrl {
                url: url.to_string(),
                expires_at,
            })
        })
    }

    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Vec<u8>,
        content_type: &'a str,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'a, Result<String, FolioError>> {
        Box::pin(async move {
            let url = self.object_url(path)?;
            let total = data.len() as u64;
            info!("Uploading {} bytes to {}", total, path);

            let chunks: Vec<Vec<u8>> = data.chunks(UPLOAD_CHUNK).map(<[u8]>::to_vec).collect();
            let mut sent = 0u64;
            let body = stream::iter(chunks).map(move |chunk| {
                sent += chunk.len() as u64;
                if let Some(report) = &progress {
                    report(TransferProgress {
                        transferred_bytes: sent,
                        total_bytes: Some(total),
                    });
                }
                Ok::<_, std::io::Error>(chunk)
            });

            let response = self
                .client
                .put(url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .header(reqwest::header::CONTENT_LENGTH, total)
                .body(reqwest::Body::wrap_stream(body))
                .send()
                .await
                .map_err(|e| FolioError::UploadFailed {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;

            if !response.status().is_success() {
                return Err(FolioError::UploadFailed {
                    path: path.to_string(),
                    reason: format!("HTTP {}", response.status()),
                });
            }
            Ok(path.to_string())
        })
    }
}
