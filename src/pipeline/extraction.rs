//! Extracted-content acquisition.
//!
//! Extracted content for `<doc>.pdf` lives next to it at
//! `<doc>.pdf.extracted.json`. Loading it is best effort: a missing file is the
//! normal state for documents that were never extracted, and a broken one only
//! costs the viewer its overlay. Neither blocks the raster view.
//!
//! [`ExtractionClient`] asks an external extraction service to produce the
//! file for a stored document and persists the validated reply.

use crate::content::ExtractedContent;
use crate::error::FolioError;
use crate::folio::extracted_content_path;
use crate::pipeline::input::Fetcher;
use crate::storage::StorageClient;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of looking for a document's extracted content.
#[derive(Debug, Clone)]
pub enum ExtractionStatus {
    Available(Arc<ExtractedContent>),
    /// No extracted content was ever produced for this document.
    NotFound,
    /// Content exists but could not be fetched or failed validation.
    Failed { reason: String },
}

impl ExtractionStatus {
    pub fn content(&self) -> Option<&Arc<ExtractedContent>> {
        match self {
            ExtractionStatus::Available(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ExtractionStatus::Available(_))
    }

    /// User-facing notice for a missing overlay, if any.
    pub fn notice(&self) -> Option<String> {
        match self {
            ExtractionStatus::Available(_) => None,
            ExtractionStatus::NotFound => {
                Some("No extracted content for this document; showing pages only.".into())
            }
            ExtractionStatus::Failed { reason } => {
                Some(format!("Extracted content unavailable: {reason}"))
            }
        }
    }
}

/// Fetch and validate extracted content for `document_path`.
///
/// Extracted content is small and read once per view, so it bypasses the
/// resource cache.
pub async fn load_extracted_content(
    storage: &dyn StorageClient,
    fetcher: &dyn Fetcher,
    document_path: &str,
    expires_in: Duration,
) -> ExtractionStatus {
    let path = extracted_content_path(document_path);

    let signed = match storage.sign_url(&path, expires_in).await {
        Ok(s) => s,
        Err(e) => {
            warn!("Could not sign {}: {}", path, e);
            return ExtractionStatus::Failed {
                reason: e.to_string(),
            };
        }
    };

    let raw = match fetcher.fetch(&signed.url).await {
        Ok(raw) => raw,
        Err(e) if e.is_not_found() => {
            debug!("No extracted content at {}", path);
            return ExtractionStatus::NotFound;
        }
        Err(e) => {
            warn!("Fetching {} failed: {}", path, e);
            return ExtractionStatus::Failed {
                reason: e.to_string(),
            };
        }
    };

    match ExtractedContent::from_json(&raw) {
        Ok(content) => {
            info!(
                "Loaded extracted content for {} ({} pages)",
                document_path,
                content.page_count()
            );
            ExtractionStatus::Available(Arc::new(content))
        }
        Err(e) => {
            warn!("Extracted content for {} rejected: {}", document_path, e);
            ExtractionStatus::Failed {
                reason: e.to_string(),
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractionRequest<'a> {
    pdf_url: &'a str,
}

/// Client for the external extraction service.
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    client: reqwest::Client,
    service_url: String,
}

impl ExtractionClient {
    pub fn new(service_url: impl Into<String>, timeout_secs: u64) -> Result<Self, FolioError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FolioError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            service_url: service_url.into(),
        })
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// Extract `document_path` and store the result beside it.
    ///
    /// The service receives a signed URL for the document as `{"pdfUrl": …}`
    /// and must answer with extracted-content JSON. The reply is validated
    /// before anything is written.
    pub async fn request(
        &self,
        storage: &dyn StorageClient,
        document_path: &str,
        expires_in: Duration,
    ) -> Result<Arc<ExtractedContent>, FolioError> {
        let failed = |reason: String| FolioError::ExtractionRequestFailed {
            path: document_path.to_string(),
            reason,
        };

        let signed = storage.sign_url(document_path, expires_in).await?;
        info!("Requesting extraction of {}", document_path);

        let response = self
            .client
            .post(&self.service_url)
            .json(&ExtractionRequest {
                pdf_url: &signed.url,
            })
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {status}: {}", body.trim())));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| failed(format!("invalid JSON reply: {e}")))?;
        let content = ExtractedContent::from_value(value)?;

        let serialised =
            serde_json::to_vec(&content).map_err(|e| FolioError::Internal(e.to_string()))?;
        let target = extracted_content_path(document_path);
        storage
            .put(&target, serialised, "application/json", None)
            .await?;

        info!(
            "Stored extracted content at {} ({} pages)",
            target,
            content.page_count()
        );
        Ok(Arc::new(content))
    }
}
