//! Document upload with typed progress.
//!
//! [`start_upload`] validates the file up front (PDF magic, size limit), then
//! runs the transfer on a tokio task. The caller reads [`UploadEvent`]s from
//! the returned [`UploadTask`]: any number of `Progress` events followed by
//! exactly one terminal event (`Succeeded`, `Failed` or `Cancelled`).

use crate::error::FolioError;
use crate::folio::{document_path, slug_for_file_name};
use crate::pipeline::input::check_pdf_magic;
use crate::storage::{ProgressFn, StorageClient, TransferProgress};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Something that happened to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Progress(TransferProgress),
    Succeeded { slug: String, path: String },
    Failed { reason: String },
    Cancelled,
}

impl UploadEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadEvent::Progress(_))
    }
}

/// Reject files that must not reach storage.
pub fn validate_upload(data: &[u8]) -> Result<(), FolioError> {
    if data.is_empty() {
        return Err(FolioError::InvalidUpload("file is empty".into()));
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(FolioError::InvalidUpload(format!(
            "file is {} bytes; the limit is {} bytes",
            data.len(),
            MAX_UPLOAD_BYTES
        )));
    }
    check_pdf_magic(data)
}

/// Handle to a running upload.
#[derive(Debug)]
pub struct UploadTask {
    slug: String,
    path: String,
    events: mpsc::UnboundedReceiver<UploadEvent>,
    cancel: Option<oneshot::Sender<()>>,
    finished: bool,
}

impl UploadTask {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Storage path the document is being written to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next event, or `None` once the terminal event has been delivered.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await?;
        if event.is_terminal() {
            self.finished = true;
        }
        Some(event)
    }

    /// Ask the upload to stop. A transfer that already finished is unaffected.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Drain progress and return the terminal event.
    pub async fn outcome(mut self) -> UploadEvent {
        while let Some(event) = self.next_event().await {
            if event.is_terminal() {
                return event;
            }
        }
        UploadEvent::Failed {
            reason: "upload task ended without a result".into(),
        }
    }
}

/// Validate `data` and start uploading it under a fresh slug.
///
/// Must be called from within a tokio runtime.
pub fn start_upload(
    storage: Arc<dyn StorageClient>,
    file_name: &str,
    data: Vec<u8>,
) -> Result<UploadTask, FolioError> {
    validate_upload(&data)?;

    let slug = slug_for_file_name(file_name);
    let path = document_path(&slug);
    let (tx, events) = mpsc::unbounded_channel();
    let (cancel, mut cancelled) = oneshot::channel::<()>();

    info!("Uploading {} ({} bytes) to {}", file_name, data.len(), path);

    let progress_tx = tx.clone();
    let progress: ProgressFn = Arc::new(move |p: TransferProgress| {
        let _ = progress_tx.send(UploadEvent::Progress(p));
    });

    let task_slug = slug.clone();
    let task_path = path.clone();
    tokio::spawn(async move {
        let terminal = tokio::select! {
            result = storage.put(&task_path, data, PDF_CONTENT_TYPE, Some(progress)) => match result {
                Ok(stored) => UploadEvent::Succeeded { slug: task_slug, path: stored },
                Err(e) => {
                    warn!("Upload of {} failed: {}", task_path, e);
                    UploadEvent::Failed { reason: e.to_string() }
                }
            },
            _ = &mut cancelled => {
                info!("Upload of {} cancelled", task_path);
                UploadEvent::Cancelled
            }
        };
        let _ = tx.send(terminal);
    });

    Ok(UploadTask {
        slug,
        path,
        events,
        cancel: Some(cancel),
        finished: false,
    })
}
