//! Progressive scroll-view painting: emit pages as they are painted.
//!
//! [`DocumentViewer::paint_scroll`] returns only after every page is done.
//! [`scroll_pages`] yields each page as soon as it is ready, in page order,
//! so hosts can show the top of a long document while the rest decodes.
//! Pages are painted one at a time; dropping the stream stops the work.

use crate::error::FolioError;
use crate::viewer::{DocumentViewer, PaintedPage};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;

/// A boxed stream of painted scroll-view pages.
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = Result<PaintedPage, FolioError>> + Send + 'a>>;

/// Stream every page of a ready viewer in scroll mode.
///
/// # Returns
/// - `Ok(PageStream)`: one item per page; a page whose raster failed arrives
///   as `Ok` with its `error` set
/// - `Err(FolioError)`: the viewer is not ready
pub fn scroll_pages(viewer: &DocumentViewer) -> Result<PageStream<'_>, FolioError> {
    if !viewer.is_ready() {
        return Err(FolioError::NotReady {
            phase: viewer.phase().to_string(),
        });
    }
    let total = viewer.num_pages();
    let s = stream::iter(0..total).then(move |index| viewer.paint_scroll_page(index));
    Ok(Box::pin(s))
}
