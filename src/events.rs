//! Typed view events.
//!
//! A [`DocumentViewer`](crate::viewer::DocumentViewer) reports what happens to
//! it as [`ViewEvent`]s over an unbounded tokio channel. Hosts forward them to
//! whatever they drive (a toolbar, a log, a progress bar) without the viewer
//! knowing how. Terminal outcomes are explicit phases, never boolean flags.
//!
//! Sending never blocks and never fails the viewer: a dropped receiver just
//! turns the sink into a no-op.

use crate::error::PageError;
use crate::view::ViewMode;
use crate::viewer::ViewPhase;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Something observable happened to a viewing session.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    PhaseChanged(ViewPhase),
    /// `current` or `num_pages` changed. `current` is 0-based.
    PageChanged { current: usize, num_pages: usize },
    ZoomChanged(f64),
    ModeChanged(ViewMode),
    /// A page image was painted. `page` is 0-based.
    PagePainted { page: usize },
    /// A page failed to rasterise; its siblings are unaffected.
    PageFailed(PageError),
    /// One overlay element was dropped; the rest of its page painted.
    ElementSkipped(PageError),
    /// Extracted content is missing or unusable; pages render without overlay.
    ExtractionUnavailable(String),
}

/// Sending half held by a viewer.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<ViewEvent>>,
}

impl EventSink {
    /// A sink that discards everything.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(tx: UnboundedSender<ViewEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Create a connected sink/receiver pair.
    pub fn channel() -> (Self, UnboundedReceiver<ViewEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: ViewEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_sink_discards() {
        EventSink::none().emit(ViewEvent::ZoomChanged(1.1));
    }

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(ViewEvent::PhaseChanged(ViewPhase::Loading));
        sink.emit(ViewEvent::PhaseChanged(ViewPhase::Ready));
        assert_eq!(rx.recv().await, Some(ViewEvent::PhaseChanged(ViewPhase::Loading)));
        assert_eq!(rx.recv().await, Some(ViewEvent::PhaseChanged(ViewPhase::Ready)));
    }

    #[test]
    fn closed_receiver_is_harmless() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(ViewEvent::PagePainted { page: 0 });
    }
}
