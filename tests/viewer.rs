//! Integration tests for viewing sessions over in-memory collaborators.
//!
//! No network or libpdfium is needed: storage, fetching and decoding are the
//! stand-ins from `common`.

mod common;

use common::*;
use flipfolio::pipeline::overlay::OverlayContent;
use flipfolio::viewer::ReflowBlock;
use flipfolio::{
    scroll_pages, EventSink, ExtractionStatus, FolioError, PageError, Rect, ResourceCache, Size,
    ViewEvent, ViewMode, ViewPhase, ViewerConfig,
};
use futures::StreamExt;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

// ── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_load_reaches_ready() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let decoder = StubDecoder::uniform(5, letter());
    let mut viewer = viewer(&storage, decoder.clone());

    assert_eq!(viewer.phase(), &ViewPhase::Loading);
    assert_ok!(viewer.load().await);
    assert_eq!(viewer.phase(), &ViewPhase::Ready);
    assert_eq!(viewer.num_pages(), 5);
    assert_eq!(viewer.current(), 0);
    assert_eq!(viewer.native_page_size(4), Some(letter()));
    assert_eq!(decoder.probes(), 1);
}

#[tokio::test]
async fn test_missing_document_is_error_and_retry_recovers() {
    let storage = MemoryStorage::new();
    let mut viewer = viewer(&storage, StubDecoder::uniform(2, letter()));

    let err = assert_err!(viewer.load().await);
    assert!(err.is_not_found(), "got: {err}");
    assert!(matches!(viewer.phase(), ViewPhase::Error(_)));
    assert!(viewer.layout_flipbook().is_err());

    storage.insert(DOC, pdf_bytes());
    assert_ok!(viewer.load().await);
    assert_eq!(viewer.phase(), &ViewPhase::Ready);
}

#[tokio::test]
async fn test_non_pdf_bytes_are_rejected() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, b"<html>Access denied</html>".to_vec());
    let decoder = StubDecoder::uniform(1, letter());
    let mut viewer = viewer(&storage, decoder.clone());

    let err = assert_err!(viewer.load().await);
    assert!(matches!(err, FolioError::NotAPdf { .. }));
    assert!(matches!(viewer.phase(), ViewPhase::Error(_)));
    assert_eq!(decoder.probes(), 0);
}

#[tokio::test]
async fn test_corrupt_pdf_is_decode_failure() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, b"%PDF-1.4 CORRUPT".to_vec());
    let mut viewer = viewer(&storage, StubDecoder::uniform(1, letter()));

    let err = assert_err!(viewer.load().await);
    assert!(matches!(err, FolioError::DecodeFailed { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_dispose_during_load_discards_result() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    *storage.fetch_delay.lock().unwrap() = Some(Duration::from_millis(100));
    let mut viewer = viewer(&storage, StubDecoder::uniform(3, letter()));

    let token = viewer.dispose_token();
    let disposer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.dispose();
    });

    let err = assert_err!(viewer.load().await);
    assert!(matches!(err, FolioError::Disposed));
    assert_eq!(viewer.phase(), &ViewPhase::Disposed);
    assert!(viewer.document_bytes().is_none());
    disposer.await.unwrap();

    // A disposed view stays disposed.
    assert!(matches!(viewer.load().await, Err(FolioError::Disposed)));
}

#[tokio::test]
async fn test_dispose_releases_handle_but_not_cache() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let cache = ResourceCache::new();
    let mut viewer = viewer_with(
        &storage,
        StubDecoder::uniform(2, letter()),
        ViewerConfig::default(),
        cache.clone(),
    );
    viewer.load().await.unwrap();
    assert!(viewer.document_bytes().is_some());

    viewer.dispose();
    assert_eq!(viewer.phase(), &ViewPhase::Disposed);
    assert!(viewer.document_bytes().is_none());
    assert!(matches!(viewer.paint_scroll().await, Err(FolioError::Disposed)));
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_phase_events() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let (sink, mut rx) = EventSink::channel();
    let mut viewer = viewer(&storage, StubDecoder::uniform(2, letter())).with_events(sink);

    viewer.load().await.unwrap();
    viewer.next_page();
    viewer.dispose();
    drop(viewer);

    let mut events = Vec::new();
    while let Some(e) = rx.recv().await {
        events.push(e);
    }
    assert_eq!(
        events,
        vec![
            ViewEvent::PhaseChanged(ViewPhase::Loading),
            ViewEvent::PhaseChanged(ViewPhase::Ready),
            ViewEvent::PageChanged { current: 0, num_pages: 2 },
            ViewEvent::PageChanged { current: 1, num_pages: 2 },
            ViewEvent::PhaseChanged(ViewPhase::Disposed),
        ]
    );
}

// ── Cache ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_same_url_fetched_once_across_views() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let cache = ResourceCache::new();

    let mut first = viewer_with(
        &storage,
        StubDecoder::uniform(1, letter()),
        ViewerConfig::default(),
        cache.clone(),
    );
    let mut second = viewer_with(
        &storage,
        StubDecoder::uniform(1, letter()),
        ViewerConfig::default(),
        cache.clone(),
    );
    first.load().await.unwrap();
    second.load().await.unwrap();

    assert_eq!(storage.fetches(), 1);
    assert_eq!(
        first.document_bytes().unwrap().bytes(),
        second.document_bytes().unwrap().bytes()
    );
}

#[tokio::test]
async fn test_rotated_urls_are_separate_entries() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    storage.rotate.store(true, Ordering::SeqCst);
    let cache = ResourceCache::new();

    for _ in 0..2 {
        let mut v = viewer_with(
            &storage,
            StubDecoder::uniform(1, letter()),
            ViewerConfig::default(),
            cache.clone(),
        );
        v.load().await.unwrap();
    }

    assert_eq!(storage.fetches_of(DOC), 2);
    assert_eq!(storage.max_fetches_per_url(), 1);
    assert_eq!(cache.len().await, 2);
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    storage.fail_fetches.store(true, Ordering::SeqCst);
    let cache = ResourceCache::new();
    let mut viewer = viewer_with(
        &storage,
        StubDecoder::uniform(1, letter()),
        ViewerConfig::default(),
        cache.clone(),
    );

    let err = assert_err!(viewer.load().await);
    assert!(err.is_retryable());
    assert!(cache.is_empty().await);

    storage.fail_fetches.store(false, Ordering::SeqCst);
    assert_ok!(viewer.load().await);
    assert_eq!(storage.fetches(), 2);
    assert_eq!(cache.len().await, 1);
}

// ── Navigation and zoom ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_host_surface_clamps() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let mut viewer = viewer(&storage, StubDecoder::uniform(4, letter()));
    viewer.load().await.unwrap();

    assert_eq!(viewer.set_current(99), 3);
    assert!(!viewer.next_page());
    assert!(viewer.previous_page());
    assert_eq!(viewer.current(), 2);

    viewer.set_num_pages(2);
    assert_eq!(viewer.current(), 1);

    assert_eq!(viewer.set_zoom_level(10.0), 3.0);
    assert_eq!(viewer.set_zoom_level(0.1), 0.5);
    assert_eq!(viewer.set_zoom_level(1.25), 1.25);
}

#[tokio::test]
async fn test_zoom_steps_converge_on_bounds() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let mut viewer = viewer(&storage, StubDecoder::uniform(1, letter()));
    viewer.load().await.unwrap();

    let mut last = viewer.zoom_level();
    for _ in 0..50 {
        let z = viewer.zoom_in();
        assert!(z <= 3.0 && z >= last);
        last = z;
    }
    assert_eq!(viewer.zoom_level(), 3.0);

    viewer.set_zoom_level(1.0);
    for _ in 0..50 {
        assert!(viewer.zoom_out() >= 0.5);
    }
    assert_eq!(viewer.zoom_level(), 0.5);
    assert_eq!(storage.fetches(), 1);
}

#[tokio::test]
async fn test_unchecked_config_does_not_panic() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let config = ViewerConfig {
        zoom_bounds: flipfolio::ZoomBounds { min: 3.0, max: 0.5 },
        render_window: usize::MAX,
        ..ViewerConfig::default()
    };
    let mut viewer = viewer_with(
        &storage,
        StubDecoder::uniform(4, letter()),
        config,
        ResourceCache::new(),
    );
    viewer.load().await.unwrap();

    assert_eq!(viewer.zoom_level(), 1.0);
    assert_eq!(viewer.set_zoom_level(10.0), 3.0);
    let slots = viewer.layout_flipbook().unwrap();
    assert_eq!(slots.len(), 4);
    assert!(slots.iter().all(|s| s.rendered));
}

// ── Flip view ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_flipbook_window_is_bounded() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let decoder = StubDecoder::uniform(12, letter());
    let mut viewer = viewer(&storage, decoder.clone());
    viewer.load().await.unwrap();

    for current in 0..12 {
        viewer.set_current(current);
        let slots = viewer.layout_flipbook().unwrap();
        assert_eq!(slots.len(), 12);
        let rendered: Vec<usize> = slots.iter().filter(|s| s.rendered).map(|s| s.index).collect();
        assert!(rendered.len() <= 3);
        assert!(rendered.iter().all(|i| i.abs_diff(current) <= 1));

        let painted = viewer.paint_flipbook().await.unwrap();
        let painted: Vec<usize> = painted.iter().map(|p| p.index).collect();
        assert_eq!(painted, rendered);
    }
    assert!(decoder.requested().iter().all(|call| call.len() <= 3));
}

#[tokio::test]
async fn test_flipbook_slots_reserve_size() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let decoder = StubDecoder::new(vec![letter(), Size::new(800.0, 600.0), letter()]);
    let config = ViewerConfig::builder().viewport_width(1000.0).build().unwrap();
    let mut viewer = viewer_with(&storage, decoder, config, ResourceCache::new());
    viewer.load().await.unwrap();

    // 48 % of 1000 = 480 wide per leaf.
    let slots = viewer.layout_flipbook().unwrap();
    assert_eq!(slots[0].size, Size::new(480.0, 640.0));
    assert_eq!(slots[1].size, Size::new(480.0, 360.0));
    assert!(!slots[2].rendered);
    assert_eq!(slots[2].size, slots[0].size);

    viewer.set_zoom_level(2.0);
    assert_eq!(viewer.layout_flipbook().unwrap()[0].size, Size::new(960.0, 1280.0));
}

#[tokio::test]
async fn test_flipbook_has_no_overlay() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    storage.insert(EXTRACTED, extracted_json(vec![page_json(false)]));
    let mut viewer = viewer(&storage, StubDecoder::uniform(1, letter()));
    viewer.load().await.unwrap();
    viewer.load_extraction().await.unwrap();

    let pages = viewer.paint_flipbook().await.unwrap();
    assert!(pages[0].is_ok());
    assert!(pages[0].overlay.is_none());
}

// ── Scroll view ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scroll_without_extraction_paints_bare_pages() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let (sink, mut rx) = EventSink::channel();
    let mut viewer = viewer(&storage, StubDecoder::uniform(3, letter())).with_events(sink);
    viewer.load().await.unwrap();

    let status = viewer.load_extraction().await.unwrap();
    assert!(matches!(status, ExtractionStatus::NotFound));

    let pages = viewer.paint_scroll().await.unwrap();
    assert_eq!(pages.len(), 3);
    assert!(pages.iter().all(|p| p.is_ok() && p.overlay.is_none()));
    assert_eq!(viewer.phase(), &ViewPhase::Ready);

    let err = assert_err!(viewer.set_mode(ViewMode::Dynamic));
    assert!(matches!(err, FolioError::ModeUnavailable { .. }));
    assert_eq!(viewer.available_modes(), vec![ViewMode::Flipbook, ViewMode::Scroll]);

    drop(viewer);
    let mut saw_notice = false;
    while let Some(e) = rx.recv().await {
        saw_notice |= matches!(e, ViewEvent::ExtractionUnavailable(_));
    }
    assert!(saw_notice);
}

#[tokio::test]
async fn test_single_bad_element_is_skipped() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    storage.insert(
        EXTRACTED,
        extracted_json(vec![page_json(false), page_json(true)]),
    );
    let (sink, mut rx) = EventSink::channel();
    let mut viewer = viewer(&storage, StubDecoder::uniform(2, letter())).with_events(sink);
    viewer.load().await.unwrap();
    viewer.load_extraction().await.unwrap();

    let pages = viewer.paint_scroll().await.unwrap();
    assert!(pages.iter().all(|p| p.is_ok()));

    let first = pages[0].overlay.as_ref().unwrap();
    assert_eq!(first.items.len(), 4);
    assert!(first.skipped.is_empty());

    let second = pages[1].overlay.as_ref().unwrap();
    let kept: Vec<usize> = second.items.iter().map(|i| i.element).collect();
    assert_eq!(kept, vec![0, 1, 3]);
    assert_eq!(
        second.skipped.iter().map(PageError::page).collect::<Vec<_>>(),
        vec![2]
    );
    assert!(matches!(
        second.skipped[0],
        PageError::ElementRenderFailed { element: 2, .. }
    ));

    drop(viewer);
    let mut skipped = 0;
    while let Some(e) = rx.recv().await {
        if matches!(e, ViewEvent::ElementSkipped(_)) {
            skipped += 1;
        }
    }
    assert_eq!(skipped, 1);
}

#[tokio::test]
async fn test_overlay_positions_follow_displayed_width() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    storage.insert(EXTRACTED, extracted_json(vec![page_json(false)]));
    // 80 % of 375 = 300 displayed units for a 600-point page.
    let config = ViewerConfig::builder().viewport_width(375.0).build().unwrap();
    let mut viewer = viewer_with(
        &storage,
        StubDecoder::uniform(1, letter()),
        config,
        ResourceCache::new(),
    );
    viewer.load().await.unwrap();
    viewer.load_extraction().await.unwrap();

    let page = viewer.paint_scroll_page(0).await.unwrap();
    assert_eq!(page.size, Size::new(300.0, 400.0));
    let heading = &page.overlay.as_ref().unwrap().items[0];
    assert_eq!(heading.rect, Rect::new(50.0, 25.0, 100.0, 15.0));
    assert_eq!(heading.style.font_size, 14.0);
    assert_eq!(heading.style.font_weight, 600);
    assert_eq!(heading.style.font_family, "Georgia");

    let paragraph = &page.overlay.as_ref().unwrap().items[1];
    assert_eq!(paragraph.style.color, "#333333");
    // Theme base font size 18, halved.
    assert_eq!(paragraph.style.font_size, 9.0);

    match &page.overlay.as_ref().unwrap().items[2].content {
        OverlayContent::Image { width_px, alt, .. } => {
            assert_eq!(*width_px, 3);
            assert_eq!(alt.as_deref(), Some("Chart"));
        }
        other => panic!("expected image, got {other:?}"),
    }

    // Zoom rescales the overlay without refetching.
    viewer.set_zoom_level(2.0);
    let zoomed = viewer.paint_scroll_page(0).await.unwrap();
    assert_eq!(
        zoomed.overlay.as_ref().unwrap().items[0].rect,
        Rect::new(100.0, 50.0, 200.0, 30.0)
    );
    assert_eq!(storage.fetches_of(DOC), 1);
}

#[tokio::test]
async fn test_page_render_failure_is_isolated() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let decoder = StubDecoder::with_failing(vec![letter(); 3], [1]);
    let mut viewer = viewer(&storage, decoder);
    viewer.load().await.unwrap();

    let pages = viewer.paint_scroll().await.unwrap();
    assert!(pages[0].is_ok());
    assert!(!pages[1].is_ok());
    assert_eq!(pages[1].error.as_ref().map(PageError::page), Some(2));
    assert!(pages[2].is_ok());
    assert_eq!(viewer.phase(), &ViewPhase::Ready);
}

#[tokio::test]
async fn test_invalid_extraction_degrades_to_bare_pages() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let mut broken: serde_json::Value =
        serde_json::from_slice(&extracted_json(vec![page_json(false)])).unwrap();
    broken["metadata"]["pageCount"] = 4.into();
    storage.insert(EXTRACTED, serde_json::to_vec(&broken).unwrap());

    let mut viewer = viewer(&storage, StubDecoder::uniform(1, letter()));
    viewer.load().await.unwrap();
    let status = viewer.load_extraction().await.unwrap();
    assert!(matches!(status, ExtractionStatus::Failed { .. }));

    let pages = viewer.paint_scroll().await.unwrap();
    assert!(pages[0].is_ok());
    assert!(pages[0].overlay.is_none());
}

#[tokio::test]
async fn test_scroll_stream_yields_pages_in_order() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let mut viewer = viewer(&storage, StubDecoder::uniform(4, letter()));

    assert!(scroll_pages(&viewer).is_err());
    viewer.load().await.unwrap();

    let indices: Vec<usize> = scroll_pages(&viewer)
        .unwrap()
        .map(|p| p.unwrap().index)
        .collect()
        .await;
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_painted_page_encodes_png() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    let mut viewer = viewer(&storage, StubDecoder::uniform(1, letter()));
    viewer.load().await.unwrap();

    let page = viewer.paint_scroll_page(0).await.unwrap();
    let png = page.to_png().unwrap().unwrap();
    assert_eq!(&png[1..4], b"PNG");
    assert!(matches!(
        viewer.paint_scroll_page(1).await,
        Err(FolioError::PageOutOfRange { page: 2, total: 1 })
    ));
}

// ── Dynamic view ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dynamic_reflow_uses_theme() {
    let storage = MemoryStorage::new();
    storage.insert(DOC, pdf_bytes());
    storage.insert(
        EXTRACTED,
        extracted_json(vec![page_json(false), page_json(false)]),
    );
    let mut viewer = viewer(&storage, StubDecoder::uniform(2, letter()));
    viewer.load().await.unwrap();
    viewer.load_extraction().await.unwrap();

    assert_ok!(viewer.set_mode(ViewMode::Dynamic));
    assert_eq!(viewer.mode(), ViewMode::Dynamic);

    let doc = viewer.reflow().unwrap();
    assert_eq!(doc.blocks.len(), 8);
    assert_eq!(doc.layout.columns, 1);
    assert!(doc.layout.centered);

    match &doc.blocks[0] {
        ReflowBlock::Heading { page, text, style } => {
            assert_eq!(*page, 0);
            assert_eq!(text, "Annual Report");
            assert_eq!(style.font_weight, 600);
            assert_eq!(style.font_size, 27.0);
            assert_eq!(style.color, "#1a1a2e");
            assert_eq!(style.font_family, "Georgia");
        }
        other => panic!("expected heading, got {other:?}"),
    }
    assert!(matches!(
        &doc.blocks[7],
        ReflowBlock::List { page: 1, ordered: true, .. }
    ));
}
