//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use flipfolio::error::{FolioError, PageError};
use flipfolio::pipeline::decode::{DocumentGeometry, RasterisedPage};
use flipfolio::storage::ProgressFn;
use flipfolio::{
    encode, DocumentDecoder, DocumentViewer, Fetcher, ResourceCache, SignedResourceCache,
    SignedUrl, Size, StorageClient, TransferProgress, ViewerConfig,
};
use futures::future::{self, BoxFuture, FutureExt};
use image::{DynamicImage, Rgba, RgbaImage};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

pub const BUCKET: &str = "mem://bucket/";
pub const DOC: &str = "public/annual-report-k3x9q2.pdf";
pub const EXTRACTED: &str = "public/annual-report-k3x9q2.pdf.extracted.json";

/// Bucket + signer + fetcher backed by a HashMap.
///
/// Signed URLs are `mem://bucket/<path>?sig=<n>`; `n` stays 0 unless
/// rotation is on, in which case every signing yields a new URL.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fetch_counts: Mutex<HashMap<String, usize>>,
    signings: AtomicUsize,
    puts: AtomicUsize,
    pub rotate: AtomicBool,
    pub fail_fetches: AtomicBool,
    pub fail_puts: AtomicBool,
    pub fetch_delay: Mutex<Option<Duration>>,
    pub put_delay: Mutex<Option<Duration>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.into());
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    /// Total network fetches issued, across all URLs.
    pub fn fetches(&self) -> usize {
        self.fetch_counts.lock().unwrap().values().sum()
    }

    /// Fetches of URLs for `path`, across all signings.
    pub fn fetches_of(&self, path: &str) -> usize {
        let prefix = format!("{BUCKET}{path}?");
        self.fetch_counts
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url.starts_with(&prefix))
            .map(|(_, n)| n)
            .sum()
    }

    pub fn max_fetches_per_url(&self) -> usize {
        self.fetch_counts
            .lock()
            .unwrap()
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn path_of(url: &str) -> &str {
        let rest = url.strip_prefix(BUCKET).unwrap_or(url);
        rest.split('?').next().unwrap_or(rest)
    }
}

impl StorageClient for MemoryStorage {
    fn sign_url<'a>(
        &'a self,
        path: &'a str,
        expires_in: Duration,
    ) -> BoxFuture<'a, Result<SignedUrl, FolioError>> {
        let sig = if self.rotate.load(Ordering::SeqCst) {
            self.signings.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            0
        };
        future::ready(Ok(SignedUrl {
            url: format!("{BUCKET}{path}?sig={sig}"),
            expires_at: SystemTime::now() + expires_in,
        }))
        .boxed()
    }

    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Vec<u8>,
        _content_type: &'a str,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'a, Result<String, FolioError>> {
        async move {
            self.puts.fetch_add(1, Ordering::SeqCst);
            let total = data.len() as u64;
            if let Some(report) = &progress {
                report(TransferProgress {
                    transferred_bytes: total / 2,
                    total_bytes: Some(total),
                });
            }
            let delay = *self.put_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(FolioError::UploadFailed {
                    path: path.to_string(),
                    reason: "HTTP 507".into(),
                });
            }
            if let Some(report) = &progress {
                report(TransferProgress {
                    transferred_bytes: total,
                    total_bytes: Some(total),
                });
            }
            self.insert(path, data);
            Ok(path.to_string())
        }
        .boxed()
    }
}

impl Fetcher for MemoryStorage {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FolioError>> {
        async move {
            *self
                .fetch_counts
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default() += 1;

            let delay = *self.fetch_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_fetches.load(Ordering::SeqCst) {
                return Err(FolioError::FetchFailed {
                    url: url.to_string(),
                    status: Some(503),
                    reason: "HTTP 503 Service Unavailable".into(),
                });
            }
            self.object(Self::path_of(url))
                .ok_or_else(|| FolioError::FetchFailed {
                    url: url.to_string(),
                    status: Some(404),
                    reason: "HTTP 404 Not Found".into(),
                })
        }
        .boxed()
    }
}

/// Decoder that knows page sizes up front and paints solid images.
pub struct StubDecoder {
    pages: Vec<Size>,
    failing: HashSet<usize>,
    probes: AtomicUsize,
    requested: Mutex<Vec<Vec<usize>>>,
}

impl StubDecoder {
    pub fn new(pages: Vec<Size>) -> Arc<Self> {
        Self::with_failing(pages, [])
    }

    pub fn uniform(n: usize, size: Size) -> Arc<Self> {
        Self::new(vec![size; n])
    }

    pub fn with_failing(pages: Vec<Size>, failing: impl IntoIterator<Item = usize>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            failing: failing.into_iter().collect(),
            probes: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        })
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Page indices of every rasterise call, in call order.
    pub fn requested(&self) -> Vec<Vec<usize>> {
        self.requested.lock().unwrap().clone()
    }
}

impl DocumentDecoder for StubDecoder {
    fn probe(&self, bytes: Arc<[u8]>) -> BoxFuture<'static, Result<DocumentGeometry, FolioError>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let result = if bytes.windows(7).any(|w| w == b"CORRUPT") {
            Err(FolioError::DecodeFailed {
                detail: "xref table is damaged".into(),
            })
        } else {
            Ok(DocumentGeometry {
                page_sizes: self.pages.clone(),
            })
        };
        future::ready(result).boxed()
    }

    fn rasterise(
        &self,
        _bytes: Arc<[u8]>,
        pages: Vec<usize>,
        target_width: u32,
    ) -> BoxFuture<'static, Result<Vec<RasterisedPage>, FolioError>> {
        self.requested.lock().unwrap().push(pages.clone());
        let out = pages
            .into_iter()
            .filter(|idx| *idx < self.pages.len())
            .map(|idx| {
                if self.failing.contains(&idx) {
                    return (
                        idx,
                        Err(PageError::RenderFailed {
                            page: idx + 1,
                            detail: "bitmap allocation failed".into(),
                        }),
                    );
                }
                let height = (target_width as f64 * self.pages[idx].aspect()).round() as u32;
                (idx, Ok(DynamicImage::new_rgba8(target_width, height.max(1))))
            })
            .collect();
        future::ready(Ok(out)).boxed()
    }
}

pub fn letter() -> Size {
    Size::new(600.0, 800.0)
}

pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.7\n% test document\n%%EOF\n".to_vec()
}

pub fn png_data_uri() -> String {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([20, 40, 60, 255])));
    encode::to_data_uri(&img).unwrap()
}

/// Page JSON with heading, paragraph, image and list elements (indices 0..=3).
///
/// With `bad_image` the image element carries undecodable data.
pub fn page_json(bad_image: bool) -> Value {
    let image = if bad_image {
        "data:image/png;base64,not-really-an-image".to_string()
    } else {
        png_data_uri()
    };
    json!({
        "width": 600.0,
        "height": 800.0,
        "elements": [
            {
                "type": "heading",
                "content": "Annual Report",
                "position": { "x": 100.0, "y": 50.0, "width": 200.0, "height": 30.0 },
                "style": { "fontSize": 28 }
            },
            {
                "type": "paragraph",
                "content": "Revenue grew in every region.",
                "position": { "x": 60.0, "y": 120.0, "width": 480.0, "height": 90.0 },
                "style": { "color": "#333333", "textAlign": "center" }
            },
            {
                "type": "image",
                "content": image,
                "alt": "Chart",
                "position": { "x": 60.0, "y": 240.0, "width": 240.0, "height": 160.0 }
            },
            {
                "type": "list",
                "listType": "ordered",
                "items": ["North", "South"],
                "position": { "x": 60.0, "y": 420.0, "width": 300.0, "height": 60.0 }
            }
        ],
        "layout": {
            "columns": 1,
            "hasHeader": false,
            "hasFooter": false,
            "margins": { "top": 40.0, "bottom": 40.0, "left": 60.0, "right": 60.0 }
        }
    })
}

pub fn extracted_json(pages: Vec<Value>) -> Vec<u8> {
    let count = pages.len();
    serde_json::to_vec(&json!({
        "pages": pages,
        "theme": {
            "colors": ["#1a1a2e", "#e94560"],
            "fonts": ["Georgia"],
            "layout": "article",
            "scale": { "baseFontSize": 18 }
        },
        "metadata": { "pageCount": count, "createdAt": "2024-05-01T10:00:00Z" }
    }))
    .unwrap()
}

/// A wired-up viewer over `storage` with its own cache.
pub fn viewer_with(
    storage: &Arc<MemoryStorage>,
    decoder: Arc<StubDecoder>,
    config: ViewerConfig,
    cache: ResourceCache,
) -> DocumentViewer {
    let resources = Arc::new(SignedResourceCache::new(
        storage.clone(),
        storage.clone(),
        cache,
        config.signed_url_expires_in(),
    ));
    DocumentViewer::new(config, resources, decoder, DOC)
}

pub fn viewer(storage: &Arc<MemoryStorage>, decoder: Arc<StubDecoder>) -> DocumentViewer {
    viewer_with(storage, decoder, ViewerConfig::default(), ResourceCache::new())
}
