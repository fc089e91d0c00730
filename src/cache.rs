//! Signed-resource cache: logical path → signed URL → bytes, fetched once.
//!
//! ## Keying
//!
//! Entries are keyed by the exact signed URL string. Two signings of the same
//! logical path yield two independent entries, so bytes are never served
//! under a URL that has since rotated. The cost is one extra fetch per
//! rotation, at most once per expiry window.
//!
//! ## Lifecycle
//!
//! Entries are created on the first successful fetch and never evicted or
//! invalidated. Failed fetches are not stored. Concurrent first fetches of
//! the same URL are collapsed into one network request: every caller waits on
//! the same per-URL cell.
//!
//! Callers receive a [`ResourceHandle`], a cheap shared reference to the
//! immutable bytes. The cache keeps its own reference; dropping a handle
//! releases only the caller's.

use crate::error::FolioError;
use crate::pipeline::input::Fetcher;
use crate::storage::StorageClient;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

type Entry = Arc<OnceCell<Arc<[u8]>>>;

static SHARED: Lazy<ResourceCache> = Lazy::new(ResourceCache::new);

/// A caller's reference to cached bytes.
#[derive(Clone)]
pub struct ResourceHandle {
    url: Arc<str>,
    bytes: Arc<[u8]>,
}

impl ResourceHandle {
    /// Signed URL these bytes were fetched from.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared reference to the bytes, for handing to blocking decoders.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("url", &self.url)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Append-only map from signed URL to fetched bytes.
///
/// Cloning is cheap and clones share storage.
#[derive(Clone, Default)]
pub struct ResourceCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache shared by every viewing session.
    pub fn shared() -> Self {
        SHARED.clone()
    }

    /// Cached bytes for `url`, without fetching.
    pub async fn get(&self, url: &str) -> Option<ResourceHandle> {
        let entries = self.entries.read().await;
        let bytes = entries.get(url)?.get()?;
        Some(handle(url, bytes))
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.get(url).await.is_some()
    }

    /// Number of successfully fetched entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Return cached bytes for `url`, fetching and storing them on a miss.
    pub async fn get_or_fetch(
        &self,
        url: &str,
        fetcher: &dyn Fetcher,
    ) -> Result<ResourceHandle, FolioError> {
        if let Some(hit) = self.get(url).await {
            debug!("Cache hit for {}", url);
            return Ok(hit);
        }

        let cell = {
            let mut entries = self.entries.write().await;
            Arc::clone(entries.entry(url.to_string()).or_default())
        };

        let result = cell
            .get_or_try_init(|| async {
                debug!("Cache miss for {}", url);
                let fetched = fetcher.fetch(url).await?;
                Ok::<_, FolioError>(Arc::<[u8]>::from(fetched))
            })
            .await;

        match result {
            Ok(bytes) => Ok(handle(url, bytes)),
            Err(e) => {
                self.forget_failed(url, &cell).await;
                Err(e)
            }
        }
    }

    /// Drop the empty cell a failed fetch left behind, unless another caller
    /// is still waiting on it.
    async fn forget_failed(&self, url: &str, cell: &Entry) {
        let mut entries = self.entries.write().await;
        let unused = entries.get(url).is_some_and(|current| {
            Arc::ptr_eq(current, cell) && !current.initialized() && Arc::strong_count(cell) == 2
        });
        if unused {
            entries.remove(url);
        }
    }
}

fn handle(url: &str, bytes: &Arc<[u8]>) -> ResourceHandle {
    ResourceHandle {
        url: Arc::from(url),
        bytes: Arc::clone(bytes),
    }
}

/// Resolves logical storage paths to bytes through the cache.
#[derive(Clone)]
pub struct SignedResourceCache {
    storage: Arc<dyn StorageClient>,
    fetcher: Arc<dyn Fetcher>,
    cache: ResourceCache,
    expires_in: Duration,
}

impl SignedResourceCache {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        fetcher: Arc<dyn Fetcher>,
        cache: ResourceCache,
        expires_in: Duration,
    ) -> Self {
        Self {
            storage,
            fetcher,
            cache,
            expires_in,
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageClient> {
        &self.storage
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// Sign `logical_path`, then serve the signed URL from cache or network.
    pub async fn resolve(&self, logical_path: &str) -> Result<ResourceHandle, FolioError> {
        let signed = self.storage.sign_url(logical_path, self.expires_in).await?;
        self.cache
            .get_or_fetch(&signed.url, self.fetcher.as_ref())
            .await
    }
}

impl fmt::Debug for SignedResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedResourceCache")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    impl Fetcher for CountingFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FolioError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                if self.fail.load(Ordering::SeqCst) {
                    return Err(FolioError::FetchFailed {
                        url: url.to_string(),
                        status: Some(500),
                        reason: "HTTP 500".into(),
                    });
                }
                Ok(format!("%PDF bytes of {url}").into_bytes())
            })
        }
    }

    #[tokio::test]
    async fn second_lookup_is_a_hit() {
        let cache = ResourceCache::new();
        let fetcher = CountingFetcher::new();
        let a = cache.get_or_fetch("https://b/x?e=1", &fetcher).await.unwrap();
        let b = cache.get_or_fetch("https://b/x?e=1", &fetcher).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.bytes(), b.bytes());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = ResourceCache::new();
        let fetcher = CountingFetcher::new();
        fetcher.fail.store(true, Ordering::SeqCst);
        let err = cache.get_or_fetch("https://b/y", &fetcher).await.unwrap_err();
        assert!(matches!(err, FolioError::FetchFailed { status: Some(500), .. }));
        assert!(!cache.contains("https://b/y").await);
        assert_eq!(cache.len().await, 0);
        assert!(cache.entries.read().await.is_empty());

        fetcher.fail.store(false, Ordering::SeqCst);
        assert!(cache.get_or_fetch("https://b/y", &fetcher).await.is_ok());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_failures_leave_no_entries() {
        let cache = ResourceCache::new();
        let fetcher = CountingFetcher::new();
        fetcher.fail.store(true, Ordering::SeqCst);
        for i in 0..20 {
            let url = format!("https://b/gone?sig={i}");
            assert!(cache.get_or_fetch(&url, &fetcher).await.is_err());
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 20);
        assert!(cache.entries.read().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_first_fetches_are_collapsed() {
        let cache = ResourceCache::new();
        let fetcher = Arc::new(CountingFetcher::new());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let fetcher = Arc::clone(&fetcher);
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("https://b/z", fetcher.as_ref())
                    .await
                    .map(|h| h.len())
            }));
        }
        for t in tasks {
            assert!(t.await.unwrap().is_ok());
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let cache = ResourceCache::new();
        let other = cache.clone();
        let fetcher = CountingFetcher::new();
        cache.get_or_fetch("https://b/w", &fetcher).await.unwrap();
        assert!(other.contains("https://b/w").await);
    }

    #[test]
    fn handle_debug_hides_bytes() {
        let h = handle("https://b/v", &Arc::from(vec![1u8, 2, 3]));
        let dbg = format!("{h:?}");
        assert!(dbg.contains("len: 3"), "got: {dbg}");
    }
}
