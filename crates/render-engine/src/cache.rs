//! Rasterized overlay cache.
//!
//! The cache is rebuilt wholesale: a complete replacement list is rendered
//! off to the side and then swapped in as a single `Arc`. Readers either
//! see the previous list or the new one, never a partially filled one.
//! Swapping and snapshotting only move `Arc` pointers; pixel data is never
//! copied after rendering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use overlaycast_overlay_model::{Overlay, OverlayStore};

use crate::bitmap::Bitmap;
use crate::renderer::OverlayRenderer;

/// One rendered overlay.
#[derive(Debug, Clone)]
pub struct CachedBitmap {
    pub id: String,
    pub bitmap: Arc<Bitmap>,
}

/// Rendered overlays in store order (later entries draw on top).
pub type CacheEntries = Vec<CachedBitmap>;

/// Render every definition in `snapshot`.
///
/// Overlays that fail to render are logged and left out; they do not
/// affect the rest of the batch.
pub fn build_cache(snapshot: &[Overlay], renderer: &OverlayRenderer) -> CacheEntries {
    snapshot
        .iter()
        .filter_map(|overlay| match renderer.render(overlay) {
            Ok(bitmap) => Some(CachedBitmap {
                id: overlay.id().to_string(),
                bitmap: Arc::new(bitmap),
            }),
            Err(e) => {
                tracing::warn!(
                    overlay_id = %overlay.id(),
                    kind = %overlay.kind(),
                    error = %e,
                    "Failed to render overlay; omitting it from this cache build"
                );
                None
            }
        })
        .collect()
}

/// Live, atomically swapped set of rendered overlays.
#[derive(Debug, Default)]
pub struct OverlayCache {
    current: RwLock<Arc<CacheEntries>>,
    refresh_requested: AtomicBool,
}

impl OverlayCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current entries. Holding the returned `Arc` keeps that version
    /// alive even if a rebuild swaps in a newer one.
    pub fn snapshot(&self) -> Arc<CacheEntries> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Publish a fully built replacement.
    pub fn swap(&self, entries: CacheEntries) {
        let entries = Arc::new(entries);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = entries;
    }

    /// Snapshot `store`, render without holding any lock, and swap.
    ///
    /// Returns the number of overlays in the new cache.
    pub fn rebuild(&self, store: &OverlayStore, renderer: &OverlayRenderer) -> usize {
        let definitions = store.snapshot();
        let entries = build_cache(&definitions, renderer);
        let built = entries.len();
        tracing::debug!(
            overlays = definitions.len(),
            rendered = built,
            "Overlay cache rebuilt"
        );
        self.swap(entries);
        built
    }

    /// Drop the entry for `id`, if present. Returns whether one was removed.
    pub fn evict(&self, id: &str) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if !current.iter().any(|entry| entry.id == id) {
            return false;
        }
        let remaining: CacheEntries = current
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        *current = Arc::new(remaining);
        true
    }

    /// Ask the frame loop to rebuild on its next iteration.
    pub fn request_refresh(&self) {
        self.refresh_requested.store(true, Ordering::SeqCst);
    }

    /// Consume a pending refresh request.
    pub fn take_refresh_request(&self) -> bool {
        self.refresh_requested.swap(false, Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlaycast_overlay_model::OverlaySpec;

    fn ids(entries: &[CachedBitmap]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_build_cache_omits_failed_overlays() {
        let store = OverlayStore::new();
        let a = store.create(&OverlaySpec::text("A", None)).unwrap();
        store
            .create(&OverlaySpec::image("/nonexistent/broken.png", None))
            .unwrap();
        let c = store.create(&OverlaySpec::text("C", Some("top"))).unwrap();

        let entries = build_cache(&store.snapshot(), &OverlayRenderer::with_builtin_font());
        assert_eq!(ids(&entries), vec![a.id(), c.id()]);
    }

    #[test]
    fn test_rebuild_replaces_wholesale() {
        let store = OverlayStore::new();
        let renderer = OverlayRenderer::with_builtin_font();
        let cache = OverlayCache::new();
        let a = store.create(&OverlaySpec::text("A", None)).unwrap();
        assert_eq!(cache.rebuild(&store, &renderer), 1);

        store.delete(a.id()).unwrap();
        let b = store.create(&OverlaySpec::text("B", None)).unwrap();
        assert_eq!(cache.rebuild(&store, &renderer), 1);
        assert_eq!(ids(&cache.snapshot()), vec![b.id()]);
    }

    #[test]
    fn test_rebuild_of_empty_store_is_empty() {
        let store = OverlayStore::new();
        let cache = OverlayCache::new();
        assert_eq!(cache.rebuild(&store, &OverlayRenderer::with_builtin_font()), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_old_snapshot_survives_swap() {
        let store = OverlayStore::new();
        let renderer = OverlayRenderer::with_builtin_font();
        let cache = OverlayCache::new();
        store.create(&OverlaySpec::text("A", None)).unwrap();
        cache.rebuild(&store, &renderer);

        let held = cache.snapshot();
        cache.swap(Vec::new());
        assert_eq!(held.len(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_removes_only_target() {
        let store = OverlayStore::new();
        let renderer = OverlayRenderer::with_builtin_font();
        let cache = OverlayCache::new();
        let a = store.create(&OverlaySpec::text("A", None)).unwrap();
        let b = store.create(&OverlaySpec::text("B", None)).unwrap();
        cache.rebuild(&store, &renderer);

        assert!(cache.evict(a.id()));
        assert!(!cache.evict(a.id()));
        assert_eq!(ids(&cache.snapshot()), vec![b.id()]);
    }

    #[test]
    fn test_refresh_request_is_consumed_once() {
        let cache = OverlayCache::new();
        assert!(!cache.take_refresh_request());
        cache.request_refresh();
        cache.request_refresh();
        assert!(cache.take_refresh_request());
        assert!(!cache.take_refresh_request());
    }

    #[test]
    fn test_readers_never_observe_partial_rebuild() {
        let store = Arc::new(OverlayStore::new());
        for i in 0..6 {
            store
                .create(&OverlaySpec::text(format!("T{i}"), None))
                .unwrap();
        }
        let cache = Arc::new(OverlayCache::new());
        let renderer = Arc::new(OverlayRenderer::with_builtin_font());
        cache.rebuild(&store, &renderer);

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    assert_eq!(cache.snapshot().len(), 6);
                }
            })
        };
        for _ in 0..10 {
            cache.rebuild(&store, &renderer);
        }
        done.store(true, Ordering::SeqCst);
        reader.join().unwrap();
    }
}
