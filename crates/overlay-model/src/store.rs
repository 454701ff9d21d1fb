//! The live overlay set.
//!
//! Request handlers mutate the store while the frame loop reads it, so
//! every access goes through one mutex held only for the duration of a
//! single lookup or mutation. Readers that need more than one lookup take
//! a [`OverlayStore::snapshot`], a value copy of the (small) definitions.

use std::sync::{Mutex, MutexGuard, PoisonError};

use overlaycast_common::error::{OverlaycastError, OverlaycastResult};

use crate::overlay::{Overlay, OverlayPatch, OverlaySpec};

/// Insertion-ordered, lock-guarded overlay collection.
#[derive(Debug, Default)]
pub struct OverlayStore {
    overlays: Mutex<Vec<Overlay>>,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `spec`, assign a fresh identifier, and insert it.
    pub fn create(&self, spec: &OverlaySpec) -> OverlaycastResult<Overlay> {
        let overlay = Overlay::from_spec(uuid::Uuid::new_v4().to_string(), spec)?;
        self.lock().push(overlay.clone());
        tracing::debug!(
            overlay_id = %overlay.id(),
            kind = %overlay.kind(),
            position = %overlay.position(),
            "Overlay created"
        );
        Ok(overlay)
    }

    /// All overlays in creation order.
    pub fn snapshot(&self) -> Vec<Overlay> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<Overlay> {
        self.lock().iter().find(|o| o.id() == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().iter().any(|o| o.id() == id)
    }

    /// Current pixel offset of `id`, if it still exists.
    pub fn coordinates(&self, id: &str) -> Option<(i32, i32)> {
        self.lock()
            .iter()
            .find(|o| o.id() == id)
            .map(Overlay::coordinates)
    }

    /// Apply `patch` to overlay `id` in place.
    ///
    /// Validation happens before the stored value is replaced, so an
    /// invalid patch leaves the overlay untouched.
    pub fn update(&self, id: &str, patch: &OverlayPatch) -> OverlaycastResult<Overlay> {
        let mut overlays = self.lock();
        let slot = overlays
            .iter_mut()
            .find(|o| o.id() == id)
            .ok_or_else(|| OverlaycastError::not_found(id))?;
        let updated = slot.patched(patch)?;
        *slot = updated.clone();
        drop(overlays);

        tracing::debug!(overlay_id = %id, position = %updated.position(), "Overlay updated");
        Ok(updated)
    }

    /// Remove overlay `id`, returning its last definition.
    pub fn delete(&self, id: &str) -> OverlaycastResult<Overlay> {
        let mut overlays = self.lock();
        let index = overlays
            .iter()
            .position(|o| o.id() == id)
            .ok_or_else(|| OverlaycastError::not_found(id))?;
        let removed = overlays.remove(index);
        drop(overlays);

        tracing::debug!(overlay_id = %id, "Overlay deleted");
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave a half-written overlay
    // behind (every mutation is a single push/assign/remove), so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<Overlay>> {
        self.overlays.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use std::sync::Arc;

    #[test]
    fn test_create_assigns_unique_ids() {
        let store = OverlayStore::new();
        let a = store.create(&OverlaySpec::text("A", None)).unwrap();
        let b = store.create(&OverlaySpec::text("B", None)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_snapshot_preserves_creation_order() {
        let store = OverlayStore::new();
        let ids: Vec<String> = ["ONE", "TWO", "THREE"]
            .iter()
            .map(|t| store.create(&OverlaySpec::text(*t, None)).unwrap().id().to_string())
            .collect();
        let listed: Vec<String> = store.snapshot().iter().map(|o| o.id().to_string()).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn test_invalid_create_leaves_store_empty() {
        let store = OverlayStore::new();
        assert!(store.create(&OverlaySpec::image("notes.txt", None)).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_unknown_is_not_found() {
        let store = OverlayStore::new();
        let err = store
            .update("missing", &OverlayPatch::default())
            .unwrap_err();
        assert!(matches!(err, OverlaycastError::NotFound { .. }));
    }

    #[test]
    fn test_update_moves_overlay() {
        let store = OverlayStore::new();
        let overlay = store.create(&OverlaySpec::text("HI", Some("top"))).unwrap();
        store
            .update(
                overlay.id(),
                &OverlayPatch {
                    position: Some("right".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.coordinates(overlay.id()), Some((580, 250)));
        assert_eq!(store.get(overlay.id()).unwrap().position(), Position::Right);
    }

    #[test]
    fn test_rejected_update_keeps_previous_definition() {
        let store = OverlayStore::new();
        let overlay = store.create(&OverlaySpec::text("HI", Some("top"))).unwrap();
        let err = store
            .update(
                overlay.id(),
                &OverlayPatch {
                    content: Some(" ".to_string()),
                    position: Some("bottom".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, OverlaycastError::InvalidDefinition { .. }));
        assert_eq!(store.get(overlay.id()).unwrap(), overlay);
    }

    #[test]
    fn test_delete_nonexistent_is_not_found() {
        let store = OverlayStore::new();
        let err = store.delete("nonexistent").unwrap_err();
        assert!(matches!(err, OverlaycastError::NotFound { .. }));
    }

    #[test]
    fn test_delete_removes_overlay() {
        let store = OverlayStore::new();
        let overlay = store.create(&OverlaySpec::text("BYE", None)).unwrap();
        store.delete(overlay.id()).unwrap();
        assert!(!store.contains(overlay.id()));
        assert_eq!(store.coordinates(overlay.id()), None);
    }

    #[test]
    fn test_concurrent_mutations() {
        let store = Arc::new(OverlayStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let overlay = store
                            .create(&OverlaySpec::text(format!("T{i}-{j}"), None))
                            .unwrap();
                        if j % 2 == 0 {
                            store.delete(overlay.id()).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8 * 12);
    }
}
