//! Camera selection for group operations
//!
//! Selection is plain set membership. It never starts or stops a stream;
//! it only decides which cameras take part in the next group start/stop.

use crate::types::CameraId;
use std::collections::BTreeSet;
use tokio::sync::watch;

/// Observable set of selected camera identifiers
#[derive(Clone)]
pub struct SelectionRegistry {
    tx: watch::Sender<BTreeSet<CameraId>>,
}

impl Default for SelectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(BTreeSet::new());
        Self { tx }
    }

    /// Flip membership of `id`, returning whether it is now selected
    pub fn toggle(&self, id: &CameraId) -> bool {
        let mut selected = false;
        self.tx.send_modify(|set| {
            if !set.remove(id) {
                set.insert(id.clone());
                selected = true;
            }
        });
        selected
    }

    pub fn select(&self, id: CameraId) {
        self.tx.send_if_modified(|set| set.insert(id));
    }

    pub fn deselect(&self, id: &CameraId) {
        self.tx.send_if_modified(|set| set.remove(id));
    }

    /// Replace the selection with exactly `known_ids`
    pub fn select_all(&self, known_ids: impl IntoIterator<Item = CameraId>) {
        let next: BTreeSet<CameraId> = known_ids.into_iter().collect();
        self.tx.send_if_modified(|set| {
            if *set == next {
                return false;
            }
            *set = next;
            true
        });
    }

    pub fn clear(&self) {
        self.tx.send_if_modified(|set| {
            let changed = !set.is_empty();
            set.clear();
            changed
        });
    }

    #[must_use]
    pub fn is_selected(&self, id: &CameraId) -> bool {
        self.tx.borrow().contains(id)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.tx.borrow().len()
    }

    /// Selected identifiers in stable order
    #[must_use]
    pub fn selected(&self) -> Vec<CameraId> {
        self.tx.borrow().iter().cloned().collect()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<CameraId>> {
        self.tx.subscribe()
    }
}
