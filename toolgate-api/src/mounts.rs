//! Mount Table
//!
//! Holds the current [`ActiveMountSet`] behind a reader-writer lock. Readers
//! (request dispatch) take a cheap `Arc` snapshot; the single writer (the
//! reconciler) swaps the whole set atomically. A request keeps serving from
//! the snapshot it acquired even when a reload lands mid-flight.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::loader::ActiveMountSet;

#[derive(Debug, Default)]
pub struct MountTable {
    current: RwLock<Arc<ActiveMountSet>>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot for one request.
    pub async fn snapshot(&self) -> Arc<ActiveMountSet> {
        self.current.read().await.clone()
    }

    /// Replace the whole set. Writers only during reconcile.
    pub async fn swap(&self, next: ActiveMountSet) {
        let mut guard = self.current.write().await;
        *guard = Arc::new(next);
    }

    pub async fn fingerprint(&self) -> String {
        self.current.read().await.fingerprint.clone()
    }
}
