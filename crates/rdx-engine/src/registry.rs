//! Document registry with per-document single-flight access
//!
//! The map lock is held only to look up, insert or write back a record.
//! Operations on one document hold that document's gate for their whole
//! duration through a [`DocumentLease`]; other documents are unaffected.

use rdx_core::types::{DocumentId, DocumentRecord};
use rdx_core::{RdxError, RdxResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

struct Entry {
    seq: u64,
    gate: Arc<Mutex<()>>,
    record: DocumentRecord,
}

#[derive(Default)]
struct Entries {
    next_seq: u64,
    by_id: HashMap<DocumentId, Entry>,
}

#[derive(Default)]
pub struct DocumentRegistry {
    inner: RwLock<Entries>,
}

/// Exclusive access to one document until dropped.
///
/// Changes to `record` are visible to readers only after
/// [`DocumentRegistry::persist`].
pub struct DocumentLease {
    _gate: OwnedMutexGuard<()>,
    pub record: DocumentRecord,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: DocumentRecord) {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        debug!(document = %record.id, "document registered");
        inner.by_id.insert(
            record.id,
            Entry {
                seq,
                gate: Arc::new(Mutex::new(())),
                record,
            },
        );
    }

    /// Snapshot of one record.
    pub async fn get(&self, id: &DocumentId) -> RdxResult<DocumentRecord> {
        self.inner
            .read()
            .await
            .by_id
            .get(id)
            .map(|e| e.record.clone())
            .ok_or_else(|| unknown(id))
    }

    /// Snapshot of every record, in upload order.
    pub async fn list(&self) -> Vec<DocumentRecord> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&Entry> = inner.by_id.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.record.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Wait for exclusive access to a document.
    pub async fn acquire(&self, id: &DocumentId) -> RdxResult<DocumentLease> {
        let gate = {
            let inner = self.inner.read().await;
            inner.by_id.get(id).ok_or_else(|| unknown(id))?.gate.clone()
        };
        let guard = gate.lock_owned().await;

        // The record may have changed while we waited for the gate.
        let record = self.get(id).await?;
        Ok(DocumentLease {
            _gate: guard,
            record,
        })
    }

    /// Write the lease's record back.
    pub async fn persist(&self, lease: &DocumentLease) -> RdxResult<()> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .by_id
            .get_mut(&lease.record.id)
            .ok_or_else(|| unknown(&lease.record.id))?;
        entry.record = lease.record.clone();
        debug!(document = %lease.record.id, status = lease.record.status(), "record persisted");
        Ok(())
    }
}

fn unknown(id: &DocumentId) -> RdxError {
    RdxError::NotFound(format!("unknown document {id}"))
}
