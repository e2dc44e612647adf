use crossbeam_queue::SegQueue;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

// Items per sealed chunk.
const CHUNK_TARGET: usize = 256;

/// Append-only list with torn-free snapshots.
///
/// Writers push into a lock-free queue and then try to publish. Publishing drains the
/// queue into the published [`ListSnapshot`]: full chunks are sealed onto a shared
/// persistent chain and only the open tail is ever copied, so a publish costs the batch
/// plus at most one tail copy regardless of how long the list is. Readers only clone
/// the snapshot handle, so they never see a partial batch.
#[derive(Debug)]
pub struct SnapshotList<T> {
    pending: SegQueue<T>,
    published: RwLock<ListSnapshot<T>>,
    publishing: Mutex<()>,
}

// One sealed chunk and the chain of chunks before it.
struct Sealed<T> {
    chunk: Vec<T>,
    prev: Option<Arc<Sealed<T>>>,
}

impl<T> Drop for Sealed<T> {
    fn drop(&mut self) {
        // unlink iteratively, a long chain would overflow the stack otherwise
        let mut prev = self.prev.take();
        while let Some(node) = prev {
            match Arc::try_unwrap(node) {
                Ok(mut node) => prev = node.prev.take(),
                Err(_) => break,
            }
        }
    }
}

/// Immutable view of a [`SnapshotList`] at one point in time.
pub struct ListSnapshot<T> {
    sealed: Option<Arc<Sealed<T>>>,
    sealed_chunks: usize,
    tail: Arc<Vec<T>>,
    len: usize,
}

impl<T> std::fmt::Debug for ListSnapshot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListSnapshot")
            .field("len", &self.len)
            .field("sealed_chunks", &self.sealed_chunks)
            .finish()
    }
}

impl<T> Clone for ListSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            sealed: self.sealed.clone(),
            sealed_chunks: self.sealed_chunks,
            tail: self.tail.clone(),
            len: self.len,
        }
    }
}

impl<T> Default for ListSnapshot<T> {
    fn default() -> Self {
        Self {
            sealed: None,
            sealed_chunks: 0,
            tail: Arc::new(Vec::new()),
            len: 0,
        }
    }
}

impl<T> ListSnapshot<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mut chunks: Vec<&[T]> = Vec::with_capacity(self.sealed_chunks);
        let mut node = self.sealed.as_deref();
        while let Some(sealed) = node {
            chunks.push(&sealed.chunk);
            node = sealed.prev.as_deref();
        }
        chunks.into_iter().rev().flatten().chain(self.tail.iter())
    }

    pub fn last(&self) -> Option<&T> {
        self.tail
            .last()
            .or_else(|| self.sealed.as_ref().and_then(|sealed| sealed.chunk.last()))
    }

    fn seal(&mut self, chunk: Vec<T>) {
        self.sealed = Some(Arc::new(Sealed {
            chunk,
            prev: self.sealed.take(),
        }));
        self.sealed_chunks += 1;
    }
}

impl<T: Clone> ListSnapshot<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    // Copies the tail only while an older snapshot still holds it.
    fn append(&mut self, batch: Vec<T>) {
        self.len += batch.len();
        for item in batch {
            let tail = Arc::make_mut(&mut self.tail);
            tail.push(item);
            if tail.len() >= CHUNK_TARGET {
                let full = std::mem::replace(tail, Vec::with_capacity(CHUNK_TARGET));
                self.seal(full);
            }
        }
    }
}

impl<T: Clone> Default for SnapshotList<T> {
    fn default() -> Self {
        Self {
            pending: SegQueue::new(),
            published: RwLock::new(ListSnapshot::default()),
            publishing: Mutex::new(()),
        }
    }
}

impl<T: Clone> SnapshotList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends without blocking. The item becomes visible once a publish picks it up,
    /// which this call attempts unless another writer is already publishing.
    pub fn push(&self, item: T) {
        self.pending.push(item);
        self.try_publish();
    }

    /// Appends a batch and publishes it as one unit when no other publish is running.
    pub fn extend<I: IntoIterator<Item = T>>(&self, items: I) {
        for item in items {
            self.pending.push(item);
        }
        self.try_publish();
    }

    pub fn snapshot(&self) -> ListSnapshot<T> {
        self.published.read().clone()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Blocks until everything pushed before this call is published.
    pub fn flush(&self) {
        let _guard = self.publishing.lock();
        self.publish_pending();
    }

    fn try_publish(&self) {
        // orders our push before the lock probe; pairs with the fence after release
        fence(Ordering::SeqCst);
        loop {
            let Some(guard) = self.publishing.try_lock() else {
                // the active publisher re-checks the queue after releasing
                return;
            };
            self.publish_pending();
            drop(guard);

            fence(Ordering::SeqCst);
            if self.pending.is_empty() {
                return;
            }
        }
    }

    fn publish_pending(&self) {
        let mut batch = Vec::with_capacity(self.pending.len());
        while let Some(item) = self.pending.pop() {
            batch.push(item);
        }
        if batch.is_empty() {
            return;
        }

        self.published.write().append(batch);
    }
}
