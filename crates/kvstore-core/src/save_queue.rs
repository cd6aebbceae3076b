//! Save queue: the single writer behind each store
//!
//! Every store owns one background thread fed by an unbounded channel.
//! Mutations enqueue a `Snapshot` of the whole map and return immediately;
//! the thread writes snapshots to the store file in exactly the order they
//! were enqueued. With one writer per file, a stale snapshot can never land
//! on top of a newer one.
//!
//! When several snapshots are already waiting, the writer skips to the
//! newest one before touching the disk. The skipped snapshots are older
//! states that would have been overwritten anyway.
//!
//! A flush request is a barrier: it is acknowledged only after every
//! snapshot enqueued before it has been applied.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{KvError, KvResult};
use crate::snapshot_file::{write_snapshot, Snapshot};

/// Counters describing the save pipeline of one store.
pub struct SaveStats {
    /// Snapshots handed to the queue
    enqueued: AtomicU64,
    /// Snapshots written to disk
    written: AtomicU64,
    /// Snapshots whose write failed
    failed: AtomicU64,
    /// Snapshots skipped because a newer one was already queued
    coalesced: AtomicU64,
    /// Revision of the last snapshot written successfully
    last_written_revision: AtomicU64,
}

impl SaveStats {
    pub fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            last_written_revision: AtomicU64::new(0),
        }
    }

    pub fn total_enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Acquire)
    }

    pub fn total_written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    pub fn total_failed(&self) -> u64 {
        self.failed.load(Ordering::Acquire)
    }

    pub fn total_coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Acquire)
    }

    pub fn last_written_revision(&self) -> u64 {
        self.last_written_revision.load(Ordering::Acquire)
    }

    /// Snapshots enqueued but not yet written, failed or skipped.
    pub fn pending(&self) -> u64 {
        let settled = self.total_written() + self.total_failed() + self.total_coalesced();
        self.total_enqueued().saturating_sub(settled)
    }

    fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::AcqRel);
    }

    fn record_written(&self, revision: u64) {
        self.last_written_revision.store(revision, Ordering::Release);
        self.written.fetch_add(1, Ordering::AcqRel);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::AcqRel);
    }

    fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for SaveStats {
    fn default() -> Self { Self::new() }
}

enum SaveRequest {
    Persist(Snapshot),
    Flush(Sender<()>),
}

/// Handle to a store's writer thread.
/// Dropping it closes the queue; the thread drains what is left and exits.
pub struct SaveQueue {
    store: String,
    sender: Option<Sender<SaveRequest>>,
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<SaveStats>,
}

impl SaveQueue {
    /// Start the writer thread for `store`, writing to `path`.
    pub fn start(store: &str, path: PathBuf, durable: bool) -> KvResult<Self> {
        let (sender, receiver) = channel::unbounded();
        let stats = Arc::new(SaveStats::new());

        let thread_stats = Arc::clone(&stats);
        let thread_store = store.to_string();
        let thread_path = path.clone();

        let thread = thread::Builder::new()
            .name(format!("kv-save-{}", store))
            .spawn(move || {
                save_loop(&thread_store, &thread_path, durable, receiver, &thread_stats);
            })
            .map_err(|e| KvError::Io {
                path: Some(path),
                kind: e.kind(),
                message: format!("Failed to spawn save thread: {}", e),
            })?;

        Ok(Self {
            store: store.to_string(),
            sender: Some(sender),
            thread: Some(thread),
            stats,
        })
    }

    /// Queue a snapshot for writing. Never blocks on I/O.
    pub fn enqueue(&self, snapshot: Snapshot) -> KvResult<()> {
        let sender = self.sender.as_ref().ok_or_else(|| self.closed())?;
        self.stats.record_enqueued();
        sender.send(SaveRequest::Persist(snapshot)).map_err(|_| {
            self.stats.record_failed();
            self.closed()
        })
    }

    /// Block until every snapshot enqueued so far has been applied.
    pub fn flush(&self) -> KvResult<()> {
        let sender = self.sender.as_ref().ok_or_else(|| self.closed())?;
        let (ack_tx, ack_rx) = channel::bounded(1);
        sender
            .send(SaveRequest::Flush(ack_tx))
            .map_err(|_| self.closed())?;
        ack_rx.recv().map_err(|_| self.closed())
    }

    pub fn stats(&self) -> &SaveStats {
        &self.stats
    }

    /// Check if the writer thread is still alive.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Close the queue and wait for the remaining snapshots to be written.
    pub fn shutdown(mut self) {
        self.close_and_join();
    }

    fn close_and_join(&mut self) {
        self.sender.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!(store = %self.store, "Save thread panicked");
            }
        }
    }

    fn closed(&self) -> KvError {
        KvError::QueueClosed { store: self.store.clone() }
    }
}

impl Drop for SaveQueue {
    fn drop(&mut self) {
        self.close_and_join();
    }
}

/// Writer loop; runs on the store's save thread until every sender is gone.
fn save_loop(
    store: &str,
    path: &Path,
    durable: bool,
    receiver: Receiver<SaveRequest>,
    stats: &SaveStats,
) {
    while let Ok(request) = receiver.recv() {
        match request {
            SaveRequest::Persist(snapshot) => {
                let mut latest = snapshot;
                let mut barrier = None;

                // Skip ahead to the newest snapshot, stopping at a barrier so
                // it is acknowledged right after the snapshots before it.
                while let Ok(next) = receiver.try_recv() {
                    match next {
                        SaveRequest::Persist(newer) => {
                            stats.record_coalesced();
                            latest = newer;
                        }
                        SaveRequest::Flush(ack) => {
                            barrier = Some(ack);
                            break;
                        }
                    }
                }

                apply(store, path, durable, &latest, stats);

                if let Some(ack) = barrier {
                    let _ = ack.send(());
                }
            }
            SaveRequest::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    tracing::debug!(store = %store, "Save queue closed");
}

fn apply(store: &str, path: &Path, durable: bool, snapshot: &Snapshot, stats: &SaveStats) {
    match write_snapshot(path, snapshot, durable) {
        Ok(bytes) => {
            stats.record_written(snapshot.revision);
            tracing::debug!(
                store = %store,
                revision = snapshot.revision,
                entries = snapshot.len(),
                bytes,
                "Saved data"
            );
        }
        Err(e) => {
            stats.record_failed();
            tracing::error!(store = %store, error = %e, "Error saving data");
        }
    }
}
