use image::{ImageResult, RgbaImage};
use rayon::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::canvas::{LayerStore, Surface};
use crate::io;

/// Default number of undo steps kept.
pub const DEFAULT_MAX_HISTORY: usize = 50;

// ============================================================================
// SNAPSHOT - every layer, PNG-encoded
// ============================================================================

/// Immutable copy of all layer surfaces at one instant, in layer order.
///
/// Each layer is stored PNG-encoded behind an `Arc`, so restore jobs can
/// read the bytes from other threads while the snapshot itself stays on the
/// stack untouched.
#[derive(Clone)]
pub struct Snapshot {
    layers: Vec<Arc<[u8]>>,
}

impl Snapshot {
    /// Encode every layer of `store`. Layers are encoded in parallel.
    pub fn capture(store: &LayerStore) -> ImageResult<Self> {
        let layers = store
            .layers
            .par_iter()
            .map(|layer| {
                io::encode_png(layer.pixels.as_rgba_image()).map(|bytes| Arc::<[u8]>::from(bytes))
            })
            .collect::<ImageResult<Vec<Arc<[u8]>>>>()?;
        Ok(Self { layers })
    }

    /// Number of layers captured.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Decode one layer synchronously.
    pub fn decode_layer(&self, index: usize) -> Option<ImageResult<RgbaImage>> {
        self.layers.get(index).map(|bytes| io::decode_png(bytes))
    }

    pub fn memory_size(&self) -> usize {
        self.layers.iter().map(|b| b.len()).sum()
    }
}

// ============================================================================
// RESTORE - decode jobs joined by a counting barrier
// ============================================================================

/// Progress of the restore started by the last undo/redo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreStatus {
    /// No restore in flight.
    Idle,
    /// Some decode jobs have not reported back yet.
    Pending { done: usize, total: usize },
    /// Every layer has been written back. Reported once per restore.
    Complete,
}

struct DecodedLayer {
    index: usize,
    result: ImageResult<RgbaImage>,
}

struct PendingRestore {
    receiver: Receiver<DecodedLayer>,
    done: usize,
    total: usize,
}

impl PendingRestore {
    /// Issue one decode job per layer present in both the snapshot and the
    /// store. Jobs finish in any order; only the count matters.
    fn spawn(snapshot: Snapshot, layer_count: usize) -> Self {
        if snapshot.len() != layer_count {
            log_warn!(
                "Restoring a {}-layer snapshot into {} layers; unmatched layers are skipped",
                snapshot.len(),
                layer_count
            );
        }
        let total = snapshot.len().min(layer_count);
        let (tx, rx) = mpsc::channel();

        for (index, bytes) in snapshot.layers.into_iter().take(total).enumerate() {
            let tx = tx.clone();
            rayon::spawn(move || {
                let result = io::decode_png(&bytes);
                let _ = tx.send(DecodedLayer { index, result });
            });
        }

        Self {
            receiver: rx,
            done: 0,
            total,
        }
    }

    fn is_done(&self) -> bool {
        self.done >= self.total
    }
}

fn apply_decoded(store: &mut LayerStore, decoded: DecodedLayer) {
    let Some(layer) = store.layers.get_mut(decoded.index) else {
        log_warn!("Restore: layer {} no longer exists", decoded.index);
        return;
    };
    match decoded.result {
        Ok(img) if img.dimensions() == (store.width, store.height) => {
            layer.pixels = Surface::from_rgba_image(img);
        }
        Ok(img) => {
            log_err!(
                "Restore: layer {} decoded as {}x{}, expected {}x{}",
                decoded.index,
                img.width(),
                img.height(),
                store.width,
                store.height
            );
        }
        Err(e) => {
            log_err!("Restore: layer {} failed to decode: {}", decoded.index, e);
        }
    }
}

// ============================================================================
// HISTORY MANAGER
// ============================================================================

/// Bounded undo stack and unbounded redo stack of full snapshots.
pub struct HistoryManager {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: VecDeque<Snapshot>,
    max_history_size: usize,
    pending: Option<PendingRestore>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size,
            pending: None,
        }
    }

    /// Record the current state before a mutation. Clears the redo stack.
    pub fn snapshot(&mut self, store: &mut LayerStore) -> bool {
        self.settle(store);
        match Snapshot::capture(store) {
            Ok(snapshot) => {
                self.redo_stack.clear();
                self.push_undo(snapshot);
                true
            }
            Err(e) => {
                log_err!("Snapshot failed, change will not be undoable: {}", e);
                false
            }
        }
    }

    /// Move the newest undo snapshot into the store, saving the current
    /// state for redo. Returns false when there is nothing to undo.
    ///
    /// The layers are written back asynchronously; drive the restore with
    /// [`HistoryManager::poll_restore`] or [`HistoryManager::finish_restore`].
    pub fn undo(&mut self, store: &mut LayerStore) -> bool {
        self.settle(store);
        if self.undo_stack.is_empty() {
            return false;
        }
        let current = match Snapshot::capture(store) {
            Ok(s) => s,
            Err(e) => {
                log_err!("Undo aborted, current state could not be captured: {}", e);
                return false;
            }
        };
        let Some(previous) = self.undo_stack.pop_back() else {
            return false;
        };
        self.redo_stack.push_back(current);
        self.pending = Some(PendingRestore::spawn(previous, store.len()));
        true
    }

    /// Symmetric to [`HistoryManager::undo`].
    pub fn redo(&mut self, store: &mut LayerStore) -> bool {
        self.settle(store);
        if self.redo_stack.is_empty() {
            return false;
        }
        let current = match Snapshot::capture(store) {
            Ok(s) => s,
            Err(e) => {
                log_err!("Redo aborted, current state could not be captured: {}", e);
                return false;
            }
        };
        let Some(next) = self.redo_stack.pop_back() else {
            return false;
        };
        self.push_undo(current);
        self.pending = Some(PendingRestore::spawn(next, store.len()));
        true
    }

    /// Apply every decoded layer that has arrived, without blocking.
    pub fn poll_restore(&mut self, store: &mut LayerStore) -> RestoreStatus {
        let Some(pending) = self.pending.as_mut() else {
            return RestoreStatus::Idle;
        };

        while !pending.is_done() {
            match pending.receiver.try_recv() {
                Ok(decoded) => {
                    apply_decoded(store, decoded);
                    pending.done += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log_err!(
                        "Restore: {} decode job(s) vanished",
                        pending.total - pending.done
                    );
                    pending.done = pending.total;
                }
            }
        }

        let status = if pending.is_done() {
            RestoreStatus::Complete
        } else {
            RestoreStatus::Pending {
                done: pending.done,
                total: pending.total,
            }
        };
        if status == RestoreStatus::Complete {
            self.pending = None;
        }
        status
    }

    /// Block until the restore in flight (if any) has written every layer.
    pub fn finish_restore(&mut self, store: &mut LayerStore) -> RestoreStatus {
        let Some(pending) = self.pending.as_mut() else {
            return RestoreStatus::Idle;
        };

        while !pending.is_done() {
            match pending.receiver.recv() {
                Ok(decoded) => {
                    apply_decoded(store, decoded);
                    pending.done += 1;
                }
                Err(_) => {
                    log_err!(
                        "Restore: {} decode job(s) vanished",
                        pending.total - pending.done
                    );
                    pending.done = pending.total;
                }
            }
        }

        self.pending = None;
        RestoreStatus::Complete
    }

    /// Finish a restore left in flight so operations apply in call order.
    fn settle(&mut self, store: &mut LayerStore) {
        if self.pending.is_some() {
            log_warn!("History operation while a restore was in flight; finishing it first");
            self.finish_restore(store);
        }
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > self.max_history_size {
            self.undo_stack.pop_front();
        }
    }

    pub fn is_restoring(&self) -> bool {
        self.pending.is_some()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Bytes held by both stacks.
    pub fn memory_usage(&self) -> usize {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .map(Snapshot::memory_size)
            .sum()
    }
}
