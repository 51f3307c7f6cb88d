//! Detection records and the merge/expiry store.
//!
//! The store is the single source of truth for overlay content. It is a
//! fixed-capacity, append-only ordered collection keyed by producer-assigned
//! ID. Timed-out records are paused in place, never compacted; a paused slot
//! stays occupied until a matching-ID update revives it or a shrink discards
//! it.
//!
//! The store itself is not synchronized; the engine wraps it in the single
//! process-wide lock and both the producer path and the render pass go
//! through that lock.

use crate::geometry::{iou, Rect};
use crate::{bounded_label, Rgb};

/// Default store capacity.
pub const DEFAULT_CAPACITY: usize = 100;

/// Default staleness timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// IoU above which a differently-identified incoming detection is treated
/// as a duplicate of a stored one and discarded.
pub const IOU_DUPLICATE_THRESHOLD: f32 = 0.5;

/// Incoming detection from the producer. The store, not the producer,
/// assigns freshness and visibility.
#[derive(Clone, Debug)]
pub struct DetectionUpdate {
    pub id: i32,
    pub rect: Rect,
    pub color: Rgb,
    pub label: String,
}

/// A stored detection.
#[derive(Clone, Debug)]
pub struct DetectionRecord {
    pub id: i32,
    pub rect: Rect,
    pub color: Rgb,
    pub label: String,
    /// Milliseconds since the engine epoch; non-decreasing per ID.
    pub last_seen_ms: u64,
    /// False once timed out. Only a matching-ID update sets it back.
    pub active: bool,
}

/// Fixed-capacity ordered detection store.
#[derive(Debug)]
pub struct DetectionStore {
    records: Vec<DetectionRecord>,
    capacity: usize,
    iou_threshold: f32,
}

impl DetectionStore {
    pub fn new(capacity: usize) -> Self {
        Self::with_iou_threshold(capacity, IOU_DUPLICATE_THRESHOLD)
    }

    pub fn with_iou_threshold(capacity: usize, iou_threshold: f32) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
            iou_threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, id: i32) -> Option<&DetectionRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Apply one producer batch. Returns the number of records applied
    /// (updated or inserted).
    ///
    /// Records are processed strictly in input order; duplicate IDs within
    /// a batch resolve last-wins because the later one takes the exact-ID
    /// update path. At most `capacity` records are considered per call;
    /// excess is dropped with a diagnostic.
    ///
    /// Merge policy per record:
    /// 1. exact-ID match: overwrite all fields, refresh `last_seen_ms`
    ///    (clamped non-decreasing), reactivate. The only revival path.
    /// 2. otherwise, IoU above the duplicate threshold against any stored
    ///    record: discard.
    /// 3. otherwise insert while below capacity; at capacity, drop with a
    ///    diagnostic.
    pub fn upsert_batch(&mut self, updates: &[DetectionUpdate], now_ms: u64) -> usize {
        if updates.len() > self.capacity {
            log::debug!(
                "batch of {} exceeds capacity {}, considering first {} only",
                updates.len(),
                self.capacity,
                self.capacity
            );
        }

        let mut applied = 0;
        for update in updates.iter().take(self.capacity) {
            if self.apply_one(update, now_ms) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_one(&mut self, update: &DetectionUpdate, now_ms: u64) -> bool {
        if let Some(existing) = self.records.iter_mut().find(|r| r.id == update.id) {
            existing.rect = update.rect;
            existing.color = update.color;
            existing.label = bounded_label(&update.label);
            existing.last_seen_ms = existing.last_seen_ms.max(now_ms);
            existing.active = true;
            log::debug!(
                "detection updated id={} rect={:?} label={}",
                existing.id,
                existing.rect,
                existing.label
            );
            return true;
        }

        if let Some(stored) = self
            .records
            .iter()
            .find(|r| iou(&update.rect, &r.rect) > self.iou_threshold)
        {
            log::debug!(
                "detection id={} discarded as duplicate of stored id={} (iou > {})",
                update.id,
                stored.id,
                self.iou_threshold
            );
            return false;
        }

        if self.records.len() >= self.capacity {
            log::debug!(
                "capacity {} reached, dropping detection id={}",
                self.capacity,
                update.id
            );
            return false;
        }

        let record = DetectionRecord {
            id: update.id,
            rect: update.rect,
            color: update.color,
            label: bounded_label(&update.label),
            last_seen_ms: now_ms,
            active: true,
        };
        log::debug!(
            "detection added id={} rect={:?} label={}",
            record.id,
            record.rect,
            record.label
        );
        self.records.push(record);
        true
    }

    /// Change capacity. Transactional: on allocation failure the store is
    /// left untouched. Shrinking below the current count truncates the
    /// tail and clamps the count; the discarded records are gone for good,
    /// which is why the data loss is logged at warn level.
    pub fn resize(&mut self, new_capacity: usize) {
        if new_capacity == 0 {
            log::warn!("resize ignored: capacity must be greater than zero");
            return;
        }
        if new_capacity > self.records.len() {
            let additional = new_capacity - self.records.len();
            if let Err(err) = self.records.try_reserve(additional) {
                log::warn!("resize to {} failed, keeping capacity {}: {}", new_capacity, self.capacity, err);
                return;
            }
        }
        if self.records.len() > new_capacity {
            let dropped = self.records.len() - new_capacity;
            self.records.truncate(new_capacity);
            log::warn!(
                "store shrunk to {}, discarded {} tail record(s)",
                new_capacity,
                dropped
            );
        }
        self.capacity = new_capacity;
        log::debug!("max detections set to {}", new_capacity);
    }

    /// Lifecycle pass: pause every record whose last update is older than
    /// `timeout_ms`. Runs under the store lock at render time. Returns the
    /// number of records paused by this pass.
    pub fn mark_stale(&mut self, now_ms: u64, timeout_ms: u64) -> usize {
        let mut paused = 0;
        for record in self.records.iter_mut().filter(|r| r.active) {
            if now_ms.saturating_sub(record.last_seen_ms) > timeout_ms {
                record.active = false;
                paused += 1;
                log::debug!("detection id={} timed out, paused", record.id);
            }
        }
        paused
    }

    /// Active records, in insertion order.
    pub fn visible(&self) -> impl Iterator<Item = &DetectionRecord> {
        self.records.iter().filter(|record| record.active)
    }

    /// Copies of the active records. This is what crosses the lock
    /// boundary to the render thread; no reference escapes.
    pub fn visible_snapshot(&self) -> Vec<DetectionRecord> {
        self.visible().cloned().collect()
    }
}
