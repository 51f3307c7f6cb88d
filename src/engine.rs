//! The overlay engine control surface.
//!
//! `OverlayEngine` is an explicit object owned by the embedding
//! application; there is no process-wide singleton. It owns the shared
//! state, the surface provider, and the render thread handle.
//!
//! Caller contract: `stop()` (and therefore `drop`) blocks until the
//! render thread has exited and must never be called from the render
//! thread itself.

use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::config::OverlayConfig;
use crate::geometry::TargetRegion;
use crate::render::{self, RenderSettings, RenderSignal};
use crate::store::{DetectionStore, DetectionUpdate};
use crate::surface::SurfaceProvider;

/// Everything behind the single exclusive lock: the detection store and
/// the target region. Update batches and render passes are both short,
/// bounded critical sections over this one mutex; no finer-grained locking
/// exists.
pub struct OverlayState {
    pub store: DetectionStore,
    pub region: TargetRegion,
}

/// State shared between the producer-facing engine and the render thread.
pub struct EngineShared {
    state: Mutex<OverlayState>,
}

impl EngineShared {
    pub(crate) fn new(state: OverlayState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Scoped acquisition of the exclusive lock. A poisoned lock means a
    /// panic on the other side; surface it as an error rather than
    /// propagating the panic.
    pub(crate) fn lock_state(&self) -> Result<MutexGuard<'_, OverlayState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("overlay state lock poisoned"))
    }
}

struct RenderHandle {
    signals: Sender<RenderSignal>,
    join: JoinHandle<()>,
}

/// Thread-safe detection overlay: concurrent store, merge/expiry policy,
/// and a dedicated render thread painting through a [`SurfaceProvider`].
pub struct OverlayEngine {
    shared: Arc<EngineShared>,
    provider: Arc<dyn SurfaceProvider>,
    settings: RenderSettings,
    epoch: Instant,
    render: Option<RenderHandle>,
}

impl OverlayEngine {
    pub fn new(config: OverlayConfig, provider: Arc<dyn SurfaceProvider>) -> Self {
        let state = OverlayState {
            store: DetectionStore::with_iou_threshold(config.capacity, config.iou_threshold),
            region: config.region,
        };
        Self {
            shared: Arc::new(EngineShared::new(state)),
            provider,
            settings: RenderSettings {
                timeout_ms: config.timeout_ms,
                frame_interval: config.frame_interval,
                show_labels: config.show_labels,
                transparency_key: config.transparency_key,
            },
            epoch: Instant::now(),
            render: None,
        }
    }

    /// Milliseconds since this engine was constructed. All `last_seen`
    /// bookkeeping is in this clock.
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub fn is_running(&self) -> bool {
        self.render.is_some()
    }

    /// Spawn the render thread. Idempotent: returns `Ok` immediately when
    /// already running. On spawn failure the engine stays stopped.
    pub fn start(&mut self) -> Result<()> {
        if self.render.is_some() {
            log::debug!("overlay already running");
            return Ok(());
        }

        let (signals, receiver) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let provider = Arc::clone(&self.provider);
        let settings = self.settings.clone();
        let epoch = self.epoch;
        let join = thread::Builder::new()
            .name("overlay-render".to_string())
            .spawn(move || render::run(shared, provider, receiver, settings, epoch))
            .context("failed to spawn overlay render thread")?;

        self.render = Some(RenderHandle { signals, join });
        log::info!("overlay started");
        Ok(())
    }

    /// Signal the render thread to terminate and block until it has fully
    /// exited and released the surface. Idempotent no-op when not running.
    pub fn stop(&mut self) {
        let Some(handle) = self.render.take() else {
            return;
        };
        // Send failure just means the thread already exited (for example
        // after a surface-creation failure); joining is still correct.
        let _ = handle.signals.send(RenderSignal::Shutdown);
        if handle.join.join().is_err() {
            log::error!("render thread panicked before shutdown");
        }
        log::info!("overlay stopped");
    }

    /// Apply one producer batch atomically and request a single repaint.
    ///
    /// No-op on an empty batch. The whole batch is applied under one lock
    /// acquisition, so a render pass never observes a partially-applied
    /// batch, and exactly one invalidate is sent per call.
    pub fn upsert_batch(&self, updates: &[DetectionUpdate]) {
        if updates.is_empty() {
            return;
        }
        let now_ms = self.now_ms();
        let applied = match self.shared.lock_state() {
            Ok(mut state) => state.store.upsert_batch(updates, now_ms),
            Err(err) => {
                log::error!("dropping batch of {}: {err:#}", updates.len());
                return;
            }
        };
        log::debug!("applied {applied} of {} batch record(s)", updates.len());

        if let Some(handle) = &self.render {
            let _ = handle.signals.send(RenderSignal::Invalidate);
        }
    }

    /// Move/resize the overlay's screen placement. A degenerate rectangle
    /// is rejected at the call site with a diagnostic; prior state is
    /// unchanged. Composition picks up the new extent on the next paint;
    /// the surface itself is recreated on the next `start()`.
    pub fn set_target_region(&self, left: i32, top: i32, right: i32, bottom: i32) {
        let region = TargetRegion::new(left, top, right, bottom);
        if !region.is_valid() {
            log::warn!("ignoring degenerate target region {region:?}");
            return;
        }
        match self.shared.lock_state() {
            Ok(mut state) => {
                state.region = region;
                log::info!(
                    "target region updated: ({}, {}, {}, {})",
                    left,
                    top,
                    right,
                    bottom
                );
            }
            Err(err) => log::error!("target region not updated: {err:#}"),
        }
    }

    /// Change the store capacity. Ignored with a diagnostic when
    /// `max <= 0`; shrinking truncates tail records (see
    /// [`DetectionStore::resize`]).
    pub fn set_capacity(&self, max: i32) {
        if max <= 0 {
            log::warn!("ignoring capacity {max}: must be greater than zero");
            return;
        }
        match self.shared.lock_state() {
            Ok(mut state) => state.store.resize(max as usize),
            Err(err) => log::error!("capacity not updated: {err:#}"),
        }
    }

    /// Count of live records (active and paused) currently in the store.
    pub fn record_count(&self) -> usize {
        self.shared
            .lock_state()
            .map(|state| state.store.len())
            .unwrap_or(0)
    }

    /// Count of records an immediate render pass would draw.
    pub fn visible_count(&self) -> usize {
        let now_ms = self.now_ms();
        let timeout_ms = self.settings.timeout_ms;
        match self.shared.lock_state() {
            Ok(mut state) => {
                state.store.mark_stale(now_ms, timeout_ms);
                state.store.visible().count()
            }
            Err(_) => 0,
        }
    }
}

impl Drop for OverlayEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
