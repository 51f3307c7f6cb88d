//! Render-loop thread driver.
//!
//! One dedicated thread owns the overlay surface end-to-end: creation,
//! per-frame paint, teardown. The message pump blocks on a channel with a
//! paint-due timeout, so the loop is busy-wait free and a shutdown signal
//! is honored within one pump iteration.
//!
//! Lock discipline: each paint takes the shared lock exactly once — stale
//! pass, region read, record copy — and releases it before any draw call.
//! No draw or present ever runs with the lock held.

use anyhow::Result;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::EngineShared;
use crate::store::DetectionRecord;
use crate::surface::{OverlaySurface, SurfaceProvider};
use crate::Rgb;

/// Vertical offset of a label above its box, in pixels.
const LABEL_OFFSET_PX: i32 = 20;

/// Signals the control surface sends to the render thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RenderSignal {
    /// A batch was applied; repaint.
    Invalidate,
    /// Terminate the loop, tear down the surface, exit the thread.
    Shutdown,
}

/// Render-side settings, fixed for the lifetime of one engine.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Staleness timeout applied by the lifecycle pass each paint.
    pub timeout_ms: u64,
    /// Upper bound on how long the pump blocks before a timer-driven paint.
    pub frame_interval: Duration,
    /// Draw labels above boxes.
    pub show_labels: bool,
    /// Color the composition buffer is cleared to; the window system keys
    /// it out.
    pub transparency_key: Rgb,
}

/// Thread body. Creates the surface, pumps signals, paints, tears down.
///
/// A surface-creation failure logs and exits early; `stop()` remains safe
/// because joining an already-exited thread is a no-op.
pub(crate) fn run(
    shared: Arc<EngineShared>,
    provider: Arc<dyn SurfaceProvider>,
    signals: Receiver<RenderSignal>,
    settings: RenderSettings,
    epoch: Instant,
) {
    let region = match shared.lock_state() {
        Ok(state) => state.region,
        Err(err) => {
            log::error!("render loop aborting: {err:#}");
            return;
        }
    };

    let mut surface = match provider.create(region) {
        Ok(surface) => surface,
        Err(err) => {
            log::error!("overlay surface creation failed: {err:#}");
            return;
        }
    };
    log::info!(
        "render loop started, region {}x{} at ({}, {})",
        region.width(),
        region.height(),
        region.left,
        region.top
    );

    loop {
        match signals.recv_timeout(settings.frame_interval) {
            Ok(RenderSignal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(RenderSignal::Invalidate) | Err(RecvTimeoutError::Timeout) => {
                let now_ms = epoch.elapsed().as_millis() as u64;
                if let Err(err) = paint(&shared, surface.as_mut(), &settings, now_ms) {
                    log::warn!("paint failed: {err:#}");
                }
            }
        }
    }

    // Surface teardown happens here, on the owning thread.
    drop(surface);
    log::info!("render loop exited");
}

struct FramePass {
    width: u32,
    height: u32,
    records: Vec<DetectionRecord>,
}

/// Take the minimal read pass under the lock, then draw outside it.
fn paint(
    shared: &EngineShared,
    surface: &mut dyn OverlaySurface,
    settings: &RenderSettings,
    now_ms: u64,
) -> Result<()> {
    let pass = {
        let mut state = shared.lock_state()?;
        state.store.mark_stale(now_ms, settings.timeout_ms);
        FramePass {
            width: state.region.width(),
            height: state.region.height(),
            records: state.store.visible_snapshot(),
        }
    };

    surface.begin_frame(pass.width, pass.height, settings.transparency_key)?;
    for record in &pass.records {
        let Some(clamped) = record.rect.clamp_to(pass.width, pass.height) else {
            continue;
        };
        surface.stroke_rect(clamped, record.color)?;
        if settings.show_labels && !record.label.is_empty() {
            surface.draw_label(
                clamped.x,
                clamped.y - LABEL_OFFSET_PX,
                &record.label,
                record.color,
            )?;
        }
    }
    surface.present()
}
