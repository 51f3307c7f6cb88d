//! Detection overlay engine.
//!
//! This crate maintains a live, thread-safe set of labeled bounding boxes
//! produced by an external perception process and drives an always-on-top
//! transparent overlay that renders them over a designated screen region.
//!
//! # Architecture
//!
//! Two threads share one lock:
//!
//! - The **producer thread** (the embedding application) calls
//!   [`OverlayEngine::upsert_batch`] and the configuration mutators.
//! - The **render thread** (spawned by [`OverlayEngine::start`]) owns the
//!   overlay surface and paints one frame per invalidate signal or timer
//!   tick.
//!
//! The engine enforces these guarantees by construction:
//!
//! 1. **ID uniqueness**: at most one live record per detection ID.
//! 2. **Capacity bound**: the store never holds more records than its
//!    configured capacity, across any interleaving of inserts and resizes.
//! 3. **Batch atomicity**: a render pass only ever observes fully-applied
//!    update batches, never a partially-applied one.
//! 4. **Bounded staleness**: records not refreshed within the timeout are
//!    paused (hidden, not deleted) until the same ID is seen again.
//! 5. **No escaping references**: only copies of detection records cross
//!    the lock boundary; drawing happens with the lock released.
//!
//! # Module Structure
//!
//! - `geometry`: rectangles, target region, IoU, clamping
//! - `store`: detection records and the merge/expiry store
//! - `surface`: overlay surface collaborator traits + stub implementation
//! - `render`: the render-loop thread driver
//! - `engine`: the `OverlayEngine` control surface
//! - `config`: configuration loading (file + environment)

use serde::{Deserialize, Serialize};

pub mod config;
pub mod engine;
pub mod geometry;
pub mod render;
pub mod store;
pub mod surface;

pub use config::OverlayConfig;
pub use engine::OverlayEngine;
pub use geometry::{iou, Rect, TargetRegion};
pub use render::RenderSettings;
pub use store::{
    DetectionRecord, DetectionStore, DetectionUpdate, DEFAULT_CAPACITY, DEFAULT_TIMEOUT_MS,
    IOU_DUPLICATE_THRESHOLD,
};
pub use surface::{DrawCommand, OverlaySurface, StubFrame, StubSurfaceProvider, SurfaceProvider};

/// Maximum label length in bytes. Longer labels are truncated on a char
/// boundary. Matches the 50-byte wire buffer (49 payload bytes + NUL) the
/// overlay protocol has always used.
pub const MAX_LABEL_BYTES: usize = 49;

/// Truncate a label to [`MAX_LABEL_BYTES`] without splitting a character.
pub fn bounded_label(label: &str) -> String {
    if label.len() <= MAX_LABEL_BYTES {
        return label.to_string();
    }
    let mut end = MAX_LABEL_BYTES;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    label[..end].to_string()
}

// -------------------- Color --------------------

/// RGB box/label color.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Bright magenta, the conventional transparency key color.
pub const TRANSPARENCY_KEY: Rgb = Rgb::new(255, 0, 255);

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Encode as a COLORREF (`0x00BBGGRR`), the format window-system
    /// collaborators expect.
    pub fn to_colorref(self) -> u32 {
        (u32::from(self.b) << 16) | (u32::from(self.g) << 8) | u32::from(self.r)
    }

    /// Decode from a COLORREF (`0x00BBGGRR`).
    pub fn from_colorref(value: u32) -> Self {
        Self {
            r: (value & 0xff) as u8,
            g: ((value >> 8) & 0xff) as u8,
            b: ((value >> 16) & 0xff) as u8,
        }
    }
}
