//! Overlay surface collaborator boundary.
//!
//! Window-system integration (layered-window creation, transparency key
//! setup, the actual stroke/text primitives) lives behind these traits.
//! The render loop drives them; it never talks to a windowing API
//! directly. Implementations MUST NOT retain references into engine state:
//! every draw call hands them copies.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

use crate::geometry::{Rect, TargetRegion};
use crate::Rgb;

/// One overlay surface, owned by the render thread for the lifetime of one
/// `start()`/`stop()` cycle. Teardown happens on drop, on the render
/// thread, before the thread signals exit.
pub trait OverlaySurface: Send {
    /// Begin a frame: size the composition buffer to the current region
    /// extent and fill it with the transparency key color.
    fn begin_frame(&mut self, width: u32, height: u32, clear: Rgb) -> Result<()>;

    /// Stroke an unfilled rectangle. `rect` is already clamped into the
    /// frame extent and non-empty.
    fn stroke_rect(&mut self, rect: Rect, color: Rgb) -> Result<()>;

    /// Draw a detection label anchored at `(x, y)` (may be negative when a
    /// box hugs the top edge; implementations clip).
    fn draw_label(&mut self, x: i32, y: i32, text: &str, color: Rgb) -> Result<()>;

    /// Composite the finished frame to the visible surface.
    fn present(&mut self) -> Result<()>;
}

/// Creates surfaces on the render thread. `start()` captures the provider;
/// the surface itself is created and torn down inside the render thread so
/// no window handle ever crosses threads.
pub trait SurfaceProvider: Send + Sync {
    fn create(&self, region: TargetRegion) -> Result<Box<dyn OverlaySurface>>;
}

// -------------------- Stub implementation --------------------

/// A draw call recorded by [`StubSurface`].
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear { width: u32, height: u32, color: Rgb },
    StrokeRect { rect: Rect, color: Rgb },
    Label { x: i32, y: i32, text: String, color: Rgb },
}

/// One presented frame of recorded draw calls.
#[derive(Clone, Debug, Default)]
pub struct StubFrame {
    pub commands: Vec<DrawCommand>,
}

impl StubFrame {
    pub fn stroked_rects(&self) -> Vec<(Rect, Rgb)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::StrokeRect { rect, color } => Some((*rect, *color)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct StubLog {
    frames: Vec<StubFrame>,
    pending: Vec<DrawCommand>,
}

/// Stub surface for tests and demos: records every draw call instead of
/// touching a window system.
pub struct StubSurface {
    log: Arc<Mutex<StubLog>>,
}

impl OverlaySurface for StubSurface {
    fn begin_frame(&mut self, width: u32, height: u32, clear: Rgb) -> Result<()> {
        let mut log = self.log.lock().map_err(|_| anyhow!("stub log lock poisoned"))?;
        log.pending.clear();
        log.pending.push(DrawCommand::Clear {
            width,
            height,
            color: clear,
        });
        Ok(())
    }

    fn stroke_rect(&mut self, rect: Rect, color: Rgb) -> Result<()> {
        let mut log = self.log.lock().map_err(|_| anyhow!("stub log lock poisoned"))?;
        log.pending.push(DrawCommand::StrokeRect { rect, color });
        Ok(())
    }

    fn draw_label(&mut self, x: i32, y: i32, text: &str, color: Rgb) -> Result<()> {
        let mut log = self.log.lock().map_err(|_| anyhow!("stub log lock poisoned"))?;
        log.pending.push(DrawCommand::Label {
            x,
            y,
            text: text.to_string(),
            color,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let mut log = self.log.lock().map_err(|_| anyhow!("stub log lock poisoned"))?;
        let commands = std::mem::take(&mut log.pending);
        log.frames.push(StubFrame { commands });
        Ok(())
    }
}

/// Provider handing out [`StubSurface`]s that all record into one shared
/// log, so a test can keep a handle while the engine owns the provider.
#[derive(Clone, Default)]
pub struct StubSurfaceProvider {
    log: Arc<Mutex<StubLog>>,
    fail_creation: bool,
}

impl StubSurfaceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose `create` always fails, for exercising the
    /// surface-creation error path.
    pub fn failing() -> Self {
        Self {
            log: Arc::default(),
            fail_creation: true,
        }
    }

    /// Snapshot of all frames presented so far.
    pub fn presented_frames(&self) -> Vec<StubFrame> {
        self.log.lock().expect("stub log lock").frames.clone()
    }

    pub fn presented_frame_count(&self) -> usize {
        self.log.lock().expect("stub log lock").frames.len()
    }
}

impl SurfaceProvider for StubSurfaceProvider {
    fn create(&self, region: TargetRegion) -> Result<Box<dyn OverlaySurface>> {
        if self.fail_creation {
            return Err(anyhow!(
                "stub surface creation refused for region {:?}",
                region
            ));
        }
        Ok(Box::new(StubSurface {
            log: Arc::clone(&self.log),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_surface_groups_commands_by_presented_frame() {
        let provider = StubSurfaceProvider::new();
        let mut surface = provider
            .create(TargetRegion::default())
            .expect("stub create");

        surface
            .begin_frame(640, 480, crate::TRANSPARENCY_KEY)
            .unwrap();
        surface
            .stroke_rect(Rect::new(1, 2, 3, 4), Rgb::new(0, 255, 0))
            .unwrap();
        surface.present().unwrap();

        surface
            .begin_frame(640, 480, crate::TRANSPARENCY_KEY)
            .unwrap();
        surface.present().unwrap();

        let frames = provider.presented_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].stroked_rects().len(), 1);
        assert_eq!(frames[1].stroked_rects().len(), 0);
    }

    #[test]
    fn failing_provider_reports_creation_error() {
        let provider = StubSurfaceProvider::failing();
        assert!(provider.create(TargetRegion::default()).is_err());
    }
}
