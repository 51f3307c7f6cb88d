//! Rectangles, the overlay target region, and the IoU duplicate heuristic.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixels, top-left origin.
///
/// Zero (or negative) extents are representable; such rectangles have zero
/// area and are never drawn.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width.max(0)) * i64::from(self.height.max(0))
    }

    fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Area of the intersection with `other`, zero when disjoint.
    pub fn intersection_area(&self, other: &Rect) -> i64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        i64::from((x2 - x1).max(0)) * i64::from((y2 - y1).max(0))
    }

    /// Clamp this rectangle into `[0, width] x [0, height]`.
    ///
    /// Returns `None` when nothing remains to draw (the clamped extent is
    /// empty, including the zero-area-record case).
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let max_x = width.min(i32::MAX as u32) as i32;
        let max_y = height.min(i32::MAX as u32) as i32;
        let x1 = self.x.clamp(0, max_x);
        let y1 = self.y.clamp(0, max_y);
        let x2 = self.right().clamp(0, max_x);
        let y2 = self.bottom().clamp(0, max_y);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Producer-side sanitation: clamp corners into the monitor bounds and
    /// force a minimum 1-pixel extent so downstream consumers never see an
    /// inverted box.
    pub fn sanitize(x1: i32, y1: i32, x2: i32, y2: i32, width: u32, height: u32) -> Rect {
        let max_x = width.min(i32::MAX as u32) as i32;
        let max_y = height.min(i32::MAX as u32) as i32;
        let x1 = x1.clamp(0, max_x);
        let y1 = y1.clamp(0, max_y);
        let mut x2 = x2.clamp(0, max_x);
        let mut y2 = y2.clamp(0, max_y);
        if x2 <= x1 {
            x2 = x1 + 1;
        }
        if y2 <= y1 {
            y2 = y1 + 1;
        }
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }
}

/// Intersection-over-Union duplicate heuristic.
///
/// `union = areaA + areaB - intersection`; a zero union yields 0.0 so two
/// degenerate rectangles never count as duplicates of each other.
pub fn iou(a: &Rect, b: &Rect) -> f32 {
    let intersection = a.intersection_area(b);
    let union = a.area() + b.area() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

// -------------------- Target region --------------------

/// Screen rectangle the overlay surface is positioned over and sized to
/// match. Mutated only through the control surface, read once per paint.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetRegion {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Default for TargetRegion {
    fn default() -> Self {
        // Historical default monitor rect; embedders override it.
        Self::new(0, 0, 2560, 1440)
    }
}

impl TargetRegion {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top).max(0) as u32
    }

    /// A region is drawable only when it spans at least one pixel on both
    /// axes.
    pub fn is_valid(&self) -> bool {
        self.right > self.left && self.bottom > self.top
    }
}
