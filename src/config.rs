//! Engine configuration.
//!
//! Defaults, then an optional JSON config file named by `OVERLAY_CONFIG`,
//! then environment overrides, then validation. Invalid values fail
//! loading with a diagnostic rather than silently degrading.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::geometry::TargetRegion;
use crate::store::{DEFAULT_CAPACITY, DEFAULT_TIMEOUT_MS, IOU_DUPLICATE_THRESHOLD};
use crate::{Rgb, TRANSPARENCY_KEY};

const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    capacity: Option<usize>,
    timeout_ms: Option<u64>,
    frame_interval_ms: Option<u64>,
    iou_threshold: Option<f32>,
    show_labels: Option<bool>,
    transparency_key: Option<Rgb>,
    region: Option<TargetRegion>,
}

/// Resolved engine configuration.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Maximum number of stored detections.
    pub capacity: usize,
    /// Staleness timeout before a detection is paused.
    pub timeout_ms: u64,
    /// Paint-due interval for the render pump.
    pub frame_interval: Duration,
    /// IoU above which a new-ID detection is discarded as a duplicate.
    pub iou_threshold: f32,
    /// Draw labels above boxes.
    pub show_labels: bool,
    /// Transparency key the composition buffer is cleared to.
    pub transparency_key: Rgb,
    /// Screen placement of the overlay.
    pub region: TargetRegion,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            iou_threshold: IOU_DUPLICATE_THRESHOLD,
            show_labels: true,
            transparency_key: TRANSPARENCY_KEY,
            region: TargetRegion::default(),
        }
    }
}

impl OverlayConfig {
    /// Load configuration: defaults, then the `OVERLAY_CONFIG` file when
    /// set, then environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("OVERLAY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlayConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            capacity: file.capacity.unwrap_or(defaults.capacity),
            timeout_ms: file.timeout_ms.unwrap_or(defaults.timeout_ms),
            frame_interval: file
                .frame_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.frame_interval),
            iou_threshold: file.iou_threshold.unwrap_or(defaults.iou_threshold),
            show_labels: file.show_labels.unwrap_or(defaults.show_labels),
            transparency_key: file.transparency_key.unwrap_or(defaults.transparency_key),
            region: file.region.unwrap_or(defaults.region),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(capacity) = std::env::var("OVERLAY_CAPACITY") {
            self.capacity = capacity
                .parse()
                .map_err(|_| anyhow!("OVERLAY_CAPACITY must be an integer"))?;
        }
        if let Ok(timeout) = std::env::var("OVERLAY_TIMEOUT_MS") {
            self.timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("OVERLAY_TIMEOUT_MS must be an integer number of ms"))?;
        }
        if let Ok(interval) = std::env::var("OVERLAY_FRAME_INTERVAL_MS") {
            let ms: u64 = interval
                .parse()
                .map_err(|_| anyhow!("OVERLAY_FRAME_INTERVAL_MS must be an integer number of ms"))?;
            self.frame_interval = Duration::from_millis(ms);
        }
        if let Ok(threshold) = std::env::var("OVERLAY_IOU_THRESHOLD") {
            self.iou_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("OVERLAY_IOU_THRESHOLD must be a float"))?;
        }
        if let Ok(show) = std::env::var("OVERLAY_SHOW_LABELS") {
            self.show_labels = match show.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => return Err(anyhow!("OVERLAY_SHOW_LABELS must be a boolean, got '{other}'")),
            };
        }
        if let Ok(region) = std::env::var("OVERLAY_REGION") {
            self.region = parse_region(&region)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(anyhow!("capacity must be greater than zero"));
        }
        if self.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be greater than zero"));
        }
        if self.frame_interval.is_zero() {
            return Err(anyhow!("frame_interval_ms must be greater than zero"));
        }
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err(anyhow!(
                "iou_threshold must be in (0, 1], got {}",
                self.iou_threshold
            ));
        }
        if !self.region.is_valid() {
            return Err(anyhow!("region must span at least one pixel on both axes"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<OverlayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

/// Parse `left,top,right,bottom`.
fn parse_region(value: &str) -> Result<TargetRegion> {
    let parts: Vec<i32> = value
        .split(',')
        .map(|part| part.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|_| anyhow!("OVERLAY_REGION must be 'left,top,right,bottom'"))?;
    let &[left, top, right, bottom] = parts.as_slice() else {
        return Err(anyhow!(
            "OVERLAY_REGION must have exactly four components, got {}",
            parts.len()
        ));
    };
    Ok(TargetRegion::new(left, top, right, bottom))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = OverlayConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.capacity, 100);
        assert_eq!(cfg.timeout_ms, 2000);
        assert_eq!(cfg.transparency_key, TRANSPARENCY_KEY);
    }

    #[test]
    fn region_string_parses_and_rejects_garbage() {
        let region = parse_region("0, 0, 1920, 1080").expect("parse");
        assert_eq!(region, TargetRegion::new(0, 0, 1920, 1080));

        assert!(parse_region("1,2,3").is_err());
        assert!(parse_region("a,b,c,d").is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut cfg = OverlayConfig::default();
        cfg.capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = OverlayConfig::default();
        cfg.iou_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = OverlayConfig::default();
        cfg.region = TargetRegion::new(10, 10, 10, 500);
        assert!(cfg.validate().is_err());
    }
}
