/*!
 * Crop composition.
 */

use serde::Serialize;

use crate::app_config::CropConfig;
use crate::errors::SegmentFailure;

/// Pixels removed from each edge of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
    pub min_width: u32,
    pub min_height: u32,
}

/// Resulting crop window, ready for the `crop=w:h:x:y` filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropBox {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropBox {
    pub fn filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

impl CropRect {
    /// `None` when cropping is disabled or removes nothing
    pub fn from_config(config: &CropConfig) -> Option<Self> {
        let removes_something = config.top + config.bottom + config.left + config.right > 0;
        (config.enabled && removes_something).then_some(Self {
            top: config.top,
            bottom: config.bottom,
            left: config.left,
            right: config.right,
            min_width: config.min_width,
            min_height: config.min_height,
        })
    }

    /// Compute the crop window for a `source_w` x `source_h` frame, refusing
    /// windows smaller than the configured minimum
    pub fn apply(&self, source_w: u32, source_h: u32) -> Result<CropBox, SegmentFailure> {
        let width = i64::from(source_w) - i64::from(self.left) - i64::from(self.right);
        let height = i64::from(source_h) - i64::from(self.top) - i64::from(self.bottom);

        if width < i64::from(self.min_width) || height < i64::from(self.min_height) {
            return Err(SegmentFailure::CropTooAggressive {
                width,
                height,
                min_width: self.min_width,
                min_height: self.min_height,
            });
        }

        Ok(CropBox {
            width: width as u32,
            height: height as u32,
            x: self.left,
            y: self.top,
        })
    }
}
