//! Final quarter turn for rasters that are still landscape.

use crate::op_apply_transform::{OpApplyTransform, TransformError};
use crate::orientation::OrientationCode;
use crate::raster::{Image, ImageAllocation};

/// Rotates a landscape raster 90° clockwise; portrait and square rasters
/// pass through untouched.
#[derive(Copy, Clone, Debug, Default)]
pub struct OpEnforcePortrait {
    allocation: Option<ImageAllocation>,
}

impl OpEnforcePortrait {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_allocation(&mut self, allocation: ImageAllocation) -> &mut Self {
        self.allocation = Some(allocation);
        self
    }

    /// Returns true when [`apply`](Self::apply) would rotate `img`.
    pub fn needs_rotation(&self, img: &Image) -> bool {
        img.width() > img.height()
    }

    /// Takes ownership so the common portrait case costs nothing.
    pub fn apply(&self, img: Image) -> Result<Image, TransformError> {
        if !self.needs_rotation(&img) {
            return Ok(img);
        }
        let mut rotate = OpApplyTransform::from_code(OrientationCode::Rotate90Cw);
        if let Some(allocation) = self.allocation {
            rotate.set_allocation(allocation);
        }
        rotate.apply(&img)
    }
}
