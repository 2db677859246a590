//! Orientation correction by exact pixel remapping.
//!
//! All eight corrections run through one routine: the descriptor's affine
//! matrix is resolved against the source extent and every source pixel is
//! blitted, scanline by scanline, to the destination index the matrix gives
//! for its center. No interpolation is involved, so the result is lossless.

use thiserror::Error;

use crate::orientation::{OrientationCode, TransformDescriptor, resolve_transform};
use crate::raster::{AllocationError, Image, ImageAllocation, ImageFormat};

/// The corrected raster could not be produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("destination is {actual:?}, expected {expected:?}")]
    DestinationSize {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("destination format {actual:?} differs from source format {expected:?}")]
    DestinationFormat {
        expected: ImageFormat,
        actual: ImageFormat,
    },

    #[error("source pixel ({x}, {y}) maps outside the destination")]
    OutOfBounds { x: usize, y: usize },
}

/// Applies the correction for one orientation code to a raster.
#[derive(Copy, Clone, Debug)]
pub struct OpApplyTransform {
    descriptor: TransformDescriptor,
    allocation: Option<ImageAllocation>,
}

impl Default for OpApplyTransform {
    fn default() -> Self {
        Self::from_code(OrientationCode::Normal)
    }
}

impl OpApplyTransform {
    pub fn new(descriptor: TransformDescriptor) -> Self {
        Self {
            descriptor,
            allocation: None,
        }
    }

    pub fn from_code(code: OrientationCode) -> Self {
        Self::new(resolve_transform(code))
    }

    pub fn set_descriptor(&mut self, descriptor: TransformDescriptor) -> &mut Self {
        self.descriptor = descriptor;
        self
    }

    /// Overrides the allocation strategy of rasters returned by
    /// [`apply`](Self::apply). By default they are allocated like the source.
    pub fn set_allocation(&mut self, allocation: ImageAllocation) -> &mut Self {
        self.allocation = Some(allocation);
        self
    }

    pub fn descriptor(&self) -> TransformDescriptor {
        self.descriptor
    }

    pub fn compute_output_dimensions(&self, src: &Image) -> (usize, usize) {
        self.descriptor.output_dimensions(src.width(), src.height())
    }

    /// Returns a new corrected raster.
    pub fn apply(&self, src: &Image) -> Result<Image, TransformError> {
        let (out_w, out_h) = self.compute_output_dimensions(src);
        let allocation = self.allocation.unwrap_or(src.allocation());
        let mut dst = Image::try_with_allocation(out_w, out_h, src.format(), allocation)?;
        self.apply_to_preallocated(src, &mut dst)?;
        Ok(dst)
    }

    /// Writes the corrected raster into `dst`, which must already have the
    /// output dimensions and the source format.
    pub fn apply_to_preallocated(
        &self,
        src: &Image,
        dst: &mut Image,
    ) -> Result<(), TransformError> {
        let expected = self.compute_output_dimensions(src);
        let actual = (dst.width(), dst.height());
        if expected != actual {
            return Err(TransformError::DestinationSize { expected, actual });
        }
        if src.format() != dst.format() {
            return Err(TransformError::DestinationFormat {
                expected: src.format(),
                actual: dst.format(),
            });
        }

        if self.descriptor.is_identity() {
            dst.data.copy_from_slice(&src.data);
            return Ok(());
        }

        let matrix = self.descriptor.matrix(src.width(), src.height());
        let channels = src.channels();
        let (out_w, out_h) = expected;
        let out_stride = dst.stride();

        for y in 0..src.height() {
            let row = src.row(y);
            for x in 0..src.width() {
                let (dx, dy) = matrix
                    .map_pixel(x, y)
                    .filter(|&(dx, dy)| dx < out_w && dy < out_h)
                    .ok_or(TransformError::OutOfBounds { x, y })?;
                let start = dy * out_stride + dx * channels;
                dst.data[start..start + channels]
                    .copy_from_slice(&row[x * channels..(x + 1) * channels]);
            }
        }
        Ok(())
    }
}
