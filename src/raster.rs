//! Decoded raster with row-major 8-bit pixel storage.
//!
//! # Memory Layout
//!
//! Pixels are stored in a flat `Sample` buffer in row-major order:
//!
//! ```text
//! data[y * stride + x * channels + c]
//! ```
//!
//! where `stride = width * channels`.
//!
//! Rasters only live for the duration of a single normalization call, so
//! allocation is fallible: a raster that cannot be allocated is reported as
//! an [`AllocationError`] instead of aborting the process.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use thiserror::Error;

/// 8-bit color sample, the native depth of baseline JPEG.
pub type Sample = u8;

/// Pixel format describing the number and meaning of channels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Gray,
    Rgb,
}

impl ImageFormat {
    /// Returns the number of channels for this format.
    pub fn channel_count(self) -> usize {
        match self {
            ImageFormat::Gray => 1,
            ImageFormat::Rgb => 3,
        }
    }
}

/// Allocation strategy for raster pixel buffers.
///
/// The default uses transparent huge pages on Linux and standard pages
/// elsewhere. `HugePages` is best-effort: it falls back to standard pages if the OS
/// cannot satisfy the request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageAllocation {
    Standard,
    HugePages,
}

impl Default for ImageAllocation {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            ImageAllocation::HugePages
        } else {
            ImageAllocation::Standard
        }
    }
}

/// A raster could not be allocated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("raster dimensions {width}x{height} overflow the address space")]
    Overflow { width: usize, height: usize },

    #[error("failed to allocate {bytes} bytes for a {width}x{height} raster")]
    OutOfMemory {
        width: usize,
        height: usize,
        bytes: usize,
    },
}

/// A pixel value does not match the raster's channel count.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("pixel has {actual} samples, raster expects {expected}")]
pub struct PixelWidthError {
    pub expected: usize,
    pub actual: usize,
}

/// Internal buffer that can be backed by standard pages or OS huge pages.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) enum ImageBuffer {
    Vec(Vec<Sample>),
    Mmap {
        ptr: NonNull<Sample>,
        len: usize,
        bytes: usize,
    },
}

// The mapping is exclusively owned and only reachable through `&`/`&mut`.
unsafe impl Send for ImageBuffer {}
unsafe impl Sync for ImageBuffer {}

impl ImageBuffer {
    fn empty() -> Self {
        ImageBuffer::Vec(Vec::new())
    }

    /// Allocates a zeroed buffer, returning `None` if the heap refuses.
    fn try_new(len: usize, allocation: ImageAllocation) -> Option<Self> {
        if len == 0 {
            return Some(ImageBuffer::empty());
        }
        if allocation == ImageAllocation::HugePages {
            if let Some(buffer) = try_huge_pages(len) {
                return Some(buffer);
            }
        }
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        data.resize(len, 0);
        Some(ImageBuffer::Vec(data))
    }

    pub(crate) fn as_slice(&self) -> &[Sample] {
        match self {
            ImageBuffer::Vec(data) => data.as_slice(),
            ImageBuffer::Mmap { ptr, len, .. } => unsafe {
                slice::from_raw_parts(ptr.as_ptr(), *len)
            },
        }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Sample] {
        match self {
            ImageBuffer::Vec(data) => data.as_mut_slice(),
            ImageBuffer::Mmap { ptr, len, .. } => unsafe {
                slice::from_raw_parts_mut(ptr.as_ptr(), *len)
            },
        }
    }
}

impl Deref for ImageBuffer {
    type Target = [Sample];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for ImageBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageBuffer::Vec(data) => write!(f, "Vec({} samples)", data.len()),
            ImageBuffer::Mmap { len, bytes, .. } => {
                write!(f, "Mmap({len} samples, {bytes} bytes mapped)")
            }
        }
    }
}

#[cfg(target_os = "linux")]
impl Drop for ImageBuffer {
    fn drop(&mut self) {
        if let ImageBuffer::Mmap { ptr, bytes, .. } = self {
            // SAFETY: `ptr` and `bytes` describe a mapping this buffer owns.
            unsafe {
                libc::munmap(ptr.as_ptr().cast(), *bytes);
            }
        }
    }
}

/// Rasters below this size stay on the regular heap.
#[cfg(target_os = "linux")]
const HUGE_PAGE_MIN_BYTES: usize = 2 * 1024 * 1024;

/// Maps an anonymous region and asks for transparent huge pages.
///
/// Returns `None` for small rasters and whenever the kernel refuses, in which
/// case the caller falls back to a `Vec`. Fresh anonymous mappings are zeroed.
#[cfg(target_os = "linux")]
fn try_huge_pages(len: usize) -> Option<ImageBuffer> {
    if len < HUGE_PAGE_MIN_BYTES {
        return None;
    }
    // SAFETY: sysconf has no preconditions.
    let page = match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => 4096,
    };
    let bytes = len.checked_next_multiple_of(page)?;

    // SAFETY: a private anonymous mapping aliases no existing memory.
    let region = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            bytes,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if region == libc::MAP_FAILED {
        return None;
    }
    let Some(ptr) = NonNull::new(region.cast::<Sample>()) else {
        // SAFETY: unmaps the region created above.
        unsafe {
            libc::munmap(region, bytes);
        }
        return None;
    };
    // Advisory only: the mapping is usable whether or not THP is enabled.
    // SAFETY: `region` is the mapping created above.
    unsafe {
        libc::madvise(region, bytes, libc::MADV_HUGEPAGE);
    }
    Some(ImageBuffer::Mmap { ptr, len, bytes })
}

#[cfg(not(target_os = "linux"))]
fn try_huge_pages(_len: usize) -> Option<ImageBuffer> {
    None
}

/// A 2D raster stored as a flat array of 8-bit samples in row-major order.
///
/// Pixel data is stored contiguously: `data[y * stride + x * channels + c]` where
/// `stride = width * channels`. Freshly allocated rasters are zero-filled.
#[derive(Debug)]
pub struct Image {
    width: usize,
    height: usize,
    format: ImageFormat,
    allocation: ImageAllocation,
    pub(crate) data: ImageBuffer,
}

impl Image {
    /// Allocates a zero-filled raster with the platform default allocation.
    pub fn try_new(
        width: usize,
        height: usize,
        format: ImageFormat,
    ) -> Result<Self, AllocationError> {
        Self::try_with_allocation(width, height, format, ImageAllocation::default())
    }

    /// Allocates a zero-filled raster with a specific allocation strategy.
    pub fn try_with_allocation(
        width: usize,
        height: usize,
        format: ImageFormat,
        allocation: ImageAllocation,
    ) -> Result<Self, AllocationError> {
        let len = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(format.channel_count()))
            .ok_or(AllocationError::Overflow { width, height })?;
        let data = ImageBuffer::try_new(len, allocation).ok_or(AllocationError::OutOfMemory {
            width,
            height,
            bytes: len,
        })?;
        Ok(Self {
            width,
            height,
            format,
            allocation,
            data,
        })
    }

    /// Wraps interleaved samples produced by a decoder.
    ///
    /// Returns `None` when `samples` does not hold exactly
    /// `width * height * channels` values.
    pub fn from_samples(
        width: usize,
        height: usize,
        format: ImageFormat,
        samples: Vec<Sample>,
    ) -> Option<Self> {
        let expected = width
            .checked_mul(height)?
            .checked_mul(format.channel_count())?;
        if samples.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            format,
            allocation: ImageAllocation::Standard,
            data: ImageBuffer::Vec(samples),
        })
    }

    /// Returns the pixel format.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Returns the allocation strategy.
    pub fn allocation(&self) -> ImageAllocation {
        self.allocation
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns true when `height >= width`.
    pub fn is_portrait(&self) -> bool {
        self.height >= self.width
    }

    /// Returns the number of channels per pixel.
    pub fn channels(&self) -> usize {
        self.format.channel_count()
    }

    /// Returns the row stride in samples (width * channels).
    pub fn stride(&self) -> usize {
        self.width * self.channels()
    }

    /// Returns every sample in row-major order.
    pub fn samples(&self) -> &[Sample] {
        self.data.as_slice()
    }

    /// Returns the samples for row `y`.
    pub fn row(&self, y: usize) -> &[Sample] {
        let stride = self.stride();
        let start = y * stride;
        &self.data[start..start + stride]
    }

    /// Returns mutable samples for row `y`.
    pub fn row_mut(&mut self, y: usize) -> &mut [Sample] {
        let stride = self.stride();
        let start = y * stride;
        &mut self.data[start..start + stride]
    }

    /// Returns the samples for the pixel at (x, y).
    pub fn pixel(&self, x: usize, y: usize) -> &[Sample] {
        let channels = self.channels();
        let start = y * self.stride() + x * channels;
        &self.data[start..start + channels]
    }

    /// Returns mutable samples for the pixel at (x, y).
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [Sample] {
        let channels = self.channels();
        let start = y * self.stride() + x * channels;
        &mut self.data[start..start + channels]
    }

    /// Fills the rectangle `[x0, x1) x [y0, y1)` with one pixel value.
    ///
    /// Coordinates are clamped to the raster. Fails without writing anything
    /// when `pixel` does not hold exactly `channels()` samples.
    pub fn fill_rect(
        &mut self,
        x0: usize,
        y0: usize,
        x1: usize,
        y1: usize,
        pixel: &[Sample],
    ) -> Result<(), PixelWidthError> {
        let channels = self.channels();
        if pixel.len() != channels {
            return Err(PixelWidthError {
                expected: channels,
                actual: pixel.len(),
            });
        }
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        for y in y0.min(y1)..y1 {
            let row = self.row_mut(y);
            for x in x0.min(x1)..x1 {
                row[x * channels..(x + 1) * channels].copy_from_slice(pixel);
            }
        }
        Ok(())
    }
}
