//! Best-effort upright/portrait normalization of uploaded images.
//!
//! # Pipeline
//!
//! 1. Inputs whose MIME type is not `image/*` pass through untouched.
//! 2. The bytes are decoded to a raster; undecodable inputs pass through.
//! 3. The EXIF orientation is read (JPEG only, anything else is `Normal`).
//! 4. If no correction is needed and the image is already portrait or
//!    square, the original bytes are returned without re-encoding.
//! 5. Otherwise the EXIF correction is applied, a still-landscape raster is
//!    turned 90° clockwise, and the result is re-encoded as JPEG at
//!    [`JPEG_QUALITY`].
//!
//! Every failure after step 1 degrades to returning the original bytes, so
//! [`Normalizer::normalize`] always yields a usable buffer. The branch taken
//! is reported through [`Normalized`] and [`PassThrough`].

use std::borrow::Cow;

use thiserror::Error;

use crate::codec::{CodecError, ImageRsCodec, JPEG_QUALITY, RasterCodec};
use crate::exif::{DEFAULT_SCAN_LIMIT, read_orientation_code};
use crate::op_apply_transform::{OpApplyTransform, TransformError};
use crate::op_enforce_portrait::OpEnforcePortrait;
use crate::orientation::OrientationCode;
use crate::raster::ImageAllocation;

/// MIME type of every corrected output.
pub const OUTPUT_MIME_TYPE: &str = "image/jpeg";

/// Smallest scan window accepted; it covers the SOI marker and one marker header.
const MIN_SCAN_LIMIT: usize = 4;

/// Caller-owned input: file bytes plus the MIME type the picker declared.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceBuffer<'a> {
    pub bytes: &'a [u8],
    pub mime_type: &'a str,
}

impl<'a> SourceBuffer<'a> {
    pub fn new(bytes: &'a [u8], mime_type: &'a str) -> Self {
        Self { bytes, mime_type }
    }

    /// True when the declared type starts with `image/` (ASCII case-insensitive).
    pub fn is_image(&self) -> bool {
        self.mime_type
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
    }
}

/// A correction step failed; the original bytes were passed through.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("decode failed: {0}")]
    Decode(#[source] CodecError),

    #[error("orientation transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("re-encode failed: {0}")]
    Encode(#[source] CodecError),
}

/// Why the original bytes were returned.
#[derive(Debug)]
pub enum PassThrough {
    /// The declared MIME type is not `image/*`.
    NotAnImage,
    /// Orientation is normal and the image is already portrait or square.
    AlreadyUpright,
    Failed(NormalizeError),
}

/// Outcome of a normalization: always a usable byte buffer.
#[derive(Debug)]
pub enum Normalized<'a> {
    Unchanged {
        source: SourceBuffer<'a>,
        reason: PassThrough,
    },
    Corrected {
        bytes: Vec<u8>,
        /// Orientation read from the input.
        orientation: OrientationCode,
        width: usize,
        height: usize,
    },
}

impl<'a> Normalized<'a> {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Normalized::Unchanged { source, .. } => source.bytes,
            Normalized::Corrected { bytes, .. } => bytes,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            Normalized::Unchanged { source, .. } => source.mime_type,
            Normalized::Corrected { .. } => OUTPUT_MIME_TYPE,
        }
    }

    pub fn is_corrected(&self) -> bool {
        matches!(self, Normalized::Corrected { .. })
    }

    /// Returns the pass-through reason, or `None` for corrected output.
    pub fn pass_through(&self) -> Option<&PassThrough> {
        match self {
            Normalized::Unchanged { reason, .. } => Some(reason),
            Normalized::Corrected { .. } => None,
        }
    }

    /// Splits into `(bytes, mime_type)`, borrowing when nothing changed.
    pub fn into_parts(self) -> (Cow<'a, [u8]>, Cow<'a, str>) {
        match self {
            Normalized::Unchanged { source, .. } => {
                (Cow::Borrowed(source.bytes), Cow::Borrowed(source.mime_type))
            }
            Normalized::Corrected { bytes, .. } => {
                (Cow::Owned(bytes), Cow::Borrowed(OUTPUT_MIME_TYPE))
            }
        }
    }
}

/// Normalizes image orientation.
///
/// Holds only immutable configuration, so one instance can serve many
/// threads at once.
#[derive(Clone, Debug)]
pub struct Normalizer<C = ImageRsCodec> {
    codec: C,
    scan_limit: usize,
    allocation: ImageAllocation,
}

impl Default for Normalizer<ImageRsCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer<ImageRsCodec> {
    pub fn new() -> Self {
        Self::with_codec(ImageRsCodec)
    }
}

impl<C: RasterCodec> Normalizer<C> {
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            scan_limit: DEFAULT_SCAN_LIMIT,
            allocation: ImageAllocation::default(),
        }
    }

    /// Sets how many leading bytes the EXIF reader may scan.
    pub fn set_scan_limit(&mut self, bytes: usize) -> &mut Self {
        self.scan_limit = bytes.max(MIN_SCAN_LIMIT);
        self
    }

    /// Sets the allocation strategy for intermediate rasters.
    pub fn set_allocation(&mut self, allocation: ImageAllocation) -> &mut Self {
        self.allocation = allocation;
        self
    }

    pub fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    pub fn allocation(&self) -> ImageAllocation {
        self.allocation
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Normalizes `bytes` declared as `mime_type`. Never fails.
    pub fn normalize<'a>(&self, bytes: &'a [u8], mime_type: &'a str) -> Normalized<'a> {
        self.normalize_source(SourceBuffer::new(bytes, mime_type))
    }

    pub fn normalize_source<'a>(&self, source: SourceBuffer<'a>) -> Normalized<'a> {
        if !source.is_image() {
            log::debug!("passing through non-image input ({})", source.mime_type);
            return Normalized::Unchanged {
                source,
                reason: PassThrough::NotAnImage,
            };
        }

        match self.correct(source) {
            Ok(Some(corrected)) => corrected,
            Ok(None) => {
                log::debug!("image already upright, keeping original bytes");
                Normalized::Unchanged {
                    source,
                    reason: PassThrough::AlreadyUpright,
                }
            }
            Err(err) => {
                log::warn!(
                    "orientation correction failed for {} input of {} bytes, keeping original: {err}",
                    source.mime_type,
                    source.bytes.len()
                );
                Normalized::Unchanged {
                    source,
                    reason: PassThrough::Failed(err),
                }
            }
        }
    }

    /// Runs the pipeline; `Ok(None)` means no correction is needed.
    fn correct<'a>(
        &self,
        source: SourceBuffer<'a>,
    ) -> Result<Option<Normalized<'a>>, NormalizeError> {
        let raster = self
            .codec
            .decode(source.bytes)
            .map_err(NormalizeError::Decode)?;
        let orientation = read_orientation_code(source.bytes, source.mime_type, self.scan_limit);

        let (effective_w, effective_h) =
            orientation.effective_dimensions(raster.width(), raster.height());
        if orientation.is_identity() && effective_w <= effective_h {
            return Ok(None);
        }

        let oriented = if orientation.is_identity() {
            raster
        } else {
            let mut transform = OpApplyTransform::from_code(orientation);
            transform.set_allocation(self.allocation);
            transform.apply(&raster)?
        };

        let mut enforce = OpEnforcePortrait::new();
        enforce.set_allocation(self.allocation);
        let upright = enforce.apply(oriented)?;

        let bytes = self
            .codec
            .encode_jpeg(&upright, JPEG_QUALITY)
            .map_err(NormalizeError::Encode)?;

        log::debug!(
            "corrected orientation {} to {}x{} ({} -> {} bytes)",
            orientation.exif_value(),
            upright.width(),
            upright.height(),
            source.bytes.len(),
            bytes.len()
        );
        Ok(Some(Normalized::Corrected {
            bytes,
            orientation,
            width: upright.width(),
            height: upright.height(),
        }))
    }
}

/// Normalizes with the default [`Normalizer`].
pub fn normalize<'a>(bytes: &'a [u8], mime_type: &'a str) -> Normalized<'a> {
    Normalizer::new().normalize(bytes, mime_type)
}
