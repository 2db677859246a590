//! Upright/portrait normalization for photographed and scanned essay images.
//!
//! # Pipeline
//!
//! - **EXIF reader** ([`read_orientation_code`]): walks the JPEG marker
//!   segments with a bounds-checked [`ByteView`] and pulls the Orientation tag
//!   out of IFD0. Malformed input always degrades to [`OrientationCode::Normal`].
//! - **Resolver** ([`resolve_transform`]): maps each of the eight codes to a
//!   fixed affine [`TransformDescriptor`].
//! - **Transform** ([`OpApplyTransform`]): one data-driven pixel remap for all
//!   eight corrections.
//! - **Portrait** ([`OpEnforcePortrait`]): a final 90° clockwise turn for
//!   rasters that are still wider than tall.
//! - **Orchestrator** ([`Normalizer`]): decode, correct, re-encode as JPEG at
//!   quality 92, and fall back to the original bytes on any failure.
//!
//! # Example
//!
//! ```
//! use essay_orient::{Normalized, PassThrough, normalize};
//!
//! let pdf = b"%PDF-1.7 ...";
//! let result = normalize(pdf, "application/pdf");
//! assert!(matches!(
//!     result,
//!     Normalized::Unchanged { reason: PassThrough::NotAnImage, .. }
//! ));
//! assert_eq!(result.bytes(), pdf);
//! ```

mod byte_view;
mod codec;
mod exif;
#[doc(hidden)]
pub mod fixtures;
mod normalize;
mod op_apply_transform;
mod op_enforce_portrait;
mod orientation;
mod raster;

pub use crate::byte_view::{ByteView, Endian};
pub use crate::codec::{CodecError, ImageRsCodec, JPEG_QUALITY, RasterCodec};
pub use crate::exif::{
    DEFAULT_SCAN_LIMIT, ExifError, ORIENTATION_TAG, is_jpeg_mime, read_orientation_code,
    try_read_orientation,
};
pub use crate::normalize::{
    NormalizeError, Normalized, Normalizer, OUTPUT_MIME_TYPE, PassThrough, SourceBuffer, normalize,
};
pub use crate::op_apply_transform::{OpApplyTransform, TransformError};
pub use crate::op_enforce_portrait::OpEnforcePortrait;
pub use crate::orientation::{
    AffineMatrix, Extent, OrientationCode, TransformDescriptor, resolve_transform,
};
pub use crate::raster::{
    AllocationError, Image, ImageAllocation, ImageFormat, PixelWidthError, Sample,
};
