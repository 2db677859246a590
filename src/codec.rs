//! Decode/encode primitive used by the normalizer.
//!
//! The normalizer only needs two things from an image codec: turn file bytes
//! into an 8-bit [`Image`], and turn an [`Image`] back into a baseline JPEG.
//! [`ImageRsCodec`] does both with the `image` crate; hosts with their own
//! codec implement [`RasterCodec`] instead.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType};
use thiserror::Error;

use crate::raster::{Image, ImageFormat};

/// Quality of the single re-encode applied to corrected rasters.
pub const JPEG_QUALITY: u8 = 92;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] BoxError),

    #[error("failed to encode JPEG: {0}")]
    Encode(#[source] BoxError),

    #[error("decoded {width}x{height} raster does not fit in memory")]
    RasterSize { width: u32, height: u32 },
}

/// Converts between encoded bytes and rasters.
pub trait RasterCodec {
    /// Decodes `bytes`, sniffing the container format from the content.
    fn decode(&self, bytes: &[u8]) -> Result<Image, CodecError>;

    /// Encodes `raster` as a baseline JPEG at `quality` (1-100).
    fn encode_jpeg(&self, raster: &Image, quality: u8) -> Result<Vec<u8>, CodecError>;
}

impl<C: RasterCodec + ?Sized> RasterCodec for &C {
    fn decode(&self, bytes: &[u8]) -> Result<Image, CodecError> {
        (**self).decode(bytes)
    }

    fn encode_jpeg(&self, raster: &Image, quality: u8) -> Result<Vec<u8>, CodecError> {
        (**self).encode_jpeg(raster, quality)
    }
}

/// [`RasterCodec`] backed by the `image` crate.
#[derive(Copy, Clone, Debug, Default)]
pub struct ImageRsCodec;

impl ImageRsCodec {
    fn to_raster(decoded: DynamicImage) -> Result<Image, CodecError> {
        let (width, height) = (decoded.width(), decoded.height());
        // JPEG has no alpha; greyscale stays single-channel.
        let (format, samples) = if decoded.color().has_color() {
            (ImageFormat::Rgb, decoded.into_rgb8().into_raw())
        } else {
            (ImageFormat::Gray, decoded.into_luma8().into_raw())
        };
        Image::from_samples(width as usize, height as usize, format, samples)
            .ok_or(CodecError::RasterSize { width, height })
    }
}

impl RasterCodec for ImageRsCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Image, CodecError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|err| CodecError::Decode(Box::new(err)))?;
        Self::to_raster(decoded)
    }

    fn encode_jpeg(&self, raster: &Image, quality: u8) -> Result<Vec<u8>, CodecError> {
        let encode_err = |err| CodecError::Encode(Box::new(err));
        let width = u32::try_from(raster.width()).map_err(encode_err)?;
        let height = u32::try_from(raster.height()).map_err(encode_err)?;
        let color = match raster.format() {
            ImageFormat::Gray => ExtendedColorType::L8,
            ImageFormat::Rgb => ExtendedColorType::Rgb8,
        };

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode(raster.samples(), width, height, color)
            .map_err(|err| CodecError::Encode(Box::new(err)))?;
        Ok(out)
    }
}
