//! Synthetic rasters and EXIF-tagged JPEGs shared by tests and benches.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::byte_view::Endian;
use crate::codec::{CodecError, ImageRsCodec, JPEG_QUALITY, RasterCodec};
use crate::orientation::OrientationCode;
use crate::raster::{Image, ImageFormat};

pub const BENCH_SIZES: [(usize, usize); 3] = [(640, 480), (1600, 1200), (4032, 3024)];

/// Solid colors painted into the four quadrants of [`quadrant_image`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Quadrant {
    Red,
    Green,
    Blue,
    White,
}

impl Quadrant {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Quadrant::Red => [255, 0, 0],
            Quadrant::Green => [0, 255, 0],
            Quadrant::Blue => [0, 0, 255],
            Quadrant::White => [255, 255, 255],
        }
    }

    /// Recovers the quadrant color from a (possibly lossy) RGB pixel.
    pub fn classify(pixel: &[u8]) -> Option<Quadrant> {
        let high = |v: u8| v > 128;
        match (high(pixel[0]), high(pixel[1]), high(pixel[2])) {
            (true, false, false) => Some(Quadrant::Red),
            (false, true, false) => Some(Quadrant::Green),
            (false, false, true) => Some(Quadrant::Blue),
            (true, true, true) => Some(Quadrant::White),
            _ => None,
        }
    }
}

/// RGB raster with red, green, blue and white quadrants (top-left,
/// top-right, bottom-left, bottom-right).
pub fn quadrant_image(width: usize, height: usize) -> Image {
    let mut img = Image::from_samples(width, height, ImageFormat::Rgb, vec![0; width * height * 3])
        .expect("sample count matches dimensions");
    let (mid_x, mid_y) = (width / 2, height / 2);
    let quadrants = [
        (0, 0, mid_x, mid_y, Quadrant::Red),
        (mid_x, 0, width, mid_y, Quadrant::Green),
        (0, mid_y, mid_x, height, Quadrant::Blue),
        (mid_x, mid_y, width, height, Quadrant::White),
    ];
    for (x0, y0, x1, y1, quadrant) in quadrants {
        img.fill_rect(x0, y0, x1, y1, &quadrant.rgb())
            .expect("rgb pixel fits an rgb raster");
    }
    img
}

/// Colors found just inside the corners, as `[top-left, top-right,
/// bottom-left, bottom-right]`.
pub fn corner_quadrants(img: &Image) -> [Option<Quadrant>; 4] {
    let inset = 4.min(img.width() / 4).min(img.height() / 4);
    let (right, bottom) = (img.width() - 1 - inset, img.height() - 1 - inset);
    [
        Quadrant::classify(img.pixel(inset, inset)),
        Quadrant::classify(img.pixel(right, inset)),
        Quadrant::classify(img.pixel(inset, bottom)),
        Quadrant::classify(img.pixel(right, bottom)),
    ]
}

/// Gradient raster for benchmarks.
pub fn create_test_image(width: usize, height: usize, format: ImageFormat) -> Image {
    let channels = format.channel_count();
    let mut samples = Vec::with_capacity(width * height * channels);
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                samples.push(((x + y * (c + 1)) % 256) as u8);
            }
        }
    }
    Image::from_samples(width, height, format, samples).expect("sample count matches dimensions")
}

/// TIFF block (header + IFD0 with a single Orientation entry).
///
/// Layout: byte order `0..2`, magic `2..4`, IFD0 offset `4..8`, entry count
/// `8..10`, the entry `10..22` (value at `18..20`), next-IFD offset `22..26`.
pub fn tiff_block(code: OrientationCode, endian: Endian) -> Vec<u8> {
    let u16_bytes = |v: u16| match endian {
        Endian::Little => v.to_le_bytes(),
        Endian::Big => v.to_be_bytes(),
    };
    let u32_bytes = |v: u32| match endian {
        Endian::Little => v.to_le_bytes(),
        Endian::Big => v.to_be_bytes(),
    };

    let mut buf = Vec::with_capacity(26);
    buf.extend_from_slice(match endian {
        Endian::Little => b"II",
        Endian::Big => b"MM",
    });
    buf.extend_from_slice(&u16_bytes(42));
    buf.extend_from_slice(&u32_bytes(8));

    buf.extend_from_slice(&u16_bytes(1));
    // Orientation, type SHORT (3), count 1
    buf.extend_from_slice(&u16_bytes(0x0112));
    buf.extend_from_slice(&u16_bytes(3));
    buf.extend_from_slice(&u32_bytes(1));
    buf.extend_from_slice(&u16_bytes(code.exif_value()));
    buf.extend_from_slice(&[0, 0]);

    buf.extend_from_slice(&u32_bytes(0));
    buf
}

/// Wraps a TIFF block in an APP1 segment (`FF E1`, length, `Exif\0\0`).
pub fn exif_app1_with_tiff(tiff: &[u8]) -> Vec<u8> {
    let length = (2 + 6 + tiff.len()) as u16;
    let mut buf = Vec::with_capacity(2 + length as usize);
    buf.extend_from_slice(&[0xFF, 0xE1]);
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(b"Exif\0\0");
    buf.extend_from_slice(tiff);
    buf
}

/// Minimal EXIF APP1 segment carrying only `code`.
pub fn exif_app1(code: OrientationCode, endian: Endian) -> Vec<u8> {
    exif_app1_with_tiff(&tiff_block(code, endian))
}

/// Inserts `segment` directly after the SOI marker of `jpeg`.
pub fn insert_after_soi(jpeg: &[u8], segment: &[u8]) -> Vec<u8> {
    let split = 2.min(jpeg.len());
    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&jpeg[..split]);
    out.extend_from_slice(segment);
    out.extend_from_slice(&jpeg[split..]);
    out
}

/// Encodes `img` as a JPEG without any EXIF segment.
pub fn encode_jpeg(img: &Image) -> Result<Vec<u8>, CodecError> {
    ImageRsCodec.encode_jpeg(img, JPEG_QUALITY)
}

/// Encodes `img` as a JPEG tagged with `code`.
pub fn tagged_jpeg(
    img: &Image,
    code: OrientationCode,
    endian: Endian,
) -> Result<Vec<u8>, CodecError> {
    Ok(insert_after_soi(&encode_jpeg(img)?, &exif_app1(code, endian)))
}

/// Encodes `img` as a PNG.
pub fn encode_png(img: &Image) -> Result<Vec<u8>, CodecError> {
    let color = match img.format() {
        ImageFormat::Gray => ExtendedColorType::L8,
        ImageFormat::Rgb => ExtendedColorType::Rgb8,
    };
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.samples(), img.width() as u32, img.height() as u32, color)
        .map_err(|err| CodecError::Encode(Box::new(err)))?;
    Ok(out)
}
