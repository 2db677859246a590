//! EXIF orientation reader for JPEG byte streams.
//!
//! Walks the marker segments at the head of a JPEG, finds the EXIF APP1
//! segment, and scans IFD0 of its TIFF structure for the Orientation tag
//! (`0x0112`). No image decoding is involved.
//!
//! ```text
//! FFD8 | FFxx len payload | ... | FFE1 len "Exif\0\0" | TIFF header | IFD0 ...
//!                                                     ^ offsets are relative to here
//! ```
//!
//! Only the first [`DEFAULT_SCAN_LIMIT`] bytes are inspected by default. Any
//! structural problem yields [`OrientationCode::Normal`] from
//! [`read_orientation_code`]; [`try_read_orientation`] reports the reason.

use thiserror::Error;

use crate::byte_view::{ByteView, Endian};
use crate::orientation::OrientationCode;

/// Default number of leading bytes scanned for the EXIF segment.
pub const DEFAULT_SCAN_LIMIT: usize = 128 * 1024;

/// TIFF tag id of the Orientation entry.
pub const ORIENTATION_TAG: u16 = 0x0112;

const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP1: u8 = 0xE1;
const TEM: u8 = 0x01;
const RST0: u8 = 0xD0;
const RST7: u8 = 0xD7;

const EXIF_SIGNATURE: &[u8; 6] = b"Exif\0\0";
const TIFF_LITTLE_ENDIAN: u16 = 0x4949;
const TIFF_BIG_ENDIAN: u16 = 0x4D4D;
const TIFF_MAGIC: u16 = 42;
const IFD_ENTRY_LEN: usize = 12;

/// Why no orientation could be read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExifError {
    #[error("declared type {0:?} is not JPEG")]
    NotJpegMime(String),

    #[error("missing JPEG SOI marker")]
    MissingSoi,

    #[error("read of {needed} bytes at offset {offset} exceeds {available} available bytes")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("expected a marker at offset {offset}, found byte 0x{byte:02x}")]
    BadMarker { offset: usize, byte: u8 },

    #[error("segment at offset {offset} declares invalid length {length}")]
    BadSegmentLength { offset: usize, length: u16 },

    #[error("reached marker 0x{0:02x} before any EXIF segment")]
    NoExifSegment(u8),

    #[error("scan window ended before any EXIF segment")]
    ScanWindowExhausted,

    #[error("APP1 segment does not carry the Exif signature")]
    NotExif,

    #[error("unknown TIFF byte order marker 0x{0:04x}")]
    BadByteOrder(u16),

    #[error("TIFF magic number is {0}, expected 42")]
    BadMagic(u16),

    #[error("IFD0 has no orientation entry")]
    NoOrientationTag,

    #[error("orientation value {0} is outside 1..=8")]
    InvalidOrientation(u16),
}

/// Returns true for the MIME types whose bytes may carry EXIF APP1 segments.
pub fn is_jpeg_mime(mime_type: &str) -> bool {
    ["image/jpeg", "image/jpg", "image/pjpeg"]
        .iter()
        .any(|jpeg| mime_type.eq_ignore_ascii_case(jpeg))
}

/// Reads the orientation code, degrading every failure to `Normal`.
pub fn read_orientation_code(
    bytes: &[u8],
    mime_type: &str,
    scan_limit: usize,
) -> OrientationCode {
    match try_read_orientation(bytes, mime_type, scan_limit) {
        Ok(code) => code,
        Err(err) => {
            log::debug!("no usable EXIF orientation, assuming normal: {err}");
            OrientationCode::Normal
        }
    }
}

/// Reads the orientation code, reporting why it could not be found.
pub fn try_read_orientation(
    bytes: &[u8],
    mime_type: &str,
    scan_limit: usize,
) -> Result<OrientationCode, ExifError> {
    if !is_jpeg_mime(mime_type) {
        return Err(ExifError::NotJpegMime(mime_type.to_owned()));
    }
    let window = &bytes[..bytes.len().min(scan_limit.max(4))];
    let view = ByteView::new(window, Endian::Big);
    let tiff = find_exif_payload(view)?;
    read_ifd0_orientation(tiff)
}

/// Walks marker segments and returns the TIFF block of the EXIF APP1 segment.
fn find_exif_payload(view: ByteView<'_>) -> Result<ByteView<'_>, ExifError> {
    if view.u8_at(0).ok() != Some(MARKER_PREFIX) || view.u8_at(1).ok() != Some(SOI) {
        return Err(ExifError::MissingSoi);
    }

    let mut offset = 2;
    loop {
        if offset >= view.len() {
            return Err(ExifError::ScanWindowExhausted);
        }
        let prefix = view.u8_at(offset)?;
        if prefix != MARKER_PREFIX {
            return Err(ExifError::BadMarker {
                offset,
                byte: prefix,
            });
        }
        let marker = view.u8_at(offset + 1)?;
        match marker {
            // Fill byte: the real marker byte follows.
            MARKER_PREFIX => {
                offset += 1;
                continue;
            }
            SOI | TEM | RST0..=RST7 => {
                offset += 2;
                continue;
            }
            EOI | SOS => return Err(ExifError::NoExifSegment(marker)),
            _ => {}
        }

        let length = view.u16_at(offset + 2)?;
        if length < 2 {
            return Err(ExifError::BadSegmentLength { offset, length });
        }
        let payload_start = offset + 4;
        let segment_end = offset + 2 + length as usize;

        if marker == APP1 {
            let signature = view.bytes(payload_start, EXIF_SIGNATURE.len())?;
            if signature != EXIF_SIGNATURE {
                return Err(ExifError::NotExif);
            }
            let tiff_start = payload_start + EXIF_SIGNATURE.len();
            // An EXIF block longer than the scan window is read up to the window.
            let tiff_end = segment_end.min(view.len());
            let tiff_len = tiff_end.saturating_sub(tiff_start);
            return view.sub_view(tiff_start, tiff_len);
        }

        if segment_end > view.len() {
            return Err(ExifError::Truncated {
                offset,
                needed: length as usize + 2,
                available: view.len() - offset,
            });
        }
        offset = segment_end;
    }
}

/// Parses the TIFF header and scans IFD0 for the orientation entry.
fn read_ifd0_orientation(tiff: ByteView<'_>) -> Result<OrientationCode, ExifError> {
    let endian = match tiff.u16_at(0)? {
        TIFF_LITTLE_ENDIAN => Endian::Little,
        TIFF_BIG_ENDIAN => Endian::Big,
        other => return Err(ExifError::BadByteOrder(other)),
    };
    let tiff = tiff.with_endian(endian);

    let magic = tiff.u16_at(2)?;
    if magic != TIFF_MAGIC {
        return Err(ExifError::BadMagic(magic));
    }

    let ifd0 = tiff.u32_at(4)? as usize;
    let entry_count = tiff.u16_at(ifd0)? as usize;
    let entries_start = ifd0 + 2;

    for index in 0..entry_count {
        let entry = entries_start + index * IFD_ENTRY_LEN;
        // Reading the full entry up front rejects a directory cut short.
        tiff.bytes(entry, IFD_ENTRY_LEN)?;
        if tiff.u16_at(entry)? != ORIENTATION_TAG {
            continue;
        }
        // A single SHORT lives in the first two bytes of the value field.
        let value = tiff.u16_at(entry + 8)?;
        return OrientationCode::from_exif(value).ok_or(ExifError::InvalidOrientation(value));
    }

    Err(ExifError::NoOrientationTag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{exif_app1, exif_app1_with_tiff, tiff_block};

    fn jpeg_with(segments: &[&[u8]]) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        for segment in segments {
            bytes.extend_from_slice(segment);
        }
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    fn read(bytes: &[u8]) -> Result<OrientationCode, ExifError> {
        try_read_orientation(bytes, "image/jpeg", DEFAULT_SCAN_LIMIT)
    }

    #[test]
    fn test_reads_both_byte_orders() {
        for endian in [Endian::Little, Endian::Big] {
            for code in OrientationCode::ALL {
                let bytes = jpeg_with(&[&exif_app1(code, endian)]);
                assert_eq!(read(&bytes), Ok(code), "{endian:?} {code:?}");
            }
        }
    }

    #[test]
    fn test_skips_earlier_segments_and_fill_bytes() {
        let app0 = [0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00];
        let app1 = exif_app1(OrientationCode::Transverse, Endian::Big);
        let bytes = jpeg_with(&[&app0, &[0xFF, 0xFF], &[0xFF, 0xD0], &app1]);
        assert_eq!(read(&bytes), Ok(OrientationCode::Transverse));
    }

    #[test]
    fn test_non_jpeg_mime_is_not_parsed() {
        let bytes = jpeg_with(&[&exif_app1(OrientationCode::Rotate90Cw, Endian::Little)]);
        assert_eq!(
            try_read_orientation(&bytes, "image/png", DEFAULT_SCAN_LIMIT),
            Err(ExifError::NotJpegMime("image/png".into()))
        );
        assert_eq!(
            read_orientation_code(&bytes, "IMAGE/JPEG", DEFAULT_SCAN_LIMIT),
            OrientationCode::Rotate90Cw
        );
        assert_eq!(
            read_orientation_code(&bytes, "image/png", DEFAULT_SCAN_LIMIT),
            OrientationCode::Normal
        );
    }

    #[test]
    fn test_missing_soi() {
        assert_eq!(read(&[0x89, b'P', b'N', b'G']), Err(ExifError::MissingSoi));
        assert_eq!(read(&[]), Err(ExifError::MissingSoi));
        assert_eq!(read(&[0xFF]), Err(ExifError::MissingSoi));
    }

    #[test]
    fn test_stops_at_start_of_scan() {
        let sos = [0xFF, 0xDA, 0x00, 0x02];
        let app1 = exif_app1(OrientationCode::Rotate180, Endian::Little);
        let bytes = jpeg_with(&[&sos, &app1]);
        assert_eq!(read(&bytes), Err(ExifError::NoExifSegment(0xDA)));
    }

    #[test]
    fn test_non_exif_app1_stops_the_scan() {
        let xmp = [0xFF, 0xE1, 0x00, 0x0A, b'h', b't', b't', b'p', b':', b'/', b'/', b'n'];
        let app1 = exif_app1(OrientationCode::Rotate180, Endian::Little);
        let bytes = jpeg_with(&[&xmp, &app1]);
        assert_eq!(read(&bytes), Err(ExifError::NotExif));
    }

    #[test]
    fn test_bad_segment_length() {
        let bytes = jpeg_with(&[&[0xFF, 0xE0, 0x00, 0x01]]);
        assert!(matches!(
            read(&bytes),
            Err(ExifError::BadSegmentLength { length: 1, .. })
        ));
    }

    #[test]
    fn test_segment_running_past_buffer() {
        let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x40, 0x00, 0x00];
        assert!(matches!(read(&bytes), Err(ExifError::Truncated { .. })));
    }

    #[test]
    fn test_garbage_between_segments() {
        let bytes = vec![0xFF, 0xD8, 0x00, 0x11];
        assert_eq!(
            read(&bytes),
            Err(ExifError::BadMarker {
                offset: 2,
                byte: 0x00
            })
        );
    }

    #[test]
    fn test_bad_tiff_header() {
        let mut tiff = tiff_block(OrientationCode::Rotate90Cw, Endian::Little);
        tiff[0] = b'X';
        let bytes = jpeg_with(&[&exif_app1_with_tiff(&tiff)]);
        assert!(matches!(read(&bytes), Err(ExifError::BadByteOrder(_))));

        let mut tiff = tiff_block(OrientationCode::Rotate90Cw, Endian::Big);
        tiff[3] = 43;
        let bytes = jpeg_with(&[&exif_app1_with_tiff(&tiff)]);
        assert_eq!(read(&bytes), Err(ExifError::BadMagic(43)));
    }

    #[test]
    fn test_ifd0_offset_past_end() {
        let mut tiff = tiff_block(OrientationCode::Rotate90Cw, Endian::Little);
        tiff[4..8].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        let bytes = jpeg_with(&[&exif_app1_with_tiff(&tiff)]);
        assert!(matches!(read(&bytes), Err(ExifError::Truncated { .. })));
    }

    #[test]
    fn test_entry_count_past_end() {
        let mut tiff = tiff_block(OrientationCode::Rotate90Cw, Endian::Big);
        // Claim 500 entries; only one fits inside the segment.
        tiff[8..10].copy_from_slice(&500u16.to_be_bytes());
        // Make the lone entry something other than orientation.
        tiff[10..12].copy_from_slice(&0x010Fu16.to_be_bytes());
        let bytes = jpeg_with(&[&exif_app1_with_tiff(&tiff)]);
        assert!(matches!(read(&bytes), Err(ExifError::Truncated { .. })));
    }

    #[test]
    fn test_out_of_range_value() {
        let mut tiff = tiff_block(OrientationCode::Normal, Endian::Little);
        tiff[18..20].copy_from_slice(&9u16.to_le_bytes());
        let bytes = jpeg_with(&[&exif_app1_with_tiff(&tiff)]);
        assert_eq!(read(&bytes), Err(ExifError::InvalidOrientation(9)));
    }

    #[test]
    fn test_no_orientation_entry() {
        let mut tiff = tiff_block(OrientationCode::Rotate180, Endian::Little);
        tiff[10..12].copy_from_slice(&0x0110u16.to_le_bytes());
        let bytes = jpeg_with(&[&exif_app1_with_tiff(&tiff)]);
        assert_eq!(read(&bytes), Err(ExifError::NoOrientationTag));
    }

    #[test]
    fn test_scan_limit_hides_late_segment() {
        let padding = vec![0u8; 300];
        let mut com = vec![0xFF, 0xFE];
        com.extend_from_slice(&(padding.len() as u16 + 2).to_be_bytes());
        com.extend_from_slice(&padding);
        let app1 = exif_app1(OrientationCode::Rotate90Ccw, Endian::Big);
        let bytes = jpeg_with(&[&com, &app1]);

        assert_eq!(read(&bytes), Ok(OrientationCode::Rotate90Ccw));
        assert!(try_read_orientation(&bytes, "image/jpeg", 256).is_err());
        assert_eq!(
            read_orientation_code(&bytes, "image/jpeg", 256),
            OrientationCode::Normal
        );
    }
}
