use proptest::prelude::*;

use essay_orient::fixtures::{exif_app1, exif_app1_with_tiff, insert_after_soi, tiff_block};
use essay_orient::{
    DEFAULT_SCAN_LIMIT, Endian, ExifError, OrientationCode, read_orientation_code,
    try_read_orientation,
};

fn minimal_jpeg(segment: &[u8]) -> Vec<u8> {
    insert_after_soi(&[0xFF, 0xD8, 0xFF, 0xD9], segment)
}

fn endian_strategy() -> impl Strategy<Value = Endian> {
    prop_oneof![Just(Endian::Little), Just(Endian::Big)]
}

fn code_strategy() -> impl Strategy<Value = OrientationCode> {
    proptest::sample::select(OrientationCode::ALL.to_vec())
}

#[test]
fn test_truncated_tiff_header_resolves_to_normal() {
    let tiff = tiff_block(OrientationCode::Rotate90Cw, Endian::Little);
    for cut in 0..tiff.len() {
        let bytes = minimal_jpeg(&exif_app1_with_tiff(&tiff[..cut]));
        let code = read_orientation_code(&bytes, "image/jpeg", DEFAULT_SCAN_LIMIT);
        // The orientation entry spans 10..22 and must be read whole.
        if cut < 22 {
            assert_eq!(code, OrientationCode::Normal, "cut at {cut}");
        } else {
            assert_eq!(code, OrientationCode::Rotate90Cw, "cut at {cut}");
        }
    }
}

#[test]
fn test_corrupt_signature_resolves_to_normal() {
    let mut segment = exif_app1(OrientationCode::Rotate180, Endian::Big);
    segment[4..10].copy_from_slice(b"Exif\0X");
    let bytes = minimal_jpeg(&segment);
    assert_eq!(
        try_read_orientation(&bytes, "image/jpeg", DEFAULT_SCAN_LIMIT),
        Err(ExifError::NotExif)
    );
    assert_eq!(
        read_orientation_code(&bytes, "image/jpeg", DEFAULT_SCAN_LIMIT),
        OrientationCode::Normal
    );
}

#[test]
fn test_ifd_offset_past_end_resolves_to_normal() {
    for endian in [Endian::Little, Endian::Big] {
        let mut tiff = tiff_block(OrientationCode::Rotate90Ccw, endian);
        let offset = match endian {
            Endian::Little => u32::MAX.to_le_bytes(),
            Endian::Big => u32::MAX.to_be_bytes(),
        };
        tiff[4..8].copy_from_slice(&offset);
        let bytes = minimal_jpeg(&exif_app1_with_tiff(&tiff));
        assert!(matches!(
            try_read_orientation(&bytes, "image/jpeg", DEFAULT_SCAN_LIMIT),
            Err(ExifError::Truncated { .. })
        ));
    }
}

#[test]
fn test_segment_length_past_end_resolves_to_normal() {
    let mut segment = exif_app1(OrientationCode::Transverse, Endian::Little);
    // Declare a much longer segment than is present; only the bytes inside
    // the buffer are read, and the tag is still found.
    segment[2..4].copy_from_slice(&0x4000u16.to_be_bytes());
    let bytes = minimal_jpeg(&segment);
    assert_eq!(
        read_orientation_code(&bytes, "image/jpeg", DEFAULT_SCAN_LIMIT),
        OrientationCode::Transverse
    );

    // Cutting the buffer inside the TIFF block loses it.
    let cut = &bytes[..bytes.len() - 12];
    assert_eq!(
        read_orientation_code(cut, "image/jpeg", DEFAULT_SCAN_LIMIT),
        OrientationCode::Normal
    );
}

proptest! {
    #[test]
    fn prop_arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let code = read_orientation_code(&bytes, "image/jpeg", DEFAULT_SCAN_LIMIT);
        prop_assert!((1..=8).contains(&code.exif_value()));
    }

    #[test]
    fn prop_arbitrary_payload_after_soi_never_panics(
        payload in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE1];
        bytes.extend_from_slice(&payload);
        let code = read_orientation_code(&bytes, "image/jpeg", DEFAULT_SCAN_LIMIT);
        prop_assert!((1..=8).contains(&code.exif_value()));
    }

    #[test]
    fn prop_every_prefix_is_safe(
        code in code_strategy(),
        endian in endian_strategy(),
        cut in 0usize..64,
    ) {
        let bytes = minimal_jpeg(&exif_app1(code, endian));
        let cut = cut.min(bytes.len());
        let read = read_orientation_code(&bytes[..cut], "image/jpeg", DEFAULT_SCAN_LIMIT);
        prop_assert!(read == code || read == OrientationCode::Normal);
    }

    #[test]
    fn prop_tagged_code_round_trips(code in code_strategy(), endian in endian_strategy()) {
        let bytes = minimal_jpeg(&exif_app1(code, endian));
        prop_assert_eq!(try_read_orientation(&bytes, "image/jpeg", DEFAULT_SCAN_LIMIT), Ok(code));
    }

    #[test]
    fn prop_corrupted_tiff_byte_never_panics(
        code in code_strategy(),
        endian in endian_strategy(),
        index in 0usize..26,
        value in any::<u8>(),
    ) {
        let mut tiff = tiff_block(code, endian);
        tiff[index] = value;
        let bytes = minimal_jpeg(&exif_app1_with_tiff(&tiff));
        let read = read_orientation_code(&bytes, "image/jpeg", DEFAULT_SCAN_LIMIT);
        prop_assert!((1..=8).contains(&read.exif_value()));
    }
}
