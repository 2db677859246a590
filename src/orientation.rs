//! EXIF orientation codes and the fixed affine transform for each.
//!
//! Each code names how the stored raster relates to the upright picture. The
//! diagrams show how an upright `1 2 / 3 4` picture is laid out in storage:
//!
//! ```text
//! Normal (1)      FlipHorizontal (2)  Rotate180 (3)    FlipVertical (4)
//! ┌───────┐       ┌───────┐           ┌───────┐        ┌───────┐
//! │ 1   2 │       │ 2   1 │           │ 4   3 │        │ 3   4 │
//! │ 3   4 │       │ 4   3 │           │ 2   1 │        │ 1   2 │
//! └───────┘       └───────┘           └───────┘        └───────┘
//!
//! Transpose (5)   Rotate90Cw (6)      Transverse (7)   Rotate90Ccw (8)
//! ┌───────┐       ┌───────┐           ┌───────┐        ┌───────┐
//! │ 1   3 │       │ 2   4 │           │ 4   2 │        │ 3   1 │
//! │ 2   4 │       │ 1   3 │           │ 3   1 │        │ 4   2 │
//! └───────┘       └───────┘           └───────┘        └───────┘
//! ```
//!
//! The variant name is the correction that restores the upright picture.

/// One of the eight EXIF orientation codes (tag `0x0112`).
///
/// Discriminants are the EXIF values.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OrientationCode {
    #[default]
    Normal = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    Transpose = 5,
    Rotate90Cw = 6,
    Transverse = 7,
    Rotate90Ccw = 8,
}

impl OrientationCode {
    pub const ALL: [OrientationCode; 8] = [
        OrientationCode::Normal,
        OrientationCode::FlipHorizontal,
        OrientationCode::Rotate180,
        OrientationCode::FlipVertical,
        OrientationCode::Transpose,
        OrientationCode::Rotate90Cw,
        OrientationCode::Transverse,
        OrientationCode::Rotate90Ccw,
    ];

    /// Maps a raw EXIF value to a code; anything outside `1..=8` is `None`.
    pub fn from_exif(value: u16) -> Option<Self> {
        match value {
            1 => Some(OrientationCode::Normal),
            2 => Some(OrientationCode::FlipHorizontal),
            3 => Some(OrientationCode::Rotate180),
            4 => Some(OrientationCode::FlipVertical),
            5 => Some(OrientationCode::Transpose),
            6 => Some(OrientationCode::Rotate90Cw),
            7 => Some(OrientationCode::Transverse),
            8 => Some(OrientationCode::Rotate90Ccw),
            _ => None,
        }
    }

    /// Returns the raw EXIF value.
    pub fn exif_value(self) -> u16 {
        self as u16
    }

    pub fn is_identity(self) -> bool {
        self == OrientationCode::Normal
    }

    /// True for codes 5-8, whose correction exchanges width and height.
    pub fn swaps_dimensions(self) -> bool {
        self.exif_value() >= 5
    }

    /// Dimensions of the raster once this code has been corrected.
    pub fn effective_dimensions(self, width: usize, height: usize) -> (usize, usize) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

impl TryFrom<u16> for OrientationCode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_exif(value).ok_or(value)
    }
}

/// Source dimension that feeds a translation term.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Extent {
    Zero,
    Width,
    Height,
}

impl Extent {
    fn resolve(self, width: usize, height: usize) -> i64 {
        match self {
            Extent::Zero => 0,
            Extent::Width => width as i64,
            Extent::Height => height as i64,
        }
    }
}

/// A 2x3 affine matrix in continuous raster coordinates.
///
/// A source point `(x, y)` maps to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AffineMatrix {
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
    pub e: i64,
    pub f: i64,
}

impl AffineMatrix {
    /// Maps a continuous point.
    pub fn apply(&self, x: i64, y: i64) -> (i64, i64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Maps the pixel with index `(x, y)` to its destination index.
    ///
    /// The pixel's center `(x + 0.5, y + 0.5)` is pushed through the matrix in
    /// doubled coordinates so the arithmetic stays integral. Returns `None`
    /// when the result lands on a negative index.
    pub fn map_pixel(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let cx = 2 * x as i64 + 1;
        let cy = 2 * y as i64 + 1;
        let dx = self.a * cx + self.c * cy + 2 * self.e;
        let dy = self.b * cx + self.d * cy + 2 * self.f;
        if dx < 0 || dy < 0 {
            return None;
        }
        Some(((dx / 2) as usize, (dy / 2) as usize))
    }
}

/// The fixed correction for one orientation code.
///
/// The linear part is baked in per code; the translation refers to the
/// source raster's extent and is resolved by [`TransformDescriptor::matrix`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransformDescriptor {
    code: OrientationCode,
    linear: [i8; 4],
    translate: [Extent; 2],
}

const DESCRIPTORS: [TransformDescriptor; 8] = [
    descriptor(OrientationCode::Normal, [1, 0, 0, 1], [Extent::Zero, Extent::Zero]),
    descriptor(OrientationCode::FlipHorizontal, [-1, 0, 0, 1], [Extent::Width, Extent::Zero]),
    descriptor(OrientationCode::Rotate180, [-1, 0, 0, -1], [Extent::Width, Extent::Height]),
    descriptor(OrientationCode::FlipVertical, [1, 0, 0, -1], [Extent::Zero, Extent::Height]),
    descriptor(OrientationCode::Transpose, [0, 1, 1, 0], [Extent::Zero, Extent::Zero]),
    descriptor(OrientationCode::Rotate90Cw, [0, 1, -1, 0], [Extent::Height, Extent::Zero]),
    descriptor(OrientationCode::Transverse, [0, -1, -1, 0], [Extent::Height, Extent::Width]),
    descriptor(OrientationCode::Rotate90Ccw, [0, -1, 1, 0], [Extent::Zero, Extent::Width]),
];

const fn descriptor(
    code: OrientationCode,
    linear: [i8; 4],
    translate: [Extent; 2],
) -> TransformDescriptor {
    TransformDescriptor {
        code,
        linear,
        translate,
    }
}

/// Returns the fixed transform that corrects `code`.
pub fn resolve_transform(code: OrientationCode) -> TransformDescriptor {
    DESCRIPTORS[code.exif_value() as usize - 1]
}

impl TransformDescriptor {
    pub fn code(&self) -> OrientationCode {
        self.code
    }

    /// True when the destination is `height x width` of the source.
    pub fn swaps_dimensions(&self) -> bool {
        self.code.swaps_dimensions()
    }

    pub fn is_identity(&self) -> bool {
        self.code.is_identity()
    }

    /// Destination dimensions for a `width x height` source.
    pub fn output_dimensions(&self, width: usize, height: usize) -> (usize, usize) {
        self.code.effective_dimensions(width, height)
    }

    /// Resolves the matrix for a `width x height` source raster.
    pub fn matrix(&self, width: usize, height: usize) -> AffineMatrix {
        let [a, b, c, d] = self.linear;
        let [e, f] = self.translate;
        AffineMatrix {
            a: a.into(),
            b: b.into(),
            c: c.into(),
            d: d.into(),
            e: e.resolve(width, height),
            f: f.resolve(width, height),
        }
    }
}
