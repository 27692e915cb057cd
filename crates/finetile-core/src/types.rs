//! Common types shared by tile producers and consumers

use crate::error::{TileError, TileResult};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Command bytes available to one tile.
pub const TILE_BUF_SIZE: usize = 64;

/// Tile edge length in pixels.
pub const TILE_SIZE: u32 = 16;

/// Widest grid, in tiles, a consumer accepts.
pub const MAX_TILES_WIDTH: u32 = 256;

/// Tallest grid, in tiles, a consumer accepts.
pub const MAX_TILES_HEIGHT: u32 = 256;

/// Fractional bits of the fixed-point tile coordinates.
///
/// Coordinates are stored as `i16` with 4 fractional bits, so a point is
/// exact to 1/16 pixel and the representable range is circa `[-2048, 2048)`.
pub const FRAC_BITS: u32 = 4;

const FIXED_ONE: f32 = (1 << FRAC_BITS) as f32;

/// A tile-local point in fixed-point coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePoint {
    pub x: i16,
    pub y: i16,
}

impl TilePoint {
    /// Origin of the tile
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a point from raw fixed-point components
    pub const fn from_fixed(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// Quantize pixel coordinates to the nearest 1/16 pixel.
    ///
    /// Fails for coordinates outside the representable range and for
    /// non-finite values.
    pub fn try_new(x: f32, y: f32) -> TileResult<Self> {
        match (quantize(x), quantize(y)) {
            (Some(qx), Some(qy)) => Ok(Self { x: qx, y: qy }),
            _ => Err(TileError::CoordinateOutOfRange {
                x: x as i32,
                y: y as i32,
            }),
        }
    }

    /// Whether `(x, y)` can be stored without clamping
    pub fn is_representable(x: f32, y: f32) -> bool {
        quantize(x).is_some() && quantize(y).is_some()
    }

    /// Convert back to pixel coordinates
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32 / FIXED_ONE, self.y as f32 / FIXED_ONE)
    }

    /// Raw components in wire order
    pub const fn to_raw(self) -> [i16; 2] {
        [self.x, self.y]
    }

    /// Build from raw components in wire order
    pub const fn from_raw(raw: [i16; 2]) -> Self {
        Self {
            x: raw[0],
            y: raw[1],
        }
    }
}

fn quantize(v: f32) -> Option<i16> {
    let q = (v * FIXED_ONE).round();
    if q.is_finite() && q >= i16::MIN as f32 && q <= i16::MAX as f32 {
        Some(q as i16)
    } else {
        None
    }
}

impl TryFrom<Vec2> for TilePoint {
    type Error = TileError;

    fn try_from(vec: Vec2) -> TileResult<Self> {
        Self::try_new(vec.x, vec.y)
    }
}

impl From<TilePoint> for Vec2 {
    fn from(point: TilePoint) -> Self {
        point.to_vec2()
    }
}

/// Column and row of a tile within a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Create a new tile coordinate
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// RGBA color representation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Create a new color from RGBA values (0.0 to 1.0)
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a new color from RGB values (0.0 to 1.0)
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Same color with alpha scaled by `coverage`
    pub fn with_coverage(self, coverage: f32) -> Self {
        Self {
            a: self.a * coverage.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Convert to 8-bit RGBA
    pub fn to_rgba8(self) -> [u8; 4] {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [channel(self.r), channel(self.g), channel(self.b), channel(self.a)]
    }

    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);
    pub const RED: Self = Self::rgba(1.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);
}

impl Default for Color {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}
