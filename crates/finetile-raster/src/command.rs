//! Tile command set and its wire layout.
//!
//! Every command starts with a one-word discriminator followed by a fixed,
//! padding-free payload. The length of a command is implied by its
//! discriminator, so the mapping below is the whole format: producer and
//! consumer must agree on it exactly.
//!
//! | op | tag | payload | bytes |
//! |---|---|---|---|
//! | `End` | 0 | - | 4 |
//! | `LineFill` | 1 | `a`, `b` | 12 |
//! | `BezFill` | 2 | `a`, `b`, `c` | 16 |
//! | `Solid` | 3 | `color: i32` | 8 |
//! | `Segment` | 4 | `a`, `b`, `width: f32` | 16 |
//!
//! On the wire, points are [`TilePoint`]s, two `i16` fixed-point components
//! each. A [`Command`] keeps its geometry in `f32` until it is encoded, so a
//! point that does not fit the fixed-point range is rejected at encode time
//! instead of being clamped.

use bytemuck::{Pod, Zeroable};
use finetile_core::{TileError, TilePoint, TileResult};
use glam::Vec2;
use std::mem::size_of;

/// Command discriminator
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    End = 0,
    LineFill = 1,
    BezFill = 2,
    Solid = 3,
    Segment = 4,
}

impl Op {
    /// Encoded size of a command with this discriminator, tag included
    pub const fn encoded_len(self) -> usize {
        match self {
            Op::End => size_of::<u32>(),
            Op::LineFill => size_of::<LineFillRecord>(),
            Op::BezFill => size_of::<BezFillRecord>(),
            Op::Solid => size_of::<SolidRecord>(),
            Op::Segment => size_of::<SegmentRecord>(),
        }
    }

    /// Wire value of this discriminator
    pub const fn tag(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Op {
    /// The unrecognized tag
    type Error = u32;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Op::End),
            1 => Ok(Op::LineFill),
            2 => Ok(Op::BezFill),
            3 => Ok(Op::Solid),
            4 => Ok(Op::Segment),
            other => Err(other),
        }
    }
}

/// Size of the `End` marker. Non-terminal appends keep this much in reserve.
pub const END_LEN: usize = Op::End.encoded_len();

/// Largest encoded command.
pub const MAX_COMMAND_LEN: usize = Op::Segment.encoded_len();

/// A single tile drawing operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Terminates a command sequence.
    End,
    /// Stroked line segment with half-width `width`.
    Segment { a: Vec2, b: Vec2, width: f32 },
    /// Flip the sign of the distance if a ray from the sample crosses `a→b`.
    LineFill { a: Vec2, b: Vec2 },
    /// Flip the sign of the distance if the sample is inside the quadratic
    /// bezier `a, b, c` (between the curve and its chord).
    BezFill { a: Vec2, b: Vec2, c: Vec2 },
    /// Set the current color index.
    Solid { color: i32 },
}

impl Command {
    /// Stroked segment from `a` to `b`
    pub fn segment(a: impl Into<Vec2>, b: impl Into<Vec2>, width: f32) -> Self {
        Command::Segment {
            a: a.into(),
            b: b.into(),
            width,
        }
    }

    /// Fill edge from `a` to `b`
    pub fn line_fill(a: impl Into<Vec2>, b: impl Into<Vec2>) -> Self {
        Command::LineFill {
            a: a.into(),
            b: b.into(),
        }
    }

    /// Quadratic fill edge with control point `b`
    pub fn bez_fill(a: impl Into<Vec2>, b: impl Into<Vec2>, c: impl Into<Vec2>) -> Self {
        Command::BezFill {
            a: a.into(),
            b: b.into(),
            c: c.into(),
        }
    }

    /// Color change
    pub fn solid(color: i32) -> Self {
        Command::Solid { color }
    }

    /// Discriminator of this command
    pub fn op(&self) -> Op {
        match self {
            Command::End => Op::End,
            Command::Segment { .. } => Op::Segment,
            Command::LineFill { .. } => Op::LineFill,
            Command::BezFill { .. } => Op::BezFill,
            Command::Solid { .. } => Op::Solid,
        }
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        self.op().encoded_len()
    }

    /// Whether this is the sequence terminator
    pub fn is_end(&self) -> bool {
        matches!(self, Command::End)
    }

    /// Write this command at the start of `out`, returning the bytes written.
    ///
    /// Fails without writing if `out` is shorter than [`Command::encoded_len`]
    /// or a point falls outside the fixed-point range.
    pub fn encode_into(&self, out: &mut [u8]) -> TileResult<usize> {
        let needed = self.encoded_len();
        let Some(dst) = out.get_mut(..needed) else {
            return Err(TileError::CapacityExceeded {
                needed,
                remaining: out.len(),
                capacity: out.len(),
            });
        };

        let tag = self.op().tag();
        match *self {
            Command::End => dst.copy_from_slice(bytemuck::bytes_of(&tag)),
            Command::Segment { a, b, width } => {
                let record = SegmentRecord {
                    op: tag,
                    a: fixed(a)?,
                    b: fixed(b)?,
                    width,
                };
                dst.copy_from_slice(bytemuck::bytes_of(&record))
            }
            Command::LineFill { a, b } => {
                let record = LineFillRecord {
                    op: tag,
                    a: fixed(a)?,
                    b: fixed(b)?,
                };
                dst.copy_from_slice(bytemuck::bytes_of(&record))
            }
            Command::BezFill { a, b, c } => {
                let record = BezFillRecord {
                    op: tag,
                    a: fixed(a)?,
                    b: fixed(b)?,
                    c: fixed(c)?,
                };
                dst.copy_from_slice(bytemuck::bytes_of(&record))
            }
            Command::Solid { color } => {
                dst.copy_from_slice(bytemuck::bytes_of(&SolidRecord { op: tag, color }))
            }
        }

        Ok(needed)
    }

    /// Read the command starting at `offset`, returning it with its length.
    ///
    /// A tag or payload cut off by the end of `bytes` is an
    /// [`TileError::UnterminatedBuffer`]; a tag outside the command set is an
    /// [`TileError::UnknownDiscriminator`].
    pub fn decode_at(bytes: &[u8], offset: usize) -> TileResult<(Command, usize)> {
        let unterminated = TileError::UnterminatedBuffer { offset };

        let tag_bytes = bytes
            .get(offset..offset + size_of::<u32>())
            .ok_or(unterminated)?;
        let tag: u32 = bytemuck::pod_read_unaligned(tag_bytes);
        let op = Op::try_from(tag).map_err(|tag| TileError::UnknownDiscriminator { tag, offset })?;

        let len = op.encoded_len();
        let record = bytes.get(offset..offset + len).ok_or(unterminated)?;

        let command = match op {
            Op::End => Command::End,
            Op::LineFill => {
                let r: LineFillRecord = bytemuck::pod_read_unaligned(record);
                debug_assert_eq!(r.op, tag);
                Command::LineFill {
                    a: point(r.a),
                    b: point(r.b),
                }
            }
            Op::BezFill => {
                let r: BezFillRecord = bytemuck::pod_read_unaligned(record);
                debug_assert_eq!(r.op, tag);
                Command::BezFill {
                    a: point(r.a),
                    b: point(r.b),
                    c: point(r.c),
                }
            }
            Op::Solid => {
                let r: SolidRecord = bytemuck::pod_read_unaligned(record);
                debug_assert_eq!(r.op, tag);
                Command::Solid { color: r.color }
            }
            Op::Segment => {
                let r: SegmentRecord = bytemuck::pod_read_unaligned(record);
                debug_assert_eq!(r.op, tag);
                Command::Segment {
                    a: point(r.a),
                    b: point(r.b),
                    width: r.width,
                }
            }
        };

        Ok((command, len))
    }
}

/// Quantize a point for the wire
fn fixed(p: Vec2) -> TileResult<[i16; 2]> {
    Ok(TilePoint::try_from(p)?.to_raw())
}

fn point(raw: [i16; 2]) -> Vec2 {
    TilePoint::from_raw(raw).to_vec2()
}

// Wire records. These mirror the structs the GPU-side evaluator reads, so
// field order is part of the format.

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SegmentRecord {
    op: u32,
    a: [i16; 2],
    b: [i16; 2],
    width: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct LineFillRecord {
    op: u32,
    a: [i16; 2],
    b: [i16; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BezFillRecord {
    op: u32,
    a: [i16; 2],
    b: [i16; 2],
    c: [i16; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SolidRecord {
    op: u32,
    color: i32,
}

const _: () = assert!(size_of::<SegmentRecord>() == 16);
const _: () = assert!(size_of::<LineFillRecord>() == 12);
const _: () = assert!(size_of::<BezFillRecord>() == 16);
const _: () = assert!(size_of::<SolidRecord>() == 8);
