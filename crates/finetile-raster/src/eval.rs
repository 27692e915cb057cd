//! Per-pixel evaluation of tile command sequences
//!
//! Fill edges toggle an even-odd parity bit and contribute their distance to
//! the fill boundary; segments contribute stroke distance directly. The sign
//! of the combined distance decides inside/outside at `End`.

use crate::buffer::TileView;
use crate::command::Command;
use finetile_core::{TilePoint, TileResult};
use glam::Vec2;

const EPSILON: f32 = 1.0e-6;

/// Result of evaluating one sample point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSample {
    /// Whether the signed distance is negative
    pub inside: bool,
    /// Current color when the sample has any coverage
    pub color: Option<i32>,
    /// Signed distance to the nearest boundary (negative inside)
    pub distance: f32,
    /// Covered fraction of the pixel, in `[0, 1]`
    pub coverage: f32,
}

impl PixelSample {
    /// Nothing drawn
    pub const EMPTY: Self = Self {
        inside: false,
        color: None,
        distance: f32::INFINITY,
        coverage: 0.0,
    };
}

/// Running state while walking one sequence
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    boundary: f32,
    parity: bool,
    stroke: f32,
    color: Option<i32>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            boundary: f32::INFINITY,
            parity: false,
            stroke: f32::INFINITY,
            color: None,
        }
    }

    /// Apply one command. Returns `false` once the sequence has ended.
    fn apply(&mut self, command: &Command, p: Vec2) -> bool {
        match *command {
            Command::End => return false,
            Command::Segment { a, b, width } => {
                let d = segment_distance(p, a, b) - width;
                self.stroke = self.stroke.min(d);
            }
            Command::LineFill { a, b } => {
                self.boundary = self.boundary.min(segment_distance(p, a, b));
                if ray_crosses(p, a, b) {
                    self.parity = !self.parity;
                }
            }
            Command::BezFill { a, b, c } => {
                self.boundary = self.boundary.min(bezier_distance(p, a, b, c));
                if inside_bezier(p, a, b, c) {
                    self.parity = !self.parity;
                }
            }
            Command::Solid { color } => self.color = Some(color),
        }
        true
    }

    fn finish(self, antialias: bool) -> PixelSample {
        let fill = if self.parity {
            -self.boundary
        } else {
            self.boundary
        };
        let distance = fill.min(self.stroke);
        let inside = distance < 0.0;
        let coverage = if antialias {
            (0.5 - distance).clamp(0.0, 1.0)
        } else if inside {
            1.0
        } else {
            0.0
        };

        PixelSample {
            inside,
            color: if coverage > 0.0 { self.color } else { None },
            distance,
            coverage,
        }
    }
}

/// Evaluates command sequences at sample points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluator {
    antialias: bool,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self { antialias: true }
    }
}

impl Evaluator {
    /// Create an evaluator
    pub fn new(antialias: bool) -> Self {
        Self { antialias }
    }

    /// Decode `view` from the start and evaluate it at tile-local point `p`.
    ///
    /// Decode errors are returned as-is; nothing is guessed for a malformed
    /// tile.
    pub fn eval_view(&self, view: &TileView<'_>, p: Vec2) -> TileResult<PixelSample> {
        let mut acc = Accumulator::new();
        for command in view.decode() {
            if !acc.apply(&command?, p) {
                break;
            }
        }
        Ok(acc.finish(self.antialias))
    }

    /// Evaluate already-decoded commands, stopping at the first `End`
    pub fn eval_commands<'c, I>(&self, commands: I, p: Vec2) -> PixelSample
    where
        I: IntoIterator<Item = &'c Command>,
    {
        let mut acc = Accumulator::new();
        for command in commands {
            if !acc.apply(command, p) {
                break;
            }
        }
        acc.finish(self.antialias)
    }

    /// Evaluate at a fixed-point sample
    pub fn eval_at(&self, view: &TileView<'_>, p: TilePoint) -> TileResult<PixelSample> {
        self.eval_view(view, p.to_vec2())
    }
}

/// Distance from `p` to the segment `a→b`
fn segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let pa = p - a;
    let ba = b - a;
    let len2 = ba.length_squared();
    let h = if len2 > EPSILON {
        (pa.dot(ba) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (pa - ba * h).length()
}

/// Whether a ray from `p` toward +x crosses the edge `a→b`.
///
/// Half-open in y so a vertex shared by two edges counts once.
fn ray_crosses(p: Vec2, a: Vec2, b: Vec2) -> bool {
    if (a.y > p.y) == (b.y > p.y) {
        return false;
    }
    let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
    p.x < x
}

/// Whether `p` lies between the quadratic curve `a, b, c` and its chord.
///
/// Maps `p` into the curve's canonical space (`a→(0,0)`, `b→(½,0)`,
/// `c→(1,1)`) where the curve is `u² = v`.
fn inside_bezier(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;

    let den = v0.perp_dot(v1);
    if den.abs() < EPSILON {
        return false;
    }

    let lb = v2.perp_dot(v1) / den;
    let lc = v0.perp_dot(v2) / den;
    let la = 1.0 - lb - lc;
    if la < 0.0 || lb < 0.0 || lc < 0.0 {
        return false;
    }

    let u = 0.5 * lb + lc;
    let v = lc;
    u * u - v < 0.0
}

/// Distance from `p` to the quadratic bezier `a, b, c`.
///
/// Solves the cubic for the closest curve parameter in closed form.
fn bezier_distance(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> f32 {
    let qa = b - a;
    let qb = a - 2.0 * b + c;
    let qc = qa * 2.0;
    let qd = a - p;

    let bb = qb.length_squared();
    if bb < EPSILON {
        // Control point on the chord: a straight line.
        return segment_distance(p, a, c);
    }

    let kk = 1.0 / bb;
    let kx = kk * qa.dot(qb);
    let ky = kk * (2.0 * qa.dot(qa) + qd.dot(qb)) / 3.0;
    let kz = kk * qd.dot(qa);

    let pp = ky - kx * kx;
    let p3 = pp * pp * pp;
    let q = kx * (2.0 * kx * kx - 3.0 * ky) + kz;
    let h = q * q + 4.0 * p3;

    let at = |t: f32| (qd + (qc + qb * t) * t).length_squared();

    let d2 = if h >= 0.0 {
        let h = h.sqrt();
        let x0 = 0.5 * (h - q);
        let x1 = 0.5 * (-h - q);
        let t = (x0.cbrt() + x1.cbrt() - kx).clamp(0.0, 1.0);
        at(t)
    } else {
        let z = (-pp).sqrt();
        let v = (q / (pp * z * 2.0)).clamp(-1.0, 1.0).acos() / 3.0;
        let m = v.cos();
        let n = v.sin() * 3.0_f32.sqrt();
        let t0 = ((m + m) * z - kx).clamp(0.0, 1.0);
        let t1 = ((-n - m) * z - kx).clamp(0.0, 1.0);
        at(t0).min(at(t1))
    };

    d2.sqrt()
}
