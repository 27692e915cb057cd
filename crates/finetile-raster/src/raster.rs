//! Parallel fine rasterization of a sealed grid
//!
//! The frame is split into bands one tile high. Bands are dealt round-robin to
//! scoped worker threads, and each worker decodes a tile once and then
//! evaluates every pixel center inside it. A tile that fails to decode is left
//! blank and reported; it never affects its neighbours.

use crate::command::Command;
use crate::eval::Evaluator;
use crate::grid::{SealedGrid, TileStatus};
use finetile_core::logging::LogCategory;
use finetile_core::{
    finetile_debug, finetile_error_rate_limited, finetile_info, finetile_warn_rate_limited,
    Color, ErrorContext, FinetileError, RasterConfig, Result, TileCoord, TileError, TileResult,
};
use glam::Vec2;
use smallvec::SmallVec;
use std::any::Any;
use std::mem::size_of;

/// One evaluated pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    /// Color index of the covering shape
    pub color: Option<i32>,
    /// Covered fraction in `[0, 1]`
    pub coverage: f32,
}

impl Pixel {
    /// Uncovered pixel
    pub const BLANK: Self = Self {
        color: None,
        coverage: 0.0,
    };
}

impl Default for Pixel {
    fn default() -> Self {
        Self::BLANK
    }
}

/// Row-major grid of evaluated pixels
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// `width * height` pixels, top row first
    pub pixels: Vec<Pixel>,
}

impl Frame {
    /// Blank frame, or an error if its pixels cannot be addressed
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .filter(|len| {
                len.checked_mul(size_of::<Pixel>())
                    .is_some_and(|bytes| bytes <= isize::MAX as usize)
            })
            .ok_or_else(|| {
                FinetileError::configuration(format!(
                    "frame {}x{} is too large to allocate",
                    width, height
                ))
            })?;

        Ok(Self {
            width,
            height,
            pixels: vec![Pixel::BLANK; len],
        })
    }

    /// Pixel at `(x, y)`, if inside the frame
    pub fn get(&self, x: u32, y: u32) -> Option<&Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize)
    }

    /// Map color indices through `palette` into RGBA8, scaled by coverage.
    ///
    /// Indices outside the palette resolve to transparent black.
    pub fn resolve(&self, palette: &[Color]) -> Vec<[u8; 4]> {
        self.pixels
            .iter()
            .map(|pixel| {
                pixel
                    .color
                    .and_then(|index| usize::try_from(index).ok())
                    .and_then(|index| palette.get(index))
                    .map(|color| color.with_coverage(pixel.coverage).to_rgba8())
                    .unwrap_or([0; 4])
            })
            .collect()
    }
}

/// A tile that could not be evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileFault {
    /// Tile that was left blank
    pub coord: TileCoord,
    /// Why its commands could not be read
    pub error: TileError,
}

/// Per-pass summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RasterReport {
    /// Tiles evaluated successfully
    pub tiles: usize,
    /// Of those, tiles rendered from their retained command list
    pub fallback_tiles: usize,
    /// Tiles left blank, in row-major order
    pub faults: Vec<TileFault>,
}

impl RasterReport {
    /// Whether every tile was evaluated
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    fn merge(&mut self, other: RasterReport) {
        self.tiles += other.tiles;
        self.fallback_tiles += other.fallback_tiles;
        self.faults.extend(other.faults);
    }
}

/// Evaluates sealed grids into frames
#[derive(Debug, Clone)]
pub struct FineRasterizer {
    config: RasterConfig,
}

impl Default for FineRasterizer {
    fn default() -> Self {
        Self::new(RasterConfig::default())
    }
}

impl FineRasterizer {
    /// Create a rasterizer
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Number of worker threads a render will use at most
    pub fn worker_count(&self) -> usize {
        match self.config.worker_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }

    /// Evaluate every pixel of `grid`.
    ///
    /// Tile decode errors are reported, not returned. An error is returned
    /// only if a worker thread fails.
    pub fn render(&self, grid: &SealedGrid) -> Result<(Frame, RasterReport)> {
        let span = tracing::debug_span!(
            "render",
            width = grid.width_px(),
            height = grid.height_px()
        );
        let _enter = span.enter();

        let mut frame = Frame::new(grid.width_px(), grid.height_px())?;
        let width = frame.width as usize;
        let band_len = width * grid.tile_size() as usize;

        let bands: Vec<(u32, &mut [Pixel])> = frame
            .pixels
            .chunks_mut(band_len)
            .enumerate()
            .map(|(row, band)| (row as u32, band))
            .collect();
        let workers = self.worker_count().clamp(1, bands.len().max(1));

        let mut assignments: Vec<Vec<(u32, &mut [Pixel])>> =
            (0..workers).map(|_| Vec::new()).collect();
        for (i, band) in bands.into_iter().enumerate() {
            assignments[i % workers].push(band);
        }

        finetile_debug!(
            LogCategory::Raster,
            "rendering {} tile rows on {} workers",
            grid.height_tiles(),
            workers
        );

        let evaluator = Evaluator::new(self.config.antialias);
        let joined = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = assignments
                .into_iter()
                .map(|bands| {
                    s.spawn(move |_| {
                        let mut report = RasterReport::default();
                        for (row, band) in bands {
                            render_band(grid, &evaluator, row, band, &mut report);
                        }
                        report
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        })
        .map_err(|payload| worker_failure(payload.as_ref()))?;

        let mut report = RasterReport::default();
        for outcome in joined {
            report.merge(outcome.map_err(|payload| worker_failure(payload.as_ref()))?);
        }
        report.faults.sort_by_key(|fault| (fault.coord.y, fault.coord.x));

        finetile_info!(
            LogCategory::Raster,
            "rendered {}x{} frame: {} tiles, {} fallback, {} faults",
            frame.width,
            frame.height,
            report.tiles,
            report.fallback_tiles,
            report.faults.len()
        );
        Ok((frame, report))
    }
}

/// Evaluate one row of tiles into its band of the frame
fn render_band(
    grid: &SealedGrid,
    evaluator: &Evaluator,
    row: u32,
    band: &mut [Pixel],
    report: &mut RasterReport,
) {
    let width = grid.width_px() as usize;
    let tile_size = grid.tile_size() as usize;
    let rows = band.len() / width;

    for column in 0..grid.width_tiles() {
        let index = row as usize * grid.width_tiles() as usize + column as usize;
        let coord = grid.coord_of(index);

        let commands = match tile_commands(grid, index) {
            Ok(commands) => commands,
            Err(error) => {
                finetile_warn_rate_limited!(
                    LogCategory::Decode,
                    "tile {} left blank: {}",
                    coord,
                    error
                );
                report.faults.push(TileFault { coord, error });
                continue;
            }
        };

        report.tiles += 1;
        if grid.status_at(index) == TileStatus::Fallback {
            report.fallback_tiles += 1;
        }

        let x0 = column as usize * tile_size;
        let x1 = (x0 + tile_size).min(width);
        for py in 0..rows {
            let line = &mut band[py * width..(py + 1) * width];
            for (px, pixel) in line[x0..x1].iter_mut().enumerate() {
                let local = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                let sample = evaluator.eval_commands(&commands, local);
                *pixel = Pixel {
                    color: sample.color,
                    coverage: sample.coverage,
                };
            }
        }
    }
}

/// Commands to evaluate for a tile, decoded once
fn tile_commands(grid: &SealedGrid, index: usize) -> TileResult<SmallVec<[Command; 8]>> {
    if grid.status_at(index) == TileStatus::Fallback {
        if let Some(commands) = grid.fallback_at(index) {
            return Ok(SmallVec::from_slice(commands));
        }
    }
    grid.view(index)?.commands()
}

fn worker_failure(payload: &(dyn Any + Send)) -> FinetileError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    finetile_error_rate_limited!(LogCategory::Raster, "worker thread failed: {}", message);

    FinetileError::raster(
        format!("worker thread failed: {}", message),
        ErrorContext::new("render", "FineRasterizer"),
    )
}
