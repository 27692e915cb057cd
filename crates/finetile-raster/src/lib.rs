//! Finetile Raster
//!
//! Per-tile command buffers and the fine rasterizer that consumes them.
//!
//! ## Features
//! - Fixed-layout command set with a one-word discriminator per command
//! - Fixed-capacity, append-only tile buffers with bounds-checked encoding
//! - Lazy, restartable decoding that reports malformed tiles instead of guessing
//! - Even-odd signed-distance evaluation of fills, strokes and quadratic curves
//! - Tile grids with an explicit bin/seal/reset pass lifecycle
//! - Parallel per-pixel rasterization with per-tile fault isolation

pub mod buffer;
pub mod command;
pub mod eval;
pub mod grid;
pub mod raster;

// Re-export commonly used types
pub use buffer::{Decoder, TileBuffer, TileStorage, TileView};
pub use command::{Command, Op, END_LEN, MAX_COMMAND_LEN};
pub use eval::{Evaluator, PixelSample};
pub use grid::{SealedGrid, TileGrid, TileStatus};
pub use raster::{FineRasterizer, Frame, Pixel, RasterReport, TileFault};

use finetile_core::{FinetileConfig, Result};

/// Build an empty grid and a matching rasterizer from one configuration
pub fn pipeline(
    width_px: u32,
    height_px: u32,
    config: &FinetileConfig,
) -> Result<(TileGrid, FineRasterizer)> {
    config.validate()?;
    let grid = TileGrid::new(width_px, height_px, &config.tiles)?
        .with_overflow_policy(config.raster.overflow_policy);
    tracing::debug!(
        "tile pipeline for {}x{} px: {}x{} tiles",
        width_px,
        height_px,
        grid.width_tiles(),
        grid.height_tiles()
    );
    Ok((grid, FineRasterizer::new(config.raster)))
}
