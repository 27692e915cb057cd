//! Finetile - fixed-capacity tile command buffers for fine vector rasterization
//!
//! A producer bins tile-local drawing commands into one small byte buffer per
//! screen tile; a parallel fine rasterizer decodes each buffer and evaluates
//! coverage and color for every pixel of the tile.
//!
//! ```rust
//! use finetile::prelude::*;
//!
//! fn main() -> finetile::Result<()> {
//!     let config = FinetileConfig::default();
//!     let (mut grid, rasterizer) = finetile::pipeline(16, 16, &config)?;
//!
//!     grid.bin(
//!         TileCoord::new(0, 0),
//!         &[
//!             Command::solid(7),
//!             Command::line_fill((0.0, 0.0), (10.0, 0.0)),
//!             Command::line_fill((10.0, 0.0), (10.0, 10.0)),
//!             Command::line_fill((10.0, 10.0), (0.0, 10.0)),
//!             Command::line_fill((0.0, 10.0), (0.0, 0.0)),
//!         ],
//!     )?;
//!
//!     let (frame, report) = rasterizer.render(&grid.seal())?;
//!     assert!(report.is_clean());
//!     assert_eq!(frame.get(5, 5).and_then(|p| p.color), Some(7));
//!     Ok(())
//! }
//! ```

pub use finetile_core;
pub use finetile_raster;

pub use finetile_core::{FinetileError, Result};
pub use finetile_raster::pipeline;

use finetile_core::FinetileConfig;

/// Unified prelude module that exports all commonly used types
pub mod prelude {
    pub use finetile_core::prelude::*;
    pub use finetile_raster::{
        Command, Evaluator, FineRasterizer, Frame, PixelSample, SealedGrid, TileBuffer,
        TileGrid, TileStatus, TileView,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging and the process-wide configuration
pub fn init(config: FinetileConfig) -> Result<()> {
    finetile_core::init(&config)?;
    finetile_core::config::init_config_with(config);
    tracing::info!("finetile v{} ready", VERSION);
    Ok(())
}
