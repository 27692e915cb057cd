//! Core functionality for finetile
//!
//! Shared building blocks for the tile command encoder and the fine
//! rasterizer: error taxonomy, configuration, logging and the fixed-point
//! geometry types both sides of a tile buffer agree on.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{
    ConfigManager, FinetileConfig, LoggingConfig, OverflowPolicy, RasterConfig, TileConfig,
};
pub use error::{ErrorContext, FinetileError, Result, TileError, TileResult};
pub use logging::{LogCategory, LogLevel};
pub use types::{
    Color, TileCoord, TilePoint, FRAC_BITS, MAX_TILES_HEIGHT, MAX_TILES_WIDTH, TILE_BUF_SIZE, TILE_SIZE,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        config::{FinetileConfig, OverflowPolicy, RasterConfig, TileConfig},
        error::{FinetileError, Result, TileError},
        logging::{LogCategory, LogLevel},
        types::{Color, TileCoord, TilePoint},
    };
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging from a configuration
pub fn init(config: &FinetileConfig) -> Result<()> {
    config.validate()?;

    if let Err(e) = logging::init(&config.logging) {
        return Err(FinetileError::initialization(format!(
            "Failed to initialize logging: {}",
            e
        )));
    }

    tracing::info!("finetile core v{} initialized", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let mut config = FinetileConfig::default();
        config.tiles.capacity = 3;
        assert!(init(&config).is_err());
    }
}
