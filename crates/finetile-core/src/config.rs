//! Configuration system for finetile

use crate::error::{FinetileError, Result};
use crate::types::{MAX_TILES_HEIGHT, MAX_TILES_WIDTH, TILE_BUF_SIZE, TILE_SIZE};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Size in bytes of the `End` marker; the smallest usable tile budget.
const END_MARKER_SIZE: usize = 4;

/// Global configuration for finetile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FinetileConfig {
    /// Tile geometry and per-tile byte budget
    pub tiles: TileConfig,
    /// Fine rasterizer settings
    pub raster: RasterConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Tile geometry shared by producer and consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Command bytes available per tile
    pub capacity: usize,
    /// Tile edge length in pixels
    pub tile_size: u32,
    /// Widest grid, in tiles, the consumer accepts
    pub max_tiles_width: u32,
    /// Tallest grid, in tiles, the consumer accepts
    pub max_tiles_height: u32,
}

/// What the grid does with a tile whose commands do not fit its buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the offending command and everything after it, then terminate.
    Truncate,
    /// Leave the tile buffer empty and render the tile from its primitive list.
    Fallback,
}

/// Fine rasterizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Recovery policy for overflowing tiles
    pub overflow_policy: OverflowPolicy,
    /// Worker threads used for evaluation (0 = available parallelism)
    pub worker_threads: usize,
    /// Derive coverage from the signed distance instead of a hard edge
    pub antialias: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Category-specific log levels (category name -> level string)
    pub category_levels: HashMap<String, String>,
    /// Rate limiting duration in seconds
    pub rate_limit_seconds: u64,
    /// Maximum number of messages before rate limiting kicks in
    pub max_rate_limit_count: u32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            capacity: TILE_BUF_SIZE,
            tile_size: TILE_SIZE,
            max_tiles_width: MAX_TILES_WIDTH,
            max_tiles_height: MAX_TILES_HEIGHT,
        }
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            overflow_policy: OverflowPolicy::Fallback,
            worker_threads: 0,
            antialias: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut category_levels = HashMap::new();

        category_levels.insert("encode".to_string(), "info".to_string());
        category_levels.insert("decode".to_string(), "info".to_string());
        category_levels.insert("grid".to_string(), "info".to_string());
        category_levels.insert("raster".to_string(), "info".to_string());
        // Per-pixel evaluation is far too hot for anything below warn.
        category_levels.insert("eval".to_string(), "warn".to_string());

        Self {
            category_levels,
            rate_limit_seconds: 5,
            max_rate_limit_count: 10,
        }
    }
}

impl TileConfig {
    /// Check that producer and consumer can agree on this geometry
    pub fn validate(&self) -> Result<()> {
        if self.capacity < END_MARKER_SIZE {
            return Err(FinetileError::configuration(format!(
                "tile capacity {} cannot hold an End marker",
                self.capacity
            )));
        }
        if self.capacity % 4 != 0 {
            return Err(FinetileError::configuration(format!(
                "tile capacity {} is not a multiple of 4 bytes",
                self.capacity
            )));
        }
        if self.tile_size == 0 {
            return Err(FinetileError::configuration("tile size must be non-zero"));
        }
        if self.max_tiles_width == 0 || self.max_tiles_height == 0 {
            return Err(FinetileError::configuration(format!(
                "max tiles {}x{} must be non-zero",
                self.max_tiles_width, self.max_tiles_height
            )));
        }
        let arena = (self.max_tiles_width as usize)
            .checked_mul(self.max_tiles_height as usize)
            .and_then(|tiles| tiles.checked_mul(self.capacity));
        if arena.is_none() {
            return Err(FinetileError::configuration(format!(
                "{}x{} tiles of {} bytes overflow the address space",
                self.max_tiles_width, self.max_tiles_height, self.capacity
            )));
        }
        Ok(())
    }
}

impl FinetileConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.tiles.validate()
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Shared configuration handle
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<FinetileConfig>>,
}

impl ConfigManager {
    /// Create a new configuration manager with default settings
    pub fn new() -> Self {
        Self::with_config(FinetileConfig::default())
    }

    /// Create a configuration manager with custom config
    pub fn with_config(config: FinetileConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Get a copy of the current configuration
    pub fn get_config(&self) -> FinetileConfig {
        self.config.read().clone()
    }

    /// Current tile geometry
    pub fn tile_config(&self) -> TileConfig {
        self.config.read().tiles
    }

    /// Current rasterizer settings
    pub fn raster_config(&self) -> RasterConfig {
        self.config.read().raster
    }

    /// Update the configuration, rejecting the change if it does not validate
    pub fn update_config<F>(&self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut FinetileConfig),
    {
        let mut config = self.config.write();
        let mut next = config.clone();
        updater(&mut next);
        next.validate()?;
        *config = next;
        Ok(())
    }

    /// Set log level for a specific category
    pub fn set_category_level(&self, category: &str, level: &str) {
        self.config
            .write()
            .logging
            .category_levels
            .insert(category.to_string(), level.to_string());
    }

    /// Get log level for a specific category
    pub fn get_category_level(&self, category: &str) -> Option<String> {
        self.config
            .read()
            .logging
            .category_levels
            .get(category)
            .cloned()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Global configuration instance
static CONFIG_MANAGER: OnceLock<ConfigManager> = OnceLock::new();

/// Initialize the global configuration manager
pub fn init_config() -> &'static ConfigManager {
    CONFIG_MANAGER.get_or_init(ConfigManager::new)
}

/// Initialize the global configuration manager with custom config
pub fn init_config_with(config: FinetileConfig) -> &'static ConfigManager {
    CONFIG_MANAGER.get_or_init(|| ConfigManager::with_config(config))
}

/// Get the global configuration manager
pub fn get_config_manager() -> Option<&'static ConfigManager> {
    CONFIG_MANAGER.get()
}
