//! Error types for finetile

use std::collections::BTreeMap;
use thiserror::Error;

/// Context information attached to crate-level errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Operation that was being performed when the error occurred
    pub operation: String,
    /// Component or module where the error occurred
    pub component: String,
    /// Additional contextual data
    pub metadata: BTreeMap<String, String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(operation: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            component: component.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Add metadata to the context
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    /// Format context for logging
    pub fn format_for_log(&self) -> String {
        let mut parts = vec![
            format!("operation={}", self.operation),
            format!("component={}", self.component),
        ];

        if !self.metadata.is_empty() {
            let metadata_str = self
                .metadata
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("metadata=[{}]", metadata_str));
        }

        parts.join(", ")
    }
}

/// Errors local to a single tile's command buffer.
///
/// These never affect neighbouring tiles. The rasterizer records them per tile
/// and renders the faulty tile blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TileError {
    /// An append would write past the fixed per-tile byte budget.
    ///
    /// Detected before any byte is written; the buffer is left unchanged.
    #[error("tile capacity exceeded: command needs {needed} bytes, {remaining} of {capacity} available")]
    CapacityExceeded {
        needed: usize,
        remaining: usize,
        capacity: usize,
    },

    /// Decoding ran out of written bytes before reaching an `End` marker.
    #[error("unterminated tile buffer at byte offset {offset}")]
    UnterminatedBuffer { offset: usize },

    /// A discriminator outside the closed command set was read.
    #[error("unknown command discriminator {tag:#x} at byte offset {offset}")]
    UnknownDiscriminator { tag: u32, offset: usize },

    /// A point cannot be stored in fixed-point tile coordinates without
    /// clamping. `x` and `y` are the requested coordinates in whole pixels.
    #[error("point ({x}, {y}) is outside the fixed-point tile coordinate range")]
    CoordinateOutOfRange { x: i32, y: i32 },

    /// The buffer already holds its `End` marker.
    #[error("tile buffer is already terminated")]
    AlreadyTerminated,
}

/// Main error type for finetile operations
#[derive(Debug, Error)]
pub enum FinetileError {
    #[error("Tile error: {0}")]
    Tile(#[from] TileError),

    #[error("Grid error: {message}")]
    Grid {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Raster error: {message}")]
    Raster {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Initialization error: {message}")]
    Initialization {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FinetileError {
    /// Create a grid error with context
    pub fn grid_with_context<S: Into<String>>(msg: S, context: ErrorContext) -> Self {
        Self::Grid {
            message: msg.into(),
            context: Some(context),
        }
    }

    /// Create a raster error with context
    pub fn raster<S: Into<String>>(msg: S, context: ErrorContext) -> Self {
        Self::Raster {
            message: msg.into(),
            context: Some(context),
        }
    }

    /// Create a configuration error from a string
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration {
            message: msg.into(),
            context: None,
        }
    }

    /// Create an initialization error from a string
    pub fn initialization<S: Into<String>>(msg: S) -> Self {
        Self::Initialization {
            message: msg.into(),
            context: None,
        }
    }

    /// Get the error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Grid { context, .. }
            | Self::Raster { context, .. }
            | Self::Configuration { context, .. }
            | Self::Initialization { context, .. } => context.as_ref(),
            Self::Tile(_) | Self::Serialization(_) => None,
        }
    }

    /// The tile-local error, if this is one
    pub fn as_tile_error(&self) -> Option<&TileError> {
        match self {
            Self::Tile(err) => Some(err),
            _ => None,
        }
    }

    /// Format error with context for logging
    pub fn format_for_log(&self) -> String {
        let base_msg = self.to_string();
        if let Some(context) = self.context() {
            format!("{} [{}]", base_msg, context.format_for_log())
        } else {
            base_msg
        }
    }
}

/// Result type alias for finetile operations
pub type Result<T> = std::result::Result<T, FinetileError>;

/// Result type for tile-local operations
pub type TileResult<T> = std::result::Result<T, TileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_formatting() {
        let err = FinetileError::grid_with_context(
            "tile out of range",
            ErrorContext::new("bin", "grid")
                .with_metadata("x", 40)
                .with_metadata("y", 2),
        );

        assert_eq!(
            err.format_for_log(),
            "Grid error: tile out of range [operation=bin, component=grid, metadata=[x=40, y=2]]"
        );
    }

    #[test]
    fn test_tile_error_conversion() {
        let err: FinetileError = TileError::AlreadyTerminated.into();
        assert_eq!(err.as_tile_error(), Some(&TileError::AlreadyTerminated));
        assert!(err.context().is_none());
    }

    #[test]
    fn test_tile_error_messages() {
        let err = TileError::UnknownDiscriminator {
            tag: 0xff,
            offset: 12,
        };
        assert_eq!(
            err.to_string(),
            "unknown command discriminator 0xff at byte offset 12"
        );
    }
}
