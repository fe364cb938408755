//! Error taxonomy for the tiling pipeline.
//!
//! - [`RasterError::Config`]: unsupported statistic/geometry combination,
//!   malformed palette, invalid tiling config. Fatal, never retried.
//! - [`RasterError::Data`]: a problem with one tile's inputs. Reported with
//!   the tile and attribute it concerns; siblings keep going.
//! - [`PartialDataWarning`]: a parent built from fewer than four children.
//!   Not an error at all.

use std::fmt;
use thiserror::Error;

use crate::tile::TileCoord;

/// Result type alias using RasterError.
pub type RasterResult<T> = Result<T, RasterError>;

/// Primary error type for rasterization, aggregation and colorization.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("data error ({context}): {message}")]
    Data {
        context: ErrorContext,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RasterError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a data error without tile context.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data {
            context: ErrorContext::default(),
            message: msg.into(),
        }
    }

    /// Attach the tile this error concerns. Keeps an existing tile.
    pub fn with_tile(mut self, coord: TileCoord) -> Self {
        if let Self::Data { context, .. } = &mut self {
            context.tile.get_or_insert(coord);
        }
        self
    }

    /// Attach the attribute (band) this error concerns.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        if let Self::Data { context, .. } = &mut self {
            if context.attribute.is_none() {
                context.attribute = Some(attribute.into());
            }
        }
        self
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// The tile this error was raised for, if known.
    pub fn tile(&self) -> Option<TileCoord> {
        match self {
            Self::Data { context, .. } => context.tile,
            _ => None,
        }
    }
}

/// Where a data error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub tile: Option<TileCoord>,
    pub attribute: Option<String>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.tile, &self.attribute) {
            (Some(tile), Some(attr)) => write!(f, "tile {}, attribute '{}'", tile, attr),
            (Some(tile), None) => write!(f, "tile {}", tile),
            (None, Some(attr)) => write!(f, "attribute '{}'", attr),
            (None, None) => write!(f, "no tile context"),
        }
    }
}

/// A parent tile was built from fewer than four children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDataWarning {
    pub parent: TileCoord,
    pub missing: Vec<TileCoord>,
}

impl PartialDataWarning {
    pub fn present(&self) -> usize {
        4 - self.missing.len()
    }
}

impl fmt::Display for PartialDataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tile {} built from {} of 4 children (missing: {})",
            self.parent,
            self.present(),
            self.missing
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
