//! Common types shared across the vector-to-raster tiling crates.
//!
//! Everything that touches a numeric grid goes through [`NodataPolicy`], so
//! the rasterizer, the pyramid aggregator and the colorizer always agree on
//! what an empty cell looks like.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod nodata;
pub mod raster_tile;
pub mod tile;

pub use bbox::BoundingBox;
pub use crs::{CrsCode, CrsParseError};
pub use error::{ErrorContext, PartialDataWarning, RasterError, RasterResult};
pub use grid::Grid;
pub use nodata::NodataPolicy;
pub use raster_tile::{
    Band, BandSummary, RangeSupport, RasterTile, TileLayout, TileSpec, ValueRange,
};
pub use tile::{Quadrant, TileCoord, TileMatrixSet};
