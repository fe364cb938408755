//! Persistence for raster pyramids.
//!
//! Provides:
//! - GeoTIFF encoding/decoding of [`raster_common::RasterTile`]
//! - The [`TileStore`] hand-off trait with filesystem and in-memory stores

pub mod error;
pub mod geotiff;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use geotiff::{decode_geotiff, encode_geotiff, read_geotiff, write_geotiff};
pub use store::{FileTileStore, MemoryTileStore, StoreStats, TileStore};
