//! Builds a raster pyramid and its web image tiles from tiled GeoJSON.
//!
//! Stages, each reading and writing through a [`storage::TileStore`]:
//!
//! 1. rasterize the leaf tiles `<in>/{z}/{x}/{y}.geojson`
//! 2. aggregate parents down to the minimum zoom
//! 3. colorize every stored raster into `web_tiles/{band}/{z}/{x}/{y}.png`

pub mod config;
pub mod input;
pub mod pipeline;

pub use config::{StatisticConfig, StretchScope, TilingConfig, ZoomRange};
pub use input::LeafSource;
pub use pipeline::{Pipeline, WebTileReport};
