//! Common test fixtures.
//!
//! Pre-defined bounds, tile specs and GeoJSON documents that represent
//! common scenarios in the tiling pipeline.

use raster_common::{BoundingBox, CrsCode, NodataPolicy, TileCoord, TileMatrixSet, TileSpec};

/// Common bounding box definitions for testing.
pub mod bbox {
    /// Global geographic extent
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// A 10x10 square at the origin, the usual hand-checked tile
    pub const UNIT_TILE: (f64, f64, f64, f64) = (0.0, 0.0, 10.0, 10.0);

    /// Degenerate box with zero width
    pub const ZERO_WIDTH: (f64, f64, f64, f64) = (5.0, 0.0, 5.0, 10.0);

    /// Inverted box (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Tile spec over [`bbox::UNIT_TILE`] in EPSG:4326.
pub fn unit_tile_spec(coord: TileCoord, size: usize) -> TileSpec {
    let (min_x, min_y, max_x, max_y) = bbox::UNIT_TILE;
    TileSpec::new(
        coord,
        BoundingBox::new(min_x, min_y, max_x, max_y),
        CrsCode::Epsg4326,
        size,
        size,
        NodataPolicy::default(),
    )
}

/// Tile spec of a WorldCRS84Quad tile.
pub fn crs84_tile_spec(coord: TileCoord, size: usize) -> TileSpec {
    TileSpec::from_tms(
        TileMatrixSet::WorldCrs84Quad,
        coord,
        size,
        size,
        NodataPolicy::default(),
    )
}

/// GeoJSON FeatureCollection with one square polygon per entry.
///
/// Each entry is `(min_x, min_y, max_x, max_y, properties-json)`.
pub fn squares_geojson(squares: &[(f64, f64, f64, f64, &str)]) -> String {
    let features: Vec<String> = squares
        .iter()
        .map(|(x0, y0, x1, y1, props)| {
            format!(
                r#"{{"type":"Feature","geometry":{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}},"properties":{props}}}"#
            )
        })
        .collect();
    format!(
        r#"{{"type":"FeatureCollection","features":[{}]}}"#,
        features.join(",")
    )
}
