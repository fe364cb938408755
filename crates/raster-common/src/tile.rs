//! Tile addressing and tile matrix sets.
//!
//! Tiles are addressed XYZ-style: `y` grows southwards from the top-left
//! corner of the matrix. Two OGC tile matrix sets are supported, which fix
//! the CRS of a pyramid.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BoundingBox, CrsCode};

/// Half the width of the Web Mercator square, in meters.
pub const WEB_MERCATOR_EXTENT: f64 = 20037508.342789244;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level (TileMatrix identifier)
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Get the parent tile (zoom - 1).
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord {
            z: self.z - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }

    /// Get the four children tiles (zoom + 1): top-left, top-right,
    /// bottom-left, bottom-right.
    pub fn children(&self) -> [TileCoord; 4] {
        let x = self.x * 2;
        let y = self.y * 2;
        let z = self.z + 1;
        [
            TileCoord { z, x, y },
            TileCoord { z, x: x + 1, y },
            TileCoord { z, x, y: y + 1 },
            TileCoord {
                z,
                x: x + 1,
                y: y + 1,
            },
        ]
    }

    /// Which quadrant of its parent this tile occupies.
    pub fn quadrant(&self) -> Quadrant {
        match (self.x & 1, self.y & 1) {
            (0, 0) => Quadrant::TopLeft,
            (1, 0) => Quadrant::TopRight,
            (0, _) => Quadrant::BottomLeft,
            _ => Quadrant::BottomRight,
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Position of a child inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    /// (column, row) offset in units of half the parent grid.
    pub fn offset(&self) -> (usize, usize) {
        match self {
            Quadrant::TopLeft => (0, 0),
            Quadrant::TopRight => (1, 0),
            Quadrant::BottomLeft => (0, 1),
            Quadrant::BottomRight => (1, 1),
        }
    }
}

/// Supported tile matrix sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TileMatrixSet {
    /// Web Mercator (Google/OSM) quad tree, one tile at zoom 0.
    #[default]
    WebMercatorQuad,
    /// Plate carrée quad tree, two tiles at zoom 0.
    #[serde(rename = "WorldCRS84Quad")]
    WorldCrs84Quad,
}

impl TileMatrixSet {
    pub fn identifier(&self) -> &'static str {
        match self {
            TileMatrixSet::WebMercatorQuad => "WebMercatorQuad",
            TileMatrixSet::WorldCrs84Quad => "WorldCRS84Quad",
        }
    }

    pub fn crs(&self) -> CrsCode {
        match self {
            TileMatrixSet::WebMercatorQuad => CrsCode::Epsg3857,
            TileMatrixSet::WorldCrs84Quad => CrsCode::Epsg4326,
        }
    }

    /// Bounding box of the whole matrix set.
    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            TileMatrixSet::WebMercatorQuad => BoundingBox::new(
                -WEB_MERCATOR_EXTENT,
                -WEB_MERCATOR_EXTENT,
                WEB_MERCATOR_EXTENT,
                WEB_MERCATOR_EXTENT,
            ),
            TileMatrixSet::WorldCrs84Quad => BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
        }
    }

    /// Number of tile (columns, rows) at a zoom level.
    pub fn matrix_size(&self, z: u32) -> (u32, u32) {
        let n = 1u32 << z;
        match self {
            TileMatrixSet::WebMercatorQuad => (n, n),
            TileMatrixSet::WorldCrs84Quad => (n * 2, n),
        }
    }

    /// Tile span in CRS units (x, y) at a zoom level.
    fn tile_span(&self, z: u32) -> (f64, f64) {
        let bbox = self.bounding_box();
        let (cols, rows) = self.matrix_size(z);
        (bbox.width() / cols as f64, bbox.height() / rows as f64)
    }

    /// Whether the coordinate exists in this matrix set.
    pub fn contains(&self, coord: &TileCoord) -> bool {
        let (cols, rows) = self.matrix_size(coord.z);
        coord.x < cols && coord.y < rows
    }

    /// Get the bounding box for a tile.
    pub fn tile_bbox(&self, coord: &TileCoord) -> BoundingBox {
        let bbox = self.bounding_box();
        let (span_x, span_y) = self.tile_span(coord.z);

        let min_x = bbox.min_x + coord.x as f64 * span_x;
        let max_y = bbox.max_y - coord.y as f64 * span_y;

        BoundingBox::new(min_x, max_y - span_y, min_x + span_x, max_y)
    }
}

impl fmt::Display for TileMatrixSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}
