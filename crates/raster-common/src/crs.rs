//! Coordinate Reference System identifiers.
//!
//! The pipeline never reprojects: a pyramid is built in exactly one CRS,
//! fixed by its tile matrix set. The code is carried on every tile so that
//! mismatched inputs are caught before they are combined.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known CRS codes supported by the tile matrix sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
}

impl CrsCode {
    /// Numeric EPSG code, as written into GeoTIFF GeoKeys.
    pub fn epsg(&self) -> u16 {
        match self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Epsg3857 => 3857,
        }
    }

    /// Inverse of [`CrsCode::epsg`].
    pub fn from_epsg(code: u16) -> Result<Self, CrsParseError> {
        match code {
            4326 => Ok(CrsCode::Epsg4326),
            3857 => Ok(CrsCode::Epsg3857),
            other => Err(CrsParseError::UnsupportedCrs(format!("EPSG:{}", other))),
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
