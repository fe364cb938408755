//! Leaf tile discovery.
//!
//! Leaf vector tiles live at `<root>/{z}/{x}/{y}.geojson`, coordinates in the
//! CRS of the tile matrix set.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use raster_common::{RasterError, RasterResult, TileCoord, TileMatrixSet};
use rasterizer::{Feature, GeoJsonFeatureCollection};

/// The GeoJSON leaf tiles of one zoom level.
#[derive(Debug, Clone)]
pub struct LeafSource {
    root: PathBuf,
    zoom: u32,
}

impl LeafSource {
    pub fn new(root: impl Into<PathBuf>, zoom: u32) -> Self {
        Self {
            root: root.into(),
            zoom,
        }
    }

    pub fn path(&self, coord: TileCoord) -> PathBuf {
        self.root
            .join(coord.z.to_string())
            .join(coord.x.to_string())
            .join(format!("{}.geojson", coord.y))
    }

    /// Every leaf tile present on disk and inside `tms`, sorted.
    pub fn discover(&self, tms: TileMatrixSet) -> RasterResult<Vec<TileCoord>> {
        let dir = self.root.join(self.zoom.to_string());
        if !dir.is_dir() {
            return Err(RasterError::config(format!(
                "no leaf tiles for zoom {} under {}",
                self.zoom,
                self.root.display()
            )));
        }

        let mut coords = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| RasterError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            match parse_leaf_path(entry.path(), self.zoom) {
                Some(coord) if tms.contains(&coord) => coords.push(coord),
                Some(coord) => warn!(tile = %coord, "Leaf tile outside the tile matrix set, skipped"),
                None => debug!(path = %entry.path().display(), "Not a leaf tile, skipped"),
            }
        }
        coords.sort();
        Ok(coords)
    }

    /// Read the features of one leaf. Features without a usable geometry
    /// are dropped and counted.
    pub fn read(&self, coord: TileCoord) -> RasterResult<Vec<Feature>> {
        let path = self.path(coord);
        let bytes = fs::read(&path).map_err(|e| {
            RasterError::data(format!("cannot read {}: {}", path.display(), e)).with_tile(coord)
        })?;
        let collection = GeoJsonFeatureCollection::from_json(&bytes).map_err(|e| e.with_tile(coord))?;
        let (features, dropped) = collection.into_features();
        if dropped > 0 {
            debug!(tile = %coord, dropped, "Skipped features without a supported geometry");
        }
        Ok(features)
    }
}

/// `.../{x}/{y}.geojson` under the zoom directory.
fn parse_leaf_path(path: &Path, z: u32) -> Option<TileCoord> {
    if path.extension()? != "geojson" {
        return None;
    }
    let y = path.file_stem()?.to_str()?.parse().ok()?;
    let x = path.parent()?.file_name()?.to_str()?.parse().ok()?;
    Some(TileCoord::new(z, x, y))
}
