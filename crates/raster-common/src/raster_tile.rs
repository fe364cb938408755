//! The raster tile artifact.
//!
//! A [`RasterTile`] is produced once (by the rasterizer for leaf tiles, by
//! the pyramid aggregator for interior tiles) and never mutated afterwards.
//! Per-band value ranges are computed when the band is built, so they can
//! never drift from the data they describe.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, RasterResult};
use crate::{BoundingBox, CrsCode, Grid, NodataPolicy, TileCoord, TileMatrixSet};

/// Observed (min, max) over the valid cells of a band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    pub fn union(&self, other: &ValueRange) -> ValueRange {
        ValueRange::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Summary statistics over the valid cells of a band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSummary {
    pub min: f32,
    pub max: f32,
    pub mean: f64,
    pub std: f64,
    pub sum: f64,
    pub valid_count: usize,
}

impl BandSummary {
    /// `None` when there are no values.
    pub fn from_values(values: impl Iterator<Item = f32>) -> Option<BandSummary> {
        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for v in values {
            count += 1;
            sum += v as f64;
            sum_sq += (v as f64) * (v as f64);
            min = min.min(v);
            max = max.max(v);
        }

        if count == 0 {
            return None;
        }

        let mean = sum / count as f64;
        // population variance, clamped against rounding below zero
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);

        Some(BandSummary {
            min,
            max,
            mean,
            std: variance.sqrt(),
            sum,
            valid_count: count,
        })
    }
}

/// Per-cell extrema kept next to a `range` band.
///
/// Combining two ranges cannot recover the range of the union, so the
/// pyramid rebuilds `max - min` from these grids instead.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSupport {
    pub min: Grid,
    pub max: Grid,
}

/// Geometry of a tile: where it is, how big its grids are, what is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSpec {
    pub coord: TileCoord,
    pub bounds: BoundingBox,
    pub crs: CrsCode,
    pub width: usize,
    pub height: usize,
    pub nodata: NodataPolicy,
}

impl TileSpec {
    pub fn new(
        coord: TileCoord,
        bounds: BoundingBox,
        crs: CrsCode,
        width: usize,
        height: usize,
        nodata: NodataPolicy,
    ) -> Self {
        Self {
            coord,
            bounds,
            crs,
            width,
            height,
            nodata,
        }
    }

    /// Spec for a tile of a tile matrix set, bounds and CRS derived from it.
    pub fn from_tms(
        tms: TileMatrixSet,
        coord: TileCoord,
        width: usize,
        height: usize,
        nodata: NodataPolicy,
    ) -> Self {
        Self::new(coord, tms.tile_bbox(&coord), tms.crs(), width, height, nodata)
    }

    /// Check the `TileSpec` can carry a grid at all.
    pub fn validate(&self) -> RasterResult<()> {
        self.bounds
            .validate_extent()
            .map_err(|e| e.with_tile(self.coord))?;
        if self.width == 0 || self.height == 0 {
            return Err(RasterError::data(format!(
                "tile resolution must be positive, got {}x{}",
                self.width, self.height
            ))
            .with_tile(self.coord));
        }
        Ok(())
    }

    /// Size of one cell in CRS units (x, y).
    pub fn pixel_size(&self) -> (f64, f64) {
        (
            self.bounds.width() / self.width as f64,
            self.bounds.height() / self.height as f64,
        )
    }

    /// A fresh all-nodata grid of this tile's resolution.
    pub fn empty_grid(&self) -> Grid {
        self.nodata.fill(self.width, self.height)
    }
}

/// What every tile of one pyramid shares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLayout {
    pub tms: TileMatrixSet,
    pub width: usize,
    pub height: usize,
    pub nodata: NodataPolicy,
}

impl TileLayout {
    pub fn new(tms: TileMatrixSet, width: usize, height: usize, nodata: NodataPolicy) -> Self {
        Self {
            tms,
            width,
            height,
            nodata,
        }
    }

    pub fn spec(&self, coord: TileCoord) -> TileSpec {
        TileSpec::from_tms(self.tms, coord, self.width, self.height, self.nodata)
    }
}

/// One named grid of a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    name: String,
    grid: Grid,
    value_range: Option<ValueRange>,
    support: Option<RangeSupport>,
}

impl Band {
    pub fn new(name: impl Into<String>, grid: Grid) -> Self {
        let value_range = grid.value_range();
        Self {
            name: name.into(),
            grid,
            value_range,
            support: None,
        }
    }

    pub fn with_support(mut self, support: RangeSupport) -> Self {
        self.support = Some(support);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Observed range over valid cells; `None` for an all-nodata band.
    pub fn value_range(&self) -> Option<ValueRange> {
        self.value_range
    }

    pub fn support(&self) -> Option<&RangeSupport> {
        self.support.as_ref()
    }

    pub fn summary(&self) -> Option<BandSummary> {
        self.grid.summary()
    }

    pub fn is_all_nodata(&self) -> bool {
        self.value_range.is_none()
    }
}

/// Numeric grids plus the geospatial metadata that places them.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile {
    spec: TileSpec,
    bands: Vec<Band>,
}

impl RasterTile {
    /// Assemble a tile, checking every band against its `TileSpec`.
    pub fn new(spec: TileSpec, bands: Vec<Band>) -> RasterResult<Self> {
        spec.validate()?;

        for (i, band) in bands.iter().enumerate() {
            let mut grids = vec![band.grid()];
            if let Some(support) = band.support() {
                grids.push(&support.min);
                grids.push(&support.max);
            }
            for grid in grids {
                if grid.width() != spec.width || grid.height() != spec.height {
                    return Err(RasterError::data(format!(
                        "band grid is {}x{}, tile resolution is {}x{}",
                        grid.width(),
                        grid.height(),
                        spec.width,
                        spec.height
                    ))
                    .with_tile(spec.coord)
                    .with_attribute(band.name()));
                }
                if grid.nodata() != spec.nodata {
                    return Err(RasterError::data(format!(
                        "band nodata {} differs from tile nodata {}",
                        grid.nodata().to_tag_string(),
                        spec.nodata.to_tag_string()
                    ))
                    .with_tile(spec.coord)
                    .with_attribute(band.name()));
                }
            }
            if bands[..i].iter().any(|b| b.name() == band.name()) {
                return Err(RasterError::data("duplicate band name")
                    .with_tile(spec.coord)
                    .with_attribute(band.name()));
            }
        }

        Ok(Self { spec, bands })
    }

    pub fn spec(&self) -> &TileSpec {
        &self.spec
    }

    pub fn coord(&self) -> TileCoord {
        self.spec.coord
    }

    pub fn bounds(&self) -> BoundingBox {
        self.spec.bounds
    }

    pub fn crs(&self) -> CrsCode {
        self.spec.crs
    }

    /// Resolution as (width, height).
    pub fn resolution(&self) -> (usize, usize) {
        (self.spec.width, self.spec.height)
    }

    pub fn nodata(&self) -> NodataPolicy {
        self.spec.nodata
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name() == name)
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name()).collect()
    }

    /// True when no band holds a single valid cell.
    pub fn is_empty(&self) -> bool {
        self.bands.iter().all(|b| b.is_all_nodata())
    }

    /// Tiles that are combined must share CRS, resolution and sentinel.
    pub fn ensure_compatible(&self, other: &TileSpec) -> RasterResult<()> {
        if self.spec.crs != other.crs {
            return Err(RasterError::data(format!(
                "CRS mismatch: {} vs {}",
                self.spec.crs, other.crs
            ))
            .with_tile(self.coord()));
        }
        if self.resolution() != (other.width, other.height) {
            return Err(RasterError::data(format!(
                "resolution mismatch: {}x{} vs {}x{}",
                self.spec.width, self.spec.height, other.width, other.height
            ))
            .with_tile(self.coord()));
        }
        if self.spec.nodata != other.nodata {
            return Err(RasterError::data(format!(
                "nodata mismatch: {} vs {}",
                self.spec.nodata.to_tag_string(),
                other.nodata.to_tag_string()
            ))
            .with_tile(self.coord()));
        }
        Ok(())
    }
}
