//! The build stages: rasterize leaves, build the pyramid, render web tiles.
//!
//! Every stage reads and writes through a [`TileStore`], so stages can run
//! separately (`rasterize`, then `pyramid`, then `web-tiles`) or chained by
//! [`Pipeline::build`].

use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::{StretchScope, TilingConfig};
use crate::input::LeafSource;
use pyramid::{PyramidGraph, PyramidReport, PyramidScheduler};
use raster_common::{RasterError, RasterResult, TileCoord, ValueRange};
use renderer::Colorizer;
use storage::TileStore;

/// What the web tile stage produced.
#[derive(Debug, Default)]
pub struct WebTileReport {
    /// Images written, over all bands.
    pub images: usize,
    /// Tiles rendered.
    pub tiles: usize,
    pub failed: Vec<(TileCoord, String)>,
}

impl WebTileReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs build stages for one configuration against one store.
pub struct Pipeline<'a> {
    config: &'a TilingConfig,
    store: &'a dyn TileStore,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a TilingConfig, store: &'a dyn TileStore) -> Self {
        Self { config, store }
    }

    /// Rasterize every leaf tile found under `source`, without parents.
    pub fn rasterize(&self, source: &LeafSource) -> RasterResult<PyramidReport> {
        let max = self.config.z_range.max;
        self.rasterize_down_to(source, max)
    }

    /// Rasterize leaves, then build every parent down to the minimum zoom.
    pub fn rasters(&self, source: &LeafSource) -> RasterResult<PyramidReport> {
        let min = self.config.z_range.min;
        self.rasterize_down_to(source, min)
    }

    fn rasterize_down_to(&self, source: &LeafSource, min_zoom: u32) -> RasterResult<PyramidReport> {
        let rasterizer = self.config.rasterizer()?;
        let layout = self.config.layout();
        let leaves = source.discover(self.config.tms)?;
        let graph = PyramidGraph::new(leaves, min_zoom)?;

        let aggregator = self.config.aggregator()?;
        let scheduler = PyramidScheduler::new(&aggregator, self.store, layout);
        let report = scheduler.run(graph, |coord| {
            let features = source.read(coord)?;
            if features.is_empty() {
                return Ok(None);
            }
            rasterizer
                .rasterize(&layout.spec(coord), &features)
                .map(Some)
                .map_err(|e| e.with_tile(coord))
        });
        fatal(report)
    }

    /// Build parents from leaf rasters already in the store.
    pub fn pyramid(&self) -> RasterResult<PyramidReport> {
        let leaves = self.store.list_rasters(self.config.z_range.max)?;
        if leaves.is_empty() {
            warn!(zoom = self.config.z_range.max, "No stored leaf rasters");
        }
        let graph = PyramidGraph::new(leaves, self.config.z_range.min)?;

        let aggregator = self.config.aggregator()?;
        let scheduler =
            PyramidScheduler::new(&aggregator, self.store, self.config.layout()).with_stored_leaves();
        let report = scheduler.run(graph, |coord| {
            self.store
                .get_raster(coord)
                .map_err(|e| RasterError::from(e).with_tile(coord))
        });
        fatal(report)
    }

    /// Colorize every stored raster of every zoom into one PNG per band.
    pub fn web_tiles(&self) -> RasterResult<WebTileReport> {
        let colorizers = self.config.colorizers()?;
        let mut report = WebTileReport::default();

        for z in self.config.z_range.min..=self.config.z_range.max {
            let start = Instant::now();
            let coords = self.store.list_rasters(z)?;
            if coords.is_empty() {
                continue;
            }
            let ranges = match self.config.stretch_scope {
                StretchScope::Tile => HashMap::new(),
                StretchScope::Zoom => self.zoom_ranges(&coords),
            };

            let results: Vec<(TileCoord, RasterResult<usize>)> = coords
                .par_iter()
                .map(|&coord| (coord, self.render_tile(coord, &colorizers, &ranges)))
                .collect();

            let mut written = 0;
            for (coord, result) in results {
                match result {
                    Ok(images) => {
                        written += images;
                        report.tiles += 1;
                    }
                    Err(e) => {
                        error!(tile = %coord, error = %e, "Web tile failed");
                        report.failed.push((coord, e.to_string()));
                    }
                }
            }
            report.images += written;
            info!(
                zoom = z,
                tiles = coords.len(),
                images = written,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Rendered zoom level"
            );
        }
        Ok(report)
    }

    /// All stages in order. Web tiles are rendered even when some raster
    /// tiles failed; the failures stay in the first report.
    pub fn build(&self, source: &LeafSource) -> RasterResult<(PyramidReport, WebTileReport)> {
        let rasters = self.rasters(source)?;
        let images = self.web_tiles()?;
        Ok((rasters, images))
    }

    /// Union of each band's value range over `coords`. Unreadable tiles are
    /// left out here and reported by the render pass.
    fn zoom_ranges(&self, coords: &[TileCoord]) -> HashMap<String, ValueRange> {
        coords
            .par_iter()
            .filter_map(|&coord| self.store.get_raster(coord).ok().flatten())
            .map(|tile| {
                tile.bands()
                    .iter()
                    .filter_map(|b| Some((b.name().to_string(), b.value_range()?)))
                    .collect::<HashMap<_, _>>()
            })
            .reduce(HashMap::new, |mut acc, ranges| {
                for (name, range) in ranges {
                    acc.entry(name)
                        .and_modify(|r: &mut ValueRange| *r = r.union(&range))
                        .or_insert(range);
                }
                acc
            })
    }

    fn render_tile(
        &self,
        coord: TileCoord,
        colorizers: &[(String, Colorizer)],
        ranges: &HashMap<String, ValueRange>,
    ) -> RasterResult<usize> {
        let tile = self
            .store
            .get_raster(coord)?
            .ok_or_else(|| RasterError::data("listed raster missing from store").with_tile(coord))?;

        for (band, colorizer) in colorizers {
            let observed = match self.config.stretch_scope {
                StretchScope::Tile => tile.band(band).and_then(|b| b.value_range()),
                StretchScope::Zoom => ranges.get(band).copied(),
            };
            let image = colorizer.colorize_band_with_range(&tile, band, observed)?;
            let png = image.to_png(self.config.png_mode)?;
            self.store
                .put_image(band, coord, &png)
                .map_err(|e| RasterError::from(e).with_tile(coord))?;
        }
        Ok(colorizers.len())
    }
}

/// Surface a configuration error that stopped the build.
fn fatal(mut report: PyramidReport) -> RasterResult<PyramidReport> {
    match report.fatal.take() {
        Some(err) => Err(err),
        None => Ok(report),
    }
}
