//! Fixed-size numeric grids.
//!
//! Cells are stored row-major. Row 0 is the northern (max-y) edge of the
//! tile and column 0 the western (min-x) edge, matching GeoTIFF and web
//! tile pixel order.

use crate::error::{RasterError, RasterResult};
use crate::nodata::NodataPolicy;
use crate::raster_tile::{BandSummary, ValueRange};

/// A 2D grid of `f32` cells with its nodata policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    data: Vec<f32>,
    nodata: NodataPolicy,
}

impl Grid {
    /// A grid with every cell set to nodata.
    pub fn filled(width: usize, height: usize, nodata: NodataPolicy) -> Self {
        Self {
            width,
            height,
            data: vec![nodata.sentinel(); width * height],
            nodata,
        }
    }

    /// Wrap existing row-major data.
    pub fn from_vec(
        width: usize,
        height: usize,
        data: Vec<f32>,
        nodata: NodataPolicy,
    ) -> RasterResult<Self> {
        if data.len() != width * height {
            return Err(RasterError::data(format!(
                "grid data has {} cells, expected {}x{}={}",
                data.len(),
                width,
                height,
                width * height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            nodata,
        })
    }

    /// Build a grid from optional values, `None` meaning nodata.
    pub fn from_options(
        width: usize,
        height: usize,
        values: &[Option<f32>],
        nodata: NodataPolicy,
    ) -> RasterResult<Self> {
        let data = values.iter().map(|v| nodata.encode(*v)).collect();
        Self::from_vec(width, height, data, nodata)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn nodata(&self) -> NodataPolicy {
        self.nodata
    }

    /// Raw cell storage, sentinel included.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.width + col
    }

    /// Valid value at a cell; `None` for nodata or out of range.
    #[inline]
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.nodata.valid(self.data[self.index(col, row)])
    }

    /// Set a cell. `None` writes the sentinel.
    #[inline]
    pub fn set(&mut self, col: usize, row: usize, value: Option<f32>) {
        if col < self.width && row < self.height {
            let idx = self.index(col, row);
            self.data[idx] = self.nodata.encode(value);
        }
    }

    /// Rows as vectors of optional values, top row first.
    pub fn rows(&self) -> Vec<Vec<Option<f32>>> {
        self.data
            .chunks(self.width.max(1))
            .map(|row| row.iter().map(|v| self.nodata.valid(*v)).collect())
            .collect()
    }

    /// Iterate valid values only.
    pub fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().filter_map(|v| self.nodata.valid(*v))
    }

    pub fn valid_count(&self) -> usize {
        self.valid_values().count()
    }

    pub fn is_all_nodata(&self) -> bool {
        self.valid_values().next().is_none()
    }

    /// Observed (min, max) over valid cells.
    pub fn value_range(&self) -> Option<ValueRange> {
        self.valid_values().fold(None, |acc, v| match acc {
            None => Some(ValueRange::new(v, v)),
            Some(r) => Some(ValueRange::new(r.min.min(v), r.max.max(v))),
        })
    }

    /// Summary statistics over valid cells.
    pub fn summary(&self) -> Option<BandSummary> {
        BandSummary::from_values(self.valid_values())
    }

    /// Apply `f` to every valid cell, keeping nodata cells as they are.
    pub fn map_valid<F>(&self, f: F) -> Grid
    where
        F: Fn(f32) -> Option<f32>,
    {
        let data = self
            .data
            .iter()
            .map(|v| self.nodata.encode(self.nodata.valid(*v).and_then(&f)))
            .collect();
        Grid {
            width: self.width,
            height: self.height,
            data,
            nodata: self.nodata,
        }
    }

    /// Copy `src` into this grid with its top-left corner at (col, row).
    pub fn paste(&mut self, src: &Grid, col: usize, row: usize) {
        for src_row in 0..src.height {
            let dst_row = row + src_row;
            if dst_row >= self.height {
                break;
            }
            for src_col in 0..src.width {
                let dst_col = col + src_col;
                if dst_col >= self.width {
                    break;
                }
                self.set(dst_col, dst_row, src.get(src_col, src_row));
            }
        }
    }
}
