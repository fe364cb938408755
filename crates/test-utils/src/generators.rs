//! Test data generators for grids, tiles and vector geometry.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite.

use geo::{LineString, Point, Polygon};
use raster_common::{Band, Grid, NodataPolicy, RasterTile, TileSpec};

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a [`Grid`] of `value` with nodata at the given (col, row) cells.
pub fn create_grid_with_nodata(
    width: usize,
    height: usize,
    value: f32,
    nodata_positions: &[(usize, usize)],
    nodata: NodataPolicy,
) -> Grid {
    let mut grid = Grid::from_vec(width, height, create_constant_grid(width, height, value), nodata)
        .expect("constant grid has the right length");
    for &(col, row) in nodata_positions {
        grid.set(col, row, None);
    }
    grid
}

/// A tile whose every band is a constant grid.
pub fn constant_tile(spec: &TileSpec, bands: &[(&str, f32)]) -> RasterTile {
    let bands = bands
        .iter()
        .map(|(name, value)| {
            let grid = Grid::from_vec(
                spec.width,
                spec.height,
                create_constant_grid(spec.width, spec.height, *value),
                spec.nodata,
            )
            .expect("constant grid has the right length");
            Band::new(*name, grid)
        })
        .collect();
    RasterTile::new(spec.clone(), bands).expect("constant tile is valid")
}

/// A tile built from explicit per-band grids given as row-major options.
pub fn tile_from_rows(spec: &TileSpec, bands: &[(&str, Vec<Option<f32>>)]) -> RasterTile {
    let bands = bands
        .iter()
        .map(|(name, values)| {
            let grid = Grid::from_options(spec.width, spec.height, values, spec.nodata)
                .expect("values match the tile resolution");
            Band::new(*name, grid)
        })
        .collect();
    RasterTile::new(spec.clone(), bands).expect("tile is valid")
}

/// Axis-aligned square polygon.
pub fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
            (min_x, min_y),
        ]),
        vec![],
    )
}

/// `count` pseudo-random squares inside `bounds`, each with a value.
///
/// Deterministic for a given seed.
pub fn scattered_squares(
    bounds: (f64, f64, f64, f64),
    count: usize,
    max_size: f64,
    seed: u32,
) -> Vec<(Polygon<f64>, f64)> {
    let (min_x, min_y, max_x, max_y) = bounds;
    (0..count)
        .map(|i| {
            let hx = unit(simple_hash(i as u32, 0, seed));
            let hy = unit(simple_hash(i as u32, 1, seed));
            let hs = unit(simple_hash(i as u32, 2, seed));
            let size = max_size * (0.1 + 0.9 * hs);
            let x = min_x + hx * (max_x - min_x - size).max(0.0);
            let y = min_y + hy * (max_y - min_y - size).max(0.0);
            let value = (simple_hash(i as u32, 3, seed) % 1000) as f64 / 10.0;
            (square(x, y, x + size, y + size), value)
        })
        .collect()
}

/// `count` pseudo-random points inside `bounds`.
pub fn scattered_points(bounds: (f64, f64, f64, f64), count: usize, seed: u32) -> Vec<Point<f64>> {
    let (min_x, min_y, max_x, max_y) = bounds;
    (0..count)
        .map(|i| {
            let hx = unit(simple_hash(i as u32, 0, seed));
            let hy = unit(simple_hash(i as u32, 1, seed));
            Point::new(min_x + hx * (max_x - min_x), min_y + hy * (max_y - min_y))
        })
        .collect()
}

fn unit(hash: u32) -> f64 {
    hash as f64 / u32::MAX as f64
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}
