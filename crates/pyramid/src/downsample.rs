//! Halving a grid's resolution.
//!
//! Each output cell is the [`CombineRule`] applied to the matching 2x2 block
//! of input cells. Odd trailing rows and columns are folded into the last
//! block, so a block may have fewer than four cells.

use crate::combine::CombineRule;
use raster_common::Grid;

/// Downsample a grid by a factor of 2.
///
/// The output has `ceil(width / 2)` x `ceil(height / 2)` cells and the same
/// nodata policy. Pyramid tiles always have even dimensions, in which case
/// this is exactly half.
pub fn downsample_2x(grid: &Grid, rule: CombineRule) -> Grid {
    let new_width = grid.width().div_ceil(2);
    let new_height = grid.height().div_ceil(2);
    let nodata = grid.nodata();

    let mut output = Vec::with_capacity(new_width * new_height);
    for out_y in 0..new_height {
        for out_x in 0..new_width {
            let block = block_at(grid, out_x * 2, out_y * 2);
            output.push(nodata.encode(rule.reduce_block(block)));
        }
    }

    Grid::from_vec(new_width, new_height, output, nodata)
        .unwrap_or_else(|_| Grid::filled(new_width, new_height, nodata))
}

/// The 2x2 block with its top-left corner at (col, row); cells past the
/// edge read as nodata.
#[inline]
fn block_at(grid: &Grid, col: usize, row: usize) -> [Option<f32>; 4] {
    let get = |c: usize, r: usize| {
        if c < grid.width() && r < grid.height() {
            grid.get(c, r)
        } else {
            None
        }
    };
    [
        get(col, row),
        get(col + 1, row),
        get(col, row + 1),
        get(col + 1, row + 1),
    ]
}
