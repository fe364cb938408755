//! Mapping features onto cells.
//!
//! [`CellGrid`] is the affine transform between CRS coordinates and cell
//! indices. [`Footprint`] records, once per feature, which cells it touches
//! and how much of each; a [`CoveragePolicy`] then turns the footprint into
//! weighted contributions for a particular statistic.

use geo::{BoundingRect, Centroid, Coord, Geometry, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::clip::polygon_area_in_rect;
use crate::statistic::Statistic;
use raster_common::{BoundingBox, TileSpec};

/// How a polygon contributes to the cells it overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoveragePolicy {
    /// Every cell with a strictly positive overlap gets weight 1.
    AnyOverlap,
    /// Every overlapped cell gets the covered fraction of the cell as weight.
    #[default]
    FractionalArea,
    /// Only the cell holding the polygon's centroid, with weight 1.
    Centroid,
}

/// Affine mapping between CRS coordinates and cell indices.
///
/// Row 0 is the northern edge. A cell owns `[west, east) x (south, north]`;
/// coordinates on the tile's east or south boundary fall into the last
/// column or row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGrid {
    pub bounds: BoundingBox,
    pub width: usize,
    pub height: usize,
    cell_w: f64,
    cell_h: f64,
}

impl CellGrid {
    pub fn new(spec: &TileSpec) -> Self {
        let (cell_w, cell_h) = spec.pixel_size();
        Self {
            bounds: spec.bounds,
            width: spec.width,
            height: spec.height,
            cell_w,
            cell_h,
        }
    }

    pub fn cell_area(&self) -> f64 {
        self.cell_w * self.cell_h
    }

    #[inline]
    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.width + col
    }

    /// Cell containing a coordinate, `None` outside the tile.
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if !self.bounds.contains_point(x, y) {
            return None;
        }
        let col = ((x - self.bounds.min_x) / self.cell_w).floor() as usize;
        let row = ((self.bounds.max_y - y) / self.cell_h).floor() as usize;
        Some((col.min(self.width - 1), row.min(self.height - 1)))
    }

    pub fn cell_bounds(&self, col: usize, row: usize) -> BoundingBox {
        let min_x = self.bounds.min_x + col as f64 * self.cell_w;
        let max_y = self.bounds.max_y - row as f64 * self.cell_h;
        BoundingBox::new(min_x, max_y - self.cell_h, min_x + self.cell_w, max_y)
    }

    /// Columns and rows of the cells a box may overlap.
    pub fn cell_range(&self, bbox: &BoundingBox) -> Option<(Range<usize>, Range<usize>)> {
        let area = bbox.intersection(&self.bounds)?;
        let col0 = ((area.min_x - self.bounds.min_x) / self.cell_w).floor().max(0.0) as usize;
        let col1 = ((area.max_x - self.bounds.min_x) / self.cell_w).ceil() as usize;
        let row0 = ((self.bounds.max_y - area.max_y) / self.cell_h).floor().max(0.0) as usize;
        let row1 = ((self.bounds.max_y - area.min_y) / self.cell_h).ceil() as usize;
        Some((
            col0.min(self.width)..col1.min(self.width),
            row0.min(self.height)..row1.min(self.height),
        ))
    }
}

/// Share of one cell covered by a feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellHit {
    pub index: usize,
    /// Covered area over cell area, in (0, 1].
    pub fraction: f64,
}

/// The cells a feature touches inside one tile.
#[derive(Debug, Clone, PartialEq)]
pub enum Footprint {
    /// Point features: each distinct containing cell.
    Points(Vec<usize>),
    /// Areal features: overlapped cells and the centroid cell.
    Area {
        hits: Vec<CellHit>,
        centroid: Option<usize>,
    },
}

/// Geometry shapes the rasterizer can burn.
enum Shape {
    Points(Vec<Coord<f64>>),
    Areas(MultiPolygon<f64>),
}

fn flatten(geometry: &Geometry<f64>, points: &mut Vec<Coord<f64>>, polygons: &mut Vec<Polygon<f64>>) -> bool {
    match geometry {
        Geometry::Point(p) => points.push(p.0),
        Geometry::MultiPoint(mp) => points.extend(mp.iter().map(|p| p.0)),
        Geometry::Polygon(p) => polygons.push(p.clone()),
        Geometry::MultiPolygon(mp) => polygons.extend(mp.iter().cloned()),
        Geometry::Rect(r) => polygons.push(r.to_polygon()),
        Geometry::Triangle(t) => polygons.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            return gc.iter().all(|g| flatten(g, points, polygons));
        }
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
            return false
        }
    }
    true
}

fn shape(geometry: &Geometry<f64>) -> Option<Shape> {
    let mut points = Vec::new();
    let mut polygons = Vec::new();
    if !flatten(geometry, &mut points, &mut polygons) {
        return None;
    }
    match (points.is_empty(), polygons.is_empty()) {
        (false, true) => Some(Shape::Points(points)),
        (true, false) => Some(Shape::Areas(MultiPolygon::new(polygons))),
        // mixed or empty collections
        _ => None,
    }
}

impl Footprint {
    /// Footprint of a geometry. `None` when the geometry type cannot be
    /// burned (lines, mixed collections).
    pub fn of(geometry: &Geometry<f64>, grid: &CellGrid) -> Option<Footprint> {
        match shape(geometry)? {
            Shape::Points(coords) => {
                let mut cells: Vec<usize> = coords
                    .iter()
                    .filter_map(|c| grid.cell_of(c.x, c.y))
                    .map(|(col, row)| grid.index(col, row))
                    .collect();
                cells.sort_unstable();
                cells.dedup();
                Some(Footprint::Points(cells))
            }
            Shape::Areas(polygons) => {
                let cell_area = grid.cell_area();
                let mut hits = Vec::new();

                for polygon in polygons.iter() {
                    let Some(rect) = polygon.bounding_rect() else {
                        continue;
                    };
                    let bbox = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);
                    let Some((cols, rows)) = grid.cell_range(&bbox) else {
                        continue;
                    };
                    for row in rows {
                        for col in cols.clone() {
                            let area = polygon_area_in_rect(polygon, &grid.cell_bounds(col, row));
                            if area > 0.0 {
                                hits.push(CellHit {
                                    index: grid.index(col, row),
                                    fraction: (area / cell_area).min(1.0),
                                });
                            }
                        }
                    }
                }

                // parts of one multipolygon landing in the same cell are merged
                if polygons.0.len() > 1 {
                    hits.sort_unstable_by_key(|h| h.index);
                    hits.dedup_by(|later, first| {
                        if later.index == first.index {
                            first.fraction = (first.fraction + later.fraction).min(1.0);
                            true
                        } else {
                            false
                        }
                    });
                }

                let centroid = polygons
                    .centroid()
                    .and_then(|c| grid.cell_of(c.x(), c.y()))
                    .map(|(col, row)| grid.index(col, row));

                Some(Footprint::Area { hits, centroid })
            }
        }
    }

    pub fn is_areal(&self) -> bool {
        matches!(self, Footprint::Area { .. })
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Footprint::Points(cells) => cells.is_empty(),
            Footprint::Area { hits, centroid } => hits.is_empty() && centroid.is_none(),
        }
    }

    /// Contributions `(cell, weight, fraction)` of this feature for one
    /// statistic under a coverage policy.
    ///
    /// `percent_cover` always measures true covered area, whatever the
    /// policy.
    pub fn contributions(
        &self,
        policy: CoveragePolicy,
        statistic: Statistic,
    ) -> Vec<(usize, f64, f64)> {
        match self {
            Footprint::Points(cells) => cells.iter().map(|&i| (i, 1.0, 0.0)).collect(),
            Footprint::Area { hits, centroid } => {
                if statistic == Statistic::PercentCover {
                    return hits.iter().map(|h| (h.index, 1.0, h.fraction)).collect();
                }
                match policy {
                    CoveragePolicy::AnyOverlap => {
                        hits.iter().map(|h| (h.index, 1.0, h.fraction)).collect()
                    }
                    CoveragePolicy::FractionalArea => {
                        hits.iter().map(|h| (h.index, h.fraction, h.fraction)).collect()
                    }
                    CoveragePolicy::Centroid => centroid
                        .map(|c| {
                            let fraction = hits
                                .iter()
                                .find(|h| h.index == c)
                                .map_or(0.0, |h| h.fraction);
                            vec![(c, 1.0, fraction)]
                        })
                        .unwrap_or_default(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, MultiPoint};
    use raster_common::{CrsCode, NodataPolicy, TileCoord};

    fn grid(width: usize, height: usize) -> CellGrid {
        CellGrid::new(&TileSpec::new(
            TileCoord::new(0, 0, 0),
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            CrsCode::Epsg4326,
            width,
            height,
            NodataPolicy::default(),
        ))
    }

    #[test]
    fn test_cell_of_uses_top_left_origin() {
        let g = grid(2, 2);
        assert_eq!(g.cell_of(1.0, 9.0), Some((0, 0)));
        assert_eq!(g.cell_of(1.0, 1.0), Some((0, 1)));
        assert_eq!(g.cell_of(9.0, 1.0), Some((1, 1)));
        assert_eq!(g.cell_of(11.0, 1.0), None);
    }

    #[test]
    fn test_cell_ownership_on_boundaries() {
        let g = grid(2, 2);
        // west edge of column 1 belongs to column 1
        assert_eq!(g.cell_of(5.0, 9.0), Some((1, 0)));
        // north edge of row 1 belongs to row 1
        assert_eq!(g.cell_of(1.0, 5.0), Some((0, 1)));
        // tile east and south edges fold into the last column and row
        assert_eq!(g.cell_of(10.0, 0.0), Some((1, 1)));
        assert_eq!(g.cell_of(0.0, 10.0), Some((0, 0)));
    }

    #[test]
    fn test_cell_bounds() {
        let g = grid(2, 2);
        assert_eq!(g.cell_bounds(1, 0), BoundingBox::new(5.0, 5.0, 10.0, 10.0));
        assert_eq!(g.cell_bounds(0, 1), BoundingBox::new(0.0, 0.0, 5.0, 5.0));
    }

    #[test]
    fn test_polygon_footprint_fractions() {
        let g = grid(2, 2);
        let p = Geometry::Polygon(polygon![
            (x: 2.5, y: 2.5), (x: 7.5, y: 2.5), (x: 7.5, y: 5.0), (x: 2.5, y: 5.0)
        ]);
        let Some(Footprint::Area { hits, centroid }) = Footprint::of(&p, &g) else {
            panic!("expected an areal footprint");
        };
        assert_eq!(hits.len(), 2);
        for hit in &hits {
            assert!((hit.fraction - 0.25).abs() < 1e-12);
        }
        // centroid (5, 3.75) lies on the column boundary and belongs east
        assert_eq!(centroid, Some(g.index(1, 1)));
    }

    #[test]
    fn test_policy_contributions() {
        let g = grid(2, 2);
        let p = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 6.0, y: 0.0), (x: 6.0, y: 4.0), (x: 0.0, y: 4.0)
        ]);
        let footprint = Footprint::of(&p, &g).unwrap();

        let any = footprint.contributions(CoveragePolicy::AnyOverlap, Statistic::Sum);
        assert_eq!(any.len(), 2);
        assert!(any.iter().all(|c| c.1 == 1.0));

        let frac = footprint.contributions(CoveragePolicy::FractionalArea, Statistic::Sum);
        let left = frac.iter().find(|c| c.0 == g.index(0, 1)).unwrap();
        assert!((left.1 - 0.8).abs() < 1e-12);

        let centroid = footprint.contributions(CoveragePolicy::Centroid, Statistic::Sum);
        assert_eq!(centroid.len(), 1);
        assert_eq!(centroid[0].0, g.index(0, 1));

        let cover = footprint.contributions(CoveragePolicy::Centroid, Statistic::PercentCover);
        assert_eq!(cover.len(), 2);
    }

    #[test]
    fn test_points_and_unsupported() {
        let g = grid(2, 2);
        let mp = Geometry::MultiPoint(MultiPoint::new(vec![
            point!(x: 1.0, y: 1.0),
            point!(x: 2.0, y: 2.0),
            point!(x: 20.0, y: 2.0),
        ]));
        assert_eq!(Footprint::of(&mp, &g), Some(Footprint::Points(vec![g.index(0, 1)])));

        let line = Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]);
        assert_eq!(Footprint::of(&line, &g), None);
    }

    #[test]
    fn test_polygon_outside_tile_is_empty() {
        let g = grid(2, 2);
        let p = Geometry::Polygon(polygon![
            (x: 20.0, y: 20.0), (x: 30.0, y: 20.0), (x: 30.0, y: 30.0)
        ]);
        assert!(Footprint::of(&p, &g).unwrap().is_empty());
    }
}
