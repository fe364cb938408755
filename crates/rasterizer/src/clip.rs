//! Polygon clipping against axis-aligned cells.
//!
//! Sutherland-Hodgman against a rectangle. The clip window is convex, so the
//! clipped ring has the right area even for concave input; the only artefacts
//! are zero-width bridges, which contribute no area.

use geo::{Area, Coord, LineString, Polygon};
use raster_common::BoundingBox;

#[derive(Clone, Copy)]
enum Edge {
    Left(f64),
    Right(f64),
    Bottom(f64),
    Top(f64),
}

impl Edge {
    #[inline]
    fn inside(&self, c: Coord<f64>) -> bool {
        match *self {
            Edge::Left(k) => c.x >= k,
            Edge::Right(k) => c.x <= k,
            Edge::Bottom(k) => c.y >= k,
            Edge::Top(k) => c.y <= k,
        }
    }

    /// Crossing point of segment p-q with this edge. Only called when p and
    /// q lie on different sides, so the denominator is never zero.
    #[inline]
    fn intersect(&self, p: Coord<f64>, q: Coord<f64>) -> Coord<f64> {
        match *self {
            Edge::Left(k) | Edge::Right(k) => {
                let t = (k - p.x) / (q.x - p.x);
                Coord {
                    x: k,
                    y: p.y + t * (q.y - p.y),
                }
            }
            Edge::Bottom(k) | Edge::Top(k) => {
                let t = (k - p.y) / (q.y - p.y);
                Coord {
                    x: p.x + t * (q.x - p.x),
                    y: k,
                }
            }
        }
    }
}

/// Clip a ring to a rectangle. The result is open (first != last) and may be
/// empty.
pub fn clip_ring(ring: &LineString<f64>, rect: &BoundingBox) -> Vec<Coord<f64>> {
    let mut output: Vec<Coord<f64>> = ring.0.clone();
    if output.len() > 1 && output.first() == output.last() {
        output.pop();
    }

    let edges = [
        Edge::Left(rect.min_x),
        Edge::Right(rect.max_x),
        Edge::Bottom(rect.min_y),
        Edge::Top(rect.max_y),
    ];

    for edge in edges {
        if output.len() < 3 {
            return Vec::new();
        }
        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        for &cur in &input {
            let cur_in = edge.inside(cur);
            let prev_in = edge.inside(prev);
            if cur_in {
                if !prev_in {
                    output.push(edge.intersect(prev, cur));
                }
                output.push(cur);
            } else if prev_in {
                output.push(edge.intersect(prev, cur));
            }
            prev = cur;
        }
    }

    if output.len() < 3 {
        return Vec::new();
    }
    output
}

fn ring_area(coords: Vec<Coord<f64>>) -> f64 {
    if coords.len() < 3 {
        return 0.0;
    }
    Polygon::new(LineString::new(coords), vec![]).unsigned_area()
}

/// Area of `polygon` (holes subtracted) that falls inside `rect`.
pub fn polygon_area_in_rect(polygon: &Polygon<f64>, rect: &BoundingBox) -> f64 {
    let exterior = ring_area(clip_ring(polygon.exterior(), rect));
    if exterior <= 0.0 {
        return 0.0;
    }
    let holes: f64 = polygon
        .interiors()
        .iter()
        .map(|hole| ring_area(clip_ring(hole, rect)))
        .sum();
    (exterior - holes).max(0.0)
}
