//! Vector-to-grid rasterization.
//!
//! [`GridRasterizer`] burns the features of one leaf tile into one grid per
//! configured [`StatisticSpec`]. Cells are addressed top-left first, see
//! [`CellGrid`] for the ownership rules on cell boundaries.

pub mod clip;
pub mod coverage;
pub mod feature;
pub mod geojson;
pub mod rasterize;
pub mod statistic;

pub use coverage::{CellGrid, CellHit, CoveragePolicy, Footprint};
pub use feature::{AttributeValue, Feature};
pub use geojson::{GeoJsonFeature, GeoJsonFeatureCollection, GeoJsonGeometry, Position};
pub use rasterize::{GridRasterizer, StatisticSpec};
pub use statistic::{CellAccumulator, Statistic};
