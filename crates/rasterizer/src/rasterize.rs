//! Burning features into band grids.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::coverage::{CellGrid, CoveragePolicy, Footprint};
use crate::feature::{AttributeValue, Feature};
use crate::statistic::{CellAccumulator, Statistic};
use raster_common::{
    Band, Grid, RangeSupport, RasterError, RasterResult, RasterTile, TileSpec,
};

/// One output band: which attribute, which statistic, which coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticSpec {
    /// Band name in the output tile.
    pub name: String,
    /// Feature property the statistic reads. Not needed for `count` and
    /// `percent_cover`.
    #[serde(default)]
    pub attribute: Option<String>,
    pub statistic: Statistic,
    #[serde(default)]
    pub coverage: CoveragePolicy,
    /// Codes for text attribute values. Unmapped labels are skipped.
    #[serde(default)]
    pub categories: Option<HashMap<String, f64>>,
}

impl StatisticSpec {
    /// A spec named `<attribute>_<statistic>`.
    pub fn new(attribute: impl Into<String>, statistic: Statistic) -> Self {
        let attribute = attribute.into();
        Self {
            name: format!("{}_{}", attribute, statistic),
            attribute: Some(attribute),
            statistic,
            coverage: CoveragePolicy::default(),
            categories: None,
        }
    }

    /// A spec that reads no attribute, named after the statistic.
    pub fn geometry_only(statistic: Statistic) -> Self {
        Self {
            name: statistic.to_string(),
            attribute: None,
            statistic,
            coverage: CoveragePolicy::default(),
            categories: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_coverage(mut self, coverage: CoveragePolicy) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn with_categories(mut self, categories: HashMap<String, f64>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn validate(&self) -> RasterResult<()> {
        if self.name.trim().is_empty() {
            return Err(RasterError::config("band name must not be empty"));
        }
        if self.statistic.needs_attribute() && self.attribute.is_none() {
            return Err(RasterError::config(format!(
                "band '{}': statistic '{}' needs an attribute",
                self.name, self.statistic
            )));
        }
        Ok(())
    }
}

/// Outcome of reading one attribute from one feature.
enum Reading {
    Value(f64),
    Skip(&'static str),
}

impl StatisticSpec {
    fn read(&self, feature: &Feature) -> RasterResult<Reading> {
        let Some(attribute) = self.attribute.as_deref() else {
            return Ok(Reading::Value(1.0));
        };
        match feature.attribute(attribute) {
            AttributeValue::Number(v) if v.is_finite() => Ok(Reading::Value(v)),
            AttributeValue::Number(_) => Ok(Reading::Skip("non-finite")),
            AttributeValue::Null => Ok(Reading::Skip("null")),
            AttributeValue::Text(label) => match &self.categories {
                Some(categories) => Ok(categories
                    .get(label)
                    .map_or(Reading::Skip("unmapped category"), |code| {
                        Reading::Value(*code)
                    })),
                None => Err(RasterError::data(format!(
                    "text value '{}' without a category mapping",
                    label
                ))
                .with_attribute(attribute)),
            },
            AttributeValue::Unsupported => Err(RasterError::data(
                "attribute is an array or object",
            )
            .with_attribute(attribute)),
        }
    }
}

/// Converts features inside a tile into one grid per [`StatisticSpec`].
#[derive(Debug, Clone)]
pub struct GridRasterizer {
    specs: Vec<StatisticSpec>,
}

impl GridRasterizer {
    pub fn new(specs: Vec<StatisticSpec>) -> RasterResult<Self> {
        if specs.is_empty() {
            return Err(RasterError::config("no statistics configured"));
        }
        for (i, spec) in specs.iter().enumerate() {
            spec.validate()?;
            if specs[..i].iter().any(|s| s.name == spec.name) {
                return Err(RasterError::config(format!(
                    "band '{}' configured twice",
                    spec.name
                )));
            }
        }
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[StatisticSpec] {
        &self.specs
    }

    /// Rasterize `features` into a new tile.
    ///
    /// Features that fall outside the tile leave the grid untouched. A cell
    /// no feature contributed to stays nodata.
    pub fn rasterize(&self, spec: &TileSpec, features: &[Feature]) -> RasterResult<RasterTile> {
        spec.validate()?;
        let grid = CellGrid::new(spec);

        let mut unsupported = 0usize;
        let footprints: Vec<Option<Footprint>> = features
            .iter()
            .map(|f| {
                let footprint = Footprint::of(&f.geometry, &grid);
                if footprint.is_none() {
                    unsupported += 1;
                    trace!(tile = %spec.coord, geometry = f.geometry_type(), "Skipping unsupported geometry");
                }
                footprint
            })
            .collect();
        if unsupported > 0 {
            debug!(tile = %spec.coord, skipped = unsupported, "Skipped features with unsupported geometry");
        }

        let bands = self
            .specs
            .par_iter()
            .map(|stat| {
                self.burn(spec, &grid, stat, features, &footprints)
                    .map_err(|e| e.with_tile(spec.coord).with_attribute(stat.name.as_str()))
            })
            .collect::<RasterResult<Vec<Band>>>()?;

        RasterTile::new(spec.clone(), bands)
    }

    fn burn(
        &self,
        spec: &TileSpec,
        grid: &CellGrid,
        stat: &StatisticSpec,
        features: &[Feature],
        footprints: &[Option<Footprint>],
    ) -> RasterResult<Band> {
        let mut cells = vec![CellAccumulator::default(); grid.width * grid.height];
        let mut skipped: HashMap<&'static str, usize> = HashMap::new();

        for (feature, footprint) in features.iter().zip(footprints) {
            let Some(footprint) = footprint else {
                continue;
            };
            if !footprint.is_areal() && !stat.statistic.supports_points() {
                return Err(RasterError::config(format!(
                    "statistic '{}' is not defined for point geometries (band '{}')",
                    stat.statistic, stat.name
                )));
            }
            if footprint.is_empty() {
                continue;
            }
            let value = match stat.read(feature)? {
                Reading::Value(v) => v,
                Reading::Skip(reason) => {
                    *skipped.entry(reason).or_default() += 1;
                    continue;
                }
            };
            for (index, weight, fraction) in footprint.contributions(stat.coverage, stat.statistic)
            {
                stat.statistic
                    .accumulate(&mut cells[index], value, weight, fraction);
            }
        }

        for (reason, count) in &skipped {
            debug!(
                tile = %spec.coord,
                band = %stat.name,
                reason = *reason,
                count = *count,
                "Skipped features"
            );
        }

        let finish = |f: &dyn Fn(&CellAccumulator) -> Option<f64>| -> RasterResult<Grid> {
            let data = cells
                .iter()
                .map(|acc| spec.nodata.encode(f(acc).map(|v| v as f32)))
                .collect();
            Grid::from_vec(grid.width, grid.height, data, spec.nodata)
        };

        let values = finish(&|acc| stat.statistic.finalize(acc))?;
        let band = Band::new(stat.name.clone(), values);

        if stat.statistic == Statistic::Range {
            let min = finish(&|acc| Statistic::Min.finalize(acc))?;
            let max = finish(&|acc| Statistic::Max.finalize(acc))?;
            return Ok(band.with_support(RangeSupport { min, max }));
        }
        Ok(band)
    }
}
