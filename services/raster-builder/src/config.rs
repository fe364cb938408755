//! Tiling configuration.
//!
//! One file describes a whole pyramid: the tile matrix set, the tile size,
//! the zoom range, and per band the leaf statistic, the combine rule and the
//! palette. YAML or JSON, chosen by file extension.
//!
//! ```yaml
//! tms: WorldCRS84Quad
//! tile_size: [256, 256]
//! z_range: { min: 0, max: 6 }
//! missing_children: treat_as_absent
//! statistics:
//!   - property: population
//!     statistic: sum
//!     palette: { type: continuous, colors: ["#ffffcc", "#800026"] }
//!   - statistic: percent_cover
//!     z_domains: { 0: { min: 0, max: 100 } }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use pyramid::{BandRule, CombineRule, MissingChildPolicy, PyramidAggregator};
use raster_common::{NodataPolicy, RasterError, RasterResult, TileLayout, TileMatrixSet};
use rasterizer::{CoveragePolicy, GridRasterizer, Statistic, StatisticSpec};
use renderer::{Colorizer, PaletteConfig, PngMode, ValueDomain, ZoomDomains};

/// Deepest zoom accepted; tile indices stay well inside `u32`.
const MAX_ZOOM: u32 = 30;

/// Whole-pyramid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilingConfig {
    #[serde(default)]
    pub tms: TileMatrixSet,
    /// `[width, height]` in pixels, both even.
    #[serde(default = "default_tile_size")]
    pub tile_size: [usize; 2],
    pub z_range: ZoomRange,
    #[serde(default = "default_nodata", deserialize_with = "deserialize_nodata")]
    pub nodata: f32,
    /// Coverage for bands that do not set their own.
    #[serde(default)]
    pub coverage: CoveragePolicy,
    /// Required: what a parent does with a failed child.
    pub missing_children: MissingChildPolicy,
    pub statistics: Vec<StatisticConfig>,
    #[serde(default)]
    pub stretch_scope: StretchScope,
    #[serde(default)]
    pub png_mode: PngMode,
}

fn default_tile_size() -> [usize; 2] {
    [256, 256]
}

fn default_nodata() -> f32 {
    NodataPolicy::default().sentinel()
}

/// Accept a number, or the text `nan` for formats without a NaN literal.
fn deserialize_nodata<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f32),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(v) => Ok(v),
        Raw::Text(s) => NodataPolicy::from_tag_string(&s)
            .map(|p| p.sentinel())
            .ok_or_else(|| serde::de::Error::custom(format!("invalid nodata value '{}'", s))),
    }
}

/// Inclusive zoom range. `max` is the leaf zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: u32,
    pub max: u32,
}

/// Which observed range a continuous palette is stretched over when no
/// domain is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StretchScope {
    /// Each tile's own band range.
    #[default]
    Tile,
    /// The union of band ranges over every tile of the zoom level.
    Zoom,
}

/// One output band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticConfig {
    /// Band name; defaults to `<property>_<statistic>`, or the statistic
    /// name when there is no property.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
    pub statistic: Statistic,
    /// Defaults to the rule matching the statistic.
    #[serde(default)]
    pub combine: Option<CombineRule>,
    #[serde(default)]
    pub coverage: Option<CoveragePolicy>,
    #[serde(default)]
    pub categories: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub palette: PaletteConfig,
    #[serde(default)]
    pub domain: ValueDomain,
    #[serde(default)]
    pub z_domains: ZoomDomains,
}

impl StatisticConfig {
    pub fn band_name(&self) -> String {
        match (&self.name, &self.property) {
            (Some(name), _) => name.clone(),
            (None, Some(property)) => format!("{}_{}", property, self.statistic),
            (None, None) => self.statistic.to_string(),
        }
    }

    pub fn combine_rule(&self) -> CombineRule {
        self.combine
            .unwrap_or_else(|| CombineRule::for_statistic(self.statistic))
    }

    fn spec(&self, default_coverage: CoveragePolicy) -> StatisticSpec {
        let spec = match &self.property {
            Some(property) => StatisticSpec::new(property.clone(), self.statistic),
            None => StatisticSpec::geometry_only(self.statistic),
        };
        let spec = spec
            .named(self.band_name())
            .with_coverage(self.coverage.unwrap_or(default_coverage));
        match &self.categories {
            Some(categories) => spec.with_categories(categories.clone()),
            None => spec,
        }
    }

    pub fn colorizer(&self) -> RasterResult<Colorizer> {
        Colorizer::new(&self.palette)?
            .with_domain(self.domain)?
            .with_zoom_domains(self.z_domains.clone())
    }
}

impl TilingConfig {
    /// Load and validate a config file. `.json` is read as JSON, anything
    /// else as YAML.
    pub fn load(path: impl AsRef<Path>) -> RasterResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            RasterError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        };
        config.map_err(|e| match e {
            RasterError::Config(msg) => {
                RasterError::config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_yaml_str(text: &str) -> RasterResult<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| RasterError::config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> RasterResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| RasterError::config(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked before a tile runs.
    pub fn validate(&self) -> RasterResult<()> {
        let [width, height] = self.tile_size;
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(RasterError::config(format!(
                "tile_size {}x{} must be positive and even",
                width, height
            )));
        }
        if self.z_range.min > self.z_range.max {
            return Err(RasterError::config(format!(
                "z_range min {} is above max {}",
                self.z_range.min, self.z_range.max
            )));
        }
        if self.z_range.max > MAX_ZOOM {
            return Err(RasterError::config(format!(
                "z_range max {} is above {}",
                self.z_range.max, MAX_ZOOM
            )));
        }
        if self.nodata.is_infinite() {
            return Err(RasterError::config("nodata must be finite or NaN"));
        }

        self.rasterizer()?;
        self.aggregator()?;
        for statistic in &self.statistics {
            statistic.colorizer().map_err(|e| match e {
                RasterError::Config(msg) => RasterError::config(format!(
                    "band '{}': {}",
                    statistic.band_name(),
                    msg
                )),
                other => other,
            })?;
        }
        Ok(())
    }

    pub fn nodata_policy(&self) -> NodataPolicy {
        NodataPolicy::new(self.nodata)
    }

    pub fn layout(&self) -> TileLayout {
        let [width, height] = self.tile_size;
        TileLayout::new(self.tms, width, height, self.nodata_policy())
    }

    pub fn statistic_specs(&self) -> Vec<StatisticSpec> {
        self.statistics
            .iter()
            .map(|s| s.spec(self.coverage))
            .collect()
    }

    pub fn rasterizer(&self) -> RasterResult<GridRasterizer> {
        GridRasterizer::new(self.statistic_specs())
    }

    pub fn aggregator(&self) -> RasterResult<PyramidAggregator> {
        let rules = self
            .statistics
            .iter()
            .map(|s| BandRule::new(s.band_name(), s.combine_rule()))
            .collect();
        PyramidAggregator::new(rules, self.missing_children)
    }

    /// One colorizer per band, in configuration order.
    pub fn colorizers(&self) -> RasterResult<Vec<(String, Colorizer)>> {
        self.statistics
            .iter()
            .map(|s| Ok((s.band_name(), s.colorizer()?)))
            .collect()
    }
}
