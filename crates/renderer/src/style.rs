//! Palette configuration for band colorization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::gradient::{Color, ColorRamp, ColorStop};
use raster_common::{RasterError, RasterResult};

/// How a band's values become colors.
///
/// ```yaml
/// type: continuous
/// colors: ["rgba(102, 51, 153, 0.1)", "#ffe100"]
/// out_of_range: clamp
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaletteConfig {
    Continuous(ContinuousPalette),
    Categorical(CategoricalPalette),
}

impl Default for PaletteConfig {
    fn default() -> Self {
        PaletteConfig::Continuous(ContinuousPalette::default())
    }
}

impl PaletteConfig {
    pub fn validate(&self) -> RasterResult<()> {
        match self {
            PaletteConfig::Continuous(p) => p.ramp().map(|_| ()),
            PaletteConfig::Categorical(p) => p.validate(),
        }
    }
}

/// What the stop values of a continuous palette mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopScale {
    /// Stops are positions; the ramp is stretched over the value domain.
    #[default]
    Relative,
    /// Stops are data values; the value domain is not used.
    Absolute,
}

/// What happens to values outside the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRange {
    /// Nearest end color.
    #[default]
    Clamp,
    Transparent,
    Color(Color),
}

/// A gradient, given as evenly spaced `colors` or as explicit `stops`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousPalette {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<Color>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stops: Vec<ColorStop>,
    #[serde(default)]
    pub scale: StopScale,
    #[serde(default)]
    pub out_of_range: OutOfRange,
}

impl Default for ContinuousPalette {
    fn default() -> Self {
        Self {
            colors: vec![Color::new(102, 51, 153, 26), Color::rgb(255, 225, 0)],
            stops: Vec::new(),
            scale: StopScale::Relative,
            out_of_range: OutOfRange::Clamp,
        }
    }
}

impl ContinuousPalette {
    pub fn from_colors(colors: Vec<Color>) -> Self {
        Self {
            colors,
            ..Self::default()
        }
    }

    pub fn from_stops(stops: Vec<ColorStop>, scale: StopScale) -> Self {
        Self {
            colors: Vec::new(),
            stops,
            scale,
            out_of_range: OutOfRange::Clamp,
        }
    }

    pub fn with_out_of_range(mut self, out_of_range: OutOfRange) -> Self {
        self.out_of_range = out_of_range;
        self
    }

    pub fn ramp(&self) -> RasterResult<ColorRamp> {
        match (self.colors.is_empty(), self.stops.is_empty()) {
            (false, true) => {
                if self.scale == StopScale::Absolute {
                    return Err(RasterError::config(
                        "absolute palettes need explicit stops, not a color list",
                    ));
                }
                ColorRamp::evenly_spaced(&self.colors)
            }
            (true, false) => ColorRamp::new(self.stops.clone()),
            (false, false) => Err(RasterError::config(
                "palette sets both 'colors' and 'stops'",
            )),
            (true, true) => Err(RasterError::config("palette has no colors")),
        }
    }
}

/// One class of a categorical palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryClass {
    pub value: f64,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Exact value-to-color lookup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoricalPalette {
    pub classes: Vec<CategoryClass>,
    /// Color for values with no class. Transparent when unset.
    #[serde(default)]
    pub default: Option<Color>,
}

impl CategoricalPalette {
    pub fn validate(&self) -> RasterResult<()> {
        if self.classes.is_empty() {
            return Err(RasterError::config("categorical palette has no classes"));
        }
        for (i, class) in self.classes.iter().enumerate() {
            if !class.value.is_finite() {
                return Err(RasterError::config(format!(
                    "category value {} is not finite",
                    class.value
                )));
            }
            if self.classes[..i].iter().any(|c| c.value == class.value) {
                return Err(RasterError::config(format!(
                    "category value {} listed twice",
                    class.value
                )));
            }
        }
        Ok(())
    }
}

/// Explicit value domain. A `None` side falls back to the observed value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueDomain {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl ValueDomain {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn fixed(min: f64, max: f64) -> Self {
        Self::new(Some(min), Some(max))
    }

    pub fn validate(&self) -> RasterResult<()> {
        for side in [self.min, self.max].into_iter().flatten() {
            if !side.is_finite() {
                return Err(RasterError::config(format!(
                    "domain bound {} is not finite",
                    side
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(RasterError::config(format!(
                    "domain min {} is greater than max {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Fill unset sides from `fallback`.
    pub fn or(self, fallback: ValueDomain) -> ValueDomain {
        ValueDomain {
            min: self.min.or(fallback.min),
            max: self.max.or(fallback.max),
        }
    }
}

/// Domains keyed by zoom level.
pub type ZoomDomains = BTreeMap<u32, ValueDomain>;
