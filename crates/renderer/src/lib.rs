//! Colorization of numeric raster bands.
//!
//! Implements:
//! - Continuous color ramps stretched over a value domain
//! - Categorical value-to-color lookup
//! - PNG encoding (indexed or RGBA)

pub mod colorize;
pub mod gradient;
pub mod png;
pub mod style;

pub use colorize::{Colorizer, RgbaImage};
pub use gradient::{Color, ColorRamp, ColorStop};
pub use png::{encode_png, PngMode};
pub use style::{
    CategoricalPalette, CategoryClass, ContinuousPalette, OutOfRange, PaletteConfig, StopScale,
    ValueDomain, ZoomDomains,
};
