//! Turning a numeric band into an RGBA image.
//!
//! Nodata cells always come out fully transparent. Continuous palettes are
//! stretched over a value domain resolved per call, in this order: the
//! zoom's configured domain, the general configured domain, then the
//! observed range passed in (normally the band's own [`ValueRange`]).

use rayon::prelude::*;
use tracing::debug;

use crate::gradient::{Color, ColorRamp};
use crate::png::{encode_png, PngMode};
use crate::style::{OutOfRange, PaletteConfig, StopScale, ValueDomain, ZoomDomains};
use raster_common::{Grid, RasterError, RasterResult, RasterTile, ValueRange};

/// An RGBA image, row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    pub fn pixel(&self, col: usize, row: usize) -> Color {
        let i = (row * self.width + col) * 4;
        Color::new(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        )
    }

    /// True when every pixel has alpha 0.
    pub fn is_transparent(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p[3] == 0)
    }

    pub fn to_png(&self, mode: PngMode) -> RasterResult<Vec<u8>> {
        encode_png(&self.pixels, self.width, self.height, mode)
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Continuous {
        ramp: ColorRamp,
        scale: StopScale,
        out_of_range: OutOfRange,
    },
    Categorical {
        classes: Vec<(f32, Color)>,
        default: Color,
    },
}

/// Resolved stretch for one call.
#[derive(Debug, Clone, Copy)]
struct Stretch {
    min: f64,
    max: f64,
}

/// Maps band values to colors for one palette.
#[derive(Debug, Clone)]
pub struct Colorizer {
    mode: Mode,
    domain: ValueDomain,
    zoom_domains: ZoomDomains,
}

impl Colorizer {
    /// Build a colorizer; a malformed palette is a configuration error.
    pub fn new(palette: &PaletteConfig) -> RasterResult<Self> {
        palette.validate()?;
        let mode = match palette {
            PaletteConfig::Continuous(p) => Mode::Continuous {
                ramp: p.ramp()?,
                scale: p.scale,
                out_of_range: p.out_of_range,
            },
            PaletteConfig::Categorical(p) => Mode::Categorical {
                classes: p.classes.iter().map(|c| (c.value as f32, c.color)).collect(),
                default: p.default.unwrap_or(Color::TRANSPARENT),
            },
        };
        Ok(Self {
            mode,
            domain: ValueDomain::default(),
            zoom_domains: ZoomDomains::new(),
        })
    }

    /// General domain override.
    pub fn with_domain(mut self, domain: ValueDomain) -> RasterResult<Self> {
        domain.validate()?;
        self.domain = domain;
        Ok(self)
    }

    /// Per-zoom domain overrides, taking precedence side by side over the
    /// general domain.
    pub fn with_zoom_domains(mut self, zoom_domains: ZoomDomains) -> RasterResult<Self> {
        for domain in zoom_domains.values() {
            domain.validate()?;
        }
        self.zoom_domains = zoom_domains;
        Ok(self)
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.mode, Mode::Categorical { .. })
    }

    /// Domain used at zoom `z` given the observed range; `None` when a side
    /// is neither configured nor observable.
    pub fn resolve_domain(&self, z: u32, observed: Option<ValueRange>) -> Option<(f64, f64)> {
        let observed = observed.map_or(ValueDomain::default(), |r| {
            ValueDomain::fixed(r.min as f64, r.max as f64)
        });
        let configured = self
            .zoom_domains
            .get(&z)
            .copied()
            .unwrap_or_default()
            .or(self.domain);
        let resolved = configured.or(observed);
        Some((resolved.min?, resolved.max?))
    }

    /// Colorize one band of a tile, stretched over the band's own range.
    pub fn colorize_band(&self, tile: &RasterTile, band: &str) -> RasterResult<RgbaImage> {
        let observed = tile
            .band(band)
            .ok_or_else(|| missing_band(tile, band))?
            .value_range();
        self.colorize_band_with_range(tile, band, observed)
    }

    /// Colorize one band with an externally supplied observed range, e.g.
    /// the range over every tile of the zoom level.
    pub fn colorize_band_with_range(
        &self,
        tile: &RasterTile,
        band: &str,
        observed: Option<ValueRange>,
    ) -> RasterResult<RgbaImage> {
        let grid = tile
            .band(band)
            .ok_or_else(|| missing_band(tile, band))?
            .grid();
        Ok(self.colorize_grid(grid, tile.coord().z, observed))
    }

    /// Colorize a grid. Nodata maps to transparent.
    pub fn colorize_grid(&self, grid: &Grid, z: u32, observed: Option<ValueRange>) -> RgbaImage {
        let stretch = self
            .resolve_domain(z, observed)
            .map(|(min, max)| Stretch { min, max });
        if stretch.is_none() && !self.is_categorical() {
            debug!(z, "No value domain, band has no valid cells");
        }

        let nodata = grid.nodata();
        let mut pixels = vec![0u8; grid.width() * grid.height() * 4];
        pixels
            .par_chunks_mut(4)
            .zip(grid.data().par_iter())
            .for_each(|(pixel, raw)| {
                let color = match nodata.valid(*raw) {
                    Some(value) => self.color_for(value, stretch),
                    None => Color::TRANSPARENT,
                };
                pixel.copy_from_slice(&color.to_array());
            });

        RgbaImage {
            width: grid.width(),
            height: grid.height(),
            pixels,
        }
    }

    /// Color of one valid value.
    pub fn color_at(&self, value: f32, z: u32, observed: Option<ValueRange>) -> Color {
        let stretch = self
            .resolve_domain(z, observed)
            .map(|(min, max)| Stretch { min, max });
        self.color_for(value, stretch)
    }

    fn color_for(&self, value: f32, stretch: Option<Stretch>) -> Color {
        match &self.mode {
            Mode::Categorical { classes, default } => classes
                .iter()
                .find(|(v, _)| *v == value)
                .map_or(*default, |(_, c)| *c),
            Mode::Continuous {
                ramp,
                scale,
                out_of_range,
            } => {
                let value = value as f64;
                let (lo, hi) = match scale {
                    StopScale::Absolute => (ramp.first().value, ramp.last().value),
                    StopScale::Relative => match stretch {
                        Some(s) => (s.min, s.max),
                        None => return ramp.first().color,
                    },
                };

                if value < lo || value > hi {
                    return match out_of_range {
                        OutOfRange::Clamp if value < lo => ramp.first().color,
                        OutOfRange::Clamp => ramp.last().color,
                        OutOfRange::Transparent => Color::TRANSPARENT,
                        OutOfRange::Color(c) => *c,
                    };
                }
                match scale {
                    StopScale::Absolute => ramp.color_at(value),
                    // Degenerate domain: everything sits on the first stop.
                    StopScale::Relative if hi <= lo => ramp.first().color,
                    StopScale::Relative => ramp.color_at_fraction((value - lo) / (hi - lo)),
                }
            }
        }
    }
}

fn missing_band(tile: &RasterTile, band: &str) -> RasterError {
    RasterError::data("band not present in tile")
        .with_tile(tile.coord())
        .with_attribute(band)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::ColorStop;
    use crate::style::ContinuousPalette;
    use raster_common::NodataPolicy;

    fn grey_ramp() -> Colorizer {
        Colorizer::new(&PaletteConfig::Continuous(ContinuousPalette::from_colors(vec![
            Color::BLACK,
            Color::WHITE,
        ])))
        .unwrap()
    }

    #[test]
    fn test_domain_resolution_order() {
        let mut zooms = ZoomDomains::new();
        zooms.insert(3, ValueDomain::new(None, Some(50.0)));
        let colorizer = grey_ramp()
            .with_domain(ValueDomain::new(Some(0.0), None))
            .unwrap()
            .with_zoom_domains(zooms)
            .unwrap();
        let observed = Some(ValueRange::new(2.0, 8.0));

        assert_eq!(colorizer.resolve_domain(3, observed), Some((0.0, 50.0)));
        assert_eq!(colorizer.resolve_domain(4, observed), Some((0.0, 8.0)));
        assert_eq!(colorizer.resolve_domain(4, None), None);
    }

    #[test]
    fn test_relative_stretch() {
        let colorizer = grey_ramp();
        let observed = Some(ValueRange::new(10.0, 20.0));
        assert_eq!(colorizer.color_at(10.0, 0, observed), Color::BLACK);
        assert_eq!(colorizer.color_at(20.0, 0, observed), Color::WHITE);
        assert_eq!(colorizer.color_at(15.0, 0, observed), Color::rgb(128, 128, 128));
    }

    #[test]
    fn test_degenerate_domain_uses_first_stop() {
        let colorizer = grey_ramp();
        let observed = Some(ValueRange::new(7.0, 7.0));
        assert_eq!(colorizer.color_at(7.0, 0, observed), Color::BLACK);
    }

    #[test]
    fn test_absolute_stops_ignore_domain() {
        let palette = ContinuousPalette::from_stops(
            vec![
                ColorStop::new(0.0, Color::BLACK),
                ColorStop::new(100.0, Color::WHITE),
            ],
            StopScale::Absolute,
        );
        let colorizer = Colorizer::new(&PaletteConfig::Continuous(palette)).unwrap();
        let observed = Some(ValueRange::new(40.0, 60.0));
        assert_eq!(colorizer.color_at(50.0, 0, observed), Color::rgb(128, 128, 128));
    }

    #[test]
    fn test_nodata_is_transparent_and_zero_is_not() {
        let colorizer = grey_ramp();
        let grid = Grid::from_options(2, 1, &[None, Some(0.0)], NodataPolicy::default()).unwrap();
        let image = colorizer.colorize_grid(&grid, 0, grid.value_range());
        assert_eq!(image.pixel(0, 0), Color::TRANSPARENT);
        assert_eq!(image.pixel(1, 0).a, 255);
    }
}
