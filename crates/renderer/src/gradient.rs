//! Colors and continuous color ramps.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use raster_common::{RasterError, RasterResult};

/// Color value in RGBA format.
///
/// Deserializes from a CSS-like string (`"#ff8800"`, `"#f80"`,
/// `"#ff880080"`, `"rgb(255, 136, 0)"`, `"rgba(255, 136, 0, 0.5)"`, a few
/// names) or from an `[r, g, b]` / `[r, g, b, a]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ColorSpec", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Linear interpolation per channel, `t` clamped to [0, 1].
    ///
    /// `t == 0` and `t == 1` return the endpoints unchanged.
    pub fn lerp(self, other: Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Color::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    fn named(name: &str) -> Option<Color> {
        let color = match name {
            "transparent" => Color::TRANSPARENT,
            "black" => Color::BLACK,
            "white" => Color::WHITE,
            "red" => Color::rgb(255, 0, 0),
            "green" => Color::rgb(0, 128, 0),
            "lime" => Color::rgb(0, 255, 0),
            "blue" => Color::rgb(0, 0, 255),
            "yellow" => Color::rgb(255, 255, 0),
            "orange" => Color::rgb(255, 165, 0),
            "purple" => Color::rgb(128, 0, 128),
            "rebeccapurple" => Color::rgb(102, 51, 153),
            "cyan" => Color::rgb(0, 255, 255),
            "magenta" => Color::rgb(255, 0, 255),
            "gray" | "grey" => Color::rgb(128, 128, 128),
            _ => return None,
        };
        Some(color)
    }

    fn from_hex(hex: &str) -> Option<Color> {
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize, width: usize| -> Option<u8> {
            let v = u8::from_str_radix(hex.get(i * width..(i + 1) * width)?, 16).ok()?;
            Some(if width == 1 { v * 17 } else { v })
        };
        match hex.len() {
            3 => Some(Color::rgb(channel(0, 1)?, channel(1, 1)?, channel(2, 1)?)),
            6 => Some(Color::rgb(channel(0, 2)?, channel(1, 2)?, channel(2, 2)?)),
            8 => Some(Color::new(
                channel(0, 2)?,
                channel(1, 2)?,
                channel(2, 2)?,
                channel(3, 2)?,
            )),
            _ => None,
        }
    }

    /// `rgb(r, g, b)` or `rgba(r, g, b, a)` with `a` in [0, 1].
    fn from_function(s: &str) -> Option<Color> {
        let (args, has_alpha) = if let Some(rest) = s.strip_prefix("rgba(") {
            (rest.strip_suffix(')')?, true)
        } else {
            (s.strip_prefix("rgb(")?.strip_suffix(')')?, false)
        };
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != if has_alpha { 4 } else { 3 } {
            return None;
        }
        let channel = |p: &str| p.parse::<u8>().ok();
        let alpha = if has_alpha {
            let a: f64 = parts[3].parse().ok()?;
            if !(0.0..=1.0).contains(&a) {
                return None;
            }
            (a * 255.0).round() as u8
        } else {
            255
        };
        Some(Color::new(
            channel(parts[0])?,
            channel(parts[1])?,
            channel(parts[2])?,
            alpha,
        ))
    }
}

impl FromStr for Color {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let parsed = match lower.strip_prefix('#') {
            Some(hex) => Color::from_hex(hex),
            None => Color::named(&lower).or_else(|| Color::from_function(&lower)),
        };
        parsed.ok_or_else(|| RasterError::config(format!("invalid color '{}'", s)))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Accepted serialized forms of a [`Color`].
#[derive(Deserialize)]
#[serde(untagged)]
enum ColorSpec {
    Text(String),
    Rgb([u8; 3]),
    Rgba([u8; 4]),
}

impl TryFrom<ColorSpec> for Color {
    type Error = String;

    fn try_from(spec: ColorSpec) -> Result<Self, Self::Error> {
        match spec {
            ColorSpec::Text(s) => s.parse().map_err(|e: RasterError| e.to_string()),
            ColorSpec::Rgb([r, g, b]) => Ok(Color::rgb(r, g, b)),
            ColorSpec::Rgba([r, g, b, a]) => Ok(Color::new(r, g, b, a)),
        }
    }
}

/// One control point of a ramp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub value: f64,
    pub color: Color,
}

impl ColorStop {
    pub fn new(value: f64, color: Color) -> Self {
        Self { value, color }
    }
}

/// Ordered control points with linear interpolation between them.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Stops are sorted by value. Values must be finite and distinct.
    pub fn new(mut stops: Vec<ColorStop>) -> RasterResult<Self> {
        if stops.is_empty() {
            return Err(RasterError::config("color ramp needs at least one stop"));
        }
        if let Some(bad) = stops.iter().find(|s| !s.value.is_finite()) {
            return Err(RasterError::config(format!(
                "color stop value {} is not finite",
                bad.value
            )));
        }
        stops.sort_by(|a, b| a.value.total_cmp(&b.value));
        if let Some(pair) = stops.windows(2).find(|w| w[0].value == w[1].value) {
            return Err(RasterError::config(format!(
                "duplicate color stop at {}",
                pair[0].value
            )));
        }
        Ok(Self { stops })
    }

    /// Colors spread evenly over [0, 1].
    pub fn evenly_spaced(colors: &[Color]) -> RasterResult<Self> {
        let last = colors.len().saturating_sub(1).max(1) as f64;
        Self::new(
            colors
                .iter()
                .enumerate()
                .map(|(i, c)| ColorStop::new(i as f64 / last, *c))
                .collect(),
        )
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn first(&self) -> ColorStop {
        self.stops[0]
    }

    pub fn last(&self) -> ColorStop {
        self.stops[self.stops.len() - 1]
    }

    /// Color at `value`, clamped to the end stops.
    pub fn color_at(&self, value: f64) -> Color {
        let first = self.first();
        let last = self.last();
        if value <= first.value {
            return first.color;
        }
        if value >= last.value {
            return last.color;
        }

        // First stop strictly above value; at least 1 and at most len - 1.
        let upper = self.stops.partition_point(|s| s.value <= value);
        let lo = self.stops[upper - 1];
        let hi = self.stops[upper];
        if value == lo.value {
            return lo.color;
        }
        lo.color
            .lerp(hi.color, (value - lo.value) / (hi.value - lo.value))
    }

    /// Color at a position in [0, 1] across the ramp's own extent.
    pub fn color_at_fraction(&self, fraction: f64) -> Color {
        let first = self.first().value;
        let last = self.last().value;
        if fraction <= 0.0 {
            return self.first().color;
        }
        if fraction >= 1.0 {
            return self.last().color;
        }
        self.color_at(first + fraction * (last - first))
    }
}
