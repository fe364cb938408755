//! The nodata sentinel.
//!
//! A cell that no feature contributed to holds the sentinel. Zero is a valid
//! value and must never be confused with an empty cell, so every component
//! reads and writes cells through [`NodataPolicy`] instead of comparing
//! against a constant of its own.

use serde::{Deserialize, Serialize};

use crate::grid::Grid;

/// Sentinel used by [`NodataPolicy::default`].
pub const DEFAULT_NODATA: f32 = -9999.0;

/// Declares and applies the nodata sentinel for a grid.
///
/// NaN is always treated as nodata, whatever the declared sentinel is, so a
/// statistic that degenerates to NaN can never leak out as a valid value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodataPolicy {
    sentinel: f32,
}

impl NodataPolicy {
    pub fn new(sentinel: f32) -> Self {
        Self { sentinel }
    }

    pub fn sentinel(&self) -> f32 {
        self.sentinel
    }

    #[inline]
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || value == self.sentinel
    }

    /// `Some(value)` for a valid cell, `None` for nodata.
    #[inline]
    pub fn valid(&self, value: f32) -> Option<f32> {
        if self.is_nodata(value) {
            None
        } else {
            Some(value)
        }
    }

    /// Encode an optional value as a cell.
    #[inline]
    pub fn encode(&self, value: Option<f32>) -> f32 {
        match value {
            Some(v) if !v.is_nan() => v,
            _ => self.sentinel,
        }
    }

    /// A grid of the given size with every cell set to nodata.
    pub fn fill(&self, width: usize, height: usize) -> Grid {
        Grid::filled(width, height, *self)
    }

    /// Text form used in the GDAL_NODATA TIFF tag.
    pub fn to_tag_string(&self) -> String {
        if self.sentinel.is_nan() {
            "nan".to_string()
        } else {
            format!("{}", self.sentinel)
        }
    }

    /// Parse the GDAL_NODATA tag text.
    pub fn from_tag_string(s: &str) -> Option<Self> {
        let s = s.trim().trim_end_matches('\0');
        if s.eq_ignore_ascii_case("nan") {
            return Some(Self::new(f32::NAN));
        }
        s.parse::<f32>().ok().map(Self::new)
    }
}

impl Default for NodataPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_NODATA)
    }
}

impl PartialEq for NodataPolicy {
    fn eq(&self, other: &Self) -> bool {
        (self.sentinel.is_nan() && other.sentinel.is_nan()) || self.sentinel == other.sentinel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_valid() {
        let policy = NodataPolicy::default();
        assert!(!policy.is_nodata(0.0));
        assert!(policy.is_nodata(DEFAULT_NODATA));
        assert!(policy.is_nodata(f32::NAN));
    }

    #[test]
    fn test_nan_sentinel() {
        let policy = NodataPolicy::new(f32::NAN);
        assert!(policy.is_nodata(f32::NAN));
        assert!(!policy.is_nodata(-9999.0));
        assert_eq!(policy, NodataPolicy::new(f32::NAN));
    }

    #[test]
    fn test_encode() {
        let policy = NodataPolicy::new(-1.0);
        assert_eq!(policy.encode(Some(3.0)), 3.0);
        assert_eq!(policy.encode(None), -1.0);
        assert_eq!(policy.encode(Some(f32::NAN)), -1.0);
    }

    #[test]
    fn test_tag_string() {
        let policy = NodataPolicy::new(-9999.0);
        assert_eq!(policy.to_tag_string(), "-9999");
        assert_eq!(NodataPolicy::from_tag_string("-9999\0"), Some(policy));
        let nan = NodataPolicy::from_tag_string("nan").unwrap();
        assert!(nan.sentinel().is_nan());
        assert_eq!(NodataPolicy::from_tag_string("abc"), None);
    }

    #[test]
    fn test_fill() {
        let policy = NodataPolicy::default();
        let grid = policy.fill(3, 2);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert!(grid.is_all_nodata());
    }
}
