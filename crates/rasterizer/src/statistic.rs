//! Per-cell summary statistics.
//!
//! A statistic is a tagged variant that knows how to fold one contribution
//! into a [`CellAccumulator`] and how to turn the accumulator into a cell
//! value. The rasterizer never branches on statistic names itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Summary statistic applied while burning features into cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    /// Number of contributing features.
    Count,
    /// Sum of attribute values, weighted by the coverage policy.
    Sum,
    Max,
    Min,
    /// Weighted mean of attribute values.
    Mean,
    /// Share of the cell covered by features, 0..=100.
    PercentCover,
    /// `max - min` of attribute values.
    Range,
}

impl Statistic {
    pub const ALL: [Statistic; 7] = [
        Statistic::Count,
        Statistic::Sum,
        Statistic::Max,
        Statistic::Min,
        Statistic::Mean,
        Statistic::PercentCover,
        Statistic::Range,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Statistic::Count => "count",
            Statistic::Sum => "sum",
            Statistic::Max => "max",
            Statistic::Min => "min",
            Statistic::Mean => "mean",
            Statistic::PercentCover => "percent_cover",
            Statistic::Range => "range",
        }
    }

    /// Whether the statistic reads an attribute value at all.
    pub fn needs_attribute(&self) -> bool {
        !matches!(self, Statistic::Count | Statistic::PercentCover)
    }

    /// Whether the statistic is defined for zero-area geometries.
    pub fn supports_points(&self) -> bool {
        !matches!(self, Statistic::PercentCover)
    }

    /// Fold one feature's contribution into a cell.
    ///
    /// `weight` comes from the coverage policy, `fraction` is the true share
    /// of the cell the feature covers (0 for points).
    #[inline]
    pub fn accumulate(&self, acc: &mut CellAccumulator, value: f64, weight: f64, fraction: f64) {
        acc.hits += 1;
        match self {
            Statistic::Count => {}
            Statistic::Sum | Statistic::Mean => {
                acc.weighted_sum += value * weight;
                acc.weight += weight;
            }
            Statistic::Max | Statistic::Min | Statistic::Range => {
                acc.min = acc.min.min(value);
                acc.max = acc.max.max(value);
            }
            Statistic::PercentCover => acc.cover += fraction,
        }
    }

    /// Final cell value; `None` leaves the cell as nodata.
    #[inline]
    pub fn finalize(&self, acc: &CellAccumulator) -> Option<f64> {
        if acc.hits == 0 {
            return None;
        }
        match self {
            Statistic::Count => Some(acc.hits as f64),
            Statistic::Sum => Some(acc.weighted_sum),
            Statistic::Mean => (acc.weight > 0.0).then(|| acc.weighted_sum / acc.weight),
            Statistic::Max => Some(acc.max),
            Statistic::Min => Some(acc.min),
            Statistic::Range => Some(acc.max - acc.min),
            Statistic::PercentCover => Some((acc.cover * 100.0).min(100.0)),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Statistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Statistic::ALL
            .into_iter()
            .find(|stat| stat.name() == normalized)
            .ok_or_else(|| format!("unknown statistic '{}'", s))
    }
}

/// Running state for one cell of one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellAccumulator {
    /// Contributing features.
    pub hits: u32,
    pub weighted_sum: f64,
    pub weight: f64,
    pub min: f64,
    pub max: f64,
    /// Sum of covered cell fractions.
    pub cover: f64,
}

impl Default for CellAccumulator {
    fn default() -> Self {
        Self {
            hits: 0,
            weighted_sum: 0.0,
            weight: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            cover: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(stat: Statistic, contributions: &[(f64, f64, f64)]) -> Option<f64> {
        let mut acc = CellAccumulator::default();
        for &(value, weight, fraction) in contributions {
            stat.accumulate(&mut acc, value, weight, fraction);
        }
        stat.finalize(&acc)
    }

    #[test]
    fn test_empty_cell_is_nodata() {
        for stat in Statistic::ALL {
            assert_eq!(run(stat, &[]), None, "{}", stat);
        }
    }

    #[test]
    fn test_basic_statistics() {
        let c = [(2.0, 1.0, 0.5), (6.0, 1.0, 0.25), (-1.0, 1.0, 0.5)];
        assert_eq!(run(Statistic::Count, &c), Some(3.0));
        assert_eq!(run(Statistic::Sum, &c), Some(7.0));
        assert_eq!(run(Statistic::Max, &c), Some(6.0));
        assert_eq!(run(Statistic::Min, &c), Some(-1.0));
        assert_eq!(run(Statistic::Range, &c), Some(7.0));
        assert_eq!(run(Statistic::PercentCover, &c), Some(100.0));
    }

    #[test]
    fn test_weighted_mean_and_sum() {
        let c = [(10.0, 0.25, 0.25), (20.0, 0.75, 0.75)];
        assert_eq!(run(Statistic::Sum, &c), Some(17.5));
        assert_eq!(run(Statistic::Mean, &c), Some(17.5));
        assert_eq!(run(Statistic::PercentCover, &c), Some(100.0));
    }

    #[test]
    fn test_zero_is_a_value() {
        assert_eq!(run(Statistic::Sum, &[(0.0, 1.0, 1.0)]), Some(0.0));
        assert_eq!(run(Statistic::Range, &[(4.0, 1.0, 1.0)]), Some(0.0));
    }

    #[test]
    fn test_parse_statistic() {
        assert_eq!("percent-cover".parse::<Statistic>().unwrap(), Statistic::PercentCover);
        assert_eq!("MAX".parse::<Statistic>().unwrap(), Statistic::Max);
        assert!("median".parse::<Statistic>().is_err());
        let parsed: Statistic = serde_json::from_str("\"percent_cover\"").unwrap();
        assert_eq!(parsed, Statistic::PercentCover);
    }
}
