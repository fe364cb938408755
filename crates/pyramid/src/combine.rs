//! Rules for merging a 2x2 block of child cells into one parent cell.

use rasterizer::Statistic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How four finer cells become one coarser cell.
///
/// Nodata cells never take part: a block with no valid cell stays nodata,
/// a partially valid block combines only its valid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineRule {
    Sum,
    Max,
    Min,
    /// Unweighted mean of the valid cells.
    Mean,
    /// Sum of child counts.
    Count,
    /// Covered share of the parent cell: sum of valid covers / 4.
    PercentCover,
    /// `max - min`. Exact only with range support grids, see
    /// [`crate::PyramidAggregator`].
    Range,
    /// First valid cell in top-left, top-right, bottom-left, bottom-right
    /// order. Keeps categorical codes intact.
    Nearest,
}

impl CombineRule {
    pub const ALL: [CombineRule; 8] = [
        CombineRule::Sum,
        CombineRule::Max,
        CombineRule::Min,
        CombineRule::Mean,
        CombineRule::Count,
        CombineRule::PercentCover,
        CombineRule::Range,
        CombineRule::Nearest,
    ];

    /// The rule that keeps a leaf statistic's meaning across zoom levels.
    pub fn for_statistic(statistic: Statistic) -> Self {
        match statistic {
            Statistic::Count => CombineRule::Count,
            Statistic::Sum => CombineRule::Sum,
            Statistic::Max => CombineRule::Max,
            Statistic::Min => CombineRule::Min,
            Statistic::Mean => CombineRule::Mean,
            Statistic::PercentCover => CombineRule::PercentCover,
            Statistic::Range => CombineRule::Range,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CombineRule::Sum => "sum",
            CombineRule::Max => "max",
            CombineRule::Min => "min",
            CombineRule::Mean => "mean",
            CombineRule::Count => "count",
            CombineRule::PercentCover => "percent_cover",
            CombineRule::Range => "range",
            CombineRule::Nearest => "nearest",
        }
    }

    /// Combine one block, given as [top-left, top-right, bottom-left,
    /// bottom-right].
    ///
    /// `Range` on plain values has no extrema to work from and falls back to
    /// the largest child range.
    pub fn reduce_block(&self, block: [Option<f32>; 4]) -> Option<f32> {
        if block.iter().all(Option::is_none) {
            return None;
        }
        let valid = block.into_iter().flatten();

        let result = match self {
            CombineRule::Nearest => return block.into_iter().flatten().next(),
            CombineRule::Sum | CombineRule::Count => valid.map(f64::from).sum::<f64>(),
            CombineRule::Max | CombineRule::Range => {
                valid.map(f64::from).fold(f64::NEG_INFINITY, f64::max)
            }
            CombineRule::Min => valid.map(f64::from).fold(f64::INFINITY, f64::min),
            CombineRule::Mean => {
                let (sum, n) = valid.fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
                sum / n as f64
            }
            CombineRule::PercentCover => {
                (valid.map(f64::from).sum::<f64>() / 4.0).min(100.0)
            }
        };
        Some(result as f32)
    }
}

impl fmt::Display for CombineRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CombineRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "average" | "avg" => return Ok(CombineRule::Mean),
            "first" => return Ok(CombineRule::Nearest),
            _ => {}
        }
        CombineRule::ALL
            .into_iter()
            .find(|r| r.name() == lower)
            .ok_or_else(|| format!("unknown combine rule '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: [Option<f32>; 4] = [Some(1.0), Some(2.0), Some(3.0), Some(6.0)];
    const SPARSE: [Option<f32>; 4] = [None, Some(4.0), None, Some(2.0)];
    const EMPTY: [Option<f32>; 4] = [None; 4];

    #[test]
    fn test_sum_excludes_nodata() {
        assert_eq!(CombineRule::Sum.reduce_block(FULL), Some(12.0));
        assert_eq!(CombineRule::Sum.reduce_block(SPARSE), Some(6.0));
        assert_eq!(CombineRule::Count.reduce_block(SPARSE), Some(6.0));
    }

    #[test]
    fn test_extrema_and_mean() {
        assert_eq!(CombineRule::Max.reduce_block(FULL), Some(6.0));
        assert_eq!(CombineRule::Min.reduce_block(SPARSE), Some(2.0));
        assert_eq!(CombineRule::Mean.reduce_block(FULL), Some(3.0));
        assert_eq!(CombineRule::Mean.reduce_block(SPARSE), Some(3.0));
    }

    #[test]
    fn test_percent_cover_is_share_of_parent() {
        let block = [Some(100.0), Some(50.0), None, None];
        assert_eq!(CombineRule::PercentCover.reduce_block(block), Some(37.5));
        assert_eq!(
            CombineRule::PercentCover.reduce_block([Some(100.0); 4]),
            Some(100.0)
        );
    }

    #[test]
    fn test_nearest_takes_first_valid() {
        assert_eq!(CombineRule::Nearest.reduce_block(FULL), Some(1.0));
        assert_eq!(CombineRule::Nearest.reduce_block(SPARSE), Some(4.0));
    }

    #[test]
    fn test_all_nodata_stays_nodata() {
        for rule in CombineRule::ALL {
            assert_eq!(rule.reduce_block(EMPTY), None, "{}", rule);
        }
    }

    #[test]
    fn test_zero_is_a_value() {
        let block = [Some(0.0), None, None, None];
        assert_eq!(CombineRule::Max.reduce_block(block), Some(0.0));
        assert_eq!(CombineRule::Sum.reduce_block(block), Some(0.0));
    }

    #[test]
    fn test_for_statistic_and_parse() {
        assert_eq!(CombineRule::for_statistic(Statistic::Count), CombineRule::Count);
        assert_eq!(
            CombineRule::for_statistic(Statistic::PercentCover),
            CombineRule::PercentCover
        );
        assert_eq!("average".parse::<CombineRule>(), Ok(CombineRule::Mean));
        assert_eq!("percent_cover".parse::<CombineRule>(), Ok(CombineRule::PercentCover));
        assert!("median".parse::<CombineRule>().is_err());
    }
}
