//! Building a parent tile from its four children.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::combine::CombineRule;
use crate::downsample::downsample_2x;
use raster_common::{
    Band, BoundingBox, Grid, PartialDataWarning, Quadrant, RangeSupport, RasterError, RasterResult,
    RasterTile, TileCoord, TileSpec,
};

/// What the scheduler knows about one child when its parent is due.
#[derive(Debug)]
pub enum ChildSlot {
    /// The child was built.
    Ready(RasterTile),
    /// No child tile exists, or it had no data.
    Absent,
    /// The child failed.
    Failed(RasterError),
}

impl ChildSlot {
    pub fn is_ready(&self) -> bool {
        matches!(self, ChildSlot::Ready(_))
    }
}

/// How a parent treats a child that failed.
///
/// No default: choosing between silently thinner parents and failing the
/// chain is left to configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingChildPolicy {
    /// Build the parent from the remaining children and warn.
    TreatAsAbsent,
    /// Fail the parent with a data error.
    Fail,
}

/// Which combine rule builds which band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandRule {
    pub band: String,
    pub rule: CombineRule,
}

impl BandRule {
    pub fn new(band: impl Into<String>, rule: CombineRule) -> Self {
        Self {
            band: band.into(),
            rule,
        }
    }
}

/// A built parent, plus a warning when some children were missing.
#[derive(Debug)]
pub struct AggregateOutcome {
    pub tile: RasterTile,
    pub warning: Option<PartialDataWarning>,
}

/// Combines four child tiles into their parent, band by band.
///
/// Each present child is down-sampled by 2 with the band's rule and pasted
/// into its quadrant; quadrants without a child stay nodata.
#[derive(Debug, Clone)]
pub struct PyramidAggregator {
    rules: Vec<BandRule>,
    missing: MissingChildPolicy,
}

impl PyramidAggregator {
    pub fn new(rules: Vec<BandRule>, missing: MissingChildPolicy) -> RasterResult<Self> {
        if rules.is_empty() {
            return Err(RasterError::config("no combine rules configured"));
        }
        for (i, rule) in rules.iter().enumerate() {
            if rules[..i].iter().any(|r| r.band == rule.band) {
                return Err(RasterError::config(format!(
                    "combine rule for band '{}' configured twice",
                    rule.band
                )));
            }
        }
        Ok(Self { rules, missing })
    }

    pub fn rules(&self) -> &[BandRule] {
        &self.rules
    }

    pub fn missing_child_policy(&self) -> MissingChildPolicy {
        self.missing
    }

    /// Build the parent described by `parent`.
    ///
    /// `children` is in the order of [`TileCoord::children`]. Returns `Ok(None)` when no child is present.
    pub fn aggregate(
        &self,
        parent: &TileSpec,
        children: [ChildSlot; 4],
    ) -> RasterResult<Option<AggregateOutcome>> {
        parent.validate()?;
        if parent.width % 2 != 0 || parent.height % 2 != 0 {
            return Err(RasterError::config(format!(
                "tile size {}x{} cannot be halved",
                parent.width, parent.height
            )));
        }

        let expected = parent.coord.children();
        let mut present: Vec<(Quadrant, RasterTile)> = Vec::with_capacity(4);
        let mut missing = Vec::new();

        for (slot, coord) in children.into_iter().zip(expected) {
            let quadrant = coord.quadrant();
            match slot {
                ChildSlot::Ready(tile) => {
                    self.check_child(parent, quadrant, coord, &tile)?;
                    present.push((quadrant, tile));
                }
                ChildSlot::Absent => missing.push(coord),
                ChildSlot::Failed(err) => match self.missing {
                    MissingChildPolicy::Fail => {
                        return Err(RasterError::data(format!(
                            "child {} failed: {}",
                            coord, err
                        ))
                        .with_tile(parent.coord));
                    }
                    MissingChildPolicy::TreatAsAbsent => {
                        debug!(tile = %parent.coord, child = %coord, error = %err, "Treating failed child as absent");
                        missing.push(coord);
                    }
                },
            }
        }

        if present.is_empty() {
            debug!(tile = %parent.coord, "No children present, skipping parent");
            return Ok(None);
        }

        let bands = self
            .rules
            .iter()
            .map(|rule| {
                self.combine_band(parent, rule, &present)
                    .map_err(|e| e.with_tile(parent.coord).with_attribute(rule.band.as_str()))
            })
            .collect::<RasterResult<Vec<Band>>>()?;
        let tile = RasterTile::new(parent.clone(), bands)?;

        let warning = (!missing.is_empty()).then(|| PartialDataWarning {
            parent: parent.coord,
            missing,
        });
        if let Some(warning) = &warning {
            warn!(tile = %parent.coord, present = warning.present(), "{}", warning);
        }

        Ok(Some(AggregateOutcome { tile, warning }))
    }

    fn check_child(
        &self,
        parent: &TileSpec,
        quadrant: Quadrant,
        expected: TileCoord,
        child: &RasterTile,
    ) -> RasterResult<()> {
        if child.coord() != expected {
            return Err(RasterError::data(format!(
                "child {} given for the {:?} quadrant, expected {}",
                child.coord(),
                quadrant,
                expected
            ))
            .with_tile(parent.coord));
        }
        child.ensure_compatible(parent)?;

        let (col, row) = quadrant.offset();
        let half_w = parent.bounds.width() / 2.0;
        let half_h = parent.bounds.height() / 2.0;
        let west = parent.bounds.min_x + col as f64 * half_w;
        let north = parent.bounds.max_y - row as f64 * half_h;
        let expected_bounds = BoundingBox::new(west, north - half_h, west + half_w, north);
        let tolerance = 1e-6 * half_w.max(half_h);
        if !child.bounds().approx_eq(&expected_bounds, tolerance) {
            return Err(RasterError::data(format!(
                "bounds {:?} do not match the {:?} quadrant of parent {}",
                child.bounds(),
                quadrant,
                parent.coord
            ))
            .with_tile(child.coord()));
        }
        Ok(())
    }

    fn combine_band(
        &self,
        parent: &TileSpec,
        rule: &BandRule,
        children: &[(Quadrant, RasterTile)],
    ) -> RasterResult<Band> {
        let bands = children
            .iter()
            .map(|(quadrant, tile)| {
                tile.band(&rule.band)
                    .map(|band| (*quadrant, band))
                    .ok_or_else(|| {
                        RasterError::data("band missing from child tile")
                            .with_tile(tile.coord())
                            .with_attribute(rule.band.as_str())
                    })
            })
            .collect::<RasterResult<Vec<(Quadrant, &Band)>>>()?;

        if rule.rule == CombineRule::Range {
            if bands.iter().all(|(_, band)| band.support().is_some()) {
                return Ok(combine_range(parent, &rule.band, &bands));
            }
            warn!(
                tile = %parent.coord,
                band = %rule.band,
                "Range band without min/max support, combining as max"
            );
        }

        let mut grid = parent.empty_grid();
        for (quadrant, band) in &bands {
            place(&mut grid, parent, *quadrant, &downsample_2x(band.grid(), rule.rule));
        }
        Ok(Band::new(rule.band.clone(), grid))
    }
}

/// Paste a halved child into its quadrant of the parent grid.
fn place(grid: &mut Grid, parent: &TileSpec, quadrant: Quadrant, half: &Grid) {
    let (col, row) = quadrant.offset();
    grid.paste(half, col * parent.width / 2, row * parent.height / 2);
}

/// `max - min` recomputed from the children's true extrema.
fn combine_range(parent: &TileSpec, name: &str, bands: &[(Quadrant, &Band)]) -> Band {
    let mut min = parent.empty_grid();
    let mut max = parent.empty_grid();
    for (quadrant, band) in bands {
        if let Some(support) = band.support() {
            place(&mut min, parent, *quadrant, &downsample_2x(&support.min, CombineRule::Min));
            place(&mut max, parent, *quadrant, &downsample_2x(&support.max, CombineRule::Max));
        }
    }

    let mut range = parent.empty_grid();
    for row in 0..parent.height {
        for col in 0..parent.width {
            if let (Some(lo), Some(hi)) = (min.get(col, row), max.get(col, row)) {
                range.set(col, row, Some(hi - lo));
            }
        }
    }
    Band::new(name, range).with_support(RangeSupport { min, max })
}
