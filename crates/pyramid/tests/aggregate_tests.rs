//! Tests for combining child tiles into a parent.

use pyramid::{BandRule, ChildSlot, CombineRule, MissingChildPolicy, PyramidAggregator};
use raster_common::{
    Band, Grid, NodataPolicy, RangeSupport, RasterError, RasterTile, TileCoord, TileMatrixSet,
    TileSpec,
};
use test_utils::{constant_tile, crs84_tile_spec, tile_from_rows, unit_tile_spec};

const SIZE: usize = 4;

fn root() -> TileSpec {
    crs84_tile_spec(TileCoord::new(0, 0, 0), SIZE)
}

fn child_specs() -> [TileSpec; 4] {
    TileCoord::new(0, 0, 0)
        .children()
        .map(|c| crs84_tile_spec(c, SIZE))
}

fn aggregator(rule: CombineRule, missing: MissingChildPolicy) -> PyramidAggregator {
    PyramidAggregator::new(vec![BandRule::new("v", rule)], missing).unwrap()
}

fn ready(tile: RasterTile) -> ChildSlot {
    ChildSlot::Ready(tile)
}

/// Sum of all valid cells of a band.
fn total(tile: &RasterTile, band: &str) -> f32 {
    tile.band(band).unwrap().grid().valid_values().sum()
}

// ============================================================================
// Combine semantics
// ============================================================================

#[test]
fn test_all_nodata_children_give_nodata_parent() {
    let agg = aggregator(CombineRule::Sum, MissingChildPolicy::Fail);
    let children = child_specs().map(|spec| {
        let grid = spec.empty_grid();
        ready(RasterTile::new(spec, vec![Band::new("v", grid)]).unwrap())
    });

    let outcome = agg.aggregate(&root(), children).unwrap().unwrap();
    assert!(outcome.tile.band("v").unwrap().is_all_nodata());
    assert!(outcome.warning.is_none());
}

#[test]
fn test_sum_excludes_nodata_children_cells() {
    let agg = aggregator(CombineRule::Sum, MissingChildPolicy::Fail);
    let [tl, tr, bl, br] = child_specs();

    let mut sparse = vec![None; SIZE * SIZE];
    sparse[0] = Some(3.0); // block (0,0) of the top-right child
    sparse[SIZE + 1] = Some(4.0); // same block
    sparse[2] = Some(0.0); // block (1,0), a real zero

    let children = [
        ready(constant_tile(&tl, &[("v", 1.0)])),
        ready(tile_from_rows(&tr, &[("v", sparse)])),
        ready(constant_tile(&bl, &[("v", 2.0)])),
        ready(constant_tile(&br, &[("v", 0.5)])),
    ];

    let tile = agg.aggregate(&root(), children).unwrap().unwrap().tile;
    let grid = tile.band("v").unwrap().grid();

    // Top-left quadrant: four cells of 1.0 per block
    assert_eq!(grid.get(0, 0), Some(4.0));
    assert_eq!(grid.get(1, 1), Some(4.0));
    // Top-right quadrant: 3 + 4 with nodata excluded, then a real zero
    assert_eq!(grid.get(2, 0), Some(7.0));
    assert_eq!(grid.get(3, 0), Some(0.0));
    assert_eq!(grid.get(2, 1), None);
    // Bottom quadrants
    assert_eq!(grid.get(0, 3), Some(8.0));
    assert_eq!(grid.get(3, 3), Some(2.0));

    // Totals are preserved
    assert_eq!(total(&tile, "v"), 16.0 + 7.0 + 32.0 + 8.0);
}

#[test]
fn test_quadrant_placement() {
    let agg = aggregator(CombineRule::Max, MissingChildPolicy::Fail);
    let children = child_specs()
        .into_iter()
        .enumerate()
        .map(|(i, spec)| ready(constant_tile(&spec, &[("v", i as f32 + 1.0)])))
        .collect::<Vec<_>>();
    let children: [ChildSlot; 4] = children.try_into().unwrap();

    let tile = agg.aggregate(&root(), children).unwrap().unwrap().tile;
    let grid = tile.band("v").unwrap().grid();
    assert_eq!(grid.get(0, 0), Some(1.0));
    assert_eq!(grid.get(3, 0), Some(2.0));
    assert_eq!(grid.get(0, 3), Some(3.0));
    assert_eq!(grid.get(3, 3), Some(4.0));
}

#[test]
fn test_range_uses_true_extrema() {
    let agg = aggregator(CombineRule::Range, MissingChildPolicy::TreatAsAbsent);
    let [tl, ..] = child_specs();

    // Top-left block: mins 1..4, maxes 5, 9, 6, 7.
    let mut mins = vec![None; SIZE * SIZE];
    let mut maxs = vec![None; SIZE * SIZE];
    for (i, lo, hi) in [(0, 1.0, 5.0), (1, 2.0, 9.0), (SIZE, 3.0, 6.0), (SIZE + 1, 4.0, 7.0)] {
        mins[i] = Some(lo);
        maxs[i] = Some(hi);
    }
    let ranges: Vec<Option<f32>> = mins
        .iter()
        .zip(&maxs)
        .map(|pair| match pair {
            (Some(lo), Some(hi)) => Some(hi - lo),
            _ => None,
        })
        .collect();

    let support = RangeSupport {
        min: Grid::from_options(SIZE, SIZE, &mins, tl.nodata).unwrap(),
        max: Grid::from_options(SIZE, SIZE, &maxs, tl.nodata).unwrap(),
    };
    let band = Band::new("v", Grid::from_options(SIZE, SIZE, &ranges, tl.nodata).unwrap())
        .with_support(support);
    let child = RasterTile::new(tl, vec![band]).unwrap();

    let outcome = agg
        .aggregate(&root(), [ready(child), ChildSlot::Absent, ChildSlot::Absent, ChildSlot::Absent])
        .unwrap()
        .unwrap();
    let band = outcome.tile.band("v").unwrap();

    // 9 - 1, not the largest child range (7)
    assert_eq!(band.grid().get(0, 0), Some(8.0));
    assert_eq!(band.support().unwrap().min.get(0, 0), Some(1.0));
    assert_eq!(band.support().unwrap().max.get(0, 0), Some(9.0));
    assert_eq!(band.grid().get(1, 0), None);
}

#[test]
fn test_percent_cover_parent_is_covered_share() {
    let agg = aggregator(CombineRule::PercentCover, MissingChildPolicy::Fail);
    let [tl, tr, bl, br] = child_specs();
    let children = [
        ready(constant_tile(&tl, &[("v", 100.0)])),
        ready(constant_tile(&tr, &[("v", 50.0)])),
        ready(constant_tile(&bl, &[("v", 0.0)])),
        ready(constant_tile(&br, &[("v", 100.0)])),
    ];
    let tile = agg.aggregate(&root(), children).unwrap().unwrap().tile;
    let grid = tile.band("v").unwrap().grid();
    assert_eq!(grid.get(0, 0), Some(100.0));
    assert_eq!(grid.get(2, 0), Some(50.0));
    assert_eq!(grid.get(0, 2), Some(0.0));
    assert!(grid.valid_values().all(|v| (0.0..=100.0).contains(&v)));
}

// ============================================================================
// Partial and failed children
// ============================================================================

#[test]
fn test_partial_children_warn() {
    let agg = aggregator(CombineRule::Sum, MissingChildPolicy::Fail);
    let [tl, _, _, br] = child_specs();
    let children = [
        ready(constant_tile(&tl, &[("v", 1.0)])),
        ChildSlot::Absent,
        ChildSlot::Absent,
        ready(constant_tile(&br, &[("v", 1.0)])),
    ];

    let outcome = agg.aggregate(&root(), children).unwrap().unwrap();
    let warning = outcome.warning.unwrap();
    assert_eq!(warning.parent, TileCoord::new(0, 0, 0));
    assert_eq!(warning.present(), 2);
    assert_eq!(
        warning.missing,
        vec![TileCoord::new(1, 1, 0), TileCoord::new(1, 0, 1)]
    );

    let grid = outcome.tile.band("v").unwrap().grid();
    assert_eq!(grid.get(3, 0), None);
    assert_eq!(grid.get(3, 3), Some(4.0));
}

#[test]
fn test_no_children_gives_nothing() {
    let agg = aggregator(CombineRule::Sum, MissingChildPolicy::Fail);
    let slots = [ChildSlot::Absent, ChildSlot::Absent, ChildSlot::Absent, ChildSlot::Absent];
    assert!(agg.aggregate(&root(), slots).unwrap().is_none());
}

#[test]
fn test_failed_child_policy() {
    let [tl, ..] = child_specs();
    let slots = || {
        [
            ready(constant_tile(&tl, &[("v", 1.0)])),
            ChildSlot::Failed(RasterError::data("unreadable").with_tile(TileCoord::new(1, 1, 0))),
            ChildSlot::Absent,
            ChildSlot::Absent,
        ]
    };

    let strict = aggregator(CombineRule::Sum, MissingChildPolicy::Fail);
    let err = strict.aggregate(&root(), slots()).unwrap_err();
    assert!(!err.is_config());
    assert_eq!(err.tile(), Some(TileCoord::new(0, 0, 0)));
    assert!(err.to_string().contains("1/1/0"));

    let lenient = aggregator(CombineRule::Sum, MissingChildPolicy::TreatAsAbsent);
    let outcome = lenient.aggregate(&root(), slots()).unwrap().unwrap();
    assert_eq!(outcome.warning.unwrap().missing.len(), 3);
}

// ============================================================================
// Mismatched inputs
// ============================================================================

#[test]
fn test_resolution_mismatch_is_data_error() {
    let agg = aggregator(CombineRule::Sum, MissingChildPolicy::Fail);
    let small = crs84_tile_spec(TileCoord::new(1, 0, 0), 2);
    let slots = [
        ready(constant_tile(&small, &[("v", 1.0)])),
        ChildSlot::Absent,
        ChildSlot::Absent,
        ChildSlot::Absent,
    ];
    let err = agg.aggregate(&root(), slots).unwrap_err();
    assert!(!err.is_config());
    assert!(err.to_string().contains("resolution"));
}

#[test]
fn test_crs_and_nodata_mismatch() {
    let agg = aggregator(CombineRule::Sum, MissingChildPolicy::Fail);
    let mut other_nodata = child_specs()[0].clone();
    other_nodata.nodata = NodataPolicy::new(f32::NAN);
    let slots = [
        ready(constant_tile(&other_nodata, &[("v", 1.0)])),
        ChildSlot::Absent,
        ChildSlot::Absent,
        ChildSlot::Absent,
    ];
    assert!(agg.aggregate(&root(), slots).is_err());

    let mercator = TileSpec::from_tms(
        TileMatrixSet::WebMercatorQuad,
        TileCoord::new(1, 0, 0),
        SIZE,
        SIZE,
        NodataPolicy::default(),
    );
    let slots = [
        ready(constant_tile(&mercator, &[("v", 1.0)])),
        ChildSlot::Absent,
        ChildSlot::Absent,
        ChildSlot::Absent,
    ];
    assert!(agg.aggregate(&root(), slots).unwrap_err().to_string().contains("CRS"));

    // Right coordinate and CRS, wrong place on the ground
    let misplaced = unit_tile_spec(TileCoord::new(1, 0, 0), SIZE);
    let slots = [
        ready(constant_tile(&misplaced, &[("v", 1.0)])),
        ChildSlot::Absent,
        ChildSlot::Absent,
        ChildSlot::Absent,
    ];
    let err = agg.aggregate(&root(), slots).unwrap_err();
    assert!(err.to_string().contains("quadrant"));
}

#[test]
fn test_child_in_wrong_slot() {
    let agg = aggregator(CombineRule::Sum, MissingChildPolicy::Fail);
    let [_, tr, ..] = child_specs();
    let slots = [
        ready(constant_tile(&tr, &[("v", 1.0)])),
        ChildSlot::Absent,
        ChildSlot::Absent,
        ChildSlot::Absent,
    ];
    assert!(agg.aggregate(&root(), slots).is_err());
}

#[test]
fn test_child_missing_band_names_attribute() {
    let agg = aggregator(CombineRule::Sum, MissingChildPolicy::Fail);
    let [tl, ..] = child_specs();
    let slots = [
        ready(constant_tile(&tl, &[("other", 1.0)])),
        ChildSlot::Absent,
        ChildSlot::Absent,
        ChildSlot::Absent,
    ];
    let err = agg.aggregate(&root(), slots).unwrap_err();
    assert_eq!(err.tile(), Some(TileCoord::new(1, 0, 0)));
    assert!(err.to_string().contains("attribute 'v'"));
}

#[test]
fn test_odd_tile_size_rejected() {
    let agg = aggregator(CombineRule::Sum, MissingChildPolicy::Fail);
    let parent = crs84_tile_spec(TileCoord::new(0, 0, 0), 3);
    let slots = [ChildSlot::Absent, ChildSlot::Absent, ChildSlot::Absent, ChildSlot::Absent];
    assert!(agg.aggregate(&parent, slots).unwrap_err().is_config());
}

#[test]
fn test_duplicate_rules_rejected() {
    let rules = vec![BandRule::new("v", CombineRule::Sum), BandRule::new("v", CombineRule::Max)];
    assert!(PyramidAggregator::new(rules, MissingChildPolicy::Fail)
        .unwrap_err()
        .is_config());
    assert!(PyramidAggregator::new(vec![], MissingChildPolicy::Fail).is_err());
}
