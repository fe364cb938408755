//! End-to-end tests for the build stages.

use raster_builder::{LeafSource, Pipeline, TilingConfig};
use raster_common::TileCoord;
use storage::{FileTileStore, MemoryTileStore, TileStore};
use test_utils::{squares_geojson, temp_test_dir, write_leaf_geojson};

/// WorldCRS84Quad, 4x4 tiles, one parent over zoom 1.
///
/// At zoom 1 each tile spans 90 degrees, so a cell is 22.5 degrees wide.
fn config(missing_children: &str) -> TilingConfig {
    TilingConfig::from_yaml_str(&format!(
        r##"
tms: WorldCRS84Quad
tile_size: [4, 4]
z_range: {{ min: 0, max: 1 }}
missing_children: {missing_children}
statistics:
  - property: population
    statistic: sum
    palette: {{ type: continuous, colors: ["#000000", "#ffffff"] }}
  - statistic: percent_cover
"##
    ))
    .unwrap()
}

/// Top-left cell of tile 1/0/0 and of tile 1/1/0.
fn write_two_leaves(root: &std::path::Path) {
    write_leaf_geojson(
        root,
        TileCoord::new(1, 0, 0),
        &squares_geojson(&[(-180.0, 67.5, -157.5, 90.0, r#"{"population": 10}"#)]),
    );
    write_leaf_geojson(
        root,
        TileCoord::new(1, 1, 0),
        &squares_geojson(&[(-90.0, 67.5, -67.5, 90.0, r#"{"population": 20}"#)]),
    );
}

fn band_total(store: &dyn TileStore, coord: TileCoord, band: &str) -> f64 {
    let tile = store.get_raster(coord).unwrap().unwrap();
    tile.band(band).unwrap().summary().unwrap().sum
}

// ============================================================================
// Raster stages
// ============================================================================

#[test]
fn test_build_preserves_sums_and_warns_on_partial_parent() {
    let input = temp_test_dir();
    write_two_leaves(input.path());
    let config = config("treat_as_absent");
    let store = MemoryTileStore::new();
    let pipeline = Pipeline::new(&config, &store);

    let (rasters, images) = pipeline.build(&LeafSource::new(input.path(), 1)).unwrap();

    assert!(rasters.is_success());
    assert_eq!(rasters.built.len(), 3);
    assert_eq!(rasters.warnings.len(), 1);
    assert_eq!(rasters.warnings[0].parent, TileCoord::new(0, 0, 0));
    assert_eq!(rasters.warnings[0].missing.len(), 2);

    let parent = TileCoord::new(0, 0, 0);
    assert_eq!(band_total(&store, parent, "population_sum"), 30.0);

    let tile = store.get_raster(parent).unwrap().unwrap();
    let cover = tile.band("percent_cover").unwrap().grid();
    // 1/0/0 lands in the left half, 1/1/0 in the right half
    assert_eq!(cover.get(0, 0), Some(25.0));
    assert_eq!(cover.get(2, 0), Some(25.0));
    assert_eq!(cover.get(1, 0), None);
    assert_eq!(cover.get(0, 2), None);

    assert!(images.is_success());
    assert_eq!(images.tiles, 3);
    assert_eq!(images.images, 6);
    let png = store.image("population_sum", parent).unwrap();
    assert_eq!(&png[1..4], b"PNG");
}

#[test]
fn test_stages_on_disk() {
    let input = temp_test_dir();
    let output = temp_test_dir();
    write_two_leaves(input.path());
    let config = config("fail");
    let store = FileTileStore::new(output.path());
    let pipeline = Pipeline::new(&config, &store);

    let leaves = pipeline.rasterize(&LeafSource::new(input.path(), 1)).unwrap();
    assert_eq!(leaves.built.len(), 2);
    assert!(output.path().join("geotiff/1/1/0.tif").is_file());
    assert!(!output.path().join("geotiff/0/0/0.tif").exists());

    let parents = pipeline.pyramid().unwrap();
    assert!(parents.built.contains(&TileCoord::new(0, 0, 0)));
    // Two leaves from the first stage, the parent from the second
    assert_eq!(store.stats().snapshot().0, 3);
    assert_eq!(band_total(&store, TileCoord::new(0, 0, 0), "population_sum"), 30.0);

    let images = pipeline.web_tiles().unwrap();
    assert_eq!(images.tiles, 3);
    assert!(output
        .path()
        .join("web_tiles/percent_cover/0/0/0.png")
        .is_file());
}

#[test]
fn test_leaf_without_features_is_empty() {
    let input = temp_test_dir();
    write_two_leaves(input.path());
    write_leaf_geojson(input.path(), TileCoord::new(1, 0, 1), &squares_geojson(&[]));
    let config = config("fail");
    let store = MemoryTileStore::new();

    let report = Pipeline::new(&config, &store)
        .rasters(&LeafSource::new(input.path(), 1))
        .unwrap();
    assert_eq!(report.empty, vec![TileCoord::new(1, 0, 1)]);
    assert_eq!(store.raster_count(), 3);
}

#[test]
fn test_rerun_drops_leaf_that_became_empty() {
    let input = temp_test_dir();
    let output = temp_test_dir();
    write_two_leaves(input.path());
    let config = config("treat_as_absent");
    let store = FileTileStore::new(output.path());
    let source = LeafSource::new(input.path(), 1);

    Pipeline::new(&config, &store).build(&source).unwrap();
    assert!(output.path().join("geotiff/1/1/0.tif").is_file());

    write_leaf_geojson(input.path(), TileCoord::new(1, 1, 0), &squares_geojson(&[]));
    let (rasters, images) = Pipeline::new(&config, &store).build(&source).unwrap();

    assert_eq!(rasters.empty, vec![TileCoord::new(1, 1, 0)]);
    assert!(!output.path().join("geotiff/1/1/0.tif").exists());
    assert_eq!(store.list_rasters(1).unwrap(), vec![TileCoord::new(1, 0, 0)]);
    assert_eq!(images.tiles, 2);
    assert_eq!(band_total(&store, TileCoord::new(0, 0, 0), "population_sum"), 10.0);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_bad_leaf_isolated_when_absent_allowed() {
    let input = temp_test_dir();
    write_two_leaves(input.path());
    write_leaf_geojson(input.path(), TileCoord::new(1, 1, 1), "{broken");
    let config = config("treat_as_absent");
    let store = MemoryTileStore::new();

    let report = Pipeline::new(&config, &store)
        .rasters(&LeafSource::new(input.path(), 1))
        .unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, TileCoord::new(1, 1, 1));
    assert!(report.built.contains(&TileCoord::new(0, 0, 0)));
}

#[test]
fn test_bad_leaf_fails_parent_when_configured() {
    let input = temp_test_dir();
    write_two_leaves(input.path());
    write_leaf_geojson(input.path(), TileCoord::new(1, 1, 1), "{broken");
    let config = config("fail");
    let store = MemoryTileStore::new();

    let report = Pipeline::new(&config, &store)
        .rasters(&LeafSource::new(input.path(), 1))
        .unwrap();
    let failed: Vec<TileCoord> = report.failed.iter().map(|(c, _)| *c).collect();
    assert_eq!(failed, vec![TileCoord::new(0, 0, 0), TileCoord::new(1, 1, 1)]);
    assert!(store.get_raster(TileCoord::new(0, 0, 0)).unwrap().is_none());
}

#[test]
fn test_configuration_error_stops_build() {
    let input = temp_test_dir();
    write_leaf_geojson(
        input.path(),
        TileCoord::new(1, 0, 0),
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[-170.0,80.0]},
             "properties":{"population":1}}]}"#,
    );
    let config = config("fail");
    let store = MemoryTileStore::new();

    let err = Pipeline::new(&config, &store)
        .rasters(&LeafSource::new(input.path(), 1))
        .unwrap_err();
    assert!(err.is_config());
}

// ============================================================================
// Web tiles
// ============================================================================

#[test]
fn test_zoom_stretch_shares_range_across_tiles() {
    let input = temp_test_dir();
    write_two_leaves(input.path());
    let mut config = config("fail");
    config.stretch_scope = raster_builder::StretchScope::Zoom;
    config.png_mode = renderer::PngMode::Rgba;

    let tile_store = MemoryTileStore::new();
    let zoom_store = MemoryTileStore::new();
    let mut tile_config = config.clone();
    tile_config.stretch_scope = raster_builder::StretchScope::Tile;

    Pipeline::new(&tile_config, &tile_store)
        .build(&LeafSource::new(input.path(), 1))
        .unwrap();
    Pipeline::new(&config, &zoom_store)
        .build(&LeafSource::new(input.path(), 1))
        .unwrap();

    // Per tile, both leaves stretch their single value to the same color.
    let a = tile_store.image("population_sum", TileCoord::new(1, 0, 0)).unwrap();
    let b = tile_store.image("population_sum", TileCoord::new(1, 1, 0)).unwrap();
    assert_eq!(a, b);

    // Across the zoom, 10 and 20 get different colors.
    let a = zoom_store.image("population_sum", TileCoord::new(1, 0, 0)).unwrap();
    let b = zoom_store.image("population_sum", TileCoord::new(1, 1, 0)).unwrap();
    assert_ne!(a, b);
}
