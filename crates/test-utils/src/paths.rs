//! Temporary directories and on-disk layouts for tests.

use std::path::{Path, PathBuf};

use raster_common::TileCoord;

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Writes a leaf vector tile as `<root>/{z}/{x}/{y}.geojson`.
pub fn write_leaf_geojson(root: &Path, coord: TileCoord, document: &str) -> PathBuf {
    let dir = root.join(coord.z.to_string()).join(coord.x.to_string());
    std::fs::create_dir_all(&dir).expect("Failed to create tile directory");
    let path = dir.join(format!("{}.geojson", coord.y));
    std::fs::write(&path, document).expect("Failed to write GeoJSON tile");
    path
}
