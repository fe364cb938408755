//! Tile stores: where finished rasters and image tiles are handed off.
//!
//! Layout of [`FileTileStore`]:
//!
//! ```text
//! <root>/geotiff/{z}/{x}/{y}.tif
//! <root>/web_tiles/{band}/{z}/{x}/{y}.png
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StorageError, StorageResult};
use crate::geotiff::{decode_geotiff, encode_geotiff};
use raster_common::{RasterTile, TileCoord};

/// Synchronous hand-off point for finished tiles.
pub trait TileStore: Send + Sync {
    /// Persist a numeric raster tile.
    fn put_raster(&self, tile: &RasterTile) -> StorageResult<()>;

    /// Load a raster tile; `None` if it was never written.
    fn get_raster(&self, coord: TileCoord) -> StorageResult<Option<RasterTile>>;

    /// Drop a raster left by an earlier run. `false` if there was none.
    fn remove_raster(&self, coord: TileCoord) -> StorageResult<bool>;

    /// Coordinates of every stored raster at zoom `z`.
    fn list_rasters(&self, z: u32) -> StorageResult<Vec<TileCoord>>;

    /// Persist an encoded image tile for one band.
    fn put_image(&self, band: &str, coord: TileCoord, png: &[u8]) -> StorageResult<()>;
}

/// Write counters, readable while a build runs.
#[derive(Debug, Default)]
pub struct StoreStats {
    pub rasters_written: AtomicU64,
    pub images_written: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl StoreStats {
    fn record_raster(&self, bytes: usize) {
        self.rasters_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_image(&self, bytes: usize) {
        self.images_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// (rasters, images, bytes) written so far.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.rasters_written.load(Ordering::Relaxed),
            self.images_written.load(Ordering::Relaxed),
            self.bytes_written.load(Ordering::Relaxed),
        )
    }
}

/// Filesystem store.
#[derive(Debug)]
pub struct FileTileStore {
    root: PathBuf,
    stats: StoreStats,
}

impl FileTileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stats: StoreStats::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    pub fn geotiff_dir(&self) -> PathBuf {
        self.root.join("geotiff")
    }

    pub fn raster_path(&self, coord: TileCoord) -> PathBuf {
        self.geotiff_dir()
            .join(coord.z.to_string())
            .join(coord.x.to_string())
            .join(format!("{}.tif", coord.y))
    }

    pub fn image_path(&self, band: &str, coord: TileCoord) -> PathBuf {
        self.root
            .join("web_tiles")
            .join(band)
            .join(coord.z.to_string())
            .join(coord.x.to_string())
            .join(format!("{}.png", coord.y))
    }

    /// Write through a sibling temp file and rename, so a reader never sees
    /// a half-written tile.
    fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("partial");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Parse `<geotiff>/{z}/{x}/{y}.tif` relative components.
fn coord_from_relative(rel: &Path) -> Option<TileCoord> {
    let parts: Vec<&str> = rel.iter().filter_map(|c| c.to_str()).collect();
    if parts.len() != 3 {
        return None;
    }
    let y = parts[2].strip_suffix(".tif")?;
    Some(TileCoord::new(
        parts[0].parse().ok()?,
        parts[1].parse().ok()?,
        y.parse().ok()?,
    ))
}

impl TileStore for FileTileStore {
    fn put_raster(&self, tile: &RasterTile) -> StorageResult<()> {
        let bytes = encode_geotiff(tile)?;
        let path = self.raster_path(tile.coord());
        Self::write_atomic(&path, &bytes)?;
        self.stats.record_raster(bytes.len());
        debug!(tile = %tile.coord(), path = %path.display(), bytes = bytes.len(), "Stored raster tile");
        Ok(())
    }

    fn get_raster(&self, coord: TileCoord) -> StorageResult<Option<RasterTile>> {
        let path = self.raster_path(coord);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode_geotiff(coord, &bytes).map(Some)
    }

    fn remove_raster(&self, coord: TileCoord) -> StorageResult<bool> {
        let path = self.raster_path(coord);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(tile = %coord, path = %path.display(), "Removed stale raster tile");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_rasters(&self, z: u32) -> StorageResult<Vec<TileCoord>> {
        let base = self.geotiff_dir();
        let zoom_dir = base.join(z.to_string());
        if !zoom_dir.exists() {
            return Ok(Vec::new());
        }

        let mut coords = Vec::new();
        for entry in WalkDir::new(&zoom_dir).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| StorageError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&base) else {
                continue;
            };
            if let Some(coord) = coord_from_relative(rel) {
                coords.push(coord);
            }
        }
        coords.sort();
        Ok(coords)
    }

    fn put_image(&self, band: &str, coord: TileCoord, png: &[u8]) -> StorageResult<()> {
        let path = self.image_path(band, coord);
        Self::write_atomic(&path, png)?;
        self.stats.record_image(png.len());
        Ok(())
    }
}

/// In-memory store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    rasters: RwLock<HashMap<TileCoord, RasterTile>>,
    images: RwLock<HashMap<(String, TileCoord), Vec<u8>>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self, band: &str, coord: TileCoord) -> Option<Vec<u8>> {
        self.images
            .read()
            .ok()?
            .get(&(band.to_string(), coord))
            .cloned()
    }

    pub fn raster_count(&self) -> usize {
        self.rasters.read().map(|r| r.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "memory store lock poisoned",
    ))
}

impl TileStore for MemoryTileStore {
    fn put_raster(&self, tile: &RasterTile) -> StorageResult<()> {
        self.rasters
            .write()
            .map_err(poisoned)?
            .insert(tile.coord(), tile.clone());
        Ok(())
    }

    fn get_raster(&self, coord: TileCoord) -> StorageResult<Option<RasterTile>> {
        Ok(self.rasters.read().map_err(poisoned)?.get(&coord).cloned())
    }

    fn remove_raster(&self, coord: TileCoord) -> StorageResult<bool> {
        Ok(self.rasters.write().map_err(poisoned)?.remove(&coord).is_some())
    }

    fn list_rasters(&self, z: u32) -> StorageResult<Vec<TileCoord>> {
        let mut coords: Vec<TileCoord> = self
            .rasters
            .read()
            .map_err(poisoned)?
            .keys()
            .filter(|c| c.z == z)
            .copied()
            .collect();
        coords.sort();
        Ok(coords)
    }

    fn put_image(&self, band: &str, coord: TileCoord, png: &[u8]) -> StorageResult<()> {
        self.images
            .write()
            .map_err(poisoned)?
            .insert((band.to_string(), coord), png.to_vec());
        Ok(())
    }
}
