//! GeoTIFF persistence for raster tiles.
//!
//! One IFD per band, each a single-sample Float32 image. Every IFD carries
//! the full georeferencing (ModelPixelScale, ModelTiepoint, GeoKeyDirectory),
//! the band name in ImageDescription and the nodata sentinel in the
//! GDAL_NODATA tag, so a reader never needs out-of-band knowledge.
//!
//! Range bands are followed by two extra IFDs holding their per-cell min and
//! max grids, named `<band>:range_min` and `<band>:range_max`.

use std::io::{Cursor, Read, Seek, Write};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::{Compression, DeflateLevel, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::trace;

use crate::error::{StorageError, StorageResult};
use raster_common::{
    Band, BoundingBox, CrsCode, Grid, NodataPolicy, RangeSupport, RasterTile, TileCoord, TileSpec,
};

// GeoTIFF Tag IDs (not in standard tiff crate)
const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
const GEOTIFF_MODELTIEPOINT: u16 = 33922;
const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
const GEOTIFF_GEOASCIIPARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

const RANGE_MIN_SUFFIX: &str = ":range_min";
const RANGE_MAX_SUFFIX: &str = ":range_max";

/// Encode a tile as GeoTIFF bytes.
pub fn encode_geotiff(tile: &RasterTile) -> StorageResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_geotiff(tile, &mut cursor)?;
    Ok(cursor.into_inner())
}

/// Write a tile as a multi-IFD GeoTIFF.
pub fn write_geotiff<W: Write + Seek>(tile: &RasterTile, writer: W) -> StorageResult<()> {
    if tile.bands().is_empty() {
        return Err(StorageError::invalid_metadata(format!(
            "tile {} has no bands to write",
            tile.coord()
        )));
    }

    let (width, height) = tile.resolution();
    let mut encoder =
        TiffEncoder::new(writer)?.with_compression(Compression::Deflate(DeflateLevel::Fast));

    for (name, grid) in layers(tile) {
        let mut image = encoder.new_image::<Gray32Float>(width as u32, height as u32)?;
        write_geotiff_tags(image.encoder(), tile, &name)?;
        image.write_data(grid.data())?;
        trace!(tile = %tile.coord(), band = %name, "Wrote GeoTIFF band");
    }

    Ok(())
}

fn layers(tile: &RasterTile) -> Vec<(String, &Grid)> {
    let mut layers = Vec::new();
    for band in tile.bands() {
        layers.push((band.name().to_string(), band.grid()));
        if let Some(support) = band.support() {
            layers.push((format!("{}{}", band.name(), RANGE_MIN_SUFFIX), &support.min));
            layers.push((format!("{}{}", band.name(), RANGE_MAX_SUFFIX), &support.max));
        }
    }
    layers
}

fn write_geotiff_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    tile: &RasterTile,
    name: &str,
) -> StorageResult<()> {
    let bounds = tile.bounds();
    let (scale_x, scale_y) = tile.spec().pixel_size();

    dir.write_tag(Tag::ImageDescription, name)?;

    // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
    let pixel_scale = [scale_x, scale_y, 0.0];
    dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())?;

    // ModelTiepoint: pixel (0, 0) to world (min_x, max_y)
    let tiepoint = [0.0, 0.0, 0.0, bounds.min_x, bounds.max_y, 0.0];
    dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())?;

    let geokeys = build_geokey_directory(tile.crs());
    dir.write_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())?;

    let ascii_params = format!("{}|", tile.crs());
    dir.write_tag(Tag::Unknown(GEOTIFF_GEOASCIIPARAMS), ascii_params.as_str())?;

    let nodata = tile.nodata().to_tag_string();
    dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())?;

    Ok(())
}

fn build_geokey_directory(crs: CrsCode) -> Vec<u16> {
    // [KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
    //  KeyID, TIFFTagLocation, Count, Value, ...]
    let (model_type, crs_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_GEO_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_GEO_KEY)
    };

    vec![
        1,
        1,
        0,
        3,
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        model_type,
        GT_RASTER_TYPE_GEO_KEY,
        0,
        1,
        RASTER_PIXEL_IS_AREA,
        crs_key,
        0,
        1,
        crs.epsg(),
    ]
}

fn crs_from_geokeys(keys: &[u16]) -> StorageResult<CrsCode> {
    keys.get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .find(|entry| entry[0] == GEOGRAPHIC_TYPE_GEO_KEY || entry[0] == PROJECTED_CS_TYPE_GEO_KEY)
        .ok_or_else(|| StorageError::invalid_metadata("GeoKeyDirectory has no CRS key"))
        .and_then(|entry| {
            CrsCode::from_epsg(entry[3]).map_err(|e| StorageError::invalid_metadata(e.to_string()))
        })
}

/// Georeferencing read from one IFD.
#[derive(Debug, Clone, PartialEq)]
struct IfdMeta {
    width: usize,
    height: usize,
    bounds: BoundingBox,
    crs: CrsCode,
    nodata: NodataPolicy,
}

fn read_ifd_meta<R: Read + Seek>(decoder: &mut Decoder<R>) -> StorageResult<IfdMeta> {
    let (width, height) = decoder.dimensions()?;

    let scale = decoder.get_tag_f64_vec(Tag::Unknown(GEOTIFF_MODELPIXELSCALE))?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(GEOTIFF_MODELTIEPOINT))?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(StorageError::invalid_metadata(
            "ModelPixelScale or ModelTiepoint too short",
        ));
    }
    let min_x = tiepoint[3];
    let max_y = tiepoint[4];
    let bounds = BoundingBox::new(
        min_x,
        max_y - scale[1] * height as f64,
        min_x + scale[0] * width as f64,
        max_y,
    );

    let geokeys = decoder.get_tag_u16_vec(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY))?;
    let crs = crs_from_geokeys(&geokeys)?;

    let nodata_text = decoder
        .find_tag(Tag::Unknown(GDAL_NODATA))?
        .ok_or_else(|| StorageError::invalid_metadata("missing GDAL_NODATA tag"))?
        .into_string()?;
    let nodata = NodataPolicy::from_tag_string(&nodata_text).ok_or_else(|| {
        StorageError::invalid_metadata(format!("unparseable nodata '{}'", nodata_text))
    })?;

    Ok(IfdMeta {
        width: width as usize,
        height: height as usize,
        bounds,
        crs,
        nodata,
    })
}

/// Decode a tile from GeoTIFF bytes.
pub fn decode_geotiff(coord: TileCoord, bytes: &[u8]) -> StorageResult<RasterTile> {
    read_geotiff(coord, Cursor::new(bytes))
}

/// Read a tile written by [`write_geotiff`].
///
/// The tile coordinate is not stored in the file; the caller knows it from
/// where the file lives.
pub fn read_geotiff<R: Read + Seek>(coord: TileCoord, reader: R) -> StorageResult<RasterTile> {
    let mut decoder = Decoder::new(reader)?;
    let mut meta: Option<IfdMeta> = None;
    let mut layers: Vec<(String, Vec<f32>)> = Vec::new();

    loop {
        let ifd = read_ifd_meta(&mut decoder)?;
        match &meta {
            None => meta = Some(ifd),
            Some(first) => {
                let same_grid = first.width == ifd.width
                    && first.height == ifd.height
                    && first.crs == ifd.crs
                    && first.nodata == ifd.nodata;
                if !same_grid {
                    return Err(StorageError::invalid_metadata(
                        "bands disagree on size, CRS or nodata",
                    ));
                }
            }
        }

        let name = decoder
            .get_tag_ascii_string(Tag::ImageDescription)?
            .trim_end_matches('\0')
            .to_string();
        let data = match decoder.read_image()? {
            DecodingResult::F32(data) => data,
            _ => {
                return Err(StorageError::invalid_metadata(format!(
                    "band '{}' is not Float32",
                    name
                )))
            }
        };
        layers.push((name, data));

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    let meta = meta.ok_or_else(|| StorageError::invalid_metadata("no images in GeoTIFF"))?;
    let spec = TileSpec::new(
        coord,
        meta.bounds,
        meta.crs,
        meta.width,
        meta.height,
        meta.nodata,
    );
    assemble(spec, layers)
}

fn assemble(spec: TileSpec, layers: Vec<(String, Vec<f32>)>) -> StorageResult<RasterTile> {
    let mut grids: Vec<(String, Grid)> = Vec::with_capacity(layers.len());
    for (name, data) in layers {
        let grid = Grid::from_vec(spec.width, spec.height, data, spec.nodata)?;
        grids.push((name, grid));
    }

    let take = |grids: &mut Vec<(String, Grid)>, name: String| {
        grids
            .iter()
            .position(|(n, _)| *n == name)
            .map(|i| grids.remove(i).1)
    };

    let mut bands = Vec::new();
    while !grids.is_empty() {
        let (name, grid) = grids.remove(0);
        if name.ends_with(RANGE_MIN_SUFFIX) || name.ends_with(RANGE_MAX_SUFFIX) {
            return Err(StorageError::invalid_metadata(format!(
                "range support layer '{}' without its band",
                name
            )));
        }
        let min = take(&mut grids, format!("{}{}", name, RANGE_MIN_SUFFIX));
        let max = take(&mut grids, format!("{}{}", name, RANGE_MAX_SUFFIX));
        let band = Band::new(name, grid);
        bands.push(match (min, max) {
            (Some(min), Some(max)) => band.with_support(RangeSupport { min, max }),
            _ => band,
        });
    }

    Ok(RasterTile::new(spec, bands)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TileSpec {
        TileSpec::new(
            TileCoord::new(3, 4, 2),
            BoundingBox::new(-45.0, 0.0, -22.5, 22.5),
            CrsCode::Epsg4326,
            4,
            2,
            NodataPolicy::default(),
        )
    }

    #[test]
    fn test_geokeys_round_trip() {
        for crs in [CrsCode::Epsg4326, CrsCode::Epsg3857] {
            assert_eq!(crs_from_geokeys(&build_geokey_directory(crs)).unwrap(), crs);
        }
        assert!(crs_from_geokeys(&[1, 1, 0, 0]).is_err());
    }

    #[test]
    fn test_round_trip_preserves_bands_and_nodata() {
        let spec = spec();
        let values = [
            Some(0.0),
            None,
            Some(2.5),
            Some(-1.0),
            None,
            None,
            Some(7.0),
            Some(0.0),
        ];
        let grid = Grid::from_options(4, 2, &values, spec.nodata).unwrap();
        let tile = RasterTile::new(
            spec.clone(),
            vec![Band::new("a_sum", grid), Band::new("empty", spec.empty_grid())],
        )
        .unwrap();

        let bytes = encode_geotiff(&tile).unwrap();
        let back = decode_geotiff(spec.coord, &bytes).unwrap();

        assert_eq!(back.band_names(), vec!["a_sum", "empty"]);
        assert_eq!(back.crs(), CrsCode::Epsg4326);
        assert_eq!(back.nodata(), NodataPolicy::default());
        assert!(back.bounds().approx_eq(&spec.bounds, 1e-9));
        assert_eq!(back.band("a_sum").unwrap().grid().rows(), tile.band("a_sum").unwrap().grid().rows());
        assert!(back.band("empty").unwrap().is_all_nodata());
    }

    #[test]
    fn test_round_trip_range_support() {
        let spec = spec();
        let min = Grid::from_vec(4, 2, vec![1.0; 8], spec.nodata).unwrap();
        let max = Grid::from_vec(4, 2, vec![3.0; 8], spec.nodata).unwrap();
        let range = Grid::from_vec(4, 2, vec![2.0; 8], spec.nodata).unwrap();
        let tile = RasterTile::new(
            spec.clone(),
            vec![Band::new("h_range", range).with_support(RangeSupport { min, max })],
        )
        .unwrap();

        let back = decode_geotiff(spec.coord, &encode_geotiff(&tile).unwrap()).unwrap();
        assert_eq!(back.bands().len(), 1);
        let support = back.band("h_range").unwrap().support().unwrap();
        assert_eq!(support.min.get(0, 0), Some(1.0));
        assert_eq!(support.max.get(3, 1), Some(3.0));
    }

    #[test]
    fn test_nan_nodata_round_trip() {
        let mut spec = spec();
        spec.nodata = NodataPolicy::new(f32::NAN);
        let tile = RasterTile::new(spec.clone(), vec![Band::new("a", spec.empty_grid())]).unwrap();
        let back = decode_geotiff(spec.coord, &encode_geotiff(&tile).unwrap()).unwrap();
        assert!(back.nodata().sentinel().is_nan());
    }

    #[test]
    fn test_tile_without_bands_is_rejected() {
        let tile = RasterTile::new(spec(), vec![]).unwrap();
        assert!(encode_geotiff(&tile).is_err());
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(decode_geotiff(TileCoord::new(0, 0, 0), b"not a tiff").is_err());
    }
}
