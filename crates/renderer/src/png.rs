//! PNG encoding for RGBA image data.
//!
//! Supports two encoding modes:
//! - **Indexed PNG (color type 3)**: used when the image has at most 256
//!   distinct colors, which is nearly always true for ramp output.
//! - **RGBA PNG (color type 6)**: fallback, or when asked for explicitly.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;

use raster_common::{RasterError, RasterResult};

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// Rows per parallel filter/extraction chunk.
const ROWS_PER_CHUNK: usize = 32;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Which PNG flavour to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PngMode {
    /// Indexed when the colors fit a palette, RGBA otherwise.
    #[default]
    Auto,
    Rgba,
}

/// Encode RGBA pixels (4 bytes per pixel, row-major).
pub fn encode_png(pixels: &[u8], width: usize, height: usize, mode: PngMode) -> RasterResult<Vec<u8>> {
    if pixels.len() != width * height * 4 {
        return Err(RasterError::data(format!(
            "pixel buffer has {} bytes, expected {}x{}x4",
            pixels.len(),
            width,
            height
        )));
    }
    match mode {
        PngMode::Auto => match extract_palette(pixels) {
            Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices),
            None => create_png(pixels, width, height),
        },
        PngMode::Rgba => create_png(pixels, width, height),
    }
}

/// Map every pixel to a palette index; `None` past 256 colors.
fn extract_palette(pixels: &[u8]) -> Option<(Vec<[u8; 4]>, Vec<u8>)> {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<[u8; 4]> = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices = Vec::with_capacity(pixels.len() / 4);

    for chunk in pixels.chunks_exact(4) {
        let color = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let index = match lookup.get(&color) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push(color);
                lookup.insert(color, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Create an indexed PNG (color type 3) from palette and indices.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[[u8; 4]],
    indices: &[u8],
) -> RasterResult<Vec<u8>> {
    let mut png = SIGNATURE.to_vec();
    write_chunk(&mut png, b"IHDR", &header(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    // tRNS only when some entry is not opaque
    if palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    write_chunk(&mut png, b"IDAT", &deflate_scanlines(indices, width, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Create a PNG image from RGBA pixel data (color type 6).
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> RasterResult<Vec<u8>> {
    let mut png = SIGNATURE.to_vec();
    write_chunk(&mut png, b"IHDR", &header(width, height, 6));
    write_chunk(&mut png, b"IDAT", &deflate_scanlines(pixels, width * 4, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn header(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    // bit depth, color type, compression, filter, interlace
    ihdr.extend_from_slice(&[8, color_type, 0, 0, 0]);
    ihdr
}

/// Prefix each row with filter byte 0 and zlib-compress.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> RasterResult<Vec<u8>> {
    let mut raw = vec![0u8; height * (row_bytes + 1)];
    raw.par_chunks_mut((row_bytes + 1) * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk, out)| {
            for (i, line) in out.chunks_mut(row_bytes + 1).enumerate() {
                let row = chunk * ROWS_PER_CHUNK + i;
                line[1..].copy_from_slice(&data[row * row_bytes..(row + 1) * row_bytes]);
            }
        });

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

/// Length, type, data, CRC over type and data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}
