//! PNG encoding for RGBA image data.
//!
//! Supports two encoding modes:
//! - **Indexed PNG (color type 3)**: used when the figure has at most 256
//!   distinct colors, which is the common case for flat-colored charts.
//! - **RGBA PNG (color type 6)**: fallback for anti-aliased or scatter
//!   figures with more colors.

use std::collections::HashMap;
use std::io::Write;

use crate::error::{RenderError, RenderResult};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

type Palette = Vec<[u8; 4]>;

/// Encode with automatic format selection.
///
/// # Arguments
/// - `pixels`: RGBA pixel data (4 bytes per pixel)
/// - `width`: Image width in pixels
/// - `height`: Image height in pixels
pub fn encode_png_auto(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    check_buffer(pixels, width, height)?;
    match extract_palette(pixels) {
        Some((palette, indices)) => encode_png_indexed(width, height, &palette, &indices),
        None => encode_png(pixels, width, height),
    }
}

/// Encode as 8-bit RGBA (color type 6).
pub fn encode_png(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    check_buffer(pixels, width, height)?;
    let mut png = Vec::with_capacity(pixels.len() / 4 + 64);
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, 6));

    let idat = deflate_scanlines(pixels, width * 4, height)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Encode palette indices as an indexed PNG (color type 3).
fn encode_png_indexed(width: usize, height: usize, palette: &[[u8; 4]], indices: &[u8]) -> RenderResult<Vec<u8>> {
    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    // tRNS only when some entry is not fully opaque
    if palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(indices, width, height)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn check_buffer(pixels: &[u8], width: usize, height: usize) -> RenderResult<()> {
    if width == 0 || height == 0 || width > u32::MAX as usize || height > u32::MAX as usize {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    let expected = width * height * 4;
    if pixels.len() != expected {
        return Err(RenderError::BufferSize {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

fn header(width: usize, height: usize, color_type: u8) -> [u8; 13] {
    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&(width as u32).to_be_bytes());
    ihdr[4..8].copy_from_slice(&(height as u32).to_be_bytes());
    ihdr[8] = 8; // bit depth
    ihdr[9] = color_type;
    // compression, filter and interlace methods stay 0
    ihdr
}

/// Collect at most 256 distinct colors and the per-pixel palette index.
fn extract_palette(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette = Vec::with_capacity(MAX_PALETTE_SIZE);
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

/// Prefix every scanline with filter type 0 and zlib-compress.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> RenderResult<Vec<u8>> {
    let mut raw = Vec::with_capacity(height * (1 + row_bytes));
    for row in data.chunks_exact(row_bytes).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}
