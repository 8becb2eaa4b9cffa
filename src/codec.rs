// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image decoding, JPEG encoding and extended attribute cleanup

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;
use tracing::debug;

use crate::scan::is_heic;
use crate::{AgesortError, Result};

/// Quality used for the in-memory copy sent to an estimator
const INFERENCE_QUALITY: u8 = 90;

/// Decode any supported image into 8-bit RGB
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let img = if is_heic(path) {
        decode_heic(path)?
    } else {
        image::open(path)?
    };
    Ok(img.to_rgb8())
}

#[cfg(feature = "heic")]
fn decode_heic(path: &Path) -> Result<DynamicImage> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let heic_err = |e: libheif_rs::HeifError| AgesortError::Heic(e.to_string());

    let path_str = path
        .to_str()
        .ok_or_else(|| AgesortError::Heic(format!("non UTF-8 path: {:?}", path)))?;
    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_file(path_str).map_err(heic_err)?;
    let handle = ctx.primary_image_handle().map_err(heic_err)?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(heic_err)?;

    let width = decoded.width();
    let height = decoded.height();
    let plane = decoded
        .planes()
        .interleaved
        .ok_or_else(|| AgesortError::Heic("no interleaved RGB plane".to_string()))?;

    // Rows may be padded past width * 3
    let row_len = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in plane.data.chunks(plane.stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    RgbImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| AgesortError::Heic("decoded buffer size mismatch".to_string()))
}

#[cfg(not(feature = "heic"))]
fn decode_heic(path: &Path) -> Result<DynamicImage> {
    Err(AgesortError::UnsupportedFileType(format!(
        "{} (rebuild with --features heic)",
        path.display()
    )))
}

/// Write `img` as a JPEG file at the given quality (1-100)
pub fn save_jpeg(img: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
    img.write_with_encoder(encoder)?;
    writer.flush()?;
    Ok(())
}

/// Downscale to `max_width` if wider, keeping the aspect ratio
pub fn fit_width(img: RgbImage, max_width: u32) -> RgbImage {
    if img.width() <= max_width {
        return img;
    }
    let ratio = max_width as f64 / img.width() as f64;
    let height = ((img.height() as f64 * ratio) as u32).max(1);
    image::imageops::resize(&img, max_width, height, image::imageops::FilterType::Triangle)
}

/// Decode, downscale and JPEG-encode an image for an age estimator
pub fn prepare_for_inference(path: &Path, max_width: u32) -> Result<Vec<u8>> {
    let img = fit_width(load_rgb(path)?, max_width);

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), INFERENCE_QUALITY);
    img.write_with_encoder(encoder)?;

    debug!("Prepared {:?} for inference ({}x{}, {} bytes)", path, img.width(), img.height(), buffer.len());
    Ok(buffer)
}

/// Remove extended attributes except Finder info. Errors are ignored.
#[cfg(unix)]
pub fn strip_extended_attributes(path: &Path) {
    let attrs = match xattr::list(path) {
        Ok(attrs) => attrs,
        Err(e) => {
            debug!("Cannot list extended attributes of {:?}: {}", path, e);
            return;
        }
    };

    for attr in attrs {
        let name = attr.to_string_lossy();
        if name.starts_with("com.apple.FinderInfo") {
            continue;
        }
        if let Err(e) = xattr::remove(path, &attr) {
            debug!("Cannot remove attribute {} from {:?}: {}", name, path, e);
        }
    }
}

#[cfg(not(unix))]
pub fn strip_extended_attributes(_path: &Path) {}
