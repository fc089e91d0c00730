//! Image encoding: painted `DynamicImage`s → PNG bytes / `data:` URIs.
//!
//! Hosts receive page rasters and overlay images as PNG. PNG is lossless, so
//! rendered text stays crisp at every zoom level.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} PNG bytes", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Encode an image as a `data:image/png;base64,…` URI for direct embedding.
pub fn to_data_uri(img: &DynamicImage) -> Result<String, image::ImageError> {
    let png = encode_png(img)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Write an image as a PNG file.
pub fn write_png(img: &DynamicImage, path: &Path) -> Result<(), image::ImageError> {
    img.save_with_format(path, image::ImageFormat::Png)
}
