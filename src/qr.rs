//! QR code rendering for login confirmation URLs.
//!
//! The browser gets a PNG as a `data:` URL it can drop straight into an
//! `<img>`; the CLI gets a Unicode rendering for terminals.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;
use std::io::Cursor;

/// Smallest edge of the rendered PNG, in pixels. Large enough for phone
/// cameras at arm's length.
const MIN_PNG_DIMENSION: u32 = 256;

/// Encode `data` as a QR code and return the PNG bytes, base64-encoded.
pub fn render_png_base64(data: &str) -> Result<String> {
    let code = QrCode::new(data.as_bytes()).context("Failed to encode QR code")?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_PNG_DIMENSION, MIN_PNG_DIMENSION)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("Failed to write QR code PNG")?;

    Ok(STANDARD.encode(png))
}

/// Same as [`render_png_base64`], wrapped as `data:image/png;base64,...`.
pub fn render_png_data_url(data: &str) -> Result<String> {
    Ok(format!("data:image/png;base64,{}", render_png_base64(data)?))
}

/// Render `data` as a QR code made of half-block characters.
pub fn render_terminal(data: &str) -> Result<String> {
    let code = QrCode::new(data.as_bytes()).context("Failed to encode QR code")?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}
