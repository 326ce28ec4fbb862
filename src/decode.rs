//! Canvas payload decoding: data-URL → base64 → image → grayscale.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, ImageReader, Limits, Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::features::{GrayImage, ImageAccess};

/// Largest accepted width or height of a decoded canvas.
pub const DEFAULT_MAX_IMAGE_SIDE: u32 = 2048;

/// The base64 payload of a data-URL, or `input` itself when it has no
/// `data:...,` prefix.
pub fn strip_data_url(input: &str) -> &str {
    let input = input.trim();
    match input.split_once(',') {
        Some((_, payload)) => payload,
        None => input,
    }
}

/// Decode a canvas snapshot sent as a data-URL or bare base64 string.
pub fn decode_data_url(input: &str) -> Result<GrayImage> {
    decode_data_url_within(input, DEFAULT_MAX_IMAGE_SIDE)
}

/// [`decode_data_url`] with a custom size limit.
pub fn decode_data_url_within(input: &str, max_side: u32) -> Result<GrayImage> {
    let payload = strip_data_url(input);
    if payload.is_empty() {
        return Err(Error::InvalidInput("image payload is empty".to_string()));
    }
    let bytes = STANDARD.decode(payload)?;
    decode_image_bytes_within(&bytes, max_side)
}

/// Decode an encoded image (PNG or JPEG) to grayscale.
///
/// Transparent pixels are composited onto white first, so an untouched
/// canvas reads as blank paper rather than black.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<GrayImage> {
    decode_image_bytes_within(bytes, DEFAULT_MAX_IMAGE_SIDE)
}

/// [`decode_image_bytes`] that rejects images wider or taller than
/// `max_side` with [`Error::InvalidInput`]. Only the header is read before
/// the check.
pub fn decode_image_bytes_within(bytes: &[u8], max_side: u32) -> Result<GrayImage> {
    if bytes.is_empty() {
        return Err(Error::InvalidInput("image buffer is empty".to_string()));
    }
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    if width > max_side || height > max_side {
        return Err(Error::InvalidInput(format!(
            "image is {width}x{height}, larger than the {max_side}x{max_side} limit"
        )));
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(max_side);
    limits.max_image_height = Some(max_side);
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.limits(limits);
    Ok(flatten(&reader.decode()?))
}

/// Grayscale version of `image` on a white background.
pub fn flatten(image: &DynamicImage) -> GrayImage {
    if !image.color().has_alpha() {
        return image.to_luma8().into();
    }
    let rgba = image.to_rgba8();
    let rgb = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let over_white = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([over_white(r), over_white(g), over_white(b)])
    });
    DynamicImage::ImageRgb8(rgb).to_luma8().into()
}

/// Encode `image` as a PNG data-URL, the format browsers send.
pub fn encode_data_url(image: &GrayImage) -> Result<String> {
    let buffer = image::GrayImage::from_raw(image.width(), image.height(), image.as_raw().to_vec())
        .ok_or_else(|| Error::InvalidInput("pixel buffer does not match dimensions".into()))?;
    let mut png = Vec::new();
    DynamicImage::ImageLuma8(buffer).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
}
