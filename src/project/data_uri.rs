//! PNG data URIs for embedded layer images.

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::{ImageFormat, RgbaImage};

const PNG_PREFIX: &str = "data:image/png;base64,";

/// Why an `imgData` value could not be turned back into pixels.
#[derive(thiserror::Error, Debug)]
pub enum DataUriError {
    #[error("not a base64 image data URI")]
    NotDataUri,

    #[error("bad base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("bad image payload: {0}")]
    Image(#[from] image::ImageError),
}

/// Encodes an image as a `data:image/png;base64,...` URI.
pub fn encode_png(image: &RgbaImage) -> Result<String, image::ImageError> {
    let png = encode_png_bytes(image)?;
    Ok(format!("{PNG_PREFIX}{}", BASE64_STANDARD.encode(png)))
}

/// Encodes an image as PNG bytes.
pub fn encode_png_bytes(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Extracts the raw bytes from an image data URI.
///
/// Accepts any `data:image/<type>;base64,` prefix since browsers may label
/// canvas output differently.
pub fn decode_bytes(uri: &str) -> Result<Vec<u8>, DataUriError> {
    let rest = uri.strip_prefix("data:image/").ok_or(DataUriError::NotDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::NotDataUri)?;
    if !header.ends_with(";base64") {
        return Err(DataUriError::NotDataUri);
    }
    Ok(BASE64_STANDARD.decode(payload.trim())?)
}

/// Decodes an image data URI into RGBA pixels.
pub fn decode_image(uri: &str) -> Result<RgbaImage, DataUriError> {
    let bytes = decode_bytes(uri)?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}
