/// Client image payload decoding.
use base64::Engine as _;
use image::{DynamicImage, RgbImage};

use crate::errors::{ClickSightError, ClickSightResult};

/// Decode a base64 image, with or without a `data:<mime>;base64,` prefix.
pub fn decode_base64_image(payload: &str) -> ClickSightResult<RgbImage> {
    let data = strip_data_uri(payload.trim());
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| ClickSightError::InvalidImage(format!("base64 decode: {e}")))?;
    decode_image_bytes(&bytes)
}

/// Decode raw encoded image bytes (PNG, JPEG, ...) into opaque RGB.
pub fn decode_image_bytes(bytes: &[u8]) -> ClickSightResult<RgbImage> {
    if bytes.is_empty() {
        return Err(ClickSightError::InvalidImage("empty image payload".into()));
    }
    let img = image::load_from_memory(bytes)
        .map_err(|e| ClickSightError::InvalidImage(format!("image load: {e}")))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(ClickSightError::InvalidImage("zero-sized image".into()));
    }
    Ok(flatten_onto_white(img))
}

fn strip_data_uri(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => payload,
    }
}

/// Composite any alpha channel onto an opaque white background.
pub fn flatten_onto_white(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut out = RgbImage::new(w, h);
    for (x, y, p) in rgba.enumerate_pixels() {
        let a = p[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * a + 255.0 * (1.0 - a)).round() as u8;
        out.put_pixel(x, y, image::Rgb([blend(p[0]), blend(p[1]), blend(p[2])]));
    }
    out
}
