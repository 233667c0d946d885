/// Draw the resolved click target onto a copy of the observed image.
///
/// The marker is a filled red disc with a dark red rim and a small white dot
/// at the exact centre, so sub-pixel placement errors stay visible when the
/// artifact is inspected later.
use image::{Rgb, RgbImage};

use crate::errors::{ClickSightError, ClickSightResult};
use crate::perception::types::NormalizedPoint;

const FILL: Rgb<u8> = Rgb([255, 0, 0]);
const RIM: Rgb<u8> = Rgb([139, 0, 0]);
const CENTRE: Rgb<u8> = Rgb([255, 255, 255]);
const RIM_WIDTH: f64 = 3.0;
const CENTRE_RADIUS: f64 = 2.0;

/// Returns a new image with the marker drawn at `point`, scaled by the
/// image's own dimensions. `image` is left untouched.
pub fn annotate(image: &RgbImage, point: NormalizedPoint, radius: u32) -> RgbImage {
    let mut canvas = image.clone();
    let (w, h) = canvas.dimensions();
    let cx = point.x * w as f64;
    let cy = point.y * h as f64;
    let r = radius as f64;

    fill_disc(&mut canvas, cx, cy, r, |d| {
        if d > r - RIM_WIDTH {
            RIM
        } else {
            FILL
        }
    });
    fill_disc(&mut canvas, cx, cy, CENTRE_RADIUS, |_| CENTRE);

    tracing::debug!(cx, cy, radius, width = w, height = h, "marker drawn");
    canvas
}

/// PNG-encode an annotated image.
pub fn encode_png(image: &RgbImage) -> ClickSightResult<Vec<u8>> {
    let mut out = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| ClickSightError::InvalidImage(format!("PNG encode: {e}")))?;
    Ok(out)
}

// ── Drawing primitives ──────────────────────────────────────────────────────

/// Paint every pixel whose centre lies within `radius` of `(cx, cy)`.
/// `colour_at` receives the pixel's distance from the centre.
fn fill_disc<F>(canvas: &mut RgbImage, cx: f64, cy: f64, radius: f64, colour_at: F)
where
    F: Fn(f64) -> Rgb<u8>,
{
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil().max(0.0) as u32).min(w - 1);
    let y1 = ((cy + radius).ceil().max(0.0) as u32).min(h - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            if d <= radius {
                canvas.put_pixel(x, y, colour_at(d));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([128, 128, 128]))
    }

    #[test]
    fn input_image_is_not_mutated() {
        let src = grey(200, 100);
        let before = src.clone();
        let _ = annotate(&src, NormalizedPoint::new(0.5, 0.5).unwrap(), 15);
        assert_eq!(src, before);
    }

    #[test]
    fn identical_inputs_give_identical_pixels() {
        let src = grey(320, 240);
        let p = NormalizedPoint::new(0.3, 0.7).unwrap();
        let a = annotate(&src, p, 12);
        let b = annotate(&src, p, 12);
        assert_eq!(a.as_raw(), b.as_raw());
        assert_eq!(encode_png(&a).unwrap(), encode_png(&b).unwrap());
    }

    #[test]
    fn marker_is_centred_on_the_projected_point() {
        let src = grey(200, 100);
        let out = annotate(&src, NormalizedPoint::new(0.5, 0.5).unwrap(), 15);
        // Centre dot at (100, 50).
        assert_eq!(*out.get_pixel(100, 50), CENTRE);
        // Inside the disc, away from the centre dot and rim.
        assert_eq!(*out.get_pixel(100 + 6, 50), FILL);
        // On the rim.
        assert_eq!(*out.get_pixel(100 + 13, 50), RIM);
        // Outside the disc.
        assert_eq!(*out.get_pixel(100 + 20, 50), Rgb([128, 128, 128]));
        assert_eq!(*out.get_pixel(0, 0), Rgb([128, 128, 128]));
    }

    #[test]
    fn corner_markers_are_clipped_to_the_canvas() {
        let src = grey(50, 40);
        let out = annotate(&src, NormalizedPoint::new(1.0, 1.0).unwrap(), 10);
        assert_eq!(out.dimensions(), (50, 40));
        assert_ne!(*out.get_pixel(49, 39), Rgb([128, 128, 128]));
        let out = annotate(&src, NormalizedPoint::new(0.0, 0.0).unwrap(), 10);
        assert_ne!(*out.get_pixel(0, 0), Rgb([128, 128, 128]));
    }

    #[test]
    fn encoded_png_round_trips_dimensions() {
        let out = annotate(&grey(64, 32), NormalizedPoint::new(0.5, 0.5).unwrap(), 4);
        let png = encode_png(&out).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
    }
}
