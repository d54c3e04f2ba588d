use super::{Constraint, ValidationError};
use crate::registry::Geometry;

pub(super) fn check(name: &str, g: &Geometry, width: u32, height: u32, errors: &mut Vec<ValidationError>) {
    let dims = Some(format!("{}x{}", width, height));
    if width.min(height) < g.min_side {
        errors.push(ValidationError::new(
            name,
            Constraint::SideTooShort {
                min_side: g.min_side,
            },
            dims.clone(),
        ));
    }
    if (width as u64) * (height as u64) > g.max_pixels {
        errors.push(ValidationError::new(
            name,
            Constraint::TooManyPixels {
                max_pixels: g.max_pixels,
            },
            dims.clone(),
        ));
    }
    if !g.aspect_within(width, height) {
        errors.push(ValidationError::new(
            name,
            Constraint::AspectRatio {
                min: g.min_aspect,
                max: g.max_aspect,
            },
            dims,
        ));
    }
}

/// Reads width and height from the encoded image header without decoding pixels.
#[cfg(feature = "image-probe")]
pub(super) fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(not(feature = "image-probe"))]
pub(super) fn probe_dimensions(_bytes: &[u8]) -> Option<(u32, u32)> {
    None
}

#[cfg(all(test, feature = "image-probe"))]
mod tests {
    use super::*;

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn probes_png_header() {
        assert_eq!(probe_dimensions(&encode_png(300, 120)), Some((300, 120)));
        assert_eq!(probe_dimensions(b"definitely not an image"), None);
    }
}
