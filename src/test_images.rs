//! Synthesized in-memory test images
//!
//! Small deterministic raster images used by unit tests across the crate, so
//! no binary fixtures need to live in the repository.

use img_hash::image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};

/// Encode an RGB buffer into the given container format
fn encode(img: ImageBuffer<Rgb<u8>, Vec<u8>>, format: ImageOutputFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut bytes, format)
        .expect("failed to encode test image");
    bytes
}

/// A horizontal brightness ramp; every gradient-hash bit ends up set
pub fn png_ramp() -> Vec<u8> {
    let img = ImageBuffer::from_fn(64, 64, |x, _y| {
        let v = (x * 4) as u8;
        Rgb([v, v, v])
    });
    encode(img, ImageOutputFormat::Png)
}

/// A flat single-intensity image; no gradient-hash bit is set
pub fn png_solid(value: u8) -> Vec<u8> {
    let img = ImageBuffer::from_fn(64, 64, |_x, _y| Rgb([value, value, value]));
    encode(img, ImageOutputFormat::Png)
}

/// A diagonal interference pattern, visually unrelated to ramp and solid
pub fn png_pattern(seed: u8) -> Vec<u8> {
    let img = ImageBuffer::from_fn(64, 64, |x, y| {
        let v = ((x ^ y) as u8).wrapping_mul(seed | 1);
        Rgb([v, v.wrapping_add(seed), v.wrapping_mul(3)])
    });
    encode(img, ImageOutputFormat::Png)
}

/// Solid pixels in a PNG container
pub fn solid_pixels_as_png(width: u32, height: u32, value: u8) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |_x, _y| Rgb([value, value, value]));
    encode(img, ImageOutputFormat::Png)
}

/// The same solid pixels in a BMP container
pub fn solid_pixels_as_bmp(width: u32, height: u32, value: u8) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |_x, _y| Rgb([value, value, value]));
    encode(img, ImageOutputFormat::Bmp)
}
