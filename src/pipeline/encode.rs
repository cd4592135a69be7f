//! Image encoding: `RgbaImage` → PNG bytes ready to persist.
//!
//! Both rendered artifacts (keyword clouds and the figures chart) are PNG.
//! Encoding happens in memory so the artifact store can write the bytes
//! atomically.

use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img.clone()).write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn encode_small_image() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).expect("valid png").to_rgba8();
        assert_eq!(decoded.dimensions(), (10, 10));
        assert_eq!(*decoded.get_pixel(3, 3), Rgba([255, 0, 0, 255]));
    }
}
