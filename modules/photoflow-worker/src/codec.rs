//! `PictureCodec` implementation over the `image` crate.

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::ImageFormat;
use std::io::Cursor;

use photoflow_core::deps::PictureCodec;

/// Decode any supported input format, scale to exactly the requested
/// dimensions (no aspect preservation — downstream consumers expect a
/// precise size), re-encode as JPEG.
pub struct JpegCodec;

impl PictureCodec for JpegCodec {
    fn resize_to_jpeg(&self, bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        let img = image::load_from_memory(bytes).map_err(|e| anyhow!("decode: {e}"))?;
        let resized = img.resize_exact(width, height, FilterType::Triangle);

        let mut out = Cursor::new(Vec::new());
        resized
            .write_to(&mut out, ImageFormat::Jpeg)
            .map_err(|e| anyhow!("encode: {e}"))?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 40, 200]),
        ));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn resizes_to_exact_dimensions() {
        let bytes = png_fixture(8, 8);
        let jpeg = JpegCodec.resize_to_jpeg(&bytes, 3, 5).unwrap();

        let out = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(out.width(), 3);
        assert_eq!(out.height(), 5);
        assert_eq!(
            image::guess_format(&jpeg).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = JpegCodec.resize_to_jpeg(b"not an image", 2, 2);
        assert!(err.is_err());
    }
}
