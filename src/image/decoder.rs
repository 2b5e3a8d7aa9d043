use crate::error::{Result, ViewerError};
use image::{DynamicImage, GenericImageView, RgbaImage};

/// デコード済みのページ画像 (RGBA8)
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
}

pub fn decode_image_from_memory(page: usize, data: &[u8]) -> Result<DecodedImage> {
    log::trace!("[Decoder] page {}: {} bytes", page, data.len());
    let img = image::load_from_memory(data).map_err(|e| ViewerError::decode(page, e))?;
    Ok(process_dynamic_image(img))
}

fn process_dynamic_image(img: DynamicImage) -> DecodedImage {
    let (width, height) = img.dimensions();
    DecodedImage {
        width,
        height,
        pixels: img.to_rgba8(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    #[test]
    fn decodes_png_bytes() {
        let img = RgbaImage::from_pixel(3, 5, Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();

        let decoded = decode_image_from_memory(0, buf.get_ref()).unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 5));
        assert_eq!(decoded.pixels.get_pixel(1, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn corrupt_bytes_are_a_decode_error() {
        let err = decode_image_from_memory(4, b"definitely not an image").unwrap_err();
        assert!(matches!(err, ViewerError::Decode { page: 4, .. }));
    }
}
