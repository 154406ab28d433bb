use crate::pixel::{PixelData, PixelFormat};
use image::DynamicImage;
use std::path::Path;

/// Decodes the image at `path` synchronously.
///
/// A missing or undecodable file yields [`PixelData::empty`]; callers upload
/// whatever comes back.
pub fn load_image(path: &Path) -> PixelData {
    match image::open(path) {
        Ok(image) => from_image(image),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to load image");
            PixelData::empty()
        }
    }
}

pub fn from_image(image: DynamicImage) -> PixelData {
    let (width, height) = (image.width(), image.height());
    match image {
        DynamicImage::ImageLuma8(buffer) => {
            PixelData::new(width, height, PixelFormat::L8, buffer.into_raw())
        }
        DynamicImage::ImageLumaA8(buffer) => {
            PixelData::new(width, height, PixelFormat::La88, buffer.into_raw())
        }
        image if image.color().has_alpha() => {
            PixelData::new(width, height, PixelFormat::Rgba8888, image.to_rgba8().into_raw())
        }
        image => PixelData::new(width, height, PixelFormat::Rgb888, image.to_rgb8().into_raw()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn missing_file_yields_empty_pixels() {
        let pixels = load_image(Path::new("definitely/not/here.png"));
        assert!(pixels.is_empty());
    }

    #[test]
    fn keeps_alpha_channel_when_present() {
        let image = RgbaImage::from_pixel(2, 1, Rgba([1, 2, 3, 4]));
        let pixels = from_image(DynamicImage::ImageRgba8(image));
        assert_eq!(pixels.format, PixelFormat::Rgba8888);
        assert_eq!(pixels.data, vec![1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn opaque_images_decode_to_rgb() {
        let image = RgbImage::from_pixel(1, 1, Rgb([9, 8, 7]));
        let pixels = from_image(DynamicImage::ImageRgb8(image));
        assert_eq!(pixels.format, PixelFormat::Rgb888);
        assert_eq!(pixels.data, vec![9, 8, 7]);
    }
}
