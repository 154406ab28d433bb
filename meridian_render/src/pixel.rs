#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PixelFormat {
    L8,
    La88,
    Rgb888,
    Rgba8888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::L8 => 1,
            PixelFormat::La88 => 2,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Rgba8888 => 4,
        }
    }
}

/// Decoded pixels waiting to be uploaded to a texture.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelData {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl PixelData {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * format.bytes_per_pixel()
        );
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// What a failed decode produces.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            format: PixelFormat::Rgba8888,
            data: Vec::new(),
        }
    }

    pub fn single_rgba(pixel: [u8; 4]) -> Self {
        Self::new(1, 1, PixelFormat::Rgba8888, pixel.to_vec())
    }

    pub fn single_rgb(pixel: [u8; 3]) -> Self {
        Self::new(1, 1, PixelFormat::Rgb888, pixel.to_vec())
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn row_pitch(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Copies out the `width` x `height` block at (`x`, `y`).
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let bpp = self.format.bytes_per_pixel();
        let mut data = Vec::with_capacity(width as usize * height as usize * bpp);
        for row in y..y + height {
            let start = row as usize * self.row_pitch() + x as usize * bpp;
            data.extend_from_slice(&self.data[start..start + width as usize * bpp]);
        }
        Self::new(width, height, self.format, data)
    }
}
