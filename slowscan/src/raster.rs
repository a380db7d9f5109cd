use image::RgbaImage;

use crate::modes::ModeDescriptor;

/// Owned RGBA output raster. Exclusively mutated by the active decode
/// session and handed to the caller by value at completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RasterImage {
    /// Opaque black raster sized for the given mode.
    pub fn for_mode(mode: &ModeDescriptor) -> Self {
        Self::new(mode.width, mode.height())
    }

    pub fn new(width: usize, height: usize) -> Self {
        let mut data = vec![0; width * height * 4];
        for alpha in data.iter_mut().skip(3).step_by(4) {
            *alpha = 0xff;
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw pixel data, `width * height * 4` bytes in RGBA order.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    pub fn write_row(&mut self, row: usize, pixels: &[[u8; 4]]) {
        assert!(row < self.height);
        assert_eq!(pixels.len(), self.width);

        let start = row * self.width * 4;
        for (x, pixel) in pixels.iter().enumerate() {
            self.data[start + x * 4..start + x * 4 + 4].copy_from_slice(pixel);
        }
    }

    pub fn into_rgba_image(self) -> RgbaImage {
        RgbaImage::from_raw(
            self.width.try_into().unwrap(),
            self.height.try_into().unwrap(),
            self.data,
        )
        .expect("raster data length matches dimensions")
    }
}
