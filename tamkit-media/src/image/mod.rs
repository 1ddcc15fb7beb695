use ::image::RgbImage;

pub mod decoder;
pub mod encoder;
pub mod size;

/// An 8-bit RGB frame, the pixel layout every model input and overlay works on.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub(crate) inner: RgbImage,
}

impl Image {
    pub fn from_rgb(inner: RgbImage) -> Self {
        Self { inner }
    }

    pub fn get_width(&self) -> u32 {
        self.inner.width()
    }

    pub fn get_height(&self) -> u32 {
        self.inner.height()
    }

    /// `(width, height)`
    pub fn get_size(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// Interleaved `rgb24` bytes, row-major.
    pub fn raw_data(&self) -> &[u8] {
        self.inner.as_raw()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.inner
    }

    pub fn as_rgb_mut(&mut self) -> &mut RgbImage {
        &mut self.inner
    }

    pub fn into_rgb(self) -> RgbImage {
        self.inner
    }
}

impl From<RgbImage> for Image {
    fn from(value: RgbImage) -> Self {
        Image::from_rgb(value)
    }
}
