use crate::Image;
use anyhow::{anyhow, Context, Result};
use std::path::Path;

impl Image {
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = ::image::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?;

        Ok(Image::from_rgb(image.to_rgb8()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = ::image::load_from_memory(bytes)?;
        Ok(Image::from_rgb(image.to_rgb8()))
    }

    /// Builds a frame from tightly packed `rgb24` bytes.
    pub fn from_raw(size: (u32, u32), data: Vec<u8>) -> Result<Self> {
        let (width, height) = size;
        let inner = ::image::RgbImage::from_raw(width, height, data)
            .ok_or_else(|| anyhow!("Raw buffer does not hold a {}x{} rgb24 frame", width, height))?;

        Ok(Image::from_rgb(inner))
    }
}
