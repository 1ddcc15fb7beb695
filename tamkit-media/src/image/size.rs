use crate::Image;
use ::image::imageops::{self, FilterType};

pub trait ResizeImage {
    fn resize_to(&mut self, size: (u32, u32));
    fn resize_into(&self, size: (u32, u32)) -> Self
    where
        Self: Sized;
}

impl ResizeImage for Image {
    fn resize_to(&mut self, size: (u32, u32)) {
        if self.get_size() != size {
            self.inner = imageops::resize(&self.inner, size.0, size.1, FilterType::Triangle);
        }
    }

    fn resize_into(&self, size: (u32, u32)) -> Self {
        let mut new = self.clone();
        new.resize_to(size);
        new
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_into_leaves_source_untouched() {
        let image = Image::from_raw((8, 4), vec![128; 8 * 4 * 3]).unwrap();
        let resized = image.resize_into((16, 16));

        assert_eq!(image.get_size(), (8, 4));
        assert_eq!(resized.get_size(), (16, 16));
        assert_eq!(resized.as_rgb().get_pixel(5, 5).0, [128, 128, 128]);
    }
}
