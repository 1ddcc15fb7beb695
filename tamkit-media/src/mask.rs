use anyhow::{ensure, Context, Result};
use bitvec::prelude::*;
use ndarray::Array2;
use std::path::Path;

/// Binary object mask, row-major, one bit per source pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: BitVec,
}

impl Mask {
    pub fn new(width: u32, height: u32, bits: BitVec) -> Result<Self> {
        ensure!(
            bits.len() == (width as usize) * (height as usize),
            "Mask of {} bits does not cover {}x{} pixels",
            bits.len(),
            width,
            height
        );

        Ok(Self {
            width,
            height,
            bits,
        })
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: bitvec![0; (width as usize) * (height as usize)],
        }
    }

    /// Binarizes logits shaped `(height, width)`: a pixel is set when its logit is positive.
    pub fn from_logits(logits: &Array2<f32>) -> Self {
        let (height, width) = logits.dim();
        let mut bits = BitVec::with_capacity(logits.len());
        logits.iter().for_each(|x| {
            bits.push(*x > 0f32);
        });

        Self {
            width: width as u32,
            height: height as u32,
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bits(&self) -> &BitVec {
        &self.bits
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width
            && y < self.height
            && self.bits[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    /// Tight `(x_min, y_min, x_max, y_max)` around the set pixels.
    pub fn bounding_box(&self) -> Option<(u32, u32, u32, u32)> {
        let width = self.width as usize;
        self.bits.iter_ones().fold(None, |acc, index| {
            let (x, y) = ((index % width) as u32, (index / width) as u32);
            Some(match acc {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            })
        })
    }

    /// 8-bit grayscale rendering, 255 where the object is.
    pub fn to_gray_image(&self) -> ::image::GrayImage {
        let data = self
            .bits
            .iter()
            .map(|bit| if *bit { 255u8 } else { 0u8 })
            .collect::<Vec<_>>();

        ::image::GrayImage::from_vec(self.width, self.height, data)
            .unwrap_or_else(|| ::image::GrayImage::new(self.width, self.height))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.to_gray_image()
            .save(path)
            .with_context(|| format!("Failed to save mask {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn logits_are_thresholded_at_zero() {
        let mask = Mask::from_logits(&array![[-1.0, 0.0, 0.5], [2.0, -0.1, 0.0]]);

        assert_eq!(mask.get_size(), (3, 2));
        assert!(!mask.get(0, 0));
        assert!(!mask.get(1, 0));
        assert!(mask.get(2, 0));
        assert!(mask.get(0, 1));
        assert_eq!(mask.count_ones(), 2);
    }

    #[test]
    fn bounding_box_spans_set_pixels() {
        let mut bits = bitvec![0; 5 * 4];
        bits.set(6, true);
        bits.set(3 * 5 + 3, true);
        let mask = Mask::new(5, 4, bits).unwrap();

        assert_eq!(mask.bounding_box(), Some((1, 1, 3, 3)));
        assert_eq!(Mask::empty(5, 4).bounding_box(), None);
    }

    #[test]
    fn new_rejects_wrong_length() {
        assert!(Mask::new(3, 3, bitvec![0; 8]).is_err());
    }

    #[test]
    fn gray_image_uses_full_scale() {
        let mask = Mask::from_logits(&array![[1.0, -1.0]]);
        let gray = mask.to_gray_image();

        assert_eq!(gray.get_pixel(0, 0).0, [255]);
        assert_eq!(gray.get_pixel(1, 0).0, [0]);
    }
}
