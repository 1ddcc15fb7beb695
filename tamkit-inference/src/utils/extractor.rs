use anyhow::Result;
use ndarray::Array4;
use rayon::prelude::*;
use tamkit_media::image::size::ResizeImage;
use tamkit_media::Image;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub trait ExtraToTensor {
    /// Stretches to `size` and lays the pixels out as normalized `[1, 3, h, w]`.
    fn extra_standard_image_to_tensor(&self, size: (u32, u32)) -> Result<Array4<f32>>;
}

impl ExtraToTensor for Image {
    fn extra_standard_image_to_tensor(&self, size: (u32, u32)) -> Result<Array4<f32>> {
        let resized = self.resize_into(size);
        let raw = resized.raw_data();
        let plane = (size.0 * size.1) as usize;

        let mut tensor = vec![0f32; plane * 3];
        tensor
            .par_chunks_mut(plane)
            .enumerate()
            .for_each(|(channel, values)| {
                let (mean, std) = (IMAGENET_MEAN[channel], IMAGENET_STD[channel]);
                values.iter_mut().enumerate().for_each(|(index, value)| {
                    *value = (raw[index * 3 + channel] as f32 / 255. - mean) / std;
                });
            });

        Ok(Array4::from_shape_vec(
            (1, 3, size.1 as usize, size.0 as usize),
            tensor,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_planar_and_normalized() {
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&[255, 0, 128]);
        }
        let image = Image::from_raw((2, 2), data).unwrap();
        let tensor = image.extra_standard_image_to_tensor((2, 2)).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
        let red = (1.0 - 0.485) / 0.229;
        let green = (0.0 - 0.456) / 0.224;
        assert!((tensor[[0, 0, 1, 1]] - red).abs() < 1e-5);
        assert!((tensor[[0, 1, 0, 1]] - green).abs() < 1e-5);
    }

    #[test]
    fn image_is_stretched_to_target() {
        let image = Image::from_raw((4, 2), vec![10; 4 * 2 * 3]).unwrap();
        let tensor = image.extra_standard_image_to_tensor((8, 8)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
    }
}
