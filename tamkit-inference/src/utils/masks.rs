use anyhow::{ensure, Result};
use rayon::prelude::*;
use tamkit_media::contour::{draw_mask_outline, draw_region_box};
use tamkit_media::draw::{draw_text, Font};
use tamkit_media::{Image, Mask, RGB};

pub trait ApplyMask {
    /// Blends `apply_color` over the masked pixels: `pixel * (1 - alpha) + color * alpha`.
    fn layering_mask(&mut self, mask: &Mask, apply_color: RGB, alpha: f32) -> Result<()>;

    /// Blends the whole frame with a layer that is `apply_color` on the mask and black elsewhere,
    /// so unmasked pixels are dimmed to `1 - alpha`.
    fn overlay_mask(&mut self, mask: &Mask, apply_color: RGB, alpha: f32) -> Result<()>;

    fn outline_mask(&mut self, mask: &Mask, color: RGB) -> Result<()>;

    /// Box around the largest region, captioned with `label` above its top-left corner.
    fn label_mask(&mut self, mask: &Mask, color: RGB, label: &str, font: Option<&Font>) -> Result<()>;
}

fn check_size(image: &Image, mask: &Mask) -> Result<()> {
    ensure!(
        image.get_size() == mask.get_size(),
        "Mask {:?} does not match image {:?}",
        mask.get_size(),
        image.get_size()
    );
    Ok(())
}

impl ApplyMask for Image {
    fn layering_mask(&mut self, mask: &Mask, apply_color: RGB, alpha: f32) -> Result<()> {
        check_size(self, mask)?;
        let bits = mask.bits();
        let color = [apply_color.0, apply_color.1, apply_color.2];

        let buffer: &mut [u8] = self.as_rgb_mut();
        buffer
            .par_chunks_mut(3)
            .enumerate()
            .filter(|(index, _)| bits[*index])
            .for_each(|(_, pixel)| {
                pixel.iter_mut().zip(color).for_each(|(value, color)| {
                    let blended = *value as f32 * (1.0 - alpha) + color as f32 * alpha;
                    *value = blended.round().clamp(0.0, 255.0) as u8;
                });
            });

        Ok(())
    }

    fn overlay_mask(&mut self, mask: &Mask, apply_color: RGB, alpha: f32) -> Result<()> {
        check_size(self, mask)?;
        let bits = mask.bits();
        let color = [apply_color.0, apply_color.1, apply_color.2];

        let buffer: &mut [u8] = self.as_rgb_mut();
        buffer
            .par_chunks_mut(3)
            .enumerate()
            .for_each(|(index, pixel)| {
                let layer = if bits[index] { color } else { [0; 3] };
                pixel.iter_mut().zip(layer).for_each(|(value, layer)| {
                    let blended = *value as f32 * (1.0 - alpha) + layer as f32 * alpha;
                    *value = blended.round().clamp(0.0, 255.0) as u8;
                });
            });

        Ok(())
    }

    fn outline_mask(&mut self, mask: &Mask, color: RGB) -> Result<()> {
        check_size(self, mask)?;
        draw_mask_outline(self, mask, color);
        Ok(())
    }

    fn label_mask(&mut self, mask: &Mask, color: RGB, label: &str, font: Option<&Font>) -> Result<()> {
        check_size(self, mask)?;
        let Some((x_min, y_min, _, _)) = draw_region_box(self, mask, color) else {
            return Ok(());
        };
        if let Some(font) = font {
            draw_text(self, font, (x_min, (y_min - 22).max(0)), 20.0, color, label);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitvec::prelude::*;

    #[test]
    fn only_masked_pixels_are_blended() {
        let mut image = Image::from_raw((2, 1), vec![100, 100, 100, 100, 100, 100]).unwrap();
        let mask = Mask::new(2, 1, bitvec![1, 0]).unwrap();

        image.layering_mask(&mask, RGB(0, 200, 0), 0.5).unwrap();

        assert_eq!(image.raw_data(), &[50, 150, 50, 100, 100, 100]);
    }

    #[test]
    fn overlay_dims_the_background() {
        let mut image = Image::from_raw((2, 1), vec![100, 100, 100, 100, 100, 100]).unwrap();
        let mask = Mask::new(2, 1, bitvec![1, 0]).unwrap();

        image.overlay_mask(&mask, RGB(0, 200, 0), 0.3).unwrap();

        assert_eq!(image.raw_data(), &[70, 130, 70, 70, 70, 70]);
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let mut image = Image::from_raw((2, 2), vec![0; 12]).unwrap();
        let mask = Mask::empty(3, 3);
        assert!(image.layering_mask(&mask, RGB(0, 0, 0), 0.3).is_err());
    }

    #[test]
    fn empty_mask_draws_no_label() {
        let mut image = Image::from_raw((4, 4), vec![7; 48]).unwrap();
        image
            .label_mask(&Mask::empty(4, 4), RGB(255, 0, 0), "ID:1", None)
            .unwrap();
        assert!(image.raw_data().iter().all(|v| *v == 7));
    }
}
