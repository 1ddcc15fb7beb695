use crate::{Image, RGB};
use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use std::path::Path;

pub const WHITE: RGB = RGB(255, 255, 255);

/// TrueType font used for captions and labels.
pub struct Font {
    inner: FontVec,
}

impl Font {
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("Cannot read font file {}", path.display()))?;
        let inner = FontVec::try_from_vec(data)
            .map_err(|_| anyhow!("Unable to parse font data in {}", path.display()))?;

        Ok(Self { inner })
    }
}

pub fn draw_text(image: &mut Image, font: &Font, position: (i32, i32), size: f32, color: RGB, text: &str) {
    draw_text_mut(
        image.as_rgb_mut(),
        color.into(),
        position.0,
        position.1,
        PxScale::from(size),
        &font.inner,
        text,
    );
}

/// Rectangle outline from corner `(x_min, y_min)` to `(x_max, y_max)`, grown inward-out by `thickness`.
pub fn draw_rectangle(image: &mut Image, corners: (i32, i32, i32, i32), color: RGB, thickness: u32) {
    let (x_min, y_min, x_max, y_max) = corners;
    let width = (x_max - x_min).max(0) as u32 + 1;
    let height = (y_max - y_min).max(0) as u32 + 1;

    for i in 0..thickness {
        let rect = Rect::at(x_min - i as i32, y_min - i as i32).of_size(width + 2 * i, height + 2 * i);
        draw_hollow_rect_mut(image.as_rgb_mut(), rect, color.into());
    }
}

/// Filled dot with a white ring, the marker used for click prompts.
pub fn draw_point_marker(image: &mut Image, center: (i32, i32), color: RGB) {
    draw_filled_circle_mut(image.as_rgb_mut(), center, 5, color.into());
    draw_hollow_circle_mut(image.as_rgb_mut(), center, 7, WHITE.into());
    draw_hollow_circle_mut(image.as_rgb_mut(), center, 6, WHITE.into());
}

/// `count` colours with evenly spaced hues at full saturation and value.
pub fn palette(count: usize) -> Vec<RGB> {
    (0..count)
        .map(|i| hsv_to_rgb(360.0 * i as f32 / count as f32, 1.0, 1.0))
        .collect()
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> RGB {
    let chroma = value * saturation;
    let sector = (hue / 60.0) % 6.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let channel = |c: f32| ((c + m) * 255.0).round() as u8;

    RGB(channel(r), channel(g), channel(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_starts_at_red_and_spreads_hues() {
        let colors = palette(3);
        assert_eq!(colors, vec![RGB(255, 0, 0), RGB(0, 255, 0), RGB(0, 0, 255)]);
        assert!(palette(0).is_empty());
    }

    #[test]
    fn rectangle_outline_is_drawn() {
        let mut image = Image::from_raw((10, 10), vec![0; 300]).unwrap();
        draw_rectangle(&mut image, (2, 2, 6, 6), RGB(0, 255, 0), 1);

        assert_eq!(image.as_rgb().get_pixel(2, 2).0, [0, 255, 0]);
        assert_eq!(image.as_rgb().get_pixel(6, 4).0, [0, 255, 0]);
        assert_eq!(image.as_rgb().get_pixel(4, 4).0, [0, 0, 0]);
    }

    #[test]
    fn point_marker_fills_center() {
        let mut image = Image::from_raw((20, 20), vec![0; 1200]).unwrap();
        draw_point_marker(&mut image, (10, 10), RGB(255, 0, 0));

        assert_eq!(image.as_rgb().get_pixel(10, 10).0, [255, 0, 0]);
        assert_eq!(image.as_rgb().get_pixel(17, 10).0, [255, 255, 255]);
    }
}
