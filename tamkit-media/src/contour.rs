use crate::draw::draw_rectangle;
use crate::{Image, Mask, RGB};
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// Outer borders of every connected region in the mask.
pub fn outer_contours(mask: &Mask) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(&mask.to_gray_image())
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .map(|contour| contour.points)
        .collect()
}

/// `(x_min, y_min, x_max, y_max)` of the region whose outer contour encloses the largest area.
pub fn largest_region_box(mask: &Mask) -> Option<(i32, i32, i32, i32)> {
    let contour = outer_contours(mask)
        .into_iter()
        .max_by(|a, b| polygon_area(a).total_cmp(&polygon_area(b)))?;

    contour.iter().fold(None, |acc, p| {
        Some(match acc {
            None => (p.x, p.y, p.x, p.y),
            Some((x0, y0, x1, y1)) => (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        })
    })
}

/// Paints the outer contours two pixels thick.
pub fn draw_mask_outline(image: &mut Image, mask: &Mask, color: RGB) {
    let (width, height) = image.get_size();
    let canvas = image.as_rgb_mut();
    for contour in outer_contours(mask) {
        for point in contour {
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let (x, y) = (point.x + dx, point.y + dy);
                if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                    canvas.put_pixel(x as u32, y as u32, color.into());
                }
            }
        }
    }
}

/// Box around the largest region of `mask`; `None` when the mask is empty.
pub fn draw_region_box(image: &mut Image, mask: &Mask, color: RGB) -> Option<(i32, i32, i32, i32)> {
    let corners = largest_region_box(mask)?;
    draw_rectangle(image, corners, color, 2);
    Some(corners)
}

fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| (a.x as f64) * (b.y as f64) - (b.x as f64) * (a.y as f64))
        .sum::<f64>();

    twice.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitvec::prelude::*;

    fn mask_with_rects(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> Mask {
        let mut bits = bitvec![0; (width * height) as usize];
        for &(x0, y0, x1, y1) in rects {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    bits.set((y * width + x) as usize, true);
                }
            }
        }
        Mask::new(width, height, bits).unwrap()
    }

    #[test]
    fn largest_region_wins() {
        let mask = mask_with_rects(32, 32, &[(1, 1, 3, 3), (10, 12, 20, 25)]);
        assert_eq!(largest_region_box(&mask), Some((10, 12, 20, 25)));
        assert_eq!(outer_contours(&mask).len(), 2);
    }

    #[test]
    fn empty_mask_has_no_region() {
        assert_eq!(largest_region_box(&Mask::empty(8, 8)), None);
    }

    #[test]
    fn outline_stays_on_the_border() {
        let mask = mask_with_rects(16, 16, &[(4, 4, 10, 10)]);
        let mut image = Image::from_raw((16, 16), vec![0; 16 * 16 * 3]).unwrap();
        draw_mask_outline(&mut image, &mask, RGB(0, 255, 0));

        assert_eq!(image.as_rgb().get_pixel(4, 4).0, [0, 255, 0]);
        assert_eq!(image.as_rgb().get_pixel(7, 7).0, [0, 0, 0]);
        assert_eq!(image.as_rgb().get_pixel(1, 1).0, [0, 0, 0]);
    }
}
