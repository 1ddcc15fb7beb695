use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use tamkit_inference::inference::sam::image_inference::SamImageInference;
use tamkit_inference::inference::sam::MaskPrediction;
use tamkit_inference::utils::graph::{BoundingBox, LabeledPoint, Point, SamPrompt};
use tamkit_inference::utils::masks::ApplyMask;
use tamkit_media::draw::{draw_point_marker, draw_text, Font, WHITE};
use tamkit_media::{Image, Mask, RGB};

#[cfg(feature = "gui")]
pub mod window;

pub const GREEN: RGB = RGB(0, 255, 0);
pub const RED: RGB = RGB(255, 0, 0);
pub const MASK_ALPHA: f32 = 0.3;
pub const CONTROLS: &str = "Left: Positive | Right: Negative | R: Reset | S: Save | Q: Quit";

/// Click-driven refinement of one object on one image.
///
/// The image is encoded once; every click re-sends the whole click history
/// together with the previous low resolution mask.
pub struct InteractiveSegmenter<M: SamImageInference> {
    model: M,
    image: Image,
    embedding: M::Embedding,
    initial_box: BoundingBox<f32>,
    positive_points: Vec<Point<f32>>,
    negative_points: Vec<Point<f32>>,
    initial: MaskPrediction,
    current: MaskPrediction,
    font: Option<Font>,
}

impl<M: SamImageInference> InteractiveSegmenter<M> {
    pub fn new(model: M, image: Image, initial_box: BoundingBox<f32>, font: Option<Font>) -> Result<Self> {
        let embedding = model.encode_image(&image)?;
        let initial = model.inference_frame(&SamPrompt::Box(initial_box), None, &embedding)?;
        info!("Initial segmentation from box {:?}, iou {:.3}", initial_box, initial.iou);

        Ok(Self {
            model,
            image,
            embedding,
            initial_box,
            positive_points: Vec::new(),
            negative_points: Vec::new(),
            current: initial.clone(),
            initial,
            font,
        })
    }

    /// Re-runs the decoder with every click so far plus this one; a failed
    /// prediction leaves the click history unchanged.
    pub fn add_point(&mut self, x: f32, y: f32, is_positive: bool) -> Result<()> {
        let point = Point::new(x, y);
        let (mut positives, mut negatives) = (self.positive_points.clone(), self.negative_points.clone());
        if is_positive {
            positives.push(point);
        } else {
            negatives.push(point);
        }

        let points = positives
            .iter()
            .map(|p| LabeledPoint::include(p.x, p.y))
            .chain(negatives.iter().map(|p| LabeledPoint::exclude(p.x, p.y)))
            .collect::<Vec<_>>();

        self.current = self.model.inference_frame(
            &SamPrompt::Points(points),
            Some(self.current.low_res_logits.view()),
            &self.embedding,
        )?;
        self.positive_points = positives;
        self.negative_points = negatives;
        Ok(())
    }

    /// Drops every click and goes back to the box-derived mask.
    pub fn reset(&mut self) {
        self.positive_points.clear();
        self.negative_points.clear();
        self.current = self.initial.clone();
        info!("Reset to initial segmentation");
    }

    pub fn positive_points(&self) -> &[Point<f32>] {
        &self.positive_points
    }

    pub fn negative_points(&self) -> &[Point<f32>] {
        &self.negative_points
    }

    pub fn initial_box(&self) -> BoundingBox<f32> {
        self.initial_box
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn mask(&self) -> Mask {
        self.current.to_mask()
    }

    pub fn visualization(&self) -> Result<Image> {
        let mask = self.mask();
        let mut vis = self.image.clone();
        vis.overlay_mask(&mask, GREEN, MASK_ALPHA)?;
        vis.outline_mask(&mask, GREEN)?;

        for point in &self.positive_points {
            draw_point_marker(&mut vis, (point.x as i32, point.y as i32), GREEN);
        }
        for point in &self.negative_points {
            draw_point_marker(&mut vis, (point.x as i32, point.y as i32), RED);
        }

        if let Some(font) = &self.font {
            draw_text(&mut vis, font, (10, 12), 20.0, WHITE, CONTROLS);
        }

        Ok(vis)
    }

    pub fn save_mask(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.mask()
            .save(path)
            .with_context(|| format!("Cannot save mask to {}", path.display()))?;
        info!("Mask saved to: {}", path.display());
        Ok(())
    }
}
