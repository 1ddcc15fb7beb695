use crate::utils::graph::SamPrompt;
use anyhow::{ensure, Result};
use ndarray::prelude::*;
use tamkit_media::Mask;

pub mod image_inference;
pub mod video_inference;

/// Side of the square the SAM encoders work in.
pub const SAM_INPUT_SIZE: u32 = 1024;
/// Side of the low resolution logits the decoders emit.
pub const SAM_LOW_RES_SIZE: usize = 256;

pub const LABEL_BOX_TOP_LEFT: f32 = 2.;
pub const LABEL_BOX_BOTTOM_RIGHT: f32 = 3.;
pub const LABEL_PADDING: f32 = -1.;

/// Decoder output for one object, best candidate already picked.
#[derive(Debug, Clone)]
pub struct MaskPrediction {
    /// `(height, width)` logits at the source image size.
    pub logits: Array2<f32>,
    /// `(256, 256)` logits, fed back as the next mask hint.
    pub low_res_logits: Array2<f32>,
    pub iou: f32,
}

impl MaskPrediction {
    pub fn to_mask(&self) -> Mask {
        Mask::from_logits(&self.logits)
    }
}

/// Encodes a prompt as `point_coords [1, N, 2]` in 1024 space and `point_labels [1, N]`.
///
/// Points come first, then the two box corners labelled 2 and 3. A prompt
/// without a box gets one `(0, 0)` padding point labelled -1.
pub fn prompt_tensors(prompt: &SamPrompt<f32>, image_size: (u32, u32)) -> Result<(Array3<f32>, Array2<f32>)> {
    ensure!(
        image_size.0 > 0 && image_size.1 > 0,
        "Cannot scale a prompt for an empty image"
    );
    let scale_x = SAM_INPUT_SIZE as f32 / image_size.0 as f32;
    let scale_y = SAM_INPUT_SIZE as f32 / image_size.1 as f32;

    let mut coords = Vec::new();
    let mut labels = Vec::new();
    for point in prompt.points() {
        coords.extend_from_slice(&[point.point.x * scale_x, point.point.y * scale_y]);
        labels.push(point.label.flag() as f32);
    }

    match prompt.bounding_box() {
        Some(boxes) => {
            coords.extend_from_slice(&[
                boxes.x_min * scale_x,
                boxes.y_min * scale_y,
                boxes.x_max * scale_x,
                boxes.y_max * scale_y,
            ]);
            labels.extend_from_slice(&[LABEL_BOX_TOP_LEFT, LABEL_BOX_BOTTOM_RIGHT]);
        }
        None => {
            coords.extend_from_slice(&[0., 0.]);
            labels.push(LABEL_PADDING);
        }
    }

    let count = labels.len();
    Ok((
        Array3::from_shape_vec((1, count, 2), coords)?,
        Array2::from_shape_vec((1, count), labels)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::{BoundingBox, LabeledPoint};

    #[test]
    fn box_prompt_becomes_two_corners() {
        let prompt = SamPrompt::Box(BoundingBox::new(10., 20., 30., 40.));
        let (coords, labels) = prompt_tensors(&prompt, (2048, 512)).unwrap();

        assert_eq!(coords, array![[[5., 40.], [15., 80.]]]);
        assert_eq!(labels, array![[2., 3.]]);
    }

    #[test]
    fn points_only_get_padding() {
        let prompt = SamPrompt::Points(vec![
            LabeledPoint::include(512., 512.),
            LabeledPoint::exclude(0., 1024.),
        ]);
        let (coords, labels) = prompt_tensors(&prompt, (1024, 1024)).unwrap();

        assert_eq!(coords.shape(), &[1, 3, 2]);
        assert_eq!(coords.slice(s![0, 2, ..]).to_vec(), vec![0., 0.]);
        assert_eq!(labels, array![[1., 0., -1.]]);
    }

    #[test]
    fn points_precede_box_corners() {
        let prompt = SamPrompt::Both(
            vec![LabeledPoint::include(100., 100.)],
            BoundingBox::new(0., 0., 200., 200.),
        );
        let (coords, labels) = prompt_tensors(&prompt, (1024, 1024)).unwrap();

        assert_eq!(coords[[0, 0, 0]], 100.);
        assert_eq!(labels, array![[1., 2., 3.]]);
    }
}
