use anyhow::Result;
use ndarray::prelude::*;
use std::cell::Cell;
use tamkit_inference::inference::sam::image_inference::{segment_boxes, SamImageInference};
use tamkit_inference::inference::sam::MaskPrediction;
use tamkit_inference::utils::graph::{BoundingBox, SamPrompt};
use tamkit_media::Image;

/// Fills the prompted box with positive logits.
#[derive(Default)]
struct BoxFiller {
    encodes: Cell<usize>,
    decodes: Cell<usize>,
}

impl SamImageInference for BoxFiller {
    type Embedding = (u32, u32);

    fn encode_image(&self, image: &Image) -> Result<(u32, u32)> {
        self.encodes.set(self.encodes.get() + 1);
        Ok(image.get_size())
    }

    fn inference_frame(
        &self,
        prompt: &SamPrompt<f32>,
        mask_hint: Option<ArrayView2<f32>>,
        size: &(u32, u32),
    ) -> Result<MaskPrediction> {
        assert!(mask_hint.is_none());
        self.decodes.set(self.decodes.get() + 1);
        let boxes = prompt.bounding_box().unwrap();
        let logits = Array2::from_shape_fn((size.1 as usize, size.0 as usize), |(y, x)| {
            let inside = x as f32 >= boxes.x_min
                && x as f32 <= boxes.x_max
                && y as f32 >= boxes.y_min
                && y as f32 <= boxes.y_max;
            if inside {
                1.0
            } else {
                -1.0
            }
        });

        Ok(MaskPrediction {
            low_res_logits: logits.clone(),
            logits,
            iou: 1.0,
        })
    }
}

fn blank(width: u32, height: u32) -> Image {
    Image::from_raw((width, height), vec![0; (width * height * 3) as usize]).unwrap()
}

#[test]
fn one_encode_per_image_one_decode_per_box() {
    let model = BoxFiller::default();
    let images = vec![blank(8, 8), blank(6, 4)];
    let boxes = vec![
        vec![
            BoundingBox::new(0., 0., 1., 1.),
            BoundingBox::new(4., 4., 7., 7.),
        ],
        vec![BoundingBox::new(1., 1., 2., 2.)],
    ];

    let masks = segment_boxes(&model, &images, &boxes).unwrap();

    assert_eq!(model.encodes.get(), 2);
    assert_eq!(model.decodes.get(), 3);
    assert_eq!(masks[0].len(), 2);
    assert_eq!(masks[0][1].count_ones(), 16);
    assert_eq!(masks[1][0].get_size(), (6, 4));
    assert!(masks[1][0].get(2, 2));
    assert!(!masks[1][0].get(3, 3));
}

#[test]
fn mismatched_box_lists_are_rejected() {
    let model = BoxFiller::default();
    let result = segment_boxes(&model, &[blank(2, 2)], &[]);

    assert!(result.is_err());
    assert_eq!(model.encodes.get(), 0);
}
