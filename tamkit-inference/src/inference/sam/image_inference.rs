use crate::engine::inference_engine::{ExecutionProvider, OnnxSession};
use crate::inference::sam::{prompt_tensors, MaskPrediction, SAM_INPUT_SIZE, SAM_LOW_RES_SIZE};
use crate::utils::extractor::ExtraToTensor;
use crate::utils::graph::{BoundingBox, SamPrompt};
use crate::utils::tensor::{argmax, linear_interpolate, output_array};
use anyhow::{anyhow, ensure, Result};
use log::{debug, info};
use ndarray::prelude::*;
use ort::inputs;
use ort::value::{DynValue, Tensor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use tamkit_media::{Image, Mask};

/// Encoder output for one image, kept for every prompt on that image.
pub struct SamEncoderOutput {
    pub(super) image_embeddings: Array4<f32>,
    pub(super) high_res_features1: Array4<f32>,
    pub(super) high_res_features2: Array4<f32>,
    pub(super) origin_size: (u32, u32),
}

impl SamEncoderOutput {
    /// `(width, height)` of the image that was encoded.
    pub fn origin_size(&self) -> (u32, u32) {
        self.origin_size
    }
}

pub trait SamImageInference {
    type Embedding;

    fn encode_image(&self, image: &Image) -> Result<Self::Embedding>;

    /// Decodes one object. `mask_hint` is a previous `(256, 256)` low resolution logit mask.
    fn inference_frame(
        &self,
        prompt: &SamPrompt<f32>,
        mask_hint: Option<ArrayView2<f32>>,
        embedding: &Self::Embedding,
    ) -> Result<MaskPrediction>;
}

/// Box-prompted segmentation of a whole batch in one call.
pub trait BatchSegmentation {
    /// `boxes[i]` are the objects of `images[i]`; the result holds one mask per box.
    fn segment_batch(
        &self,
        images: &[Image],
        boxes: &[Vec<BoundingBox<f32>>],
    ) -> Result<Vec<Vec<Mask>>>;
}

pub struct SAMImageInferenceSession {
    pub(super) image_encoder: Mutex<OnnxSession>,
    pub(super) image_decoder: Mutex<OnnxSession>,
}

impl SAMImageInferenceSession {
    pub fn new(folder_path: impl AsRef<Path>, executor: ExecutionProvider) -> Result<Self> {
        let image_encoder =
            OnnxSession::new(folder_path.as_ref().join("image_encoder.onnx"), executor)?;
        let image_decoder =
            OnnxSession::new(folder_path.as_ref().join("image_decoder.onnx"), executor)?;
        info!("SAM Image Inference Session created");

        Ok(Self {
            image_encoder: Mutex::new(image_encoder),
            image_decoder: Mutex::new(image_decoder),
        })
    }
}

impl SamImageInference for SAMImageInferenceSession {
    type Embedding = SamEncoderOutput;

    fn encode_image(&self, image: &Image) -> Result<SamEncoderOutput> {
        let origin_size = image.get_size();
        let tensor = image.extra_standard_image_to_tensor((SAM_INPUT_SIZE, SAM_INPUT_SIZE))?;

        let encoder_output = {
            let mut image_encoder = self.image_encoder.lock();
            let outputs = image_encoder
                .run(inputs!["input_image" => Tensor::from_array(tensor)?])?
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<HashMap<String, DynValue>>();
            outputs
        };
        let feature = |name: &str| -> Result<Array4<f32>> {
            Ok(output_array(&encoder_output, name)?.into_dimensionality::<Ix4>()?)
        };

        Ok(SamEncoderOutput {
            image_embeddings: feature("image_embeddings")?,
            high_res_features1: feature("high_res_features1")?,
            high_res_features2: feature("high_res_features2")?,
            origin_size,
        })
    }

    fn inference_frame(
        &self,
        prompt: &SamPrompt<f32>,
        mask_hint: Option<ArrayView2<f32>>,
        encoded_result: &SamEncoderOutput,
    ) -> Result<MaskPrediction> {
        let decoder_output = self.inference_image_decoder(encoded_result, prompt, mask_hint)?;

        let pred_masks = output_array(&decoder_output, "masks")?.into_dimensionality::<Ix4>()?;
        let iou_predictions = output_array(&decoder_output, "iou_predictions")?;
        let max_index = argmax(iou_predictions.view())
            .ok_or_else(|| anyhow!("Decoder returned no mask candidates"))?;
        ensure!(
            max_index < pred_masks.shape()[1],
            "Decoder returned {} masks for {} scores",
            pred_masks.shape()[1],
            iou_predictions.len()
        );
        let iou = iou_predictions.iter().nth(max_index).copied().unwrap_or_default();

        let (width, height) = encoded_result.origin_size;
        let pred_mask = pred_masks.slice(s![0, max_index, .., ..]);
        let logits = if pred_mask.dim() != (height as usize, width as usize) {
            debug!(
                "Resizing mask from {:?} to {}x{}",
                pred_mask.dim(),
                width,
                height
            );
            linear_interpolate(pred_mask, (height as usize, width as usize))
        } else {
            pred_mask.to_owned()
        };

        let low_res_logits = match decoder_output.get("low_res_masks") {
            Some(value) => value
                .try_extract_array::<f32>()?
                .into_dimensionality::<Ix4>()?
                .slice(s![0, max_index, .., ..])
                .to_owned(),
            None => linear_interpolate(logits.view(), (SAM_LOW_RES_SIZE, SAM_LOW_RES_SIZE)),
        };

        Ok(MaskPrediction {
            logits,
            low_res_logits,
            iou,
        })
    }
}

impl BatchSegmentation for SAMImageInferenceSession {
    fn segment_batch(
        &self,
        images: &[Image],
        boxes: &[Vec<BoundingBox<f32>>],
    ) -> Result<Vec<Vec<Mask>>> {
        segment_boxes(self, images, boxes)
    }
}

/// One encoder pass per image, one decoder pass per box.
pub fn segment_boxes<M: SamImageInference>(
    model: &M,
    images: &[Image],
    boxes: &[Vec<BoundingBox<f32>>],
) -> Result<Vec<Vec<Mask>>> {
    ensure!(
        images.len() == boxes.len(),
        "Got {} images but {} box lists",
        images.len(),
        boxes.len()
    );

    images
        .iter()
        .zip(boxes)
        .map(|(image, boxes)| {
            let embedding = model.encode_image(image)?;
            boxes
                .iter()
                .map(|boxes| {
                    let prediction =
                        model.inference_frame(&SamPrompt::Box(*boxes), None, &embedding)?;
                    Ok(prediction.to_mask())
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect()
}

impl SAMImageInferenceSession {
    fn inference_image_decoder(
        &self,
        encoded_result: &SamEncoderOutput,
        prompt: &SamPrompt<f32>,
        mask_hint: Option<ArrayView2<f32>>,
    ) -> Result<HashMap<String, DynValue>> {
        let (point_coords, point_labels) = prompt_tensors(prompt, encoded_result.origin_size)?;

        let (mask_input, has_mask_input) = match mask_hint {
            Some(hint) => {
                let hint = if hint.dim() != (SAM_LOW_RES_SIZE, SAM_LOW_RES_SIZE) {
                    linear_interpolate(hint, (SAM_LOW_RES_SIZE, SAM_LOW_RES_SIZE))
                } else {
                    hint.to_owned()
                };
                (hint.insert_axis(Axis(0)).insert_axis(Axis(0)), 1_f32)
            }
            None => (Array4::<f32>::zeros((1, 1, SAM_LOW_RES_SIZE, SAM_LOW_RES_SIZE)), 0_f32),
        };
        let (width, height) = encoded_result.origin_size;

        let mut decoder = self.image_decoder.lock();
        let result = decoder.run(inputs![
            "image_embeddings"      => Tensor::from_array(encoded_result.image_embeddings.clone())?,
            "high_res_features1"    => Tensor::from_array(encoded_result.high_res_features1.clone())?,
            "high_res_features2"    => Tensor::from_array(encoded_result.high_res_features2.clone())?,

            "point_coords"          => Tensor::from_array(point_coords)?,
            "point_labels"          => Tensor::from_array(point_labels)?,
            "mask_input"            => Tensor::from_array(mask_input)?,
            "has_mask_input"        => Tensor::from_array(array![has_mask_input])?,

            "orig_im_size"          => Tensor::from_array(array![height as i64, width as i64])?,
        ])?;

        let result = result
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<HashMap<String, DynValue>>();

        Ok(result)
    }
}
