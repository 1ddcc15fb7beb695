use crate::engine::inference_engine::{ExecutionProvider, OnnxSession};
use crate::inference::sam::video_inference::inference_state::{
    attention_mask, MemoryEntry, SamInferenceState,
};
use crate::inference::sam::video_inference::SamVideoInference;
use crate::inference::sam::{prompt_tensors, SAM_INPUT_SIZE, SAM_LOW_RES_SIZE};
use crate::utils::extractor::ExtraToTensor;
use crate::utils::graph::SamPrompt;
use crate::utils::tensor::{argmax, get_1d_sine_pe, linear_interpolate, output_array, sigmoid};
use anyhow::{anyhow, bail, ensure, Result};
use log::{debug, info};
use ndarray::prelude::*;
use ort::inputs;
use ort::value::{DynValue, Tensor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use tamkit_media::Image;

const HIDDEN_DIM: usize = 256;
const MEMORY_DIM: usize = 64;
const OBJ_PTR_TOKENS: usize = 4;

/// Image encoder outputs for one frame, shared by every object on it.
pub struct SamEncoderOutput {
    pub(super) vision_features: Array4<f32>,
    pub(super) backbone_fpn_0: Array4<f32>,
    pub(super) backbone_fpn_1: Array4<f32>,
    pub(super) vision_pos_enc_2: Array4<f32>,
}

pub struct SAMVideoInferenceSession {
    pub(super) image_encoder: Mutex<OnnxSession>,
    pub(super) mask_decoder: Mutex<OnnxSession>,
    pub(super) prompt_encoder: Mutex<OnnxSession>,

    pub(super) mlp: Mutex<OnnxSession>,
    pub(super) memory_encoder: Mutex<OnnxSession>,
    pub(super) memory_attention: Mutex<OnnxSession>,
    pub(super) obj_ptr_tpos_proj: Mutex<OnnxSession>,
}

impl SAMVideoInferenceSession {
    pub fn new(folder_path: impl AsRef<Path>, executor: ExecutionProvider) -> Result<Self> {
        let open = |name: &str| -> Result<Mutex<OnnxSession>> {
            let session = OnnxSession::new(folder_path.as_ref().join(name), executor)?;
            Ok(Mutex::new(session))
        };

        let session = Self {
            image_encoder: open("image_encoder.onnx")?,
            mask_decoder: open("mask_decoder.onnx")?,
            prompt_encoder: open("prompt_encoder.onnx")?,
            mlp: open("mlp.onnx")?,
            memory_encoder: open("memory_encoder.onnx")?,
            memory_attention: open("memory_attention.onnx")?,
            obj_ptr_tpos_proj: open("obj_ptr_tpos_proj.onnx")?,
        };
        info!("SAM Video Inference Session created");

        Ok(session)
    }
}

fn run_session(
    session: &Mutex<OnnxSession>,
    inputs: Vec<(&'static str, DynValue)>,
) -> Result<HashMap<String, DynValue>> {
    let mut session = session.lock();
    let outputs = session
        .run(inputs)?
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect::<HashMap<String, DynValue>>();

    Ok(outputs)
}

/// Runs a single-input model, feeding the tensor by position.
fn run_single(session: &Mutex<OnnxSession>, input: DynValue) -> Result<HashMap<String, DynValue>> {
    let mut session = session.lock();
    let outputs = session
        .run(inputs![input])?
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect::<HashMap<String, DynValue>>();

    Ok(outputs)
}

fn tensor<D: Dimension + 'static>(array: Array<f32, D>) -> Result<DynValue> {
    Ok(Tensor::from_array(array.as_standard_layout().into_owned())?.into_dyn())
}

/// `(1, C, 64, 64)` feature map to `(4096, 1, C)` tokens.
fn flatten_tokens(feature: ArrayView4<f32>) -> Result<Array3<f32>> {
    let channels = feature.shape()[1];
    let tokens = feature.shape()[2] * feature.shape()[3];
    let flat = feature
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((1, channels, tokens))?;

    Ok(flat.permuted_axes([2, 0, 1]).as_standard_layout().into_owned())
}

impl SamVideoInference for SAMVideoInferenceSession {
    type EncodedFrame = SamEncoderOutput;
    type ObjectState = SamInferenceState;

    fn encode_frame(&self, image: &Image) -> Result<SamEncoderOutput> {
        let tensor_in = image.extra_standard_image_to_tensor((SAM_INPUT_SIZE, SAM_INPUT_SIZE))?;
        let outputs = run_session(
            &self.image_encoder,
            vec![("input_image", tensor(tensor_in)?)],
        )?;
        let feature = |name: &str| -> Result<Array4<f32>> {
            Ok(output_array(&outputs, name)?.into_dimensionality::<Ix4>()?)
        };

        Ok(SamEncoderOutput {
            vision_features: feature("vision_features")?,
            backbone_fpn_0: feature("backbone_fpn_0")?,
            backbone_fpn_1: feature("backbone_fpn_1")?,
            vision_pos_enc_2: feature("vision_pos_enc_2")?,
        })
    }

    fn track_object(
        &self,
        encoded: &SamEncoderOutput,
        frame_idx: usize,
        prompt: Option<&SamPrompt<f32>>,
        state: &mut Option<SamInferenceState>,
        video_size: (u32, u32),
    ) -> Result<Array2<f32>> {
        if prompt.is_none() && state.as_ref().map_or(true, |s| s.is_empty()) {
            bail!("Frame {} has neither a prompt nor a memory to track from", frame_idx);
        }

        let image_embeddings = match state.as_ref().filter(|s| !s.is_empty()) {
            Some(state) => self.attend_memory(encoded, state, frame_idx)?,
            None => encoded.vision_features.clone(),
        };

        let decoder_output = self.inference_image_decoder(encoded, image_embeddings, prompt, video_size)?;
        let pred_masks = output_array(&decoder_output, "masks")?.into_dimensionality::<Ix4>()?;
        let iou_predictions = output_array(&decoder_output, "iou_pred")?;
        let max_index = argmax(iou_predictions.view())
            .ok_or_else(|| anyhow!("Decoder returned no mask candidates"))?;
        ensure!(
            max_index < pred_masks.shape()[1],
            "Decoder returned {} masks for {} scores",
            pred_masks.shape()[1],
            iou_predictions.len()
        );
        let pred_mask = pred_masks.slice(s![0, max_index, .., ..]);
        debug!("Frame {}: picked mask {} of {}", frame_idx, max_index, pred_masks.shape()[1]);

        let entry = self.encode_memory(
            encoded,
            &decoder_output,
            pred_mask,
            max_index,
            pred_masks.shape()[1],
            frame_idx,
        )?;
        state
            .get_or_insert_with(SamInferenceState::default)
            .push(entry, prompt.is_some());

        Ok(linear_interpolate(
            pred_mask,
            (video_size.1 as usize, video_size.0 as usize),
        ))
    }
}

impl SAMVideoInferenceSession {
    /// Conditions the current frame features on the object's memory bank.
    fn attend_memory(
        &self,
        encoded: &SamEncoderOutput,
        state: &SamInferenceState,
        frame_idx: usize,
    ) -> Result<Array4<f32>> {
        let curr = flatten_tokens(encoded.vision_features.view())?;
        let curr_pos = flatten_tokens(encoded.vision_pos_enc_2.view())?;
        let memory = state.memory_inputs(frame_idx)?;
        let memory_pos_2 = self.obj_ptr_positions(memory.ptr_distances.view())?;

        let attention_mask_1 = attention_mask(memory.memory_1.shape()[0]);
        let attention_mask_2 = attention_mask(memory.memory_2.shape()[0]);

        let attention_results = run_session(
            &self.memory_attention,
            vec![
                ("curr", tensor(curr)?),
                ("memory_1", tensor(memory.memory_1)?),
                ("memory_2", tensor(memory.memory_2)?),
                ("curr_pos", tensor(curr_pos)?),
                ("memory_pos_1", tensor(memory.memory_pos_1)?),
                ("memory_pos_2", tensor(memory_pos_2)?),
                ("attention_mask_1", Tensor::from_array(attention_mask_1)?.into_dyn()),
                ("attention_mask_2", Tensor::from_array(attention_mask_2)?.into_dyn()),
            ],
        )?;

        let (height, width) = (
            encoded.vision_features.shape()[2],
            encoded.vision_features.shape()[3],
        );
        let pix_feat = output_array(&attention_results, "pix_feat")?;
        let pix_feat = pix_feat.into_shape_with_order((height * width, 1, HIDDEN_DIM))?;
        let pix_feat = pix_feat.permuted_axes([1, 2, 0]);
        let pix_feat = pix_feat.as_standard_layout().into_owned();

        Ok(pix_feat.into_shape_with_order((1, HIDDEN_DIM, height, width))?)
    }

    /// Temporal encodings of the object pointers, one `(4, 1, 64)` block per memory entry.
    fn obj_ptr_positions(&self, distances: ArrayView1<f32>) -> Result<Array3<f32>> {
        let obj_pos = get_1d_sine_pe(distances, HIDDEN_DIM, 10000.0)?;
        let projected = run_single(&self.obj_ptr_tpos_proj, tensor(obj_pos)?)?;
        let projected = output_array(&projected, "x_out")?;
        let projected = projected.into_shape_with_order((distances.len(), MEMORY_DIM))?;

        let mut positions = Array3::<f32>::zeros((distances.len() * OBJ_PTR_TOKENS, 1, MEMORY_DIM));
        for (entry, row) in projected.outer_iter().enumerate() {
            for token in 0..OBJ_PTR_TOKENS {
                positions
                    .slice_mut(s![entry * OBJ_PTR_TOKENS + token, 0, ..])
                    .assign(&row);
            }
        }

        Ok(positions)
    }

    /// Encodes the predicted mask and the object pointer into a memory entry.
    fn encode_memory(
        &self,
        encoded: &SamEncoderOutput,
        decoder_output: &HashMap<String, DynValue>,
        pred_mask: ArrayView2<f32>,
        max_index: usize,
        mask_count: usize,
        frame_idx: usize,
    ) -> Result<MemoryEntry> {
        let high_res = linear_interpolate(pred_mask, (SAM_INPUT_SIZE as usize, SAM_INPUT_SIZE as usize));
        let masks = sigmoid(high_res).insert_axis(Axis(0)).insert_axis(Axis(0));

        let mem_encode_result = run_session(
            &self.memory_encoder,
            vec![
                ("pix_feat", tensor(encoded.vision_features.clone())?),
                ("masks", tensor(masks)?),
            ],
        )?;
        let vision_features =
            output_array(&mem_encode_result, "vision_features")?.into_dimensionality::<Ix4>()?;
        let vision_pos_enc =
            output_array(&mem_encode_result, "vision_pos_enc")?.into_dimensionality::<Ix4>()?;

        let sam_tokens = output_array(decoder_output, "sam_tokens_out")?;
        let token_count = sam_tokens.len() / HIDDEN_DIM;
        ensure!(token_count > 0, "Decoder returned no output tokens");
        let sam_tokens = sam_tokens.into_shape_with_order((token_count, HIDDEN_DIM))?;
        // The first token belongs to the single-mask output when all tokens are returned.
        let token = if token_count == mask_count + 1 {
            max_index + 1
        } else {
            max_index.min(token_count - 1)
        };
        let sam_out = sam_tokens.slice(s![token..token + 1, ..]).to_owned();

        let obj_ptr = run_single(&self.mlp, tensor(sam_out)?)?;
        let obj_ptr = output_array(&obj_ptr, "x_out")?;
        let obj_ptr = obj_ptr.into_shape_with_order((1, OBJ_PTR_TOKENS, MEMORY_DIM))?;
        let obj_ptr = obj_ptr.permuted_axes([1, 0, 2]).as_standard_layout().into_owned();

        Ok(MemoryEntry {
            frame_idx,
            memory: flatten_tokens(vision_features.view())?,
            memory_pos: flatten_tokens(vision_pos_enc.view())?,
            obj_ptr,
        })
    }

    fn inference_image_decoder(
        &self,
        encoded: &SamEncoderOutput,
        image_embeddings: Array4<f32>,
        prompt: Option<&SamPrompt<f32>>,
        video_size: (u32, u32),
    ) -> Result<HashMap<String, DynValue>> {
        let (coords, labels) = match prompt {
            Some(prompt) => prompt_tensors(prompt, video_size)?,
            None => (Array3::<f32>::zeros((1, 1, 2)), array![[-1_f32]]),
        };
        let labels = labels.mapv(|label| label as i32);
        let mask_input = Array3::<f32>::zeros((1, SAM_LOW_RES_SIZE, SAM_LOW_RES_SIZE));

        let prompt_result = run_session(
            &self.prompt_encoder,
            vec![
                ("coords", tensor(coords)?),
                ("labels", Tensor::from_array(labels)?.into_dyn()),
                ("masks", tensor(mask_input)?),
                ("masks_enable", Tensor::from_array(array![0_i32])?.into_dyn()),
            ],
        )?;

        let mut decoder = self.mask_decoder.lock();
        let result = decoder.run(inputs![
            "image_embeddings" => Tensor::from_array(image_embeddings)?,
            "high_res_features1" => Tensor::from_array(encoded.backbone_fpn_0.clone())?,
            "high_res_features2" => Tensor::from_array(encoded.backbone_fpn_1.clone())?,

            "image_pe" => Tensor::from_array(output_array(&prompt_result, "dense_pe")?)?,
            "sparse_prompt_embeddings" => Tensor::from_array(output_array(&prompt_result, "sparse_embeddings")?)?,
            "dense_prompt_embeddings" => Tensor::from_array(output_array(&prompt_result, "dense_embeddings")?)?,
        ])?;

        let result = result
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<HashMap<String, DynValue>>();

        Ok(result)
    }
}
