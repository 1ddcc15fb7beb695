use crate::progress::progress_bar;
use crate::prompts::VideoPrompts;
use anyhow::{Context, Result};
use log::info;
use ndarray::Array2;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tamkit_inference::inference::sam::video_inference::{SamVideoInference, VideoTrackingSession};
use tamkit_inference::utils::masks::ApplyMask;
use tamkit_media::draw::{draw_text, palette, Font, WHITE};
use tamkit_media::npy::save_mask_npy;
use tamkit_media::{Image, Mask, VideoFrames, VideoWriter, RGB};

pub const OVERLAY_ALPHA: f32 = 0.5;
pub const TRACKED_VIDEO: &str = "tracked_video.mp4";

pub struct TrackOptions {
    pub output_dir: PathBuf,
    pub visualize: bool,
    pub font: Option<Font>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackSummary {
    pub obj_ids: Vec<u32>,
    pub start_frame: Option<usize>,
    pub frames_tracked: usize,
    pub masks_written: usize,
}

/// Evenly spaced hues over the registered objects, keyed by object id.
pub fn object_colors(obj_ids: &[u32]) -> HashMap<u32, RGB> {
    obj_ids
        .iter()
        .copied()
        .zip(palette(obj_ids.len()))
        .collect()
}

pub fn mask_npy_path(masks_dir: &Path, frame_idx: usize, obj_id: u32) -> PathBuf {
    masks_dir.join(format!("frame_{:05}_obj_{}.npy", frame_idx, obj_id))
}

/// Colour overlay, labelled box per object and a frame caption.
pub fn visualize_frame(
    frame: &Image,
    masks: &[(u32, Array2<f32>)],
    colors: &HashMap<u32, RGB>,
    frame_idx: usize,
    font: Option<&Font>,
) -> Result<Image> {
    let mut vis = frame.clone();
    for (obj_id, logits) in masks {
        let color = colors.get(obj_id).copied().unwrap_or(RGB(255, 0, 0));
        let mask = Mask::from_logits(logits);
        vis.layering_mask(&mask, color, OVERLAY_ALPHA)?;
        vis.label_mask(&mask, color, &format!("ID:{}", obj_id), font)?;
    }

    if let Some(font) = font {
        draw_text(&mut vis, font, (10, 10), 28.0, WHITE, &format!("Frame: {}", frame_idx));
    }

    Ok(vis)
}

/// Registers the prompts, propagates through the video and writes masks (and overlays).
pub fn track_video<M: SamVideoInference>(
    model: &M,
    video: &VideoFrames,
    prompts: &VideoPrompts,
    options: &TrackOptions,
) -> Result<TrackSummary> {
    let masks_dir = options.output_dir.join("masks");
    std::fs::create_dir_all(&masks_dir)
        .with_context(|| format!("Cannot create {}", masks_dir.display()))?;

    let mut session = VideoTrackingSession::new(model, video.frames())?;
    info!("Adding initial objects...");
    for prompt in &prompts.objects {
        session.add_inputs(prompt.frame, prompt.obj_id, prompt.prompt.clone())?;
    }
    if !prompts.refinements.is_empty() {
        info!("Adding refinements...");
        for prompt in &prompts.refinements {
            session.add_inputs(prompt.frame, prompt.obj_id, prompt.prompt.clone())?;
        }
    }

    let mut summary = TrackSummary {
        obj_ids: session.obj_ids(),
        start_frame: session.start_frame(),
        ..Default::default()
    };
    let colors = object_colors(&summary.obj_ids);

    let mut writer = if options.visualize {
        Some(VideoWriter::create(
            options.output_dir.join(TRACKED_VIDEO),
            session.video_size(),
            video.fps(),
        )?)
    } else {
        None
    };

    info!("Tracking objects through video...");
    let mut propagation = session.propagate();
    let progress = progress_bar(propagation.remaining(), "Tracking")?;
    for output in &mut propagation {
        let output = output?;
        progress.inc(1);

        for (obj_id, logits) in &output.masks {
            save_mask_npy(mask_npy_path(&masks_dir, output.frame_idx, *obj_id), logits)?;
            summary.masks_written += 1;
        }

        if let Some(writer) = writer.as_mut() {
            let vis = visualize_frame(
                &video.frames()[output.frame_idx],
                &output.masks,
                &colors,
                output.frame_idx,
                options.font.as_ref(),
            )?;
            writer.write(&vis)?;
            vis.save(
                options
                    .output_dir
                    .join(format!("frame_{:05}.jpg", output.frame_idx)),
            )?;
        }
        summary.frames_tracked += 1;
    }
    progress.finish_and_clear();

    if let Some(writer) = writer {
        writer.finish()?;
        info!(
            "Visualization video: {}",
            options.output_dir.join(TRACKED_VIDEO).display()
        );
    }
    info!("Masks saved to: {}", masks_dir.display());

    Ok(summary)
}
