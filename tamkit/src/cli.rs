//! Command line arguments backing the `tamkit` binary.
use crate::prompts::BoxArg;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tamkit_inference::engine::inference_engine::ExecutionProvider;

pub const DEFAULT_IMAGE_MODEL: &str = "./models/edgetam";
pub const DEFAULT_VIDEO_MODEL: &str = "./models/edgetam-video";

#[derive(Parser, Debug)]
#[command(
    name = "tamkit",
    about = "Segment, refine and track objects with EdgeTAM, and check models before deployment",
    version
)]
pub struct Args {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Segment a directory of images from per-image bounding boxes
    Batch {
        /// Directory containing the input images
        #[arg(long)]
        images_dir: PathBuf,

        /// JSON file mapping image names to [x_min, y_min, x_max, y_max] boxes
        #[arg(long)]
        boxes_file: PathBuf,

        /// Directory for the output masks
        #[arg(long)]
        output_dir: PathBuf,

        /// Directory holding image_encoder.onnx and image_decoder.onnx
        #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
        model: PathBuf,

        /// Images per inference call
        #[arg(long, default_value_t = 8, value_parser = parse_batch_size)]
        batch_size: usize,

        /// auto, cpu, cuda[:N] or tensorrt[:N]
        #[arg(long, default_value = "auto")]
        device: ExecutionProvider,
    },
    /// Refine a box-prompted mask with positive and negative clicks
    Interactive {
        /// Path to the input image
        #[arg(long)]
        image: PathBuf,

        /// Initial bounding box as x_min,y_min,x_max,y_max
        #[arg(long)]
        initial_box: BoxArg,

        /// Where `s` saves the current mask
        #[arg(long, default_value = "mask.png")]
        output: PathBuf,

        #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
        model: PathBuf,

        #[arg(long, default_value = "auto")]
        device: ExecutionProvider,

        /// TrueType font for the on-screen instructions
        #[arg(long)]
        font: Option<PathBuf>,
    },
    /// Track prompted objects through a video or a directory of frames
    Track {
        /// Video file, or a directory of frame images
        #[arg(long)]
        video: PathBuf,

        /// JSON file with object prompts and refinements
        #[arg(long)]
        prompts: PathBuf,

        /// Directory for masks and visualizations
        #[arg(long)]
        output_dir: PathBuf,

        /// Directory holding the seven video model graphs
        #[arg(long, default_value = DEFAULT_VIDEO_MODEL)]
        model: PathBuf,

        /// Write tracked_video.mp4 and annotated frames
        #[arg(long)]
        visualize: bool,

        #[arg(long, default_value = "auto")]
        device: ExecutionProvider,

        /// TrueType font for object labels and frame captions
        #[arg(long)]
        font: Option<PathBuf>,
    },
    /// Check an ONNX model for edge deployment
    Validate {
        /// Path to the .onnx model file
        model_path: PathBuf,

        /// Run one inference on random inputs
        #[arg(long)]
        test: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_batch_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}
