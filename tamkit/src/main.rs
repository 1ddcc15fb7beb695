#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tamkit::batch::{run_batches, BatchOptions};
use tamkit::cli::{Args, Commands};
use tamkit::logging::log_init;
use tamkit::prompts::{load_boxes_file, load_video_prompts, BoxArg};
use tamkit::tracker::{track_video, TrackOptions};
use tamkit::validate::run_validate;
use tamkit_inference::engine::ExecutionProvider;
use tamkit_inference::inference::sam::image_inference::SAMImageInferenceSession;
use tamkit_inference::inference::sam::video_inference::video_inference::SAMVideoInferenceSession;
use tamkit_media::draw::Font;
use tamkit_media::VideoFrames;

fn main() -> ExitCode {
    let args = Args::parse();
    log_init(args.verbose);

    match run(args.command) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Batch {
            images_dir,
            boxes_file,
            output_dir,
            model,
            batch_size,
            device,
        } => {
            let entries = load_boxes_file(&boxes_file)?;
            let model = SAMImageInferenceSession::new(&model, device)?;
            let options = BatchOptions {
                images_dir,
                output_dir,
                batch_size,
            };

            let summary = run_batches(&model, &entries, &options)?;
            info!(
                "Done: {} masks for {} images written to {} ({} batches, {} failed, {} images missing)",
                summary.masks_written,
                summary.images_written,
                options.output_dir.display(),
                summary.batches_run,
                summary.batches_failed,
                summary.images_missing
            );
        }
        Commands::Interactive {
            image,
            initial_box,
            output,
            model,
            device,
            font,
        } => run_interactive(&image, initial_box, output, &model, device, font.as_deref())?,
        Commands::Track {
            video,
            prompts,
            output_dir,
            model,
            visualize,
            device,
            font,
        } => {
            let frames = VideoFrames::open(&video)?;
            info!("Loaded {} frames at {:.2} fps", frames.len(), frames.fps());
            let prompts = load_video_prompts(&prompts)?;
            let model = SAMVideoInferenceSession::new(&model, device)?;
            let options = TrackOptions {
                output_dir,
                visualize,
                font: load_font(font.as_deref())?,
            };

            let summary = track_video(&model, &frames, &prompts, &options)?;
            info!(
                "Tracked objects {:?} over {} frames, {} masks written to {}",
                summary.obj_ids,
                summary.frames_tracked,
                summary.masks_written,
                options.output_dir.display()
            );
        }
        Commands::Validate {
            model_path,
            test,
            json,
        } => return run_validate(&model_path, test, json),
    }

    Ok(ExitCode::SUCCESS)
}

fn load_font(path: Option<&Path>) -> Result<Option<Font>> {
    path.map(Font::open_file).transpose()
}

#[cfg(feature = "gui")]
fn run_interactive(
    image: &Path,
    initial_box: BoxArg,
    output: PathBuf,
    model: &Path,
    device: ExecutionProvider,
    font: Option<&Path>,
) -> Result<()> {
    use tamkit::interactive::window::run_window;
    use tamkit::interactive::InteractiveSegmenter;
    use tamkit_media::Image;

    let image = Image::open_file(image)?;
    let model = SAMImageInferenceSession::new(model, device)?;
    let segmenter =
        InteractiveSegmenter::new(model, image, initial_box.to_f32(), load_font(font)?)?;
    run_window(segmenter, output)
}

#[cfg(not(feature = "gui"))]
fn run_interactive(
    _image: &Path,
    _initial_box: BoxArg,
    _output: PathBuf,
    _model: &Path,
    _device: ExecutionProvider,
    _font: Option<&Path>,
) -> Result<()> {
    anyhow::bail!("tamkit was built without the `gui` feature; interactive mode is unavailable")
}
