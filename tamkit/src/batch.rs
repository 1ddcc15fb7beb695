use crate::progress::progress_bar;
use crate::prompts::ImageBoxes;
use anyhow::{ensure, Context, Result};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use tamkit_inference::inference::sam::image_inference::BatchSegmentation;
use tamkit_media::{Image, Mask};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub images_dir: PathBuf,
    pub output_dir: PathBuf,
    pub batch_size: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub batches_run: usize,
    pub batches_failed: usize,
    pub images_written: usize,
    pub images_missing: usize,
    pub masks_written: usize,
}

/// Output paths for the masks of one image: `<stem>.png`, or `<stem>_obj<i>.png` for several objects.
pub fn mask_paths(output_dir: &Path, image_name: &str, objects: usize) -> Vec<PathBuf> {
    let stem = Path::new(image_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| image_name.to_string());

    match objects {
        1 => vec![output_dir.join(format!("{}.png", stem))],
        n => (0..n)
            .map(|i| output_dir.join(format!("{}_obj{}.png", stem, i)))
            .collect(),
    }
}

/// Segments every listed image, `batch_size` images per model call.
///
/// A batch that fails is logged and skipped; the rest carry on.
pub fn run_batches<S: BatchSegmentation>(
    model: &S,
    entries: &[ImageBoxes],
    options: &BatchOptions,
) -> Result<BatchSummary> {
    ensure!(options.batch_size >= 1, "Batch size must be at least 1");
    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!("Cannot create output directory {}", options.output_dir.display())
    })?;

    info!(
        "Processing {} images in batches of {}",
        entries.len(),
        options.batch_size
    );
    let mut summary = BatchSummary::default();
    let batches = entries.chunks(options.batch_size);
    let progress = progress_bar(batches.len(), "Processing batches")?;

    for batch in batches {
        progress.inc(1);

        let mut images = Vec::with_capacity(batch.len());
        let mut listed = Vec::with_capacity(batch.len());
        for entry in batch {
            let path = options.images_dir.join(&entry.name);
            if !path.exists() {
                warn!("Image not found: {}", path.display());
                summary.images_missing += 1;
                continue;
            }
            match Image::open_file(&path) {
                Ok(image) => {
                    images.push(image);
                    listed.push(entry);
                }
                Err(e) => {
                    warn!("Skipping unreadable image {}: {:#}", path.display(), e);
                    summary.images_missing += 1;
                }
            }
        }

        if images.is_empty() {
            continue;
        }

        summary.batches_run += 1;
        let boxes = listed.iter().map(|e| e.boxes.clone()).collect::<Vec<_>>();
        let saved = model
            .segment_batch(&images, &boxes)
            .and_then(|masks| save_batch(&options.output_dir, &listed, &masks));

        match saved {
            Ok((images_written, masks_written)) => {
                summary.images_written += images_written;
                summary.masks_written += masks_written;
            }
            Err(e) => {
                error!("Error processing batch starting at {}: {:#}", batch[0].name, e);
                summary.batches_failed += 1;
            }
        }
    }
    progress.finish_and_clear();

    info!("Done! Masks saved to: {}", options.output_dir.display());
    Ok(summary)
}

fn save_batch(output_dir: &Path, listed: &[&ImageBoxes], masks: &[Vec<Mask>]) -> Result<(usize, usize)> {
    ensure!(
        masks.len() == listed.len(),
        "Model returned masks for {} of {} images",
        masks.len(),
        listed.len()
    );

    let mut masks_written = 0;
    for (entry, masks) in listed.iter().zip(masks) {
        for (path, mask) in mask_paths(output_dir, &entry.name, masks.len()).iter().zip(masks) {
            mask.save(path)?;
            masks_written += 1;
        }
    }

    Ok((listed.len(), masks_written))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_object_keeps_the_stem() {
        let paths = mask_paths(Path::new("out"), "cat.jpeg", 1);
        assert_eq!(paths, vec![PathBuf::from("out/cat.png")]);
    }

    #[test]
    fn several_objects_are_numbered() {
        let paths = mask_paths(Path::new("out"), "dir.v2/dog.jpg", 3);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("out/dog_obj0.png"),
                PathBuf::from("out/dog_obj1.png"),
                PathBuf::from("out/dog_obj2.png"),
            ]
        );
        assert!(mask_paths(Path::new("out"), "x.png", 0).is_empty());
    }
}
