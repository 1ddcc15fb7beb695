use anyhow::{bail, Result};
use std::cell::Cell;
use tamkit::batch::{run_batches, BatchOptions};
use tamkit::prompts::parse_boxes;
use tamkit_inference::inference::sam::image_inference::BatchSegmentation;
use tamkit_inference::utils::graph::BoundingBox;
use tamkit_media::{Image, Mask};
use tempfile::tempdir;

/// Returns empty masks and fails any batch holding a 3 pixel wide image.
#[derive(Default)]
struct CountingModel {
    calls: Cell<usize>,
    images: Cell<usize>,
}

impl BatchSegmentation for CountingModel {
    fn segment_batch(
        &self,
        images: &[Image],
        boxes: &[Vec<BoundingBox<f32>>],
    ) -> Result<Vec<Vec<Mask>>> {
        self.calls.set(self.calls.get() + 1);
        self.images.set(self.images.get() + images.len());
        assert_eq!(images.len(), boxes.len());

        if images.iter().any(|image| image.get_size().0 == 3) {
            bail!("simulated inference failure");
        }

        Ok(images
            .iter()
            .zip(boxes)
            .map(|(image, boxes)| {
                let (width, height) = image.get_size();
                boxes.iter().map(|_| Mask::empty(width, height)).collect()
            })
            .collect())
    }
}

fn write_image(dir: &std::path::Path, name: &str, width: u32) {
    Image::from_raw((width, 4), vec![0; (width * 4 * 3) as usize])
        .unwrap()
        .save(dir.join(name))
        .unwrap();
}

#[test]
fn batches_are_ceil_of_images_over_size() {
    let images = tempdir().unwrap();
    let output = tempdir().unwrap();
    for name in ["a.png", "b.png", "c.png", "d.png", "e.png"] {
        write_image(images.path(), name, 4);
    }
    let entries = parse_boxes(
        r#"{
            "a.png": [[0, 0, 1, 1]],
            "b.png": [[0, 0, 1, 1], [2, 2, 3, 3]],
            "c.png": [[0, 0, 1, 1]],
            "d.png": [[0, 0, 1, 1]],
            "e.png": [[0, 0, 1, 1]]
        }"#,
    )
    .unwrap();
    let options = BatchOptions {
        images_dir: images.path().to_path_buf(),
        output_dir: output.path().join("masks"),
        batch_size: 2,
    };
    let model = CountingModel::default();

    let summary = run_batches(&model, &entries, &options).unwrap();

    assert_eq!(model.calls.get(), 3);
    assert_eq!(model.images.get(), 5);
    assert_eq!(summary.batches_run, 3);
    assert_eq!(summary.images_written, 5);
    assert_eq!(summary.masks_written, 6);
    assert!(options.output_dir.join("a.png").exists());
    assert!(options.output_dir.join("b_obj0.png").exists());
    assert!(options.output_dir.join("b_obj1.png").exists());
    assert!(!options.output_dir.join("b.png").exists());
}

#[test]
fn missing_images_and_failed_batches_are_skipped() {
    let images = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_image(images.path(), "ok1.png", 4);
    write_image(images.path(), "bad.png", 3);
    write_image(images.path(), "ok2.png", 4);
    let entries = parse_boxes(
        r#"{
            "ok1.png": [[0, 0, 1, 1]],
            "gone.png": [[0, 0, 1, 1]],
            "bad.png": [[0, 0, 1, 1]],
            "ok2.png": [[0, 0, 1, 1]]
        }"#,
    )
    .unwrap();
    let options = BatchOptions {
        images_dir: images.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        batch_size: 2,
    };
    let model = CountingModel::default();

    let summary = run_batches(&model, &entries, &options).unwrap();

    assert_eq!(model.calls.get(), 2);
    assert_eq!(summary.images_missing, 1);
    assert_eq!(summary.batches_failed, 1);
    assert_eq!(summary.images_written, 1);
    assert!(output.path().join("ok1.png").exists());
    assert!(!output.path().join("bad.png").exists());
    assert!(!output.path().join("ok2.png").exists());
}

#[test]
fn a_batch_of_only_missing_images_makes_no_call() {
    let images = tempdir().unwrap();
    let output = tempdir().unwrap();
    let entries = parse_boxes(r#"{"x.png": [[0, 0, 1, 1]]}"#).unwrap();
    let options = BatchOptions {
        images_dir: images.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        batch_size: 8,
    };
    let model = CountingModel::default();

    let summary = run_batches(&model, &entries, &options).unwrap();

    assert_eq!(model.calls.get(), 0);
    assert_eq!(summary.batches_run, 0);
    assert_eq!(summary.images_missing, 1);
}
