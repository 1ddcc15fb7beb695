//! Prompt files and prompt arguments.
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tamkit_inference::utils::graph::{BoundingBox, LabeledPoint, Point, PointLabel, SamPrompt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("cannot read prompt file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid prompt JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("boxes for '{image}' must be a list of [x_min, y_min, x_max, y_max]")]
    BadBoxes { image: String },
    #[error("object {id} on frame {frame} has neither a box nor points")]
    EmptyObject { id: u32, frame: usize },
    #[error("object {id} on frame {frame} has {points} points but {labels} labels")]
    LabelMismatch {
        id: u32,
        frame: usize,
        points: usize,
        labels: usize,
    },
    #[error("object {id} on frame {frame} has label {label}, expected 1 or 0")]
    BadLabel { id: u32, frame: usize, label: i64 },
    #[error("invalid box '{0}', expected x_min,y_min,x_max,y_max")]
    BadBoxArgument(String),
}

fn read_file(path: &Path) -> Result<String, PromptError> {
    std::fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Boxes of one image from a boxes file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBoxes {
    pub name: String,
    pub boxes: Vec<BoundingBox<f32>>,
}

/// Parses `{ "<image>": [[x0, y0, x1, y1], ...] }`, keeping file order.
pub fn parse_boxes(json: &str) -> Result<Vec<ImageBoxes>, PromptError> {
    let map: Map<String, Value> = serde_json::from_str(json)?;

    map.into_iter()
        .map(|(name, value)| {
            let boxes: Vec<[f32; 4]> = serde_json::from_value(value)
                .map_err(|_| PromptError::BadBoxes { image: name.clone() })?;
            Ok(ImageBoxes {
                name,
                boxes: boxes
                    .into_iter()
                    .map(|[x0, y0, x1, y1]| BoundingBox::new(x0, y0, x1, y1))
                    .collect(),
            })
        })
        .collect()
}

pub fn load_boxes_file(path: impl AsRef<Path>) -> Result<Vec<ImageBoxes>, PromptError> {
    parse_boxes(&read_file(path.as_ref())?)
}

#[derive(Deserialize)]
struct RawVideoPrompts {
    objects: Vec<RawObject>,
    #[serde(default)]
    refinements: Vec<RawRefinement>,
}

#[derive(Deserialize)]
struct RawObject {
    id: u32,
    frame: usize,
    #[serde(rename = "box")]
    boxes: Option<[f32; 4]>,
    points: Option<Vec<[f32; 2]>>,
    labels: Option<Vec<i64>>,
}

#[derive(Deserialize)]
struct RawRefinement {
    object_id: u32,
    frame: usize,
    points: Vec<[f32; 2]>,
    labels: Vec<i64>,
}

/// One prompt for one object on one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePrompt {
    pub obj_id: u32,
    pub frame: usize,
    pub prompt: SamPrompt<f32>,
}

/// Initial object prompts followed by refinements, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoPrompts {
    pub objects: Vec<FramePrompt>,
    pub refinements: Vec<FramePrompt>,
}

impl VideoPrompts {
    /// Distinct object ids in registration order.
    pub fn object_ids(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        for prompt in self.objects.iter().chain(&self.refinements) {
            if !ids.contains(&prompt.obj_id) {
                ids.push(prompt.obj_id);
            }
        }
        ids
    }

    pub fn all(&self) -> impl Iterator<Item = &FramePrompt> {
        self.objects.iter().chain(&self.refinements)
    }
}

fn labeled_points(
    id: u32,
    frame: usize,
    points: Vec<[f32; 2]>,
    labels: Vec<i64>,
) -> Result<Vec<LabeledPoint<f32>>, PromptError> {
    if points.len() != labels.len() {
        return Err(PromptError::LabelMismatch {
            id,
            frame,
            points: points.len(),
            labels: labels.len(),
        });
    }

    points
        .into_iter()
        .zip(labels)
        .map(|([x, y], label)| {
            let label =
                PointLabel::from_flag(label).ok_or(PromptError::BadLabel { id, frame, label })?;
            Ok(LabeledPoint {
                point: Point::new(x, y),
                label,
            })
        })
        .collect()
}

/// Parses a video prompts file. An object's box wins over its points.
pub fn parse_video_prompts(json: &str) -> Result<VideoPrompts, PromptError> {
    let raw: RawVideoPrompts = serde_json::from_str(json)?;

    let objects = raw
        .objects
        .into_iter()
        .map(|object| {
            let prompt = match (object.boxes, object.points) {
                (Some([x0, y0, x1, y1]), _) => SamPrompt::Box(BoundingBox::new(x0, y0, x1, y1)),
                (None, Some(points)) => SamPrompt::Points(labeled_points(
                    object.id,
                    object.frame,
                    points,
                    object.labels.unwrap_or_default(),
                )?),
                (None, None) => {
                    return Err(PromptError::EmptyObject {
                        id: object.id,
                        frame: object.frame,
                    })
                }
            };
            Ok(FramePrompt {
                obj_id: object.id,
                frame: object.frame,
                prompt,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let refinements = raw
        .refinements
        .into_iter()
        .map(|refine| {
            Ok(FramePrompt {
                obj_id: refine.object_id,
                frame: refine.frame,
                prompt: SamPrompt::Points(labeled_points(
                    refine.object_id,
                    refine.frame,
                    refine.points,
                    refine.labels,
                )?),
            })
        })
        .collect::<Result<Vec<_>, PromptError>>()?;

    Ok(VideoPrompts {
        objects,
        refinements,
    })
}

pub fn load_video_prompts(path: impl AsRef<Path>) -> Result<VideoPrompts, PromptError> {
    parse_video_prompts(&read_file(path.as_ref())?)
}

/// `x_min,y_min,x_max,y_max` as integers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoxArg(pub BoundingBox<i64>);

impl FromStr for BoxArg {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || PromptError::BadBoxArgument(s.to_string());
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<i64>().map_err(|_| bad()))
            .collect::<Result<Vec<_>, _>>()?;

        match values[..] {
            [x0, y0, x1, y1] => Ok(BoxArg(BoundingBox::new(x0, y0, x1, y1))),
            _ => Err(bad()),
        }
    }
}

impl BoxArg {
    pub fn to_f32(self) -> BoundingBox<f32> {
        let b = self.0;
        BoundingBox::new(b.x_min as f32, b.y_min as f32, b.x_max as f32, b.y_max as f32)
    }
}
