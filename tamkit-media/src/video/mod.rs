use crate::Image;

pub mod decoder;
pub mod encoder;

pub use encoder::VideoWriter;

pub(crate) const DEFAULT_FPS: f32 = 30.0;

/// A fully decoded frame sequence.
#[derive(Debug, Clone)]
pub struct VideoFrames {
    pub(crate) frames: Vec<Image>,
    pub(crate) fps: f32,
}

impl VideoFrames {
    pub fn new(frames: Vec<Image>, fps: f32) -> Self {
        Self { frames, fps }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// `(width, height)` of the first frame.
    pub fn get_size(&self) -> Option<(u32, u32)> {
        self.frames.first().map(Image::get_size)
    }

    pub fn frames(&self) -> &[Image] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Image> {
        self.frames
    }
}
