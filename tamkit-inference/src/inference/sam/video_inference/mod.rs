use crate::utils::graph::SamPrompt;
use anyhow::{bail, ensure, Result};
use log::debug;
use ndarray::Array2;
use std::collections::BTreeMap;
use tamkit_media::Image;

pub mod inference_state;
pub mod video_inference;

pub trait SamVideoInference {
    type EncodedFrame;
    type ObjectState;

    fn encode_frame(&self, image: &Image) -> Result<Self::EncodedFrame>;

    /// Predicts one object on one frame and folds the result into its memory.
    ///
    /// `state` is `None` until the object's first prompted frame has been
    /// tracked. Returns `(height, width)` logits at `video_size`.
    fn track_object(
        &self,
        encoded: &Self::EncodedFrame,
        frame_idx: usize,
        prompt: Option<&SamPrompt<f32>>,
        state: &mut Option<Self::ObjectState>,
        video_size: (u32, u32),
    ) -> Result<Array2<f32>>;
}

pub struct TrackedObject<S> {
    obj_id: u32,
    prompts: BTreeMap<usize, SamPrompt<f32>>,
    state: Option<S>,
}

impl<S> TrackedObject<S> {
    pub fn obj_id(&self) -> u32 {
        self.obj_id
    }

    pub fn first_frame(&self) -> Option<usize> {
        self.prompts.keys().next().copied()
    }
}

/// Per-frame result of a propagation.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub frame_idx: usize,
    /// `(obj_id, logits)` for every object started by this frame, in registration order.
    pub masks: Vec<(u32, Array2<f32>)>,
}

/// Tracking state bound to one decoded frame sequence.
pub struct VideoTrackingSession<'a, M: SamVideoInference> {
    model: &'a M,
    frames: &'a [Image],
    video_size: (u32, u32),
    objects: Vec<TrackedObject<M::ObjectState>>,
}

impl<'a, M: SamVideoInference> VideoTrackingSession<'a, M> {
    pub fn new(model: &'a M, frames: &'a [Image]) -> Result<Self> {
        let Some(first) = frames.first() else {
            bail!("Cannot track objects in a video without frames");
        };

        Ok(Self {
            model,
            frames,
            video_size: first.get_size(),
            objects: Vec::new(),
        })
    }

    pub fn video_size(&self) -> (u32, u32) {
        self.video_size
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Adds a prompt for `obj_id` on `frame_idx`, merging with what is already there.
    pub fn add_inputs(&mut self, frame_idx: usize, obj_id: u32, prompt: SamPrompt<f32>) -> Result<()> {
        ensure!(
            frame_idx < self.frames.len(),
            "Prompt for object {} on frame {} but the video has {} frames",
            obj_id,
            frame_idx,
            self.frames.len()
        );

        let position = match self.objects.iter().position(|o| o.obj_id == obj_id) {
            Some(position) => position,
            None => {
                self.objects.push(TrackedObject {
                    obj_id,
                    prompts: BTreeMap::new(),
                    state: None,
                });
                self.objects.len() - 1
            }
        };

        let prompts = &mut self.objects[position].prompts;
        let merged = match prompts.remove(&frame_idx) {
            Some(existing) => existing.merge(prompt),
            None => prompt,
        };
        prompts.insert(frame_idx, merged);
        debug!("Object {} prompted on frame {}", obj_id, frame_idx);

        Ok(())
    }

    pub fn obj_ids(&self) -> Vec<u32> {
        self.objects.iter().map(|o| o.obj_id).collect()
    }

    pub fn objects(&self) -> &[TrackedObject<M::ObjectState>] {
        &self.objects
    }

    /// Earliest prompted frame across every object.
    pub fn start_frame(&self) -> Option<usize> {
        self.objects.iter().filter_map(|o| o.first_frame()).min()
    }

    /// Walks the frames from [`start_frame`](Self::start_frame) to the end.
    ///
    /// The iterator ends after the first error it yields.
    pub fn propagate(&mut self) -> Propagation<'_, 'a, M> {
        let next_frame = self.start_frame().unwrap_or(self.frames.len());
        Propagation {
            session: self,
            next_frame,
            failed: false,
        }
    }

    fn track_frame(&mut self, frame_idx: usize) -> Result<FrameOutput> {
        let encoded = self.model.encode_frame(&self.frames[frame_idx])?;
        let mut masks = Vec::with_capacity(self.objects.len());

        for object in self.objects.iter_mut() {
            match object.first_frame() {
                Some(first) if first <= frame_idx => {}
                _ => continue,
            }
            let logits = self.model.track_object(
                &encoded,
                frame_idx,
                object.prompts.get(&frame_idx),
                &mut object.state,
                self.video_size,
            )?;
            masks.push((object.obj_id, logits));
        }

        Ok(FrameOutput { frame_idx, masks })
    }
}

pub struct Propagation<'s, 'a, M: SamVideoInference> {
    session: &'s mut VideoTrackingSession<'a, M>,
    next_frame: usize,
    failed: bool,
}

impl<M: SamVideoInference> Propagation<'_, '_, M> {
    /// Frames left to yield.
    pub fn remaining(&self) -> usize {
        if self.failed {
            0
        } else {
            self.session.frames.len().saturating_sub(self.next_frame)
        }
    }
}

impl<M: SamVideoInference> Iterator for Propagation<'_, '_, M> {
    type Item = Result<FrameOutput>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_frame >= self.session.frames.len() {
            return None;
        }
        let frame_idx = self.next_frame;
        self.next_frame += 1;

        let output = self.session.track_frame(frame_idx);
        self.failed = output.is_err();
        Some(output)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::{BoundingBox, LabeledPoint};
    use std::cell::RefCell;

    /// Records every call; the mask value encodes how many frames the object has seen.
    #[derive(Default)]
    struct FakeModel {
        encoded: RefCell<Vec<usize>>,
        prompted: RefCell<Vec<(usize, usize)>>,
        fail_on: Option<usize>,
    }

    impl SamVideoInference for FakeModel {
        type EncodedFrame = usize;
        type ObjectState = usize;

        fn encode_frame(&self, image: &Image) -> Result<usize> {
            let index = image.raw_data()[0] as usize;
            if self.fail_on == Some(index) {
                bail!("encoder failure");
            }
            self.encoded.borrow_mut().push(index);
            Ok(index)
        }

        fn track_object(
            &self,
            encoded: &usize,
            frame_idx: usize,
            prompt: Option<&SamPrompt<f32>>,
            state: &mut Option<usize>,
            video_size: (u32, u32),
        ) -> Result<Array2<f32>> {
            assert_eq!(*encoded, frame_idx);
            if let Some(prompt) = prompt {
                self.prompted
                    .borrow_mut()
                    .push((frame_idx, prompt.points().len()));
            }
            let seen = state.map_or(1, |s| s + 1);
            *state = Some(seen);
            Ok(Array2::from_elem(
                (video_size.1 as usize, video_size.0 as usize),
                seen as f32,
            ))
        }
    }

    fn frames(count: usize) -> Vec<Image> {
        (0..count)
            .map(|i| Image::from_raw((2, 2), vec![i as u8; 12]).unwrap())
            .collect()
    }

    fn boxed() -> SamPrompt<f32> {
        SamPrompt::Box(BoundingBox::new(0., 0., 1., 1.))
    }

    #[test]
    fn propagation_starts_at_earliest_prompt() {
        let model = FakeModel::default();
        let frames = frames(6);
        let mut session = VideoTrackingSession::new(&model, &frames).unwrap();
        session.add_inputs(4, 7, boxed()).unwrap();
        session.add_inputs(2, 3, boxed()).unwrap();

        let outputs = session.propagate().collect::<Result<Vec<_>>>().unwrap();

        assert_eq!(*model.encoded.borrow(), vec![2, 3, 4, 5]);
        assert_eq!(outputs.iter().map(|o| o.frame_idx).collect::<Vec<_>>(), vec![2, 3, 4, 5]);
        assert_eq!(outputs[0].masks.len(), 1);
        assert_eq!(outputs[0].masks[0].0, 3);
        let ids = outputs[2].masks.iter().map(|m| m.0).collect::<Vec<_>>();
        assert_eq!(ids, vec![7, 3]);
        assert_eq!(outputs[3].masks[1].1[[0, 0]], 4.);
    }

    #[test]
    fn prompts_on_one_frame_merge() {
        let model = FakeModel::default();
        let frames = frames(3);
        let mut session = VideoTrackingSession::new(&model, &frames).unwrap();
        session.add_inputs(1, 1, boxed()).unwrap();
        session
            .add_inputs(1, 1, SamPrompt::Points(vec![LabeledPoint::include(1., 1.)]))
            .unwrap();
        session
            .add_inputs(2, 1, SamPrompt::Points(vec![LabeledPoint::exclude(0., 0.)]))
            .unwrap();

        session.propagate().for_each(drop);

        assert_eq!(*model.prompted.borrow(), vec![(1, 1), (2, 1)]);
        assert_eq!(session.obj_ids(), vec![1]);
    }

    #[test]
    fn prompt_outside_video_is_rejected() {
        let model = FakeModel::default();
        let frames = frames(2);
        let mut session = VideoTrackingSession::new(&model, &frames).unwrap();

        assert!(session.add_inputs(2, 1, boxed()).is_err());
        assert!(session.obj_ids().is_empty());
    }

    #[test]
    fn propagation_stops_after_error() {
        let model = FakeModel {
            fail_on: Some(1),
            ..Default::default()
        };
        let frames = frames(4);
        let mut session = VideoTrackingSession::new(&model, &frames).unwrap();
        session.add_inputs(0, 1, boxed()).unwrap();

        let results = session.propagate().collect::<Vec<_>>();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn nothing_to_propagate_without_prompts() {
        let model = FakeModel::default();
        let frames = frames(3);
        let mut session = VideoTrackingSession::new(&model, &frames).unwrap();

        assert_eq!(session.start_frame(), None);
        assert_eq!(session.propagate().count(), 0);
    }

    #[test]
    fn empty_video_is_rejected() {
        let model = FakeModel::default();
        assert!(VideoTrackingSession::new(&model, &[]).is_err());
    }
}
