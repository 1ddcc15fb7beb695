use anyhow::{ensure, Result};
use ndarray::concatenate;
use ndarray::prelude::*;
use std::collections::VecDeque;

/// Unprompted frames kept in an object's memory.
pub const MAX_MEMORY: usize = 7;
/// Divisor that maps frame distances into the object pointer position range.
pub const MAX_OBJ_PTR_DISTANCE: f32 = 15.0;

/// What one tracked frame leaves behind for later frames.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub(super) frame_idx: usize,
    /// `(tokens, 1, 64)` encoded mask features.
    pub(super) memory: Array3<f32>,
    pub(super) memory_pos: Array3<f32>,
    /// `(4, 1, 64)` object pointer split into four tokens.
    pub(super) obj_ptr: Array3<f32>,
}

/// Concatenated memory bank, ready for memory attention.
pub struct MemoryInputs {
    pub memory_1: Array3<f32>,
    pub memory_pos_1: Array3<f32>,
    pub memory_2: Array3<f32>,
    /// Frame distance of every object pointer entry, in `memory_2` order.
    pub ptr_distances: Array1<f32>,
}

/// Memory bank of one tracked object.
pub struct SamInferenceState {
    conditioning: Vec<MemoryEntry>,
    recent: VecDeque<MemoryEntry>,
    max_len: usize,
}

impl Default for SamInferenceState {
    fn default() -> Self {
        Self::new(MAX_MEMORY)
    }
}

impl SamInferenceState {
    pub fn new(max_len: usize) -> Self {
        Self {
            conditioning: Vec::new(),
            recent: VecDeque::with_capacity(max_len + 1),
            max_len,
        }
    }

    /// Prompted frames are kept for good, the rest only while they are among the latest `max_len`.
    pub fn push(&mut self, entry: MemoryEntry, prompted: bool) {
        if prompted {
            self.conditioning.retain(|e| e.frame_idx != entry.frame_idx);
            self.conditioning.push(entry);
        } else {
            self.recent.push_back(entry);
            while self.recent.len() > self.max_len {
                self.recent.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.conditioning.len() + self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn frames(&self) -> Vec<usize> {
        self.entries().map(|e| e.frame_idx).collect()
    }

    fn entries(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.conditioning.iter().chain(self.recent.iter())
    }

    pub fn memory_inputs(&self, frame_idx: usize) -> Result<MemoryInputs> {
        ensure!(!self.is_empty(), "Memory bank is empty");

        let memories = self.entries().map(|e| e.memory.view()).collect::<Vec<_>>();
        let positions = self.entries().map(|e| e.memory_pos.view()).collect::<Vec<_>>();
        let pointers = self.entries().map(|e| e.obj_ptr.view()).collect::<Vec<_>>();
        let ptr_distances = self
            .entries()
            .map(|e| e.frame_idx.abs_diff(frame_idx) as f32 / MAX_OBJ_PTR_DISTANCE)
            .collect::<Array1<f32>>();

        Ok(MemoryInputs {
            memory_1: concatenate(Axis(0), &memories)?,
            memory_pos_1: concatenate(Axis(0), &positions)?,
            memory_2: concatenate(Axis(0), &pointers)?,
            ptr_distances,
        })
    }
}

/// All-true `(len, 1)` attention mask.
pub(super) fn attention_mask(len: usize) -> Array2<bool> {
    Array2::from_elem((len, 1), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(frame_idx: usize) -> MemoryEntry {
        MemoryEntry {
            frame_idx,
            memory: Array3::from_elem((8, 1, 4), frame_idx as f32),
            memory_pos: Array3::zeros((8, 1, 4)),
            obj_ptr: Array3::from_elem((4, 1, 4), frame_idx as f32),
        }
    }

    #[test]
    fn prompted_frames_survive_eviction() {
        let mut state = SamInferenceState::new(3);
        state.push(entry(0), true);
        for frame in 1..=6 {
            state.push(entry(frame), false);
        }

        assert_eq!(state.frames(), vec![0, 4, 5, 6]);
    }

    #[test]
    fn reprompting_a_frame_replaces_it() {
        let mut state = SamInferenceState::default();
        state.push(entry(2), true);
        state.push(entry(2), true);

        assert_eq!(state.len(), 1);
    }

    #[test]
    fn inputs_concatenate_in_bank_order() {
        let mut state = SamInferenceState::new(2);
        state.push(entry(0), true);
        state.push(entry(3), false);

        let inputs = state.memory_inputs(5).unwrap();

        assert_eq!(inputs.memory_1.shape(), &[16, 1, 4]);
        assert_eq!(inputs.memory_2.shape(), &[8, 1, 4]);
        assert_eq!(inputs.memory_2[[4, 0, 0]], 3.);
        assert_eq!(
            inputs.ptr_distances.to_vec(),
            vec![5. / MAX_OBJ_PTR_DISTANCE, 2. / MAX_OBJ_PTR_DISTANCE]
        );
    }

    #[test]
    fn empty_bank_has_no_inputs() {
        assert!(SamInferenceState::default().memory_inputs(0).is_err());
        assert_eq!(attention_mask(3).dim(), (3, 1));
    }
}
