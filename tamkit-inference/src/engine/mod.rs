pub mod inference_engine;

pub use inference_engine::{ExecutionProvider, OnnxSession};
