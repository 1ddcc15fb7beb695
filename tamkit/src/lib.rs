pub mod batch;
pub mod cli;
pub mod interactive;
pub mod logging;
pub mod progress;
pub mod prompts;
pub mod tracker;
pub mod validate;
