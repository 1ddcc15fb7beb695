pub mod engine;
pub mod inference;
pub mod utils;
pub mod validate;
