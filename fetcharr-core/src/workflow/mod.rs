pub mod engine;

pub use engine::ItemWorkflow;
