//! Model-assisted extraction: prompts, model clients, response handling.

pub mod client;
pub mod model;
pub mod prompts;

pub use client::{ChunkFindings, ExtractionClient, PartialYear};
pub use model::{ClaudeModel, ExtractionModel};
