pub mod client;
pub mod error;
pub mod types;

pub use client::{GenerationBackend, GenerationClient};
pub use error::GenerationError;
pub use types::{GeneratedImage, ImageStatus, ValidationVerdict};
