pub mod client;
pub mod types;

pub use client::{tags_url, ModelDirectory, OllamaClient, OllamaClientBuilder, OllamaDirectory};
pub use types::*;
