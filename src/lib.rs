//! Ollama settings controller
//!
//! Loads, edits, diffs and persists the settings for a local Ollama server:
//! host URL, selected model, API key and code completion preferences. Model
//! names are discovered from the server's `/api/tags` endpoint.

pub mod config;
pub mod error;
pub mod notification;
pub mod ollama;
pub mod settings;

pub use error::{Result, SettingsError};
pub use settings::{DraftState, ModelListStatus, SettingsController};
