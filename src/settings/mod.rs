//! Ollama settings panel logic, independent of any UI toolkit

mod controller;
mod draft;
mod refresh;

pub use controller::SettingsController;
pub use draft::{DraftState, ModelListStatus};
pub use refresh::{PendingRefresh, RefreshResult};
