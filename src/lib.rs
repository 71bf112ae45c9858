pub mod app;
pub mod errors;
pub mod settings;
pub mod sim;

pub use app::{InputState, TouchApp};
pub use errors::{AppError, Result};
pub use settings::Settings;
