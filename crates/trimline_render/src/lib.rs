pub mod config;
pub mod error;
pub mod export;
pub mod layout;
pub mod probe;
pub mod stickers;

pub use config::ExportSettings;
pub use error::{RenderError, Result};
