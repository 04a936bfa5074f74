pub mod config;
pub mod error;
pub mod selection;
pub mod snapping;
pub mod types;

pub use config::EditorSettings;
pub use error::{CoreError, Result};
pub use selection::TimelineSelection;
pub use types::*;
