pub mod error;
pub mod mpv;
pub mod player;
pub mod session;

pub use error::{PreviewError, Result};
pub use player::PlayerControl;
pub use session::{EditorSession, SessionObserver};
