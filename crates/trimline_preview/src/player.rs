use std::path::Path;
use trimline_core::types::{PlayerCommand, TimeUs};

use crate::error::Result;

/// A media player the editor can drive.
pub trait PlayerControl {
    fn load(&mut self, path: &Path) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn seek(&mut self, time: TimeUs) -> Result<()>;
    /// Stop forward playback at `time` instead of at the end of the media.
    fn set_forward_end(&mut self, time: TimeUs) -> Result<()>;
    /// Current playhead, or `None` while nothing is loaded.
    fn position(&mut self) -> Result<Option<TimeUs>>;

    /// Whether playback stopped at the forward end.
    fn reached_end(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn apply(&mut self, command: PlayerCommand) -> Result<()> {
        match command {
            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::Seek(time) => self.seek(time),
            PlayerCommand::SetForwardEnd(time) => self.set_forward_end(time),
        }
    }
}
