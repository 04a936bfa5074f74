use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output encoding and sticker placement parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportSettings {
    /// Sticker side is the shorter video dimension divided by this.
    pub overlay_scale_divisor: f64,
    /// Sticker inset from the corner is the shorter video dimension divided by this.
    pub overlay_padding_divisor: f64,
    pub frame_rate: f64,
    pub container: String,
    pub video_crf: u32,
    pub audio_bitrate: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            overlay_scale_divisor: 3.0,
            overlay_padding_divisor: 40.0,
            frame_rate: 30.0,
            container: "mov".to_string(),
            video_crf: 23,
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl ExportSettings {
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&data)?)
    }
}
