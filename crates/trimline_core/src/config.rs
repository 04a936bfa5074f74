use crate::error::{CoreError, Result};
use crate::types::TimeUs;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for the timeline selection model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorSettings {
    /// Smallest selection the trim handles may leave.
    pub minimum_selection_us: TimeUs,
    /// Scrub positions this close to a trim edge snap onto it. Zero disables snapping.
    pub snap_threshold_us: TimeUs,
    /// How often the host should poll the player for its position.
    pub position_poll_interval_ms: u64,
    /// Resume playback after a scrub if it was playing when the scrub began.
    pub resume_after_scrub: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            minimum_selection_us: TimeUs(1_000_000),
            snap_threshold_us: TimeUs::ZERO,
            position_poll_interval_ms: 100,
            resume_after_scrub: true,
        }
    }
}

impl EditorSettings {
    /// Save settings to a file as pretty-printed JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let settings: EditorSettings = serde_json::from_str(&data)?;
        settings.validate()?;
        Ok(settings.sanitized())
    }

    /// Reject values the selection model cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.minimum_selection_us < TimeUs::ZERO {
            return Err(CoreError::InvalidSettings(format!(
                "minimum_selection_us must not be negative, got {}",
                self.minimum_selection_us.0
            )));
        }
        Ok(())
    }

    /// Clamp out-of-range values: negative durations become zero, which
    /// also turns snapping off.
    pub fn sanitized(self) -> Self {
        Self {
            minimum_selection_us: self.minimum_selection_us.max(TimeUs::ZERO),
            snap_threshold_us: self.snap_threshold_us.max(TimeUs::ZERO),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_editor_behaviour() {
        let settings = EditorSettings::default();
        assert_eq!(settings.minimum_selection_us, TimeUs(1_000_000));
        assert_eq!(settings.snap_threshold_us, TimeUs::ZERO);
        assert!(settings.resume_after_scrub);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");

        let settings = EditorSettings {
            minimum_selection_us: TimeUs(2_500_000),
            snap_threshold_us: TimeUs(100_000),
            position_poll_interval_ms: 50,
            resume_after_scrub: false,
        };
        settings.save_to_file(&path).unwrap();

        let loaded = EditorSettings::load_from_file(&path).unwrap();
        assert_eq!(settings, loaded);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "snap_threshold_us": 40000 }"#).unwrap();

        let loaded = EditorSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded.snap_threshold_us, TimeUs(40_000));
        assert_eq!(loaded.minimum_selection_us, TimeUs(1_000_000));
    }

    #[test]
    fn negative_minimum_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");
        std::fs::write(&path, r#"{ "minimum_selection_us": -5000000 }"#).unwrap();

        let result = EditorSettings::load_from_file(&path);
        assert!(matches!(result.unwrap_err(), CoreError::InvalidSettings(_)));
    }

    #[test]
    fn negative_snap_threshold_disables_snapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");
        std::fs::write(&path, r#"{ "snap_threshold_us": -300 }"#).unwrap();

        let loaded = EditorSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded.snap_threshold_us, TimeUs::ZERO);
    }

    #[test]
    fn sanitized_clamps_negative_durations() {
        let settings = EditorSettings {
            minimum_selection_us: TimeUs(-1),
            snap_threshold_us: TimeUs(-1),
            ..EditorSettings::default()
        }
        .sanitized();
        assert_eq!(settings.minimum_selection_us, TimeUs::ZERO);
        assert_eq!(settings.snap_threshold_us, TimeUs::ZERO);
    }

    #[test]
    fn load_nonexistent_file_fails() {
        let result = EditorSettings::load_from_file("/tmp/definitely_not_here_trimline.json");
        assert!(matches!(result.unwrap_err(), CoreError::Io(_)));
    }

    #[test]
    fn load_invalid_json_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json at all").unwrap();

        let result = EditorSettings::load_from_file(&path);
        assert!(matches!(result.unwrap_err(), CoreError::Json(_)));
    }
}
