use std::path::{Path, PathBuf};

use crate::error::{RenderError, Result};

/// A directory of animated GIF stickers.
#[derive(Debug, Clone)]
pub struct StickerCatalog {
    dir: PathBuf,
}

impl StickerCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sticker names (file stems), sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if is_gif(&path) {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Find a sticker by name. `"wow"`, `"wow.gif"` and `"WOW.GIF"` all match `wow.GIF`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let wanted = strip_gif_extension(name).to_lowercase();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !is_gif(&path) {
                continue;
            }
            let matches = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase() == wanted)
                .unwrap_or(false);
            if matches {
                return Ok(path);
            }
        }
        Err(RenderError::StickerNotFound(name.to_string()))
    }
}

fn is_gif(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("gif"))
            .unwrap_or(false)
}

fn strip_gif_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("gif") => stem,
        _ => name,
    }
}
