//! Where the sticker goes, in the exported frame and in an on-screen preview.
//!
//! The sticker is square, one third of the shorter video side, inset from the
//! bottom-right corner by one fortieth of the shorter side (both divisors come
//! from [`ExportSettings`]). Coordinates have a top-left origin.

use crate::config::ExportSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn shorter_side(&self) -> f64 {
        self.width.min(self.height)
    }

    fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Video and sticker rectangles inside a preview surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PreviewLayout {
    pub video: Rect,
    pub overlay: Rect,
}

/// Sticker rectangle in output pixels for a video of the given display size.
pub fn export_overlay_rect(video: Size, settings: &ExportSettings) -> Option<Rect> {
    if video.is_empty() {
        return None;
    }
    let shorter = video.shorter_side();
    let side = shorter / settings.overlay_scale_divisor;
    let padding = shorter / settings.overlay_padding_divisor;
    Some(Rect::new(
        video.width - side - padding,
        video.height - side - padding,
        side,
        side,
    ))
}

/// Aspect-fit the video into `frame`, then place the sticker inside the fitted picture.
///
/// Preview coordinates are whole points, so sticker side and padding are floored.
pub fn preview_layout(frame: Size, video: Size, settings: &ExportSettings) -> Option<PreviewLayout> {
    if frame.is_empty() || video.is_empty() {
        return None;
    }

    let fitted = if frame.width / video.width <= frame.height / video.height {
        Size::new(frame.width, video.height * frame.width / video.width)
    } else {
        Size::new(video.width * frame.height / video.height, frame.height)
    };
    let video_rect = Rect::new(
        (frame.width - fitted.width) / 2.0,
        (frame.height - fitted.height) / 2.0,
        fitted.width,
        fitted.height,
    );

    let shorter = fitted.shorter_side();
    let side = (shorter / settings.overlay_scale_divisor).floor();
    let padding = (shorter / settings.overlay_padding_divisor).floor();
    let overlay = Rect::new(
        video_rect.x + fitted.width.floor() - side - padding,
        video_rect.y + fitted.height.floor() - side - padding,
        side,
        side,
    );

    Some(PreviewLayout {
        video: video_rect,
        overlay,
    })
}
