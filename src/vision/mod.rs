//! Vision pipeline
//!
//! Captures the client canvas and finds things in it: masked template
//! matching, HSV colour segmentation and glyph OCR.

pub mod capture;
pub mod colour;
pub mod ocr;
pub mod template;
pub mod viewport;

use std::path::PathBuf;

use crate::geometry::Rect;
use crate::platform::PlatformError;

pub use capture::FrameGrabber;
pub use colour::{ColourRange, ColourRegistry, DetectedBlob};
pub use ocr::{CharMatch, GlyphOcr};
pub use template::TemplateMatcher;
pub use viewport::{NoViewport, PngViewport, Viewport};

/// Vision errors
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Template {template:?} is larger than the base image {base:?}")]
    TemplateLargerThanBase {
        template: (u32, u32),
        base: (u32, u32),
    },
    #[error("Empty image")]
    EmptyImage,
    #[error("Zone {0:?} has no overlap with the captured frame")]
    ZoneOutOfBounds(Rect),
    #[error("Zone {0:?} lies outside the game window")]
    ZoneOutsideWindow(Rect),
    #[error("Failed to load font '{name}': {reason}")]
    FontLoad { name: String, reason: String },
    #[error("Image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Platform(#[from] PlatformError),
}
