//! Window discovery and surface access
//!
//! [`WindowSystem`] is the seam to the OS. The Win32 backend talks to real
//! windows; [`stub::StubDesktop`] keeps everything in memory.

pub mod binder;
pub mod stub;
#[cfg(windows)]
pub mod windows;

use std::sync::Arc;

use image::RgbImage;

use crate::geometry::Rect;

pub use binder::{BoundWindow, WindowBinder};
pub use stub::StubDesktop;

/// Opaque native window handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub isize);

/// Operations the rest of the crate needs from the windowing system
pub trait WindowSystem: Send + Sync {
    /// First top-level window whose trimmed title equals `title`
    fn find_window(&self, title: &str) -> Result<Option<WindowId>, PlatformError>;

    /// The `index`-th (1-based) descendant of `parent` with window class `class`
    fn find_child(
        &self,
        parent: WindowId,
        class: &str,
        index: usize,
    ) -> Result<Option<WindowId>, PlatformError>;

    /// Owning process id
    fn pid(&self, window: WindowId) -> Result<u32, PlatformError>;

    /// Client area in absolute screen coordinates
    fn client_bounds(&self, window: WindowId) -> Result<Rect, PlatformError>;

    /// Restore and bring to the foreground
    fn focus(&self, window: WindowId) -> Result<(), PlatformError>;

    /// Bounds of the monitor showing most of the window
    fn monitor_bounds(&self, window: WindowId) -> Result<Rect, PlatformError>;

    /// Copy of the client area pixels, read from the window's own surface
    fn capture_client(&self, window: WindowId) -> Result<RgbImage, PlatformError>;
}

/// The window system of the running OS
pub fn native() -> Result<Arc<dyn WindowSystem>, PlatformError> {
    #[cfg(windows)]
    {
        Ok(Arc::new(windows::Win32Desktop::new()))
    }
    #[cfg(not(windows))]
    {
        Err(PlatformError::Unsupported("window capture and binding"))
    }
}

/// Platform errors
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("No window titled '{0}'")]
    WindowNotFound(String),
    #[error("Child window '{class}' #{index} not found")]
    CanvasNotFound { class: String, index: usize },
    #[error("Unknown window handle {0:?}")]
    InvalidHandle(WindowId),
    #[error("OS call failed: {0}")]
    Os(String),
    #[error("Not supported on this platform: {0}")]
    Unsupported(&'static str),
}
