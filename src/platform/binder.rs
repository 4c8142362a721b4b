//! Binding to the target client window

use std::sync::Arc;

use super::{PlatformError, WindowId, WindowSystem};
use crate::config::settings::WindowSettings;
use crate::geometry::{Point, Rect};

/// A resolved target: top-level window, drawing canvas and owning process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundWindow {
    pub window: WindowId,
    pub canvas: WindowId,
    pub pid: u32,
}

/// Locates the configured window and its canvas
pub struct WindowBinder {
    system: Arc<dyn WindowSystem>,
    settings: WindowSettings,
}

impl WindowBinder {
    pub fn new(system: Arc<dyn WindowSystem>, settings: WindowSettings) -> Self {
        Self { system, settings }
    }

    pub fn system(&self) -> &Arc<dyn WindowSystem> {
        &self.system
    }

    /// Resolve window, canvas and pid
    pub fn bind(&self) -> Result<BoundWindow, PlatformError> {
        let title = &self.settings.title;
        let window = self
            .system
            .find_window(title)?
            .ok_or_else(|| PlatformError::WindowNotFound(title.clone()))?;

        let canvas = match &self.settings.canvas_class {
            Some(class) => self
                .system
                .find_child(window, class, self.settings.canvas_index)?
                .ok_or_else(|| PlatformError::CanvasNotFound {
                    class: class.clone(),
                    index: self.settings.canvas_index,
                })?,
            None => window,
        };

        let pid = self.system.pid(window)?;
        log::info!("Bound to '{}' (pid {}, canvas {:?})", title, pid, canvas);
        Ok(BoundWindow {
            window,
            canvas,
            pid,
        })
    }

    pub fn client_bounds(&self, window: WindowId) -> Result<Rect, PlatformError> {
        self.system.client_bounds(window)
    }

    pub fn focus(&self, window: WindowId) -> Result<(), PlatformError> {
        self.system.focus(window)
    }

    pub fn monitor_bounds(&self, window: WindowId) -> Result<Rect, PlatformError> {
        self.system.monitor_bounds(window)
    }
}

/// Client-relative point to screen coordinates
pub fn client_to_screen(client_origin: Point, p: Point) -> Point {
    p.translate(client_origin.x, client_origin.y)
}

/// Screen point to client-relative coordinates
pub fn screen_to_client(client_origin: Point, p: Point) -> Point {
    p.translate(-client_origin.x, -client_origin.y)
}

pub fn client_rect_to_screen(client_origin: Point, rect: Rect) -> Rect {
    rect.translate(client_origin.x, client_origin.y)
}

pub fn screen_rect_to_client(client_origin: Point, rect: Rect) -> Rect {
    rect.translate(-client_origin.x, -client_origin.y)
}
