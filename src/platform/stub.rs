//! In-memory desktop
//!
//! Holds a list of fake windows with fixed bounds and optional frame
//! contents. Used by tests and by dry runs against a saved screenshot.

use std::sync::{Mutex, RwLock};

use image::RgbImage;

use super::{PlatformError, WindowId, WindowSystem};
use crate::geometry::Rect;

#[derive(Debug, Clone)]
struct StubWindow {
    id: WindowId,
    title: String,
    class: String,
    parent: Option<WindowId>,
    pid: u32,
    bounds: Rect,
    frame: Option<RgbImage>,
}

/// Fake window system
#[derive(Debug)]
pub struct StubDesktop {
    monitor: Rect,
    windows: RwLock<Vec<StubWindow>>,
    focused: Mutex<Option<WindowId>>,
}

impl StubDesktop {
    pub fn new(monitor: Rect) -> Self {
        Self {
            monitor,
            windows: RwLock::new(Vec::new()),
            focused: Mutex::new(None),
        }
    }

    fn insert(&self, window: StubWindow) -> WindowId {
        let mut windows = self.windows.write().unwrap_or_else(|e| e.into_inner());
        let id = WindowId(windows.len() as isize + 1);
        windows.push(StubWindow { id, ..window });
        id
    }

    /// Add a top-level window
    pub fn add_window(&self, title: &str, pid: u32, bounds: Rect) -> WindowId {
        self.insert(StubWindow {
            id: WindowId(0),
            title: title.to_string(),
            class: String::new(),
            parent: None,
            pid,
            bounds,
            frame: None,
        })
    }

    /// Add a child window with the given class
    pub fn add_child(&self, parent: WindowId, class: &str, bounds: Rect) -> WindowId {
        let pid = self.pid(parent).unwrap_or(0);
        self.insert(StubWindow {
            id: WindowId(0),
            title: String::new(),
            class: class.to_string(),
            parent: Some(parent),
            pid,
            bounds,
            frame: None,
        })
    }

    /// Replace the pixels of a window; its size follows the frame
    pub fn set_frame(&self, id: WindowId, frame: RgbImage) -> Result<(), PlatformError> {
        let mut windows = self.windows.write().unwrap_or_else(|e| e.into_inner());
        let window = windows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(PlatformError::InvalidHandle(id))?;
        window.bounds.width = frame.width() as i32;
        window.bounds.height = frame.height() as i32;
        window.frame = Some(frame);
        Ok(())
    }

    /// A desktop with one game window whose `canvas_index`-th canvas shows `frame`
    pub fn with_client(
        title: &str,
        canvas_class: &str,
        canvas_index: usize,
        pid: u32,
        origin: (i32, i32),
        frame: RgbImage,
    ) -> Self {
        let desktop = Self::new(Rect::new(0, 0, 1920, 1080));
        let (w, h) = (frame.width() as i32, frame.height() as i32);
        let window = desktop.add_window(title, pid, Rect::new(origin.0, origin.1, w, h));
        for _ in 1..canvas_index {
            desktop.add_child(window, canvas_class, Rect::new(origin.0, origin.1, 1, 1));
        }
        let canvas = desktop.add_child(window, canvas_class, Rect::new(origin.0, origin.1, w, h));
        // The id was just issued, so the lookup cannot fail
        let _ = desktop.set_frame(canvas, frame);
        desktop
    }

    /// Last window passed to `focus`
    pub fn focused(&self) -> Option<WindowId> {
        *self.focused.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lookup<T>(&self, id: WindowId, f: impl FnOnce(&StubWindow) -> T) -> Result<T, PlatformError> {
        let windows = self.windows.read().unwrap_or_else(|e| e.into_inner());
        windows
            .iter()
            .find(|w| w.id == id)
            .map(f)
            .ok_or(PlatformError::InvalidHandle(id))
    }

    fn is_descendant<'a>(windows: &'a [StubWindow], mut window: &'a StubWindow, ancestor: WindowId) -> bool {
        while let Some(parent) = window.parent {
            if parent == ancestor {
                return true;
            }
            match windows.iter().find(|w| w.id == parent) {
                Some(next) => window = next,
                None => return false,
            }
        }
        false
    }
}

impl WindowSystem for StubDesktop {
    fn find_window(&self, title: &str) -> Result<Option<WindowId>, PlatformError> {
        let windows = self.windows.read().unwrap_or_else(|e| e.into_inner());
        Ok(windows
            .iter()
            .find(|w| w.parent.is_none() && w.title.trim() == title)
            .map(|w| w.id))
    }

    fn find_child(
        &self,
        parent: WindowId,
        class: &str,
        index: usize,
    ) -> Result<Option<WindowId>, PlatformError> {
        let windows = self.windows.read().unwrap_or_else(|e| e.into_inner());
        Ok(windows
            .iter()
            .filter(|w| w.class == class && Self::is_descendant(&windows, w, parent))
            .nth(index.saturating_sub(1))
            .map(|w| w.id))
    }

    fn pid(&self, window: WindowId) -> Result<u32, PlatformError> {
        self.lookup(window, |w| w.pid)
    }

    fn client_bounds(&self, window: WindowId) -> Result<Rect, PlatformError> {
        self.lookup(window, |w| w.bounds)
    }

    fn focus(&self, window: WindowId) -> Result<(), PlatformError> {
        self.lookup(window, |_| ())?;
        *self.focused.lock().unwrap_or_else(|e| e.into_inner()) = Some(window);
        Ok(())
    }

    fn monitor_bounds(&self, window: WindowId) -> Result<Rect, PlatformError> {
        self.lookup(window, |_| self.monitor)
    }

    fn capture_client(&self, window: WindowId) -> Result<RgbImage, PlatformError> {
        self.lookup(window, |w| match &w.frame {
            Some(frame) => frame.clone(),
            None => RgbImage::new(w.bounds.width.max(0) as u32, w.bounds.height.max(0) as u32),
        })
    }
}
