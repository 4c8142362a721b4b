//! Canvas capture
//!
//! Reads the canvas pixels from the window's own surface, so overlays
//! drawn on top of the client never show up in a frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use image::RgbImage;

use super::viewport::{self, Viewport};
use super::VisionError;
use crate::geometry::Rect;
use crate::platform::binder::screen_rect_to_client;
use crate::platform::{WindowId, WindowSystem};

/// Grabs frames of one canvas
pub struct FrameGrabber {
    system: Arc<dyn WindowSystem>,
    canvas: WindowId,
    viewport: Arc<dyn Viewport>,
    /// Most recent frame
    last_frame: Mutex<Option<RgbImage>>,
    frame_count: AtomicU64,
}

impl FrameGrabber {
    /// Grabber publishing to the process-wide viewport
    pub fn new(system: Arc<dyn WindowSystem>, canvas: WindowId) -> Self {
        Self {
            system,
            canvas,
            viewport: viewport::global(),
            last_frame: Mutex::new(None),
            frame_count: 0.into(),
        }
    }

    pub fn with_viewport(mut self, viewport: Arc<dyn Viewport>) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn canvas(&self) -> WindowId {
        self.canvas
    }

    /// Canvas rectangle in screen coordinates
    pub fn canvas_bounds(&self) -> Result<Rect, VisionError> {
        Ok(self.system.client_bounds(self.canvas)?)
    }

    /// Capture the whole canvas
    pub fn capture(&self) -> Result<RgbImage, VisionError> {
        let frame = self.system.capture_client(self.canvas)?;
        if frame.width() == 0 || frame.height() == 0 {
            return Err(VisionError::EmptyImage);
        }
        self.frame_count.fetch_add(1, Ordering::SeqCst);
        self.viewport.update(&frame);
        *self.last_frame.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame.clone());
        Ok(frame)
    }

    /// Capture the part of the canvas covered by a screen rectangle
    ///
    /// The zone is clipped to the canvas; no overlap at all is an error.
    pub fn capture_zone(&self, zone: Rect) -> Result<RgbImage, VisionError> {
        let frame = self.capture()?;
        let origin = self.canvas_bounds()?.origin();
        let client = screen_rect_to_client(origin, zone);
        crop(&frame, client).ok_or(VisionError::ZoneOutOfBounds(zone))
    }

    /// Copy of the most recent frame
    pub fn last_frame(&self) -> Option<RgbImage> {
        self.last_frame
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::SeqCst)
    }
}

/// Owned copy of the part of `frame` inside `rect`, `None` without overlap
pub fn crop(frame: &RgbImage, rect: Rect) -> Option<RgbImage> {
    let bounds = Rect::new(0, 0, frame.width() as i32, frame.height() as i32);
    let clip = bounds.intersect(&rect)?;
    Some(
        image::imageops::crop_imm(
            frame,
            clip.x as u32,
            clip.y as u32,
            clip.width as u32,
            clip.height as u32,
        )
        .to_image(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StubDesktop;
    use image::Rgb;

    fn grabber() -> FrameGrabber {
        let frame = RgbImage::from_fn(100, 80, |x, y| Rgb([x as u8, y as u8, 0]));
        let desktop = Arc::new(StubDesktop::with_client("Game", "Canvas", 1, 5, (200, 100), frame));
        let window = desktop.find_window("Game").unwrap().unwrap();
        let canvas = desktop.find_child(window, "Canvas", 1).unwrap().unwrap();
        FrameGrabber::new(desktop, canvas).with_viewport(Arc::new(viewport::NoViewport))
    }

    #[test]
    fn test_capture_counts_frames() {
        let grabber = grabber();
        assert!(grabber.last_frame().is_none());
        let frame = grabber.capture().unwrap();
        assert_eq!(frame.dimensions(), (100, 80));
        grabber.capture().unwrap();
        assert_eq!(grabber.frame_count(), 2);
        assert_eq!(grabber.last_frame().unwrap(), frame);
        assert_eq!(grabber.canvas_bounds().unwrap(), Rect::new(200, 100, 100, 80));
    }

    #[test]
    fn test_capture_zone_uses_client_coordinates() {
        let grabber = grabber();
        let zone = grabber.capture_zone(Rect::new(210, 120, 5, 4)).unwrap();
        assert_eq!(zone.dimensions(), (5, 4));
        assert_eq!(zone.get_pixel(0, 0), &Rgb([10, 20, 0]));
    }

    #[test]
    fn test_capture_zone_is_clipped() {
        let grabber = grabber();
        let zone = grabber.capture_zone(Rect::new(290, 170, 30, 30)).unwrap();
        assert_eq!(zone.dimensions(), (10, 10));

        let outside = grabber.capture_zone(Rect::new(0, 0, 50, 50));
        assert!(matches!(outside, Err(VisionError::ZoneOutOfBounds(_))));
    }
}
