//! Live view of captured frames
//!
//! Frames are handed to a [`Viewport`] after every capture. The PNG viewport
//! encodes on its own thread and only ever keeps the newest frame, so a slow
//! consumer never holds up the script.

use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use image::{ImageFormat, RgbImage};
use once_cell::sync::Lazy;

use super::VisionError;

/// Encode a frame as PNG
pub fn encode_png(frame: &RgbImage) -> Result<Vec<u8>, VisionError> {
    let mut bytes = Vec::new();
    frame.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub fn decode_png(bytes: &[u8]) -> Result<RgbImage, VisionError> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgb8())
}

/// Receives every captured frame
pub trait Viewport: Send + Sync {
    fn update(&self, frame: &RgbImage);
}

/// Discards frames
#[derive(Debug, Default)]
pub struct NoViewport;

impl Viewport for NoViewport {
    fn update(&self, _frame: &RgbImage) {}
}

static GLOBAL: Lazy<RwLock<Arc<dyn Viewport>>> = Lazy::new(|| RwLock::new(Arc::new(NoViewport)));

/// The process-wide viewport, a [`NoViewport`] until one is installed
pub fn global() -> Arc<dyn Viewport> {
    GLOBAL
        .read()
        .map(|v| v.clone())
        .unwrap_or_else(|e| e.into_inner().clone())
}

pub fn set_global(viewport: Arc<dyn Viewport>) {
    match GLOBAL.write() {
        Ok(mut slot) => *slot = viewport,
        Err(poisoned) => *poisoned.into_inner() = viewport,
    }
}

/// Encodes frames to PNG in the background
pub struct PngViewport {
    sender: Option<Sender<RgbImage>>,
    drain: Receiver<RgbImage>,
    latest: Arc<RwLock<Option<Arc<Vec<u8>>>>>,
    encoded: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PngViewport {
    pub fn new() -> Self {
        let (sender, receiver) = bounded::<RgbImage>(1);
        let latest: Arc<RwLock<Option<Arc<Vec<u8>>>>> = Arc::new(RwLock::new(None));
        let encoded = Arc::new(AtomicU64::new(0));

        let worker = {
            let receiver = receiver.clone();
            let latest = latest.clone();
            let encoded = encoded.clone();
            std::thread::Builder::new()
                .name("viewport-encoder".into())
                .spawn(move || {
                    for frame in receiver.iter() {
                        match encode_png(&frame) {
                            Ok(png) => {
                                match latest.write() {
                                    Ok(mut slot) => *slot = Some(Arc::new(png)),
                                    Err(poisoned) => *poisoned.into_inner() = Some(Arc::new(png)),
                                }
                                encoded.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(e) => log::warn!("Viewport encode failed: {}", e),
                        }
                    }
                })
        };
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Could not start viewport encoder: {}", e);
                None
            }
        };

        Self {
            sender: Some(sender),
            drain: receiver,
            latest,
            encoded,
            worker: Mutex::new(worker),
        }
    }

    /// PNG bytes of the newest encoded frame
    pub fn latest_png(&self) -> Option<Arc<Vec<u8>>> {
        self.latest
            .read()
            .map(|slot| slot.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Number of frames encoded so far
    pub fn encoded_frames(&self) -> u64 {
        self.encoded.load(Ordering::SeqCst)
    }
}

impl Default for PngViewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport for PngViewport {
    fn update(&self, frame: &RgbImage) {
        let Some(sender) = &self.sender else {
            return;
        };
        let mut pending = frame.clone();
        // Replace a frame the encoder has not picked up yet
        for _ in 0..2 {
            match sender.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    let _ = self.drain.try_recv();
                    pending = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

impl Drop for PngViewport {
    fn drop(&mut self) {
        self.sender.take();
        let worker = self
            .worker
            .lock()
            .map(|mut w| w.take())
            .unwrap_or_else(|e| e.into_inner().take());
        if let Some(handle) = worker {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::time::{Duration, Instant};

    #[test]
    fn test_png_round_trip() {
        let frame = RgbImage::from_fn(17, 9, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 77]));
        let bytes = encode_png(&frame).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert_eq!(decode_png(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(decode_png(b"not a png"), Err(VisionError::Image(_))));
    }

    #[test]
    fn test_png_viewport_keeps_latest_frame() {
        let viewport = PngViewport::new();
        for shade in 0..20u8 {
            viewport.update(&RgbImage::from_pixel(8, 8, Rgb([shade, 0, 0])));
        }
        let last = RgbImage::from_pixel(8, 8, Rgb([200, 0, 0]));
        viewport.update(&last);

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(png) = viewport.latest_png() {
                if decode_png(&png).unwrap() == last {
                    break;
                }
            }
            assert!(Instant::now() < deadline, "newest frame never encoded");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(viewport.encoded_frames() <= 21);
    }
}
