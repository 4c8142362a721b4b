//! Shared test fixtures: a fake client canvas with anchor images on disk

use std::path::Path;
use std::sync::Arc;

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::TempDir;

use crate::config::settings::WindowSettings;
use crate::config::Settings;
use crate::controller::{ChannelFactory, Controller};
use crate::input::recording::{recording_channel, Recording};
use crate::input::{InputChannel, InputError};
use crate::platform::{StubDesktop, WindowSystem};
use crate::runtime::hotkey::{HotkeyError, KeyEdge, KeyHandler, KeyboardHook};
use crate::vision::capture::FrameGrabber;
use crate::runtime::statistics::Statistics;
use crate::vision::viewport::NoViewport;

pub const CANVAS_ORIGIN: (i32, i32) = (100, 50);
pub const CANVAS_SIZE: (u32, u32) = (800, 600);
pub const PID: u32 = 4242;

/// Anchor positions, client-relative
pub const MINIMAP_AT: (i32, i32) = (560, 8);
pub const INVENTORY_AT: (i32, i32) = (520, 250);
pub const CHAT_AT: (i32, i32) = (10, 400);

const ANCHOR_SIZE: u32 = 6;

/// Deterministic pixel noise, unique enough that small crops match once
pub fn noise(x: u32, y: u32) -> Rgb<u8> {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    Rgb([h as u8, (h >> 8) as u8, (h >> 16) as u8])
}

fn anchor_crop(frame: &RgbImage, at: (i32, i32)) -> RgbaImage {
    RgbaImage::from_fn(ANCHOR_SIZE, ANCHOR_SIZE, |dx, dy| {
        let p = frame.get_pixel(at.0 as u32 + dx, at.1 as u32 + dy);
        Rgba([p[0], p[1], p[2], 255])
    })
}

pub struct Fixture {
    pub dir: TempDir,
    pub frame: RgbImage,
    pub settings: Settings,
}

impl Fixture {
    /// Resizable-mode canvas with all three anchors visible
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let (w, h) = CANVAS_SIZE;
        let frame = RgbImage::from_fn(w, h, noise);

        let ui = dir.path().join("images").join("ui");
        std::fs::create_dir_all(&ui).unwrap();
        anchor_crop(&frame, MINIMAP_AT).save(ui.join("minimap.png")).unwrap();
        anchor_crop(&frame, INVENTORY_AT).save(ui.join("inv.png")).unwrap();
        anchor_crop(&frame, CHAT_AT).save(ui.join("chat.png")).unwrap();
        RgbaImage::from_pixel(ANCHOR_SIZE, ANCHOR_SIZE, Rgba([255, 0, 255, 255]))
            .save(ui.join("minimap_fixed.png"))
            .unwrap();

        let mut settings = Settings::dry_run_preset();
        settings.assets.root = dir.path().to_path_buf();
        settings.fonts.prewarm.clear();

        Self {
            dir,
            frame,
            settings,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Desktop showing the canvas under the default window settings
    pub fn desktop(&self) -> Arc<StubDesktop> {
        let window = WindowSettings::default();
        Arc::new(StubDesktop::with_client(
            &window.title,
            window.canvas_class.as_deref().unwrap_or_default(),
            window.canvas_index,
            PID,
            CANVAS_ORIGIN,
            self.frame.clone(),
        ))
    }

    pub fn grabber(&self) -> FrameGrabber {
        let desktop = self.desktop();
        let window = WindowSettings::default();
        let top = desktop.find_window(&window.title).unwrap().unwrap();
        let canvas = desktop
            .find_child(top, window.canvas_class.as_deref().unwrap(), window.canvas_index)
            .unwrap()
            .unwrap();
        FrameGrabber::new(desktop, canvas).with_viewport(Arc::new(NoViewport))
    }

    /// Stopped controller over [`Self::desktop`] with a recording channel
    pub fn controller(&self) -> (Arc<Controller>, Recording) {
        let (channel, recording) = recording_channel();
        let slot = std::sync::Mutex::new(Some(channel));
        let factory: ChannelFactory = Box::new(move |_| {
            slot.lock()
                .unwrap()
                .take()
                .map(|c| Box::new(c) as Box<dyn InputChannel>)
                .ok_or_else(|| InputError::Injector("recording channel already taken".into()))
        });
        (self.controller_with(factory), recording)
    }

    /// Like [`Self::controller`], but every init opens a fresh channel
    pub fn reopening_controller(&self) -> (Arc<Controller>, Recording) {
        let (channel, recording) = recording_channel();
        let factory: ChannelFactory =
            Box::new(move |_| Ok(Box::new(channel.clone()) as Box<dyn InputChannel>));
        (self.controller_with(factory), recording)
    }

    fn controller_with(&self, factory: ChannelFactory) -> Arc<Controller> {
        let controller = Controller::new(self.settings.clone(), self.desktop(), factory)
            .with_viewport(Arc::new(NoViewport))
            .with_stats(Arc::new(Statistics::new()));
        Arc::new(controller)
    }
}

/// Keyboard hook driven by the test
#[derive(Default)]
pub struct ManualHook {
    handler: std::sync::Mutex<Option<KeyHandler>>,
}

impl ManualHook {
    fn send(&self, key: char, edge: KeyEdge) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler(key, edge);
        }
    }

    pub fn press(&self, key: char) {
        self.send(key, KeyEdge::Pressed);
    }

    pub fn release(&self, key: char) {
        self.send(key, KeyEdge::Released);
    }
}

impl KeyboardHook for ManualHook {
    fn register(&self, handler: KeyHandler) -> Result<(), HotkeyError> {
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn unregister(&self) -> Result<(), HotkeyError> {
        *self.handler.lock().unwrap() = None;
        Ok(())
    }
}
