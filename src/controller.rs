//! Controller lifecycle
//!
//! A [`Controller`] owns everything one run needs: the bound window, the
//! input channel, the pointer and keyboard, the frame grabber, the zone
//! map, OCR and the walker. [`Controller::init`] builds them in order and
//! [`Controller::shutdown`] tears them down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::config::settings::InputSettings;
use crate::config::Settings;
use crate::input::injector::schedule_module_cleanup;
use crate::input::{
    InputChannel, InputError, Injector, MotionPlanner, NoOverlay, PointerOverlay, VirtualKeyboard,
    VirtualMouse,
};
use crate::platform::{BoundWindow, WindowBinder, WindowSystem};
use crate::runtime::hotkey::{HotkeyListener, KeyboardHook};
use crate::runtime::interrupt::InterruptToken;
use crate::runtime::statistics::Statistics;
use crate::vision::colour::{ColourRange, ColourRegistry};
use crate::vision::ocr::{load_font, GlyphOcr};
use crate::vision::{viewport, FrameGrabber, TemplateMatcher, Viewport};
use crate::walker::{NoPathService, PathService, Walker};
use crate::zones::ZoneMapper;
use crate::{Error, Result};

/// Opens the input channel for a session
pub type ChannelFactory =
    Box<dyn Fn(&InputSettings) -> std::result::Result<Box<dyn InputChannel>, InputError> + Send + Sync>;

/// Whether the controller's components may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Stopped,
    Running,
}

struct Session {
    bound: BoundWindow,
    injector: Arc<Injector>,
    mouse: Arc<VirtualMouse>,
    keyboard: Arc<VirtualKeyboard>,
    grabber: Arc<FrameGrabber>,
    zones: Arc<ZoneMapper>,
    ocr: Arc<GlyphOcr>,
    walker: Arc<Walker>,
}

/// Entry point for scripts
pub struct Controller {
    settings: Settings,
    system: Arc<dyn WindowSystem>,
    channels: ChannelFactory,
    colours: ColourRegistry,
    matcher: TemplateMatcher,
    overlay: Arc<dyn PointerOverlay>,
    viewport: Arc<dyn Viewport>,
    stats: Arc<Statistics>,
    interrupt: InterruptToken,
    paths: Arc<dyn PathService>,
    running: AtomicBool,
    session: RwLock<Option<Arc<Session>>>,
    lifecycle: Mutex<()>,
}

impl Controller {
    pub fn new(settings: Settings, system: Arc<dyn WindowSystem>, channels: ChannelFactory) -> Self {
        let mut colours = ColourRegistry::with_defaults();
        for range in &settings.colours {
            colours.register(range.clone());
        }
        Self {
            settings,
            system,
            channels,
            colours,
            matcher: TemplateMatcher::new(),
            overlay: Arc::new(NoOverlay),
            viewport: viewport::global(),
            stats: Statistics::global(),
            interrupt: InterruptToken::new(),
            paths: Arc::new(NoPathService),
            running: AtomicBool::new(false),
            session: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn with_overlay(mut self, overlay: Arc<dyn PointerOverlay>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_viewport(mut self, viewport: Arc<dyn Viewport>) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_stats(mut self, stats: Arc<Statistics>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_path_service(mut self, paths: Arc<dyn PathService>) -> Self {
        self.paths = paths;
        self
    }

    /// Bring every component up
    ///
    /// Does nothing when already running. If a step after the input channel
    /// was opened fails, the channel is closed again before returning.
    pub fn init(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_running() {
            return Ok(());
        }
        // Left behind by a pause that was never followed by shutdown
        if let Some(stale) = self.take_session() {
            log::info!("Closing the session left by the last pause");
            stale.mouse.clear_overlay();
            if let Err(e) = stale.injector.destroy() {
                log::warn!("Closing stale input channel: {}", e);
            }
        }

        let fonts = self.settings.assets.fonts_dir();
        for font in &self.settings.fonts.prewarm {
            if let Err(e) = load_font(&fonts, font) {
                log::warn!("Font prewarm skipped: {}", e);
            }
        }

        let binder = WindowBinder::new(self.system.clone(), self.settings.window.clone());
        let bound = binder.bind()?;
        binder.focus(bound.window)?;

        let channel = (self.channels)(&self.settings.input)?;
        let injector = Arc::new(Injector::create(channel, bound.pid, self.interrupt.clone())?);

        match self.build_session(&binder, bound, injector.clone()) {
            Ok(session) => {
                *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(session));
                self.running.store(true, Ordering::SeqCst);
                log::info!("Controller running");
                Ok(())
            }
            Err(e) => {
                if let Err(destroy) = injector.destroy() {
                    log::warn!("Closing input channel after failed init: {}", destroy);
                }
                Err(e)
            }
        }
    }

    fn build_session(
        &self,
        binder: &WindowBinder,
        bound: BoundWindow,
        injector: Arc<Injector>,
    ) -> Result<Session> {
        let monitor = binder.monitor_bounds(bound.window)?;
        let canvas = binder.client_bounds(bound.canvas)?;

        let mouse = VirtualMouse::new(
            injector.clone(),
            MotionPlanner::new(monitor),
            canvas.origin(),
            self.interrupt.clone(),
            self.stats.clone(),
        )
        .with_overlay(self.overlay.clone());
        mouse.set_model(self.settings.mouse.model);
        let mouse = Arc::new(mouse);
        let keyboard = Arc::new(VirtualKeyboard::new(
            injector.clone(),
            self.interrupt.clone(),
            self.stats.clone(),
        ));

        let grabber = Arc::new(
            FrameGrabber::new(self.system.clone(), bound.canvas).with_viewport(self.viewport.clone()),
        );
        let zones = Arc::new(ZoneMapper::init(
            grabber.clone(),
            &self.matcher,
            &self.settings.assets,
            &self.settings.zones,
        )?);
        zones.game_view()?;

        let ocr = Arc::new(GlyphOcr::new(
            grabber.clone(),
            self.settings.assets.fonts_dir(),
            self.interrupt.clone(),
        ));
        let text_colour = self
            .colours
            .get("White")
            .cloned()
            .unwrap_or_else(|| ColourRange::new("White", [0, 0, 200], [179, 30, 255]));
        let walker = Arc::new(Walker::new(
            ocr.clone(),
            zones.clone(),
            grabber.clone(),
            mouse.clone(),
            text_colour,
            &self.settings.assets,
            self.paths.clone(),
            self.interrupt.clone(),
        ));

        Ok(Session {
            bound,
            injector,
            mouse,
            keyboard,
            grabber,
            zones,
            ocr,
            walker,
        })
    }

    /// Tear everything down; safe to call repeatedly
    pub fn shutdown(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        self.running.store(false, Ordering::SeqCst);
        let Some(session) = self.take_session() else {
            return Ok(());
        };

        session.mouse.clear_overlay();
        let destroyed = session.injector.destroy();

        let input = &self.settings.input;
        if input.cleanup_modules {
            let paths = input.cleanup_paths();
            let delay = Duration::from_secs(input.cleanup_delay_secs);
            if let Err(e) = schedule_module_cleanup(&paths, delay) {
                log::warn!("Module cleanup not scheduled: {}", e);
            }
        }

        log::info!("Controller stopped");
        destroyed.map_err(Error::from)
    }

    fn take_session(&self) -> Option<Arc<Session>> {
        self.session.write().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Interrupt whatever is running and refuse further component access
    pub fn pause(&self) {
        self.interrupt.interrupt();
        self.running.store(false, Ordering::SeqCst);
        log::info!("Controller paused");
    }

    /// Stop on failures the session cannot recover from
    pub fn fail(&self, error: &Error) {
        if error.is_injector_failure() {
            log::error!("Input channel failed, stopping: {}", error);
            self.running.store(false, Ordering::SeqCst);
        }
    }

    /// Listener that pauses this controller on the configured chord
    pub fn pause_listener(self: &Arc<Self>, hook: Arc<dyn KeyboardHook>) -> HotkeyListener {
        let controller = Arc::downgrade(self);
        HotkeyListener::new(
            hook,
            self.settings.hotkey.chord,
            Arc::new(move || {
                if let Some(controller) = controller.upgrade() {
                    controller.pause();
                }
            }),
        )
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ControllerState {
        if self.is_running() {
            ControllerState::Running
        } else {
            ControllerState::Stopped
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> &Arc<Statistics> {
        &self.stats
    }

    pub fn interrupt(&self) -> &InterruptToken {
        &self.interrupt
    }

    pub fn colours(&self) -> &ColourRegistry {
        &self.colours
    }

    /// Registered colour by name
    pub fn colour(&self, name: &str) -> Result<&ColourRange> {
        self.colours
            .get(name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown colour '{}'", name)))
    }

    fn session(&self) -> Result<Arc<Session>> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(Error::NotRunning)
    }

    pub fn bound_window(&self) -> Result<BoundWindow> {
        Ok(self.session()?.bound)
    }

    pub fn mouse(&self) -> Result<Arc<VirtualMouse>> {
        Ok(self.session()?.mouse.clone())
    }

    pub fn keyboard(&self) -> Result<Arc<VirtualKeyboard>> {
        Ok(self.session()?.keyboard.clone())
    }

    pub fn grabber(&self) -> Result<Arc<FrameGrabber>> {
        Ok(self.session()?.grabber.clone())
    }

    pub fn zones(&self) -> Result<Arc<ZoneMapper>> {
        Ok(self.session()?.zones.clone())
    }

    pub fn ocr(&self) -> Result<Arc<GlyphOcr>> {
        Ok(self.session()?.ocr.clone())
    }

    pub fn walker(&self) -> Result<Arc<Walker>> {
        Ok(self.session()?.walker.clone())
    }

    pub fn matcher(&self) -> &TemplateMatcher {
        &self.matcher
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Shutdown on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::recording::ChannelCall;
    use crate::testing::{self, Fixture, ManualHook};
    use std::time::Instant;

    #[test]
    fn test_accessors_refuse_when_stopped() {
        let fixture = Fixture::new();
        let (controller, recording) = fixture.controller();
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert!(matches!(controller.mouse(), Err(Error::NotRunning)));
        assert!(matches!(controller.keyboard(), Err(Error::NotRunning)));
        assert!(matches!(controller.zones(), Err(Error::NotRunning)));
        assert!(matches!(controller.walker(), Err(Error::NotRunning)));
        assert!(recording.drain().is_empty());
    }

    #[test]
    fn test_init_and_shutdown() {
        let fixture = Fixture::new();
        let (controller, recording) = fixture.controller();
        controller.init().unwrap();
        assert_eq!(controller.state(), ControllerState::Running);
        assert_eq!(controller.bound_window().unwrap().pid, testing::PID);
        assert!(controller.zones().unwrap().map().inventory_slot(27).is_some());
        assert_eq!(recording.drain(), vec![ChannelCall::Create(testing::PID)]);

        // Already running
        controller.init().unwrap();
        assert!(recording.drain().is_empty());

        controller.shutdown().unwrap();
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert_eq!(recording.drain(), vec![ChannelCall::Delete(testing::PID)]);
        assert!(matches!(controller.mouse(), Err(Error::NotRunning)));

        controller.shutdown().unwrap();
        assert!(recording.drain().is_empty());
    }

    #[test]
    fn test_failed_init_closes_channel() {
        let fixture = Fixture::new();
        std::fs::remove_file(fixture.root().join("images/ui/inv.png")).unwrap();
        let (controller, recording) = fixture.controller();
        assert!(matches!(controller.init(), Err(Error::Vision(_))));
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert_eq!(
            recording.drain(),
            vec![ChannelCall::Create(testing::PID), ChannelCall::Delete(testing::PID)]
        );
    }

    #[test]
    fn test_missing_window_opens_no_channel() {
        let mut fixture = Fixture::new();
        fixture.settings.window.title = "Nothing".into();
        let (controller, recording) = fixture.controller();
        assert!(matches!(controller.init(), Err(Error::Platform(_))));
        assert!(recording.drain().is_empty());
    }

    #[test]
    fn test_user_colours_extend_defaults() {
        let mut fixture = Fixture::new();
        fixture
            .settings
            .colours
            .push(ColourRange::new("Orange", [10, 150, 150], [20, 255, 255]));
        let (controller, _recording) = fixture.controller();
        assert!(controller.colour("orange").is_ok());
        assert!(controller.colour("Red").is_ok());
        assert!(matches!(controller.colour("Teal"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_chord_pauses_sleeping_worker() {
        let fixture = Fixture::new();
        let (controller, _recording) = fixture.controller();
        controller.init().unwrap();

        let hook = Arc::new(ManualHook::default());
        let listener = controller.pause_listener(hook.clone());
        listener.start().unwrap();

        let interrupt = controller.interrupt().clone();
        let worker = std::thread::spawn(move || {
            let started = Instant::now();
            let result = interrupt.sleep_millis(10_000);
            (result, started.elapsed())
        });
        std::thread::sleep(Duration::from_millis(50));
        hook.press('=');
        hook.press('-');

        let (result, elapsed) = worker.join().unwrap();
        assert!(result.is_err());
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(controller.state(), ControllerState::Stopped);
        listener.stop();
    }

    #[test]
    fn test_init_after_pause_replaces_session() {
        let fixture = Fixture::new();
        let (controller, recording) = fixture.reopening_controller();
        controller.init().unwrap();
        controller.pause();
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert_eq!(recording.drain(), vec![ChannelCall::Create(testing::PID)]);

        controller.init().unwrap();
        assert!(controller.is_running());
        assert_eq!(
            recording.drain(),
            vec![ChannelCall::Delete(testing::PID), ChannelCall::Create(testing::PID)]
        );

        controller.shutdown().unwrap();
        assert_eq!(recording.drain(), vec![ChannelCall::Delete(testing::PID)]);
    }

    #[test]
    fn test_injector_failure_stops_controller() {
        let fixture = Fixture::new();
        let (controller, _recording) = fixture.controller();
        controller.init().unwrap();
        controller.fail(&Error::InvalidArgument("not fatal".into()));
        assert!(controller.is_running());
        controller.fail(&Error::Input(InputError::Injector("gone".into())));
        assert!(!controller.is_running());
    }
}
