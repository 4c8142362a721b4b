//! Out-of-process event injection
//!
//! The target client receives input through a channel hosted inside its own
//! process, so the OS cursor and keyboard focus stay with the user. The
//! [`InputChannel`] trait is the client end of that channel; [`Injector`]
//! adds serialisation, focus gating and click timing on top.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::humanize::Humanizer;
use super::InputError;
use crate::runtime::interrupt::InterruptToken;

/// Focus gained
pub const FOCUS_GAINED: i32 = 1004;

pub const MOUSE_CLICKED: i32 = 500;
pub const MOUSE_PRESSED: i32 = 501;
pub const MOUSE_RELEASED: i32 = 502;
pub const MOUSE_MOVED: i32 = 503;
pub const MOUSE_ENTERED: i32 = 504;
pub const MOUSE_EXITED: i32 = 505;
pub const MOUSE_DRAGGED: i32 = 506;
pub const MOUSE_WHEEL: i32 = 507;

pub const BUTTON_NONE: i32 = 0;
pub const BUTTON_LEFT: i32 = 1;
pub const BUTTON_MIDDLE: i32 = 2;
pub const BUTTON_RIGHT: i32 = 3;

pub const KEY_TYPED: i32 = 400;
pub const KEY_PRESSED: i32 = 401;
pub const KEY_RELEASED: i32 = 402;

/// Key location for ordinary keys
pub const KEY_LOCATION_STANDARD: i32 = 1;

const WHEEL_UNIT_SCROLL: i32 = 0;

/// Mouse event tuple as the host expects it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub id: i32,
    pub when: i64,
    pub modifiers: i32,
    pub x: i32,
    pub y: i32,
    pub click_count: i32,
    pub popup_trigger: bool,
    pub button: i32,
}

/// Key event tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub id: i32,
    pub when: i64,
    pub modifiers: i32,
    pub key_code: i32,
    pub key_char: u16,
    pub key_location: i32,
}

/// Wheel event tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelEvent {
    pub id: i32,
    pub when: i64,
    pub modifiers: i32,
    pub x: i32,
    pub y: i32,
    pub click_count: i32,
    pub popup_trigger: bool,
    pub scroll_type: i32,
    pub scroll_amount: i32,
    pub wheel_rotation: i32,
}

/// Client end of the host's event channel
///
/// Each call returns whether the host accepted it.
pub trait InputChannel: Send + Sync {
    fn create(&self, pid: u32) -> bool;
    fn delete(&self, pid: u32) -> bool;
    fn focus_event(&self, pid: u32, id: i32) -> bool;
    fn key_event(&self, pid: u32, event: KeyEvent) -> bool;
    fn mouse_event(&self, pid: u32, event: MouseEvent) -> bool;
    fn wheel_event(&self, pid: u32, event: WheelEvent) -> bool;
}

/// Press or release of a button or key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Release,
}

impl KeyAction {
    pub fn key_event_id(&self) -> i32 {
        match self {
            KeyAction::Press => KEY_PRESSED,
            KeyAction::Release => KEY_RELEASED,
        }
    }

    pub fn mouse_event_id(&self) -> i32 {
        match self {
            KeyAction::Press => MOUSE_PRESSED,
            KeyAction::Release => MOUSE_RELEASED,
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Serialised, focus-gated access to one target process
pub struct Injector {
    channel: Box<dyn InputChannel>,
    pid: u32,
    gate: Mutex<()>,
    destroyed: AtomicBool,
    interrupt: InterruptToken,
}

impl Injector {
    /// Open the channel for `pid`
    pub fn create(
        channel: Box<dyn InputChannel>,
        pid: u32,
        interrupt: InterruptToken,
    ) -> Result<Self, InputError> {
        if !channel.create(pid) {
            return Err(InputError::Injector(format!(
                "host refused to open a channel for pid {}",
                pid
            )));
        }
        log::info!("Input channel opened for pid {}", pid);
        Ok(Self {
            channel,
            pid,
            gate: Mutex::new(()),
            destroyed: AtomicBool::new(false),
            interrupt,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Close the channel; later calls do nothing
    pub fn destroy(&self) -> Result<(), InputError> {
        let _gate = self.lock();
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if !self.channel.delete(self.pid) {
            return Err(InputError::Injector(format!(
                "host refused to close the channel for pid {}",
                self.pid
            )));
        }
        log::info!("Input channel closed for pid {}", self.pid);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the gate and give the target focus
    fn begin(&self) -> Result<MutexGuard<'_, ()>, InputError> {
        self.interrupt.check()?;
        self.begin_always()
    }

    /// As [`begin`](Self::begin), ignoring a pending interrupt
    fn begin_always(&self) -> Result<MutexGuard<'_, ()>, InputError> {
        let gate = self.lock();
        if self.is_destroyed() {
            return Err(InputError::Injector("channel already destroyed".into()));
        }
        self.ensure(self.channel.focus_event(self.pid, FOCUS_GAINED), "focus")?;
        Ok(gate)
    }

    fn ensure(&self, accepted: bool, what: &str) -> Result<(), InputError> {
        if accepted {
            Ok(())
        } else {
            Err(InputError::Injector(format!(
                "{} event rejected for pid {}",
                what, self.pid
            )))
        }
    }

    fn mouse(&self, id: i32, modifiers: i32, x: i32, y: i32, click_count: i32, button: i32) -> Result<(), InputError> {
        let event = MouseEvent {
            id,
            when: now_millis(),
            modifiers,
            x,
            y,
            click_count,
            popup_trigger: false,
            button,
        };
        self.ensure(self.channel.mouse_event(self.pid, event), "mouse")
    }

    fn key(&self, id: i32, key_code: i32, key_char: u16) -> Result<(), InputError> {
        let event = KeyEvent {
            id,
            when: now_millis(),
            modifiers: 0,
            key_code,
            key_char,
            key_location: KEY_LOCATION_STANDARD,
        };
        self.ensure(self.channel.key_event(self.pid, event), "key")
    }

    /// Press, hold 50–80 ms, release
    ///
    /// An interrupt during the hold still releases the button before the
    /// interruption is reported.
    fn click(&self, x: i32, y: i32, button: i32, modifiers: i32) -> Result<(), InputError> {
        let _gate = self.begin()?;
        self.mouse(MOUSE_PRESSED, modifiers, x, y, 1, button)?;
        let hold = Humanizer::new().click_hold();
        let slept = self.interrupt.sleep(Duration::from_millis(hold));
        self.mouse(MOUSE_RELEASED, modifiers, x, y, 1, button)?;
        slept?;
        Ok(())
    }

    pub fn click_left(&self, x: i32, y: i32) -> Result<(), InputError> {
        self.click(x, y, BUTTON_LEFT, 1)
    }

    pub fn click_right(&self, x: i32, y: i32) -> Result<(), InputError> {
        self.click(x, y, BUTTON_RIGHT, 0)
    }

    /// Single middle-button press or release
    pub fn middle(&self, x: i32, y: i32, action: KeyAction) -> Result<(), InputError> {
        let _gate = self.begin()?;
        self.mouse(action.mouse_event_id(), 0, x, y, 1, BUTTON_MIDDLE)
    }

    /// Pointer enter followed by a move
    pub fn move_to(&self, x: i32, y: i32) -> Result<(), InputError> {
        let _gate = self.begin()?;
        self.mouse(MOUSE_ENTERED, 0, x, y, 0, BUTTON_NONE)?;
        self.mouse(MOUSE_MOVED, 0, x, y, 0, BUTTON_NONE)
    }

    /// Scroll by `rotation` notches; negative scrolls up
    pub fn wheel(&self, x: i32, y: i32, rotation: i32) -> Result<(), InputError> {
        let _gate = self.begin()?;
        let event = WheelEvent {
            id: MOUSE_WHEEL,
            when: now_millis(),
            modifiers: 0,
            x,
            y,
            click_count: 0,
            popup_trigger: false,
            scroll_type: WHEEL_UNIT_SCROLL,
            scroll_amount: 3,
            wheel_rotation: rotation,
        };
        self.ensure(self.channel.wheel_event(self.pid, event), "wheel")
    }

    /// Typed character; the key code stays zero
    pub fn key_event(&self, id: i32, ch: char) -> Result<(), InputError> {
        let mut units = [0u16; 2];
        let encoded = ch.encode_utf16(&mut units);
        if encoded.len() != 1 {
            return Err(InputError::InvalidArgument(format!(
                "character {:?} does not fit one UTF-16 unit",
                ch
            )));
        }
        let _gate = self.begin()?;
        self.key(id, 0, units[0])
    }

    /// Modifier or named key by key code
    pub fn modifier(&self, id: i32, key_code: i32) -> Result<(), InputError> {
        let _gate = self.begin()?;
        self.key(id, key_code, 0)
    }

    /// Modifier release that is sent even after an interrupt
    pub fn release_modifier(&self, key_code: i32) -> Result<(), InputError> {
        let _gate = self.begin_always()?;
        self.key(KEY_RELEASED, key_code, 0)
    }

    /// Arrow key by key code
    pub fn arrow(&self, id: i32, key_code: i32) -> Result<(), InputError> {
        let _gate = self.begin()?;
        self.key(id, key_code, 0)
    }
}

/// Delete the injection module files from a detached job after `delay`
///
/// The host keeps the module mapped until it unloads it, so the deletion
/// cannot run in-process.
pub fn schedule_module_cleanup(files: &[PathBuf], delay: Duration) -> std::io::Result<()> {
    if files.is_empty() {
        return Ok(());
    }
    let seconds = delay.as_secs().max(1);
    let quoted: Vec<String> = files
        .iter()
        .map(|f| format!("\"{}\"", f.display()))
        .collect();

    #[cfg(windows)]
    let mut command = {
        let job = format!(
            "timeout /t {} /nobreak > NUL & del /f /q {}",
            seconds,
            quoted.join(" ")
        );
        let mut command = Command::new("cmd");
        command.args(["/c", "start", "/MIN", "cmd", "/c", &job]);
        command
    };

    #[cfg(not(windows))]
    let mut command = {
        let job = format!("sleep {}; rm -f {}", seconds, quoted.join(" "));
        let mut command = Command::new("sh");
        command.args(["-c", &job]);
        command
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    log::info!("Scheduled removal of {} module file(s) in {}s", files.len(), seconds);
    Ok(())
}
