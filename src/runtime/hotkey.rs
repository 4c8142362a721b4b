//! Global pause hotkey
//!
//! A two-key chord (by default `=` and `-` held together) pauses the run.
//! The OS hook only reports key edges; [`ChordDetector`] decides when the
//! chord is complete.

use std::sync::{Arc, Mutex};

/// Direction of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Pressed,
    Released,
}

/// Called by a hook for every key it sees
pub type KeyHandler = Arc<dyn Fn(char, KeyEdge) + Send + Sync>;

/// Hotkey errors
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("Failed to register keyboard hook: {0}")]
    Register(String),
    #[error("Failed to unregister keyboard hook: {0}")]
    Unregister(String),
}

/// Tracks the two chord keys
#[derive(Debug, Clone)]
pub struct ChordDetector {
    keys: [char; 2],
    held: [bool; 2],
}

impl ChordDetector {
    pub fn new(keys: [char; 2]) -> Self {
        Self {
            keys,
            held: [false; 2],
        }
    }

    /// Feed one key edge; true when this press completes the chord
    pub fn on_key(&mut self, key: char, edge: KeyEdge) -> bool {
        let Some(slot) = self.keys.iter().position(|&k| k == key) else {
            return false;
        };
        let was_complete = self.is_held();
        self.held[slot] = edge == KeyEdge::Pressed;
        edge == KeyEdge::Pressed && !was_complete && self.is_held()
    }

    /// Both keys currently down
    pub fn is_held(&self) -> bool {
        self.held[0] && self.held[1]
    }
}

/// System-wide keyboard hook
pub trait KeyboardHook: Send + Sync {
    fn register(&self, handler: KeyHandler) -> Result<(), HotkeyError>;
    fn unregister(&self) -> Result<(), HotkeyError>;
}

/// Hook that never reports a key
#[derive(Debug, Default)]
pub struct NoopHook;

impl KeyboardHook for NoopHook {
    fn register(&self, _handler: KeyHandler) -> Result<(), HotkeyError> {
        Ok(())
    }

    fn unregister(&self) -> Result<(), HotkeyError> {
        Ok(())
    }
}

#[cfg(any(windows, target_os = "macos"))]
mod native {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, RwLock};

    use rdev::{listen, Event, EventType, Key};

    use super::{HotkeyError, KeyEdge, KeyHandler, KeyboardHook};

    fn key_char(key: Key) -> Option<char> {
        let c = match key {
            Key::Equal => '=',
            Key::Minus => '-',
            Key::Comma => ',',
            Key::Dot => '.',
            Key::Slash => '/',
            Key::SemiColon => ';',
            Key::Quote => '\'',
            Key::BackQuote => '`',
            Key::LeftBracket => '[',
            Key::RightBracket => ']',
            Key::BackSlash => '\\',
            Key::Space => ' ',
            Key::Num0 => '0',
            Key::Num1 => '1',
            Key::Num2 => '2',
            Key::Num3 => '3',
            Key::Num4 => '4',
            Key::Num5 => '5',
            Key::Num6 => '6',
            Key::Num7 => '7',
            Key::Num8 => '8',
            Key::Num9 => '9',
            Key::KeyA => 'a',
            Key::KeyB => 'b',
            Key::KeyC => 'c',
            Key::KeyD => 'd',
            Key::KeyE => 'e',
            Key::KeyF => 'f',
            Key::KeyG => 'g',
            Key::KeyH => 'h',
            Key::KeyI => 'i',
            Key::KeyJ => 'j',
            Key::KeyK => 'k',
            Key::KeyL => 'l',
            Key::KeyM => 'm',
            Key::KeyN => 'n',
            Key::KeyO => 'o',
            Key::KeyP => 'p',
            Key::KeyQ => 'q',
            Key::KeyR => 'r',
            Key::KeyS => 's',
            Key::KeyT => 't',
            Key::KeyU => 'u',
            Key::KeyV => 'v',
            Key::KeyW => 'w',
            Key::KeyX => 'x',
            Key::KeyY => 'y',
            Key::KeyZ => 'z',
            _ => return None,
        };
        Some(c)
    }

    /// Hook backed by rdev's global listener
    ///
    /// The listener thread cannot be stopped once started, so unregistering
    /// only detaches the handler.
    #[derive(Default)]
    pub struct RdevHook {
        handler: Arc<RwLock<Option<KeyHandler>>>,
        listening: AtomicBool,
    }

    impl RdevHook {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl KeyboardHook for RdevHook {
        fn register(&self, handler: KeyHandler) -> Result<(), HotkeyError> {
            match self.handler.write() {
                Ok(mut slot) => *slot = Some(handler),
                Err(poisoned) => *poisoned.into_inner() = Some(handler),
            }
            if self.listening.swap(true, Ordering::SeqCst) {
                return Ok(());
            }

            let slot = self.handler.clone();
            std::thread::Builder::new()
                .name("hotkey-listener".into())
                .spawn(move || {
                    let result = listen(move |event: Event| {
                        let (key, edge) = match event.event_type {
                            EventType::KeyPress(key) => (key, KeyEdge::Pressed),
                            EventType::KeyRelease(key) => (key, KeyEdge::Released),
                            _ => return,
                        };
                        let Some(c) = key_char(key) else {
                            return;
                        };
                        let handler = slot.read().ok().and_then(|h| h.clone());
                        if let Some(handler) = handler {
                            handler(c, edge);
                        }
                    });
                    if let Err(e) = result {
                        log::error!("Keyboard listener stopped: {:?}", e);
                    }
                })
                .map_err(|e| HotkeyError::Register(e.to_string()))?;
            Ok(())
        }

        fn unregister(&self) -> Result<(), HotkeyError> {
            match self.handler.write() {
                Ok(mut slot) => {
                    *slot = None;
                    Ok(())
                }
                Err(_) => Err(HotkeyError::Unregister("handler lock poisoned".into())),
            }
        }
    }
}

#[cfg(any(windows, target_os = "macos"))]
pub use native::RdevHook;

/// The keyboard hook of the running OS
pub fn native_hook() -> Arc<dyn KeyboardHook> {
    #[cfg(any(windows, target_os = "macos"))]
    {
        Arc::new(RdevHook::new())
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        log::warn!("No global keyboard hook on this platform; the pause chord is disabled");
        Arc::new(NoopHook)
    }
}

/// Fires a callback when the pause chord is pressed
pub struct HotkeyListener {
    hook: Arc<dyn KeyboardHook>,
    chord: [char; 2],
    on_chord: Arc<dyn Fn() + Send + Sync>,
}

impl HotkeyListener {
    pub fn new(
        hook: Arc<dyn KeyboardHook>,
        chord: [char; 2],
        on_chord: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            hook,
            chord,
            on_chord,
        }
    }

    /// Register with the hook
    pub fn start(&self) -> Result<(), HotkeyError> {
        let detector = Mutex::new(ChordDetector::new(self.chord));
        let on_chord = self.on_chord.clone();
        let chord = self.chord;
        self.hook.register(Arc::new(move |key, edge| {
            let fired = detector
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .on_key(key, edge);
            if fired {
                log::info!("Pause chord '{}' + '{}' pressed", chord[0], chord[1]);
                on_chord();
            }
        }))?;
        log::info!("Hotkey listener started");
        Ok(())
    }

    /// Unregister; failures are only logged
    pub fn stop(&self) {
        match self.hook.unregister() {
            Ok(()) => log::info!("Hotkey listener stopped"),
            Err(e) => log::warn!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualHook;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_chord_fires_once_per_hold() {
        let mut chord = ChordDetector::new(['=', '-']);
        assert!(!chord.on_key('=', KeyEdge::Pressed));
        assert!(!chord.on_key('x', KeyEdge::Pressed));
        assert!(chord.on_key('-', KeyEdge::Pressed));
        // Auto-repeat while both are down does not fire again
        assert!(!chord.on_key('-', KeyEdge::Pressed));
        assert!(!chord.on_key('=', KeyEdge::Released));
        assert!(!chord.is_held());
        assert!(chord.on_key('=', KeyEdge::Pressed));
    }

    #[test]
    fn test_release_clears_key() {
        let mut chord = ChordDetector::new(['=', '-']);
        chord.on_key('=', KeyEdge::Pressed);
        chord.on_key('=', KeyEdge::Released);
        assert!(!chord.on_key('-', KeyEdge::Pressed));
    }

    #[test]
    fn test_listener_calls_back_and_stops() {
        let hook = Arc::new(ManualHook::default());
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let listener = HotkeyListener::new(
            hook.clone(),
            ['=', '-'],
            Arc::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        listener.start().unwrap();
        hook.press('=');
        hook.press('-');
        assert_eq!(count.load(Ordering::SeqCst), 1);

        listener.stop();
        hook.release('=');
        hook.press('=');
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
