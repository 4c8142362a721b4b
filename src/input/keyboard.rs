//! Keyboard input through the injector

use std::sync::Arc;
use std::time::Duration;

use super::humanize::Humanizer;
use super::injector::{Injector, KeyAction, KEY_TYPED};
use super::InputError;
use crate::runtime::interrupt::InterruptToken;
use crate::runtime::statistics::Statistics;

/// Key code for a named modifier or control key
pub fn modifier_code(name: &str) -> Option<i32> {
    match name.trim().to_ascii_lowercase().as_str() {
        "shift" => Some(16),
        "enter" => Some(10),
        "alt" => Some(18),
        "ctrl" => Some(17),
        "esc" => Some(27),
        "space" => Some(32),
        _ => None,
    }
}

/// Key code for an arrow key
pub fn arrow_code(name: &str) -> Option<i32> {
    match name.trim().to_ascii_lowercase().as_str() {
        "left" => Some(37),
        "up" => Some(38),
        "right" => Some(39),
        "down" => Some(40),
        _ => None,
    }
}

/// Named-key and character input
pub struct VirtualKeyboard {
    injector: Arc<Injector>,
    interrupt: InterruptToken,
    stats: Arc<Statistics>,
}

impl VirtualKeyboard {
    pub fn new(injector: Arc<Injector>, interrupt: InterruptToken, stats: Arc<Statistics>) -> Self {
        Self {
            injector,
            interrupt,
            stats,
        }
    }

    /// Type one character
    pub fn send_char(&self, ch: char) -> Result<(), InputError> {
        self.interrupt.check()?;
        self.injector.key_event(KEY_TYPED, ch)?;
        self.stats.increment_inputs();
        Ok(())
    }

    /// Press or release a modifier such as `shift` or `enter`
    pub fn send_modifier(&self, action: KeyAction, name: &str) -> Result<(), InputError> {
        let code = modifier_code(name)
            .ok_or_else(|| InputError::InvalidArgument(format!("unknown modifier key '{}'", name)))?;
        self.interrupt.check()?;
        self.injector.modifier(action.key_event_id(), code)?;
        self.stats.increment_inputs();
        Ok(())
    }

    /// Release a held modifier; goes out even when interrupted
    pub fn release_modifier(&self, name: &str) -> Result<(), InputError> {
        let code = modifier_code(name)
            .ok_or_else(|| InputError::InvalidArgument(format!("unknown modifier key '{}'", name)))?;
        self.injector.release_modifier(code)?;
        self.stats.increment_inputs();
        Ok(())
    }

    /// Press or release an arrow key
    pub fn send_arrow(&self, action: KeyAction, name: &str) -> Result<(), InputError> {
        let code = arrow_code(name)
            .ok_or_else(|| InputError::InvalidArgument(format!("unknown arrow key '{}'", name)))?;
        self.interrupt.check()?;
        self.injector.arrow(action.key_event_id(), code)?;
        self.stats.increment_inputs();
        Ok(())
    }

    /// Type a string with short random gaps between characters
    pub fn type_text(&self, text: &str) -> Result<(), InputError> {
        let mut humanizer = Humanizer::new();
        for ch in text.chars() {
            self.send_char(ch)?;
            self.interrupt
                .sleep(Duration::from_millis(humanizer.typing_gap()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::injector::{KEY_PRESSED, KEY_RELEASED};
    use crate::input::recording::{recording_channel, Recording};

    fn keyboard() -> (VirtualKeyboard, Recording, InterruptToken) {
        let (channel, recording) = recording_channel();
        let token = InterruptToken::new();
        let injector = Arc::new(Injector::create(Box::new(channel), 9, token.clone()).unwrap());
        recording.drain();
        (
            VirtualKeyboard::new(injector, token.clone(), Arc::new(Statistics::new())),
            recording,
            token,
        )
    }

    #[test]
    fn test_key_tables() {
        assert_eq!(modifier_code("Shift"), Some(16));
        assert_eq!(modifier_code("esc"), Some(27));
        assert_eq!(arrow_code("down"), Some(40));
        assert_eq!(arrow_code("shift"), None);
    }

    #[test]
    fn test_modifier_press_and_release() {
        let (keyboard, recording, _) = keyboard();
        keyboard.send_modifier(KeyAction::Press, "shift").unwrap();
        keyboard.send_modifier(KeyAction::Release, "shift").unwrap();
        let keys = recording.key_events();
        assert_eq!(keys.len(), 2);
        assert_eq!((keys[0].id, keys[0].key_code, keys[0].key_char), (KEY_PRESSED, 16, 0));
        assert_eq!((keys[1].id, keys[1].key_code), (KEY_RELEASED, 16));
    }

    #[test]
    fn test_unknown_names_rejected() {
        let (keyboard, recording, _) = keyboard();
        assert!(matches!(
            keyboard.send_modifier(KeyAction::Press, "hyper"),
            Err(InputError::InvalidArgument(_))
        ));
        assert!(matches!(
            keyboard.send_arrow(KeyAction::Press, "sideways"),
            Err(InputError::InvalidArgument(_))
        ));
        assert!(recording.drain().is_empty());
    }

    #[test]
    fn test_interrupt_blocks_typing() {
        let (keyboard, recording, token) = keyboard();
        token.interrupt();
        assert!(matches!(
            keyboard.send_char('x'),
            Err(InputError::Interrupted(_))
        ));
        assert!(recording.drain().is_empty());
    }

    #[test]
    fn test_release_goes_out_after_interrupt() {
        let (keyboard, recording, token) = keyboard();
        keyboard.send_modifier(KeyAction::Press, "shift").unwrap();
        token.interrupt();
        assert!(keyboard.send_modifier(KeyAction::Release, "shift").is_err());
        keyboard.release_modifier("shift").unwrap();
        let keys = recording.key_events();
        assert_eq!(keys.len(), 2);
        assert_eq!((keys[1].id, keys[1].key_code), (KEY_RELEASED, 16));
    }
}
