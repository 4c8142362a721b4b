//! Scape Pilot - colour and template driven automation for desktop game clients
//!
//! The crate binds to a client window, reads its canvas without touching the
//! desktop, finds things by colour, template and glyph OCR, and drives the
//! client through an in-process input channel with human-like pointer paths.
//!
//! ## Layout
//!
//! - [`platform`]: window discovery and surface capture
//! - [`input`]: motion planning, click sampling, pointer and keyboard
//! - [`vision`]: capture, colour segmentation, template matching, OCR
//! - [`zones`]: named interface regions derived from anchor templates
//! - [`controller`]: ties the above together for one run
//! - [`runtime`]: script loop, interrupts, state, statistics, pause hotkey

pub mod actions;
pub mod config;
pub mod controller;
pub mod geometry;
pub mod input;
pub mod platform;
pub mod runtime;
pub mod scripts;
pub mod vision;
pub mod walker;
pub mod zones;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::ConfigError;
use crate::input::InputError;
use crate::platform::PlatformError;
use crate::runtime::hotkey::HotkeyError;
use crate::runtime::interrupt::Interrupted;
use crate::vision::VisionError;

pub use crate::controller::{Controller, ControllerState};
pub use crate::runtime::script::{Script, ScriptContext, ScriptRunner};

/// Top-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Controller is not running")]
    NotRunning,
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Hotkey(#[from] HotkeyError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Interrupted")]
    Interrupted,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("No path available: {0}")]
    PathUnavailable(String),
    #[error("Zone '{0}' is not mapped")]
    ZoneUnavailable(String),
}

impl From<Interrupted> for Error {
    fn from(_: Interrupted) -> Self {
        Error::Interrupted
    }
}

impl Error {
    /// Raised by an interrupt rather than a failure
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Error::Interrupted | Error::Input(InputError::Interrupted(_))
        )
    }

    /// The injector itself failed; the session cannot continue
    pub fn is_injector_failure(&self) -> bool {
        matches!(self, Error::Input(InputError::Injector(_)))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
