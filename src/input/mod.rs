//! Input synthesis
//!
//! Trajectory planning, click sampling and the pointer and keyboard
//! controllers, all delivering through an [`injector::Injector`].

pub mod distribution;
pub mod humanize;
pub mod injector;
pub mod keyboard;
#[cfg(windows)]
pub mod kinput;
pub mod motion;
pub mod mouse;
pub mod recording;

use crate::runtime::interrupt::Interrupted;

pub use injector::{InputChannel, Injector, KeyAction};
pub use keyboard::VirtualKeyboard;
pub use motion::{MotionModel, MotionPlanner, Speed};
pub use mouse::{NoOverlay, PointerOverlay, VirtualMouse};

/// Input errors
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Injector failure: {0}")]
    Injector(String),
    #[error("Failed to load input module: {0}")]
    LibraryLoad(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}
