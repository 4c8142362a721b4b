//! Run-time support shared by scripts
//!
//! Interrupt tokens, the user-visible activity state, run statistics, the
//! pause hotkey and the script loop itself.

pub mod hotkey;
pub mod interrupt;
pub mod script;
pub mod state;
pub mod statistics;

pub use hotkey::{HotkeyListener, KeyboardHook};
pub use interrupt::{InterruptToken, Interrupted};
pub use script::{RunConfig, RunOutcome, Script, ScriptContext, ScriptHandle, ScriptRegistry, ScriptRunner};
pub use state::{SemanticState, StateManager};
pub use statistics::{Statistics, StatsSnapshot};
