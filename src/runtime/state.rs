//! User-visible activity state
//!
//! One process-wide value with a single listener, notified only when the
//! value actually changes.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use serde::Serialize;

/// What the running script is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SemanticState {
    Searching,
    Acting,
    Waiting,
    Error,
}

impl SemanticState {
    /// Label shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            SemanticState::Searching => "Searching",
            SemanticState::Acting => "Acting",
            SemanticState::Waiting => "Waiting",
            SemanticState::Error => "Error",
        }
    }

    /// Style tag a dashboard can map to a colour
    pub fn style(&self) -> &'static str {
        match self {
            SemanticState::Searching => "primary",
            SemanticState::Acting => "success",
            SemanticState::Waiting => "warning",
            SemanticState::Error => "danger",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            SemanticState::Searching => 0,
            SemanticState::Acting => 1,
            SemanticState::Waiting => 2,
            SemanticState::Error => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => SemanticState::Searching,
            1 => SemanticState::Acting,
            3 => SemanticState::Error,
            _ => SemanticState::Waiting,
        }
    }
}

/// Receives state transitions
pub trait StateListener: Send + Sync {
    fn on_state_change(&self, state: SemanticState);
}

/// Listener that only logs transitions
pub struct LogListener;

impl StateListener for LogListener {
    fn on_state_change(&self, state: SemanticState) {
        log::debug!("Semantic state: {}", state.label());
    }
}

/// Holds the current [`SemanticState`]
pub struct StateManager {
    current: AtomicU8,
    listener: RwLock<Arc<dyn StateListener>>,
}

static GLOBAL: Lazy<Arc<StateManager>> = Lazy::new(|| Arc::new(StateManager::new()));

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            current: AtomicU8::new(SemanticState::Waiting.to_u8()),
            listener: RwLock::new(Arc::new(LogListener)),
        }
    }

    /// The process-wide manager
    pub fn global() -> Arc<StateManager> {
        GLOBAL.clone()
    }

    pub fn current(&self) -> SemanticState {
        SemanticState::from_u8(self.current.load(Ordering::SeqCst))
    }

    /// Replace the listener
    pub fn set_listener(&self, listener: Arc<dyn StateListener>) {
        match self.listener.write() {
            Ok(mut slot) => *slot = listener,
            Err(poisoned) => *poisoned.into_inner() = listener,
        }
    }

    /// Swap in `state`; the listener hears about it only on change
    pub fn set(&self, state: SemanticState) {
        let previous = self.current.swap(state.to_u8(), Ordering::SeqCst);
        if previous == state.to_u8() {
            return;
        }
        let listener = match self.listener.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        listener.on_state_change(state);
    }
}
