//! In-memory input channels
//!
//! [`RecordingChannel`] buffers every call on a crossbeam channel so tests
//! can assert the exact event sequence. [`LogChannel`] accepts everything
//! and logs it, for dry runs without a host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::injector::{InputChannel, KeyEvent, MouseEvent, WheelEvent};

/// One call made on the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    Create(u32),
    Delete(u32),
    Focus { pid: u32, id: i32 },
    Key { pid: u32, event: KeyEvent },
    Mouse { pid: u32, event: MouseEvent },
    Wheel { pid: u32, event: WheelEvent },
}

/// Channel that records calls instead of delivering them
#[derive(Clone)]
pub struct RecordingChannel {
    calls: Sender<ChannelCall>,
    reject: Arc<AtomicBool>,
}

/// Reading end of a [`RecordingChannel`]
#[derive(Clone)]
pub struct Recording {
    calls: Receiver<ChannelCall>,
    reject: Arc<AtomicBool>,
}

/// A connected channel and recording pair
pub fn recording_channel() -> (RecordingChannel, Recording) {
    let (tx, rx) = unbounded();
    let reject = Arc::new(AtomicBool::new(false));
    (
        RecordingChannel {
            calls: tx,
            reject: reject.clone(),
        },
        Recording { calls: rx, reject },
    )
}

impl RecordingChannel {
    fn record(&self, call: ChannelCall) -> bool {
        // A dropped recording only means nobody is listening
        let _ = self.calls.send(call);
        !self.reject.load(Ordering::SeqCst)
    }
}

impl InputChannel for RecordingChannel {
    fn create(&self, pid: u32) -> bool {
        self.record(ChannelCall::Create(pid))
    }

    fn delete(&self, pid: u32) -> bool {
        self.record(ChannelCall::Delete(pid))
    }

    fn focus_event(&self, pid: u32, id: i32) -> bool {
        self.record(ChannelCall::Focus { pid, id })
    }

    fn key_event(&self, pid: u32, event: KeyEvent) -> bool {
        self.record(ChannelCall::Key { pid, event })
    }

    fn mouse_event(&self, pid: u32, event: MouseEvent) -> bool {
        self.record(ChannelCall::Mouse { pid, event })
    }

    fn wheel_event(&self, pid: u32, event: WheelEvent) -> bool {
        self.record(ChannelCall::Wheel { pid, event })
    }
}

impl Recording {
    /// Make every following call report failure
    pub fn reject_all(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Take every call recorded so far
    pub fn drain(&self) -> Vec<ChannelCall> {
        self.calls.try_iter().collect()
    }

    /// Drain and keep only mouse events
    pub fn mouse_events(&self) -> Vec<MouseEvent> {
        self.drain()
            .into_iter()
            .filter_map(|call| match call {
                ChannelCall::Mouse { event, .. } => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Drain and keep only key events
    pub fn key_events(&self) -> Vec<KeyEvent> {
        self.drain()
            .into_iter()
            .filter_map(|call| match call {
                ChannelCall::Key { event, .. } => Some(event),
                _ => None,
            })
            .collect()
    }
}

/// Channel that logs and accepts every call
#[derive(Debug, Default)]
pub struct LogChannel;

impl InputChannel for LogChannel {
    fn create(&self, pid: u32) -> bool {
        log::info!("[dry-run] create channel for pid {}", pid);
        true
    }

    fn delete(&self, pid: u32) -> bool {
        log::info!("[dry-run] delete channel for pid {}", pid);
        true
    }

    fn focus_event(&self, _pid: u32, _id: i32) -> bool {
        true
    }

    fn key_event(&self, _pid: u32, event: KeyEvent) -> bool {
        log::debug!("[dry-run] key {:?}", event);
        true
    }

    fn mouse_event(&self, _pid: u32, event: MouseEvent) -> bool {
        log::trace!("[dry-run] mouse {:?}", event);
        true
    }

    fn wheel_event(&self, _pid: u32, event: WheelEvent) -> bool {
        log::debug!("[dry-run] wheel {:?}", event);
        true
    }
}
