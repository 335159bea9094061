// Input direction: host key/pointer events into the engine's event sink

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::engine_sink::EngineSink;

pub const KEYCODE_VOLUME_UP: i32 = 24;
pub const KEYCODE_VOLUME_DOWN: i32 = 25;
pub const KEYCODE_MENU: i32 = 82;

/// Key transition phase as the engine expects it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Up = 0,
    Down = 1,
    /// Focus/activity change, sent with key code 0
    Activity = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Down = 0,
    Up = 1,
    Move = 2,
}

/// Where a key event ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRouting {
    /// Injected into the engine
    Engine,
    /// Volume/menu: left to the host
    Host,
    /// Dropped because the engine is exiting
    Suppressed,
}

/// Exit-in-progress flag shared by every delivery path
///
/// Once set it stays set for the bridge's lifetime.
#[derive(Debug, Clone, Default)]
pub struct ExitFlag(Arc<AtomicBool>);

impl ExitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn is_host_key(code: i32) -> bool {
    matches!(code, KEYCODE_VOLUME_UP | KEYCODE_VOLUME_DOWN | KEYCODE_MENU)
}

/// Synchronous delivery of input into the engine, gated on the exit flag
#[derive(Clone)]
pub struct InputRelay {
    sink: Arc<dyn EngineSink>,
    exit: ExitFlag,
}

impl InputRelay {
    pub fn new(sink: Arc<dyn EngineSink>, exit: ExitFlag) -> Self {
        Self { sink, exit }
    }

    pub fn exit_flag(&self) -> &ExitFlag {
        &self.exit
    }

    /// Physical key transition
    pub fn key(&self, code: i32, phase: KeyPhase) -> KeyRouting {
        if is_host_key(code) {
            return KeyRouting::Host;
        }
        self.trigger(code, phase)
    }

    /// Simulated press: down then up
    pub fn key_press(&self, code: i32) -> KeyRouting {
        let routing = self.trigger(code, KeyPhase::Down);
        self.trigger(code, KeyPhase::Up);
        routing
    }

    /// Activity event `(0, 3)` sent on pause and resume
    pub fn activity(&self) -> KeyRouting {
        self.trigger(0, KeyPhase::Activity)
    }

    pub fn pointer(&self, x: i32, y: i32, action: PointerAction) -> bool {
        if self.exit.is_set() {
            debug!(x, y, ?action, "pointer suppressed, engine exiting");
            return false;
        }
        self.sink.pointer(x, y, action as i32);
        true
    }

    fn trigger(&self, code: i32, phase: KeyPhase) -> KeyRouting {
        if self.exit.is_set() {
            debug!(code, ?phase, "key suppressed, engine exiting");
            return KeyRouting::Suppressed;
        }
        self.sink.key(code, phase as i32);
        KeyRouting::Engine
    }
}
