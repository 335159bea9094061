//! Calls made into the engine.
//!
//! The engine is reached through this trait only. The C ABI implementation
//! lives in [`crate::ffi::EngineVTable`]; tests and the CLI use
//! [`RecordingSink`].

use std::sync::Mutex;

/// Event sink and lifecycle entry points of the engine
pub trait EngineSink: Send + Sync {
    /// Key transition, see [`crate::relay::input::KeyPhase`]
    fn key(&self, code: i32, phase: i32);

    /// Pointer event, see [`crate::relay::input::PointerAction`]
    fn pointer(&self, x: i32, y: i32, action: i32);

    fn resize(&self, width: i32, height: i32);

    /// Start the engine; `game_dir` is `None` when all I/O goes through the bridge
    fn init(&self, game_dir: Option<&str>, flags: &[String]);

    fn done(&self);

    /// Persist global settings (called when the host goes to background)
    fn save_settings(&self);

    /// Script-defined render size; non-positive until the script sets it
    fn content_size(&self) -> (i32, i32);

    fn set_font_scale(&self, scale: f64);

    fn dialog_font_size(&self) -> i32;
}

/// One recorded call on a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Key(i32, i32),
    Pointer(i32, i32, i32),
    Resize(i32, i32),
    Init(Option<String>, Vec<String>),
    Done,
    SaveSettings,
    SetFontScale(f64),
}

/// Engine stand-in that records every call
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
    content: Mutex<(i32, i32)>,
    font_size: Mutex<i32>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_size(width: i32, height: i32) -> Self {
        let sink = Self::default();
        sink.set_content_size(width, height);
        sink
    }

    pub fn set_content_size(&self, width: i32, height: i32) {
        if let Ok(mut content) = self.content.lock() {
            *content = (width, height);
        }
    }

    pub fn set_dialog_font_size(&self, size: i32) {
        if let Ok(mut font) = self.font_size.lock() {
            *font = size;
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: SinkCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl EngineSink for RecordingSink {
    fn key(&self, code: i32, phase: i32) {
        self.record(SinkCall::Key(code, phase));
    }

    fn pointer(&self, x: i32, y: i32, action: i32) {
        self.record(SinkCall::Pointer(x, y, action));
    }

    fn resize(&self, width: i32, height: i32) {
        self.record(SinkCall::Resize(width, height));
    }

    fn init(&self, game_dir: Option<&str>, flags: &[String]) {
        self.record(SinkCall::Init(game_dir.map(str::to_string), flags.to_vec()));
    }

    fn done(&self) {
        self.record(SinkCall::Done);
    }

    fn save_settings(&self) {
        self.record(SinkCall::SaveSettings);
    }

    fn content_size(&self) -> (i32, i32) {
        self.content.lock().map(|c| *c).unwrap_or((0, 0))
    }

    fn set_font_scale(&self, scale: f64) {
        self.record(SinkCall::SetFontScale(scale));
    }

    fn dialog_font_size(&self) -> i32 {
        self.font_size.lock().map(|f| *f).unwrap_or(0)
    }
}
