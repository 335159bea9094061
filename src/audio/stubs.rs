//! Stub audio devices for headless hosts and tests
//!
//! The stub device keeps the real device's play-state machine and records
//! every byte written, without touching audio hardware. Used on hosts built
//! without an audio backend, by the diagnostic CLI, and throughout the tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{AtomicPlayState, AudioDeviceFactory, AudioFormat, OutputDevice, PlayState};
use crate::error::AudioError;

/// Default minimum buffer reported by the stub factory, in bytes
pub const STUB_MIN_BUFFER: usize = 4096;

/// Output device that records writes
#[derive(Debug)]
pub struct StubDevice {
    format: AudioFormat,
    buffer_size: usize,
    state: AtomicPlayState,
    written: Mutex<Vec<u8>>,
}

impl StubDevice {
    pub fn new(format: AudioFormat, buffer_size: usize) -> Self {
        Self {
            format,
            buffer_size,
            state: AtomicPlayState::default(),
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Every byte written so far
    pub fn written(&self) -> Vec<u8> {
        self.written
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }
}

impl OutputDevice for StubDevice {
    fn play(&self) -> Result<(), AudioError> {
        self.state.store(PlayState::Playing);
        Ok(())
    }

    fn pause(&self) -> Result<(), AudioError> {
        if self.state.load() == PlayState::Playing {
            self.state.store(PlayState::Paused);
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        self.state.store(PlayState::Stopped);
        Ok(())
    }

    fn play_state(&self) -> PlayState {
        self.state.load()
    }

    fn write(&self, pcm: &[u8]) -> Result<usize, AudioError> {
        let mut written = self.written.lock().map_err(|_| AudioError::LockPoisoned {
            component: "StubDevice".to_string(),
        })?;
        written.extend_from_slice(pcm);
        Ok(pcm.len())
    }
}

/// Factory handing out [`StubDevice`]s
#[derive(Debug)]
pub struct StubDeviceFactory {
    min_buffer: usize,
    opened: AtomicUsize,
    priority_raises: AtomicUsize,
    last: Mutex<Option<Arc<StubDevice>>>,
}

impl StubDeviceFactory {
    pub fn new() -> Self {
        Self::with_min_buffer(STUB_MIN_BUFFER)
    }

    pub fn with_min_buffer(min_buffer: usize) -> Self {
        Self {
            min_buffer,
            opened: AtomicUsize::new(0),
            priority_raises: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// Number of devices opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn priority_raises(&self) -> usize {
        self.priority_raises.load(Ordering::SeqCst)
    }

    /// Most recently opened device
    pub fn last_device(&self) -> Option<Arc<StubDevice>> {
        self.last.lock().ok().and_then(|last| last.clone())
    }
}

impl Default for StubDeviceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDeviceFactory for StubDeviceFactory {
    fn min_buffer_size(&self, _format: &AudioFormat) -> Result<usize, AudioError> {
        Ok(self.min_buffer)
    }

    fn open(
        &self,
        format: &AudioFormat,
        buffer_size: usize,
    ) -> Result<Arc<dyn OutputDevice>, AudioError> {
        let device = Arc::new(StubDevice::new(*format, buffer_size));
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last.lock() {
            *last = Some(Arc::clone(&device));
        }
        Ok(device)
    }

    fn raise_thread_priority(&self) -> Result<(), AudioError> {
        self.priority_raises.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
