//! AudioBridge - the engine's pull-based buffer-fill contract
//!
//! The engine thread owns the bridge and drives it synchronously:
//!
//! ```text
//! initialize() -> buffer_mut() -> fill_request() -> buffer_mut() -> ... -> teardown()
//! ```
//!
//! `fill_request` is the only suspension point in the system. While the
//! device is paused it sleeps on a coarse poll interval and never drops the
//! pending buffer. Pause/resume/stop arrive from the host thread through an
//! [`AudioLifecycle`] handle and take effect by the next poll tick. The wait
//! itself only touches the lifecycle handle, so a caller that keeps the
//! bridge behind a lock can release it while parked (see
//! [`AudioLifecycle::wait_while_paused`] and [`AudioBridge::try_fill`]).
//!
//! The PCM buffer is a plain `Vec<u8>` with no lock: the engine thread is
//! the only writer, and the device only sees a copy inside `write`.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{AudioDeviceFactory, AudioFormat, OutputDevice, PlayState};
use crate::error::{log_audio_error, AudioError};

/// Poll interval used by `fill_request` while the device is paused
pub const DEFAULT_PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(500);

type DeviceSlot = Arc<Mutex<Option<Arc<dyn OutputDevice>>>>;

/// Host-side pause/resume handle
///
/// Cloneable and callable from any thread, including while the engine
/// thread is parked inside `fill_request`.
#[derive(Clone, Default)]
pub struct AudioLifecycle {
    device: DeviceSlot,
}

impl AudioLifecycle {
    fn current(&self) -> Option<Arc<dyn OutputDevice>> {
        match self.device.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set(&self, device: Option<Arc<dyn OutputDevice>>) {
        match self.device.lock() {
            Ok(mut slot) => *slot = device,
            Err(poisoned) => *poisoned.into_inner() = device,
        }
    }

    /// Pause the active device, if any
    pub fn pause(&self) {
        if let Some(device) = self.current() {
            if let Err(e) = device.pause() {
                log_audio_error(&e, "pause");
            }
        }
    }

    /// Resume the active device, if any
    pub fn resume(&self) {
        if let Some(device) = self.current() {
            if let Err(e) = device.play() {
                log_audio_error(&e, "resume");
            }
        }
    }

    /// Stop the active device without going through the bridge
    ///
    /// A fill parked on a pause returns an error by the next poll tick.
    pub fn stop(&self) {
        if let Some(device) = self.current() {
            if device.play_state() == PlayState::Stopped {
                return;
            }
            match device.stop() {
                Ok(()) => debug!("audio device stopped by host"),
                Err(e) => log_audio_error(&e, "stop"),
            }
        }
    }

    /// Sleep in `poll_interval` steps until the device leaves `Paused`
    ///
    /// # Errors
    /// `NotInitialized` once the session is torn down, `StreamFailure` once
    /// the device is stopped
    pub fn wait_while_paused(&self, poll_interval: Duration) -> Result<(), AudioError> {
        loop {
            let state = self
                .current()
                .map(|device| device.play_state())
                .ok_or(AudioError::NotInitialized)?;
            match state {
                PlayState::Playing => return Ok(()),
                PlayState::Paused => thread::sleep(poll_interval),
                PlayState::Stopped => return Err(stopped()),
            }
        }
    }

    pub fn play_state(&self) -> PlayState {
        self.current()
            .map(|device| device.play_state())
            .unwrap_or(PlayState::Stopped)
    }

    pub fn is_active(&self) -> bool {
        self.current().is_some()
    }
}

/// One open device plus the engine's writable buffer
pub struct AudioSession {
    device: Arc<dyn OutputDevice>,
    format: AudioFormat,
    buffer: Vec<u8>,
}

impl AudioSession {
    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Owns the platform audio session for one bridge
pub struct AudioBridge {
    factory: Arc<dyn AudioDeviceFactory>,
    session: Option<AudioSession>,
    lifecycle: AudioLifecycle,
    poll_interval: Duration,
    priority_raised: bool,
}

impl AudioBridge {
    pub fn new(factory: Arc<dyn AudioDeviceFactory>) -> Self {
        Self::with_poll_interval(factory, DEFAULT_PAUSE_POLL_INTERVAL)
    }

    pub fn with_poll_interval(factory: Arc<dyn AudioDeviceFactory>, poll_interval: Duration) -> Self {
        Self {
            factory,
            session: None,
            lifecycle: AudioLifecycle::default(),
            poll_interval,
            priority_raised: false,
        }
    }

    /// Handle for host-thread pause/resume
    pub fn lifecycle(&self) -> AudioLifecycle {
        self.lifecycle.clone()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn session(&self) -> Option<&AudioSession> {
        self.session.as_ref()
    }

    /// Open a device session
    ///
    /// # Arguments
    /// * `rate` - Sample rate in Hz
    /// * `channels` - `1` for mono, anything else stereo
    /// * `encoding` - `1` for 16-bit PCM, anything else 8-bit
    /// * `requested_size` - Buffer size the engine asked for, in bytes
    ///
    /// # Returns
    /// Effective buffer size: at least the device minimum for the format.
    /// A second call while a session is active returns the existing length.
    pub fn initialize(
        &mut self,
        rate: i32,
        channels: i32,
        encoding: i32,
        requested_size: i32,
    ) -> Result<usize, AudioError> {
        if let Some(session) = &self.session {
            debug!(size = session.buffer.len(), "audio already initialized");
            return Ok(session.buffer.len());
        }

        self.raise_priority_once();

        let format = AudioFormat::from_engine(rate, channels, encoding)?;
        let minimum = self.factory.min_buffer_size(&format)?;
        let size = minimum.max(requested_size.max(0) as usize);
        if size == 0 {
            return Err(AudioError::InvalidFormat {
                reason: "zero-length buffer".to_string(),
            });
        }

        let device = self.factory.open(&format, size)?;
        device.play()?;
        self.lifecycle.set(Some(Arc::clone(&device)));

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels.count(),
            bytes_per_frame = format.bytes_per_frame(),
            requested = requested_size,
            minimum,
            size,
            "audio session opened"
        );

        self.session = Some(AudioSession {
            device,
            format,
            buffer: vec![0u8; size],
        });
        Ok(size)
    }

    /// The engine's writable PCM buffer
    pub fn buffer_mut(&mut self) -> Result<&mut [u8], AudioError> {
        self.session
            .as_mut()
            .map(|session| session.buffer.as_mut_slice())
            .ok_or(AudioError::NotInitialized)
    }

    /// Write the whole buffer to the device, waiting out any pause first
    ///
    /// Never returns while the device is paused. There is no timeout: the
    /// host must eventually resume, stop or tear down.
    pub fn fill_request(&mut self) -> Result<(), AudioError> {
        while !self.try_fill()? {
            self.lifecycle.wait_while_paused(self.poll_interval)?;
        }
        Ok(())
    }

    /// Write the pending buffer unless the device is paused
    ///
    /// `Ok(false)` means nothing was written and the buffer is still pending.
    pub fn try_fill(&mut self) -> Result<bool, AudioError> {
        let session = self.session.as_ref().ok_or(AudioError::NotInitialized)?;
        match session.device.play_state() {
            PlayState::Paused => return Ok(false),
            PlayState::Stopped => return Err(stopped()),
            PlayState::Playing => {}
        }

        let written = session.device.write(&session.buffer)?;
        if written < session.buffer.len() {
            warn!(written, expected = session.buffer.len(), "short audio write");
        }
        Ok(true)
    }

    /// Stop and release the device; a no-op without a session
    pub fn teardown(&mut self) {
        self.lifecycle.set(None);
        if let Some(session) = self.session.take() {
            if session.device.play_state() != PlayState::Stopped {
                if let Err(e) = session.device.stop() {
                    log_audio_error(&e, "teardown");
                }
            }
            info!("audio session closed");
        }
    }

    /// Explicit request from the engine's audio thread to raise its priority
    pub fn init_audio_thread(&mut self) {
        self.raise_priority_once();
    }

    fn raise_priority_once(&mut self) {
        if self.priority_raised {
            return;
        }
        self.priority_raised = true;
        match self.factory.raise_thread_priority() {
            Ok(()) => debug!("engine thread priority raised"),
            Err(e) => log_audio_error(&e, "raise_thread_priority"),
        }
    }
}

fn stopped() -> AudioError {
    AudioError::StreamFailure {
        reason: "device stopped".to_string(),
    }
}

impl Drop for AudioBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}
