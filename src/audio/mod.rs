// Audio module - pull-based PCM output driven by the engine thread

pub mod bridge;
pub mod ring;
pub mod stream_thread;
pub mod stubs;

#[cfg(feature = "desktop_audio")]
pub mod engine_cpal;

#[cfg(target_os = "android")]
pub mod engine_oboe;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::AudioError;

pub use bridge::{AudioBridge, AudioLifecycle, AudioSession, DEFAULT_PAUSE_POLL_INTERVAL};
pub use stubs::{StubDevice, StubDeviceFactory};

/// PCM sample encoding requested by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmEncoding {
    Pcm8Bit,
    Pcm16Bit,
}

impl PcmEncoding {
    /// Engine code `1` selects 16-bit, anything else 8-bit
    pub fn from_engine(code: i32) -> Self {
        if code == 1 {
            PcmEncoding::Pcm16Bit
        } else {
            PcmEncoding::Pcm8Bit
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            PcmEncoding::Pcm8Bit => 1,
            PcmEncoding::Pcm16Bit => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    /// Engine channel count `1` is mono, anything else stereo
    pub fn from_engine(count: i32) -> Self {
        if count == 1 {
            ChannelLayout::Mono
        } else {
            ChannelLayout::Stereo
        }
    }

    pub fn count(self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Output format of one audio session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: ChannelLayout,
    pub encoding: PcmEncoding,
}

impl AudioFormat {
    /// Build a format from raw engine arguments
    ///
    /// # Errors
    /// Returns `AudioError::InvalidFormat` for a non-positive sample rate
    pub fn from_engine(rate: i32, channels: i32, encoding: i32) -> Result<Self, AudioError> {
        if rate <= 0 {
            return Err(AudioError::InvalidFormat {
                reason: format!("sample rate {} Hz", rate),
            });
        }
        Ok(Self {
            sample_rate: rate as u32,
            channels: ChannelLayout::from_engine(channels),
            encoding: PcmEncoding::from_engine(encoding),
        })
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels.count() as usize * self.encoding.bytes_per_sample()
    }
}

/// Device play state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped = 0,
    Paused = 1,
    Playing = 2,
}

/// Lock-free play state shared between a device, its owner thread and
/// the engine thread polling it
#[derive(Debug)]
pub struct AtomicPlayState(AtomicU8);

impl AtomicPlayState {
    pub fn new(state: PlayState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> PlayState {
        match self.0.load(Ordering::Acquire) {
            2 => PlayState::Playing,
            1 => PlayState::Paused,
            _ => PlayState::Stopped,
        }
    }

    pub fn store(&self, state: PlayState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for AtomicPlayState {
    fn default() -> Self {
        Self::new(PlayState::Stopped)
    }
}

/// Platform audio output device
///
/// Control calls (`play`/`pause`/`stop`) may come from any thread; `write`
/// is only ever called from the engine thread.
pub trait OutputDevice: Send + Sync {
    fn play(&self) -> Result<(), AudioError>;

    fn pause(&self) -> Result<(), AudioError>;

    /// Stop and release the device
    fn stop(&self) -> Result<(), AudioError>;

    fn play_state(&self) -> PlayState;

    /// Blocking write of a whole PCM buffer, returns bytes accepted
    fn write(&self, pcm: &[u8]) -> Result<usize, AudioError>;
}

/// Opens output devices for the current host
pub trait AudioDeviceFactory: Send + Sync {
    /// Smallest viable device buffer in bytes for `format`
    fn min_buffer_size(&self, format: &AudioFormat) -> Result<usize, AudioError>;

    fn open(
        &self,
        format: &AudioFormat,
        buffer_size: usize,
    ) -> Result<Arc<dyn OutputDevice>, AudioError>;

    /// Raise the calling thread's scheduling priority
    fn raise_thread_priority(&self) -> Result<(), AudioError> {
        Ok(())
    }
}
