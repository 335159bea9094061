//! Android output backend over Oboe
//!
//! The Oboe callback runs on a real-time thread and only pops samples from
//! the rtrb ring:
//!
//! ```text
//! AudioBridge::fill_request()  [engine thread]
//!   └─> StreamDevice::write() -> RingWriter::write_blocking()
//! OboeCallback::on_audio_ready()  [Oboe real-time thread]
//!   └─> RingReader::read_i16()  (silence on underrun)
//! ```

use std::sync::Arc;

use oboe::{
    AudioOutputCallback, AudioOutputStreamSafe, AudioStream, AudioStreamAsync,
    AudioStreamBuilder, DataCallbackResult, Mono, Output, PerformanceMode, SharingMode, Stereo,
};
use tracing::info;

use super::ring::{pcm_ring, RingReader};
use super::stream_thread::{StreamControl, StreamDevice};
use super::{AudioDeviceFactory, AudioFormat, ChannelLayout, OutputDevice, PcmEncoding};
use crate::android::{min_track_buffer_size, set_thread_priority, THREAD_PRIORITY_URGENT_AUDIO};
use crate::error::AudioError;

/// Ring capacity, in device buffers
const RING_BUFFERS: usize = 2;

struct MonoCallback {
    reader: RingReader,
}

impl AudioOutputCallback for MonoCallback {
    type FrameType = (i16, Mono);

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioOutputStreamSafe,
        frames: &mut [i16],
    ) -> DataCallbackResult {
        self.reader.read_i16(frames);
        DataCallbackResult::Continue
    }
}

struct StereoCallback {
    reader: RingReader,
}

impl AudioOutputCallback for StereoCallback {
    type FrameType = (i16, Stereo);

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioOutputStreamSafe,
        frames: &mut [(i16, i16)],
    ) -> DataCallbackResult {
        let mut pair = [0i16; 2];
        for frame in frames.iter_mut() {
            self.reader.read_i16(&mut pair);
            *frame = (pair[0], pair[1]);
        }
        DataCallbackResult::Continue
    }
}

enum OboeStream {
    Mono(AudioStreamAsync<Output, MonoCallback>),
    Stereo(AudioStreamAsync<Output, StereoCallback>),
}

macro_rules! on_stream {
    ($self:ident, $stream:ident => $body:expr) => {
        match &mut $self.0 {
            OboeStream::Mono($stream) => $body,
            OboeStream::Stereo($stream) => $body,
        }
    };
}

struct OboeControl(OboeStream);

impl StreamControl for OboeControl {
    fn start(&mut self) -> Result<(), AudioError> {
        on_stream!(self, stream => stream.start()).map_err(|e| AudioError::StreamFailure {
            reason: format!("Failed to start output stream: {:?}", e),
        })
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        on_stream!(self, stream => stream.request_pause()).map_err(|e| AudioError::StreamFailure {
            reason: format!("Failed to pause output stream: {:?}", e),
        })
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        on_stream!(self, stream => stream.stop()).map_err(|e| AudioError::StreamFailure {
            reason: format!("Failed to stop output stream: {:?}", e),
        })
    }
}

fn builder(format: &AudioFormat) -> AudioStreamBuilder<Output, oboe::Unspecified, oboe::Unspecified> {
    AudioStreamBuilder::default()
        .set_performance_mode(PerformanceMode::LowLatency)
        .set_sharing_mode(SharingMode::Shared)
        .set_direction::<Output>()
        .set_sample_rate(format.sample_rate as i32)
}

fn open_stream(format: AudioFormat, reader: RingReader) -> Result<Box<dyn StreamControl>, AudioError> {
    let map_open = |e: oboe::Error| AudioError::StreamOpenFailed {
        reason: format!("Output stream: {:?}", e),
    };
    let stream = match format.channels {
        ChannelLayout::Mono => OboeStream::Mono(
            builder(&format)
                .set_channel_count::<Mono>()
                .set_format::<i16>()
                .set_callback(MonoCallback { reader })
                .open_stream()
                .map_err(map_open)?,
        ),
        ChannelLayout::Stereo => OboeStream::Stereo(
            builder(&format)
                .set_channel_count::<Stereo>()
                .set_format::<i16>()
                .set_callback(StereoCallback { reader })
                .open_stream()
                .map_err(map_open)?,
        ),
    };
    info!(
        sample_rate = format.sample_rate,
        channels = format.channels.count(),
        "oboe output stream opened"
    );
    Ok(Box::new(OboeControl(stream)))
}

/// Opens Oboe output streams sized like the platform `AudioTrack`
#[derive(Debug, Default)]
pub struct OboeDeviceFactory;

impl OboeDeviceFactory {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDeviceFactory for OboeDeviceFactory {
    fn min_buffer_size(&self, format: &AudioFormat) -> Result<usize, AudioError> {
        if !context_registered() {
            return Err(AudioError::ContextNotInitialized);
        }
        let size = min_track_buffer_size(
            format.sample_rate as i32,
            format.channels == ChannelLayout::Stereo,
            format.encoding == PcmEncoding::Pcm16Bit,
        )
        .map_err(|e| AudioError::JniInitFailed {
            reason: format!("AudioTrack.getMinBufferSize: {}", e),
        })?;
        if size <= 0 {
            return Err(AudioError::InvalidFormat {
                reason: format!("platform rejected format {:?}", format),
            });
        }
        Ok(size as usize)
    }

    fn open(
        &self,
        format: &AudioFormat,
        buffer_size: usize,
    ) -> Result<Arc<dyn OutputDevice>, AudioError> {
        let samples = buffer_size / format.encoding.bytes_per_sample();
        let (writer, reader) = pcm_ring(samples * RING_BUFFERS, format.encoding);
        let format = *format;
        let device = StreamDevice::spawn("ons-audio-oboe", writer, move || {
            open_stream(format, reader)
        })?;
        Ok(Arc::new(device))
    }

    fn raise_thread_priority(&self) -> Result<(), AudioError> {
        set_thread_priority(THREAD_PRIORITY_URGENT_AUDIO).map_err(|e| AudioError::JniInitFailed {
            reason: format!("setThreadPriority: {}", e),
        })
    }
}
