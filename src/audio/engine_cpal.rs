// Desktop output backend over cpal (feature `desktop_audio`)

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::ring::{pcm_ring, RingReader};
use super::stream_thread::{StreamControl, StreamDevice};
use super::{AudioDeviceFactory, AudioFormat, OutputDevice};
use crate::error::AudioError;

/// Fallback device minimum when the host does not report a buffer range
const FALLBACK_MIN_FRAMES: usize = 1024;

/// Ring capacity, in device buffers
const RING_BUFFERS: usize = 2;

/// Opens the host's default output device through cpal
#[derive(Debug, Default)]
pub struct CpalDeviceFactory;

impl CpalDeviceFactory {
    pub fn new() -> Self {
        Self
    }

    fn default_device() -> Result<cpal::Device, AudioError> {
        cpal::default_host()
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceUnavailable {
                details: "No default output device found".to_string(),
            })
    }
}

impl AudioDeviceFactory for CpalDeviceFactory {
    fn min_buffer_size(&self, format: &AudioFormat) -> Result<usize, AudioError> {
        let device = Self::default_device()?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceUnavailable {
                details: format!("Failed to get default output config: {:?}", e),
            })?;
        let frames = match config.buffer_size() {
            cpal::SupportedBufferSize::Range { min, .. } if *min > 0 => *min as usize,
            _ => FALLBACK_MIN_FRAMES,
        };
        Ok(frames * format.bytes_per_frame())
    }

    fn open(
        &self,
        format: &AudioFormat,
        buffer_size: usize,
    ) -> Result<Arc<dyn OutputDevice>, AudioError> {
        let samples = buffer_size / format.encoding.bytes_per_sample();
        let (writer, reader) = pcm_ring(samples * RING_BUFFERS, format.encoding);
        let format = *format;

        let device = StreamDevice::spawn("ons-audio-cpal", writer, move || {
            open_stream(format, reader)
        })?;
        Ok(Arc::new(device))
    }
}

struct CpalStream {
    stream: cpal::Stream,
}

impl StreamControl for CpalStream {
    fn start(&mut self) -> Result<(), AudioError> {
        self.stream.play().map_err(|e| AudioError::StreamFailure {
            reason: format!("Output start failed: {}", e),
        })
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        self.stream.pause().map_err(|e| AudioError::StreamFailure {
            reason: format!("Output pause failed: {}", e),
        })
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        // dropping the stream releases the device
        self.pause()
    }
}

fn open_stream(format: AudioFormat, mut reader: RingReader) -> Result<Box<dyn StreamControl>, AudioError> {
    let device = CpalDeviceFactory::default_device()?;
    let config = cpal::StreamConfig {
        channels: format.channels.count(),
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |err| error!("Output stream error: {}", err);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                reader.read_f32(data);
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

    info!(
        device = %device.name().unwrap_or_default(),
        sample_rate = format.sample_rate,
        channels = format.channels.count(),
        "cpal output stream opened"
    );
    Ok(Box::new(CpalStream { stream }))
}
