// PcmRing - lock-free SPSC sample ring between the engine thread and a
// device callback
//
// The engine thread decodes its PCM byte buffer into i16 samples and pushes
// them into an rtrb ring, blocking while the ring is full (this is the
// device backpressure the engine's blocking write expects). The device
// callback pops samples without locks or allocation and pads underruns with
// silence.

use std::thread;
use std::time::Duration;

use rtrb::{Consumer, Producer, RingBuffer};

use super::{AtomicPlayState, PcmEncoding, PlayState};
use crate::error::AudioError;

/// Sleep between attempts while the ring is full
const FULL_RING_BACKOFF: Duration = Duration::from_millis(2);

/// Create a ring holding `capacity` interleaved samples
pub fn pcm_ring(capacity: usize, encoding: PcmEncoding) -> (RingWriter, RingReader) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (
        RingWriter { producer, encoding },
        RingReader { consumer },
    )
}

/// Decode engine PCM bytes into signed 16-bit samples
///
/// 8-bit PCM is unsigned with a 128 midpoint; 16-bit PCM is little-endian.
pub fn decode_samples(pcm: &[u8], encoding: PcmEncoding) -> impl Iterator<Item = i16> + '_ {
    let step = encoding.bytes_per_sample();
    pcm.chunks_exact(step).map(move |chunk| match encoding {
        PcmEncoding::Pcm8Bit => ((chunk[0] as i16) - 128) << 8,
        PcmEncoding::Pcm16Bit => i16::from_le_bytes([chunk[0], chunk[1]]),
    })
}

/// Engine-thread side of the ring
pub struct RingWriter {
    producer: Producer<i16>,
    encoding: PcmEncoding,
}

impl RingWriter {
    /// Push every sample of `pcm`, waiting for the consumer while full
    ///
    /// A paused device keeps the writer waiting; a stopped device aborts the
    /// write with `StreamFailure`.
    pub fn write_blocking(&mut self, pcm: &[u8], state: &AtomicPlayState) -> Result<usize, AudioError> {
        for sample in decode_samples(pcm, self.encoding) {
            let mut pending = sample;
            loop {
                match self.producer.push(pending) {
                    Ok(()) => break,
                    Err(rtrb::PushError::Full(value)) => {
                        if state.load() == PlayState::Stopped {
                            return Err(AudioError::StreamFailure {
                                reason: "device stopped during write".to_string(),
                            });
                        }
                        pending = value;
                        thread::sleep(FULL_RING_BACKOFF);
                    }
                }
            }
        }
        Ok(pcm.len())
    }

    /// Free sample slots right now
    pub fn available(&self) -> usize {
        self.producer.slots()
    }
}

/// Device-callback side of the ring
pub struct RingReader {
    consumer: Consumer<i16>,
}

impl RingReader {
    /// Fill `out` from the ring, padding with silence; returns samples read
    ///
    /// Real-time safe: no locks, no allocation.
    pub fn read_i16(&mut self, out: &mut [i16]) -> usize {
        let mut read = 0;
        for slot in out.iter_mut() {
            match self.consumer.pop() {
                Ok(sample) => {
                    *slot = sample;
                    read += 1;
                }
                Err(_) => *slot = 0,
            }
        }
        read
    }

    /// Same as [`RingReader::read_i16`] for float output streams
    pub fn read_f32(&mut self, out: &mut [f32]) -> usize {
        let mut read = 0;
        for slot in out.iter_mut() {
            match self.consumer.pop() {
                Ok(sample) => {
                    *slot = sample as f32 / 32768.0;
                    read += 1;
                }
                Err(_) => *slot = 0.0,
            }
        }
        read
    }

    /// Samples waiting to be played
    pub fn queued(&self) -> usize {
        self.consumer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_decode_8bit_centres_on_zero() {
        let samples: Vec<i16> = decode_samples(&[128, 0, 255], PcmEncoding::Pcm8Bit).collect();
        assert_eq!(samples, vec![0, -32768, 127 << 8]);
    }

    #[test]
    fn test_decode_16bit_little_endian() {
        let samples: Vec<i16> =
            decode_samples(&[0x34, 0x12, 0xff, 0xff, 0x01], PcmEncoding::Pcm16Bit).collect();
        // trailing odd byte is dropped
        assert_eq!(samples, vec![0x1234, -1]);
    }

    #[test]
    fn test_reader_pads_underrun_with_silence() {
        let (mut writer, mut reader) = pcm_ring(8, PcmEncoding::Pcm16Bit);
        let state = AtomicPlayState::new(PlayState::Playing);
        writer.write_blocking(&[1, 0, 2, 0], &state).unwrap();

        let mut out = [7i16; 4];
        assert_eq!(reader.read_i16(&mut out), 2);
        assert_eq!(out, [1, 2, 0, 0]);
    }

    #[test]
    fn test_writer_waits_for_consumer() {
        let (mut writer, mut reader) = pcm_ring(2, PcmEncoding::Pcm16Bit);
        let state = Arc::new(AtomicPlayState::new(PlayState::Playing));
        let writer_state = Arc::clone(&state);
        let handle = thread::spawn(move || writer.write_blocking(&[1, 0, 2, 0, 3, 0, 4, 0], &writer_state));

        let mut collected = Vec::new();
        let mut out = [0i16; 1];
        while collected.len() < 4 {
            if reader.read_i16(&mut out) == 1 {
                collected.push(out[0]);
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
        assert_eq!(handle.join().unwrap().unwrap(), 8);
        assert_eq!(collected, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_stopped_device_aborts_full_write() {
        let (mut writer, _reader) = pcm_ring(1, PcmEncoding::Pcm16Bit);
        let state = AtomicPlayState::new(PlayState::Stopped);
        assert!(matches!(
            writer.write_blocking(&[1, 0, 2, 0], &state),
            Err(AudioError::StreamFailure { .. })
        ));
    }
}
