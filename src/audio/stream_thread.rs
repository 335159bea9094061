//! StreamDevice - an [`OutputDevice`] whose backend stream lives on a
//! dedicated owner thread
//!
//! Backend stream handles (cpal, Oboe) are not `Send`, while the bridge
//! hands devices across threads. The owner thread opens the stream,
//! reports the open result, then applies play/pause/stop commands received
//! over a channel. PCM reaches the stream's callback through the rtrb ring.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use super::ring::RingWriter;
use super::{AtomicPlayState, OutputDevice, PlayState};
use crate::error::AudioError;

/// Control surface of a backend stream, used only on its owner thread
pub trait StreamControl {
    fn start(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self) -> Result<(), AudioError>;
    /// Stop playback; the stream is dropped right after
    fn stop(&mut self) -> Result<(), AudioError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamCommand {
    Play,
    Pause,
    Stop,
}

pub struct StreamDevice {
    commands: Mutex<Sender<StreamCommand>>,
    state: Arc<AtomicPlayState>,
    writer: Mutex<RingWriter>,
    owner: Mutex<Option<JoinHandle<()>>>,
}

impl StreamDevice {
    /// Spawn the owner thread and open the stream on it
    ///
    /// # Arguments
    /// * `name` - Owner thread name
    /// * `writer` - Engine side of the ring the stream callback drains
    /// * `open` - Builds the backend stream; runs on the owner thread
    ///
    /// # Errors
    /// Returns whatever `open` returned, or `StreamOpenFailed` if the owner
    /// thread could not be started.
    pub fn spawn<F>(name: &str, writer: RingWriter, open: F) -> Result<Self, AudioError>
    where
        F: FnOnce() -> Result<Box<dyn StreamControl>, AudioError> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let owner = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match open() {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    run_owner(stream, command_rx);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("owner thread: {}", e),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands: Mutex::new(command_tx),
                state: Arc::new(AtomicPlayState::default()),
                writer: Mutex::new(writer),
                owner: Mutex::new(Some(owner)),
            }),
            Ok(Err(e)) => {
                let _ = owner.join();
                Err(e)
            }
            Err(_) => {
                let _ = owner.join();
                Err(AudioError::StreamOpenFailed {
                    reason: "owner thread exited before opening the stream".to_string(),
                })
            }
        }
    }

    fn send(&self, command: StreamCommand) -> Result<(), AudioError> {
        let commands = self.commands.lock().map_err(|_| AudioError::LockPoisoned {
            component: "StreamDevice".to_string(),
        })?;
        commands.send(command).map_err(|_| AudioError::StreamFailure {
            reason: "owner thread has exited".to_string(),
        })
    }
}

fn run_owner(mut stream: Box<dyn StreamControl>, commands: Receiver<StreamCommand>) {
    while let Ok(command) = commands.recv() {
        let result = match command {
            StreamCommand::Play => stream.start(),
            StreamCommand::Pause => stream.pause(),
            StreamCommand::Stop => {
                if let Err(e) = stream.stop() {
                    error!("stream stop failed: {}", e);
                }
                break;
            }
        };
        if let Err(e) = result {
            error!(?command, "stream command failed: {}", e);
        }
    }
    debug!("stream owner thread exiting");
}

impl OutputDevice for StreamDevice {
    fn play(&self) -> Result<(), AudioError> {
        self.send(StreamCommand::Play)?;
        self.state.store(PlayState::Playing);
        Ok(())
    }

    fn pause(&self) -> Result<(), AudioError> {
        if self.state.load() != PlayState::Playing {
            return Ok(());
        }
        self.send(StreamCommand::Pause)?;
        self.state.store(PlayState::Paused);
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        // flip state first so a writer blocked on a full ring bails out
        self.state.store(PlayState::Stopped);
        let sent = self.send(StreamCommand::Stop);
        let owner = self.owner.lock().ok().and_then(|mut owner| owner.take());
        if let Some(owner) = owner {
            let _ = owner.join();
        }
        sent
    }

    fn play_state(&self) -> PlayState {
        self.state.load()
    }

    fn write(&self, pcm: &[u8]) -> Result<usize, AudioError> {
        let mut writer = self.writer.lock().map_err(|_| AudioError::LockPoisoned {
            component: "StreamDevice".to_string(),
        })?;
        writer.write_blocking(pcm, &self.state)
    }
}

impl Drop for StreamDevice {
    fn drop(&mut self) {
        if self.state.load() != PlayState::Stopped {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ring::{pcm_ring, RingReader};
    use crate::audio::PcmEncoding;

    struct Recorder {
        log: Arc<Mutex<Vec<&'static str>>>,
        reader: RingReader,
    }

    impl StreamControl for Recorder {
        fn start(&mut self) -> Result<(), AudioError> {
            self.log.lock().unwrap().push("start");
            Ok(())
        }
        fn pause(&mut self) -> Result<(), AudioError> {
            self.log.lock().unwrap().push("pause");
            Ok(())
        }
        fn stop(&mut self) -> Result<(), AudioError> {
            let mut drained = [0i16; 4];
            self.reader.read_i16(&mut drained);
            self.log.lock().unwrap().push("stop");
            Ok(())
        }
    }

    #[test]
    fn test_commands_run_on_owner_thread_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (writer, reader) = pcm_ring(16, PcmEncoding::Pcm16Bit);
        let stream_log = Arc::clone(&log);
        let device = StreamDevice::spawn("test-stream", writer, move || {
            Ok(Box::new(Recorder {
                log: stream_log,
                reader,
            }) as Box<dyn StreamControl>)
        })
        .unwrap();

        device.play().unwrap();
        device.pause().unwrap();
        assert_eq!(device.play_state(), PlayState::Paused);
        device.play().unwrap();
        assert_eq!(device.write(&[0, 1, 2, 3]).unwrap(), 4);
        device.stop().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["start", "pause", "start", "stop"]);
        assert!(device.play().is_err());
    }

    #[test]
    fn test_open_failure_is_reported() {
        let (writer, _) = pcm_ring(4, PcmEncoding::Pcm8Bit);
        let result = StreamDevice::spawn("test-stream", writer, || {
            Err(AudioError::DeviceUnavailable {
                details: "no output".to_string(),
            })
        });
        assert!(matches!(result, Err(AudioError::DeviceUnavailable { .. })));
    }
}
