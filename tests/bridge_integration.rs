// Full bridge lifecycle with a recording engine and a stub audio device

use std::fs;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use ons_bridge::engine_sink::{RecordingSink, SinkCall};
use ons_bridge::relay::KeyPhase;
use ons_bridge::storage::ResourceLocator;
use ons_bridge::{
    registry, BridgeBuilder, BridgeConfig, BridgeEventListener, NativeScriptError, Platform,
    SurfaceCallbacks, UserMessage,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Auto(bool),
    Skip(bool),
    SinglePage(bool),
    Video(String),
    Error(String, Option<String>),
    User(UserMessage),
    Finished,
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    video_gate: Arc<Mutex<Option<mpsc::Receiver<()>>>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    /// Videos keep "playing" until the returned sender fires
    fn hold_videos(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.video_gate.lock().unwrap() = Some(rx);
        tx
    }

    fn wait_for(&self, event: &Event) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !self.events().contains(event) {
            assert!(Instant::now() < deadline, "timed out waiting for {:?}", event);
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl BridgeEventListener for Recorder {
    fn auto_state_changed(&self, selected: bool) {
        self.push(Event::Auto(selected));
    }
    fn skip_state_changed(&self, selected: bool) {
        self.push(Event::Skip(selected));
    }
    fn single_page_state_changed(&self, selected: bool) {
        self.push(Event::SinglePage(selected));
    }
    fn video_requested(&self, video: &ResourceLocator, _: bool, _: bool) {
        self.push(Event::Video(video.name().unwrap_or_default().to_string()));
        if let Some(gate) = self.video_gate.lock().unwrap().as_ref() {
            let _ = gate.recv();
        }
    }
    fn on_native_error(&self, error: &NativeScriptError) {
        self.push(Event::Error(error.message.clone(), error.current_line.clone()));
    }
    fn on_user_message(&self, message: UserMessage) {
        self.push(Event::User(message));
    }
    fn on_game_finished(&self) {
        self.push(Event::Finished);
    }
}

fn game_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("demo/movie")).unwrap();
    fs::write(dir.path().join("demo/movie/op.mpg"), b"mpeg").unwrap();
    dir
}

#[test]
fn engine_session_end_to_end() {
    let dir = game_dir();
    let sink = Arc::new(RecordingSink::with_content_size(800, 600));
    let platform = Platform::headless(dir.path(), dir.path().join("private"), sink.clone());
    let mut config = BridgeConfig::new(dir.path().join("demo").to_string_lossy().to_string())
        .language("en")
        .use_render_outline();
    config.audio.pause_poll_interval_ms = 10;

    let mut bridge = BridgeBuilder::from_config(config).build(platform).unwrap();
    bridge.activate().unwrap();
    let recorder = Recorder::default();
    bridge.host.set_listener(Arc::new(recorder.clone()));

    // host lays out and renders the first frame
    bridge.surface.on_create();
    bridge.surface.on_resize(1920, 1080);
    bridge.surface.on_frame();
    let game_path = dir.path().join("demo").to_string_lossy().to_string();
    assert_eq!(
        &sink.calls()[1..],
        &[
            SinkCall::Resize(1440, 1080),
            SinkCall::Init(
                Some(game_path),
                vec![
                    "--language".to_string(),
                    "en".to_string(),
                    "--render-font-outline".to_string(),
                ]
            ),
        ]
    );

    // engine thread: audio plus status traffic, all through the registry
    let engine = thread::spawn(|| {
        let services = registry::active().unwrap();
        assert_eq!(services.init_audio(44100, 2, 1, 2048), 4096);
        services.receive_message(1, true);
        services.receive_message(2, true);
        services.receive_message(1, false);
        services.receive_message(4, false);
        services.play_video("movie\\op.mpg", true, false);
        services.receive_exception("undefined label", Some("goto *nowhere"), "at 0.txt:12");
        services.fill_buffer()
    });
    assert_eq!(engine.join().unwrap(), 1);

    bridge.dispatcher.drain();
    assert_eq!(
        recorder.events(),
        vec![
            Event::Video("op.mpg".to_string()),
            Event::Auto(true),
            Event::Skip(true),
            Event::Auto(false),
            Event::User(UserMessage::CorruptSaveFile),
            Event::Error("undefined label".to_string(), Some("goto *nowhere".to_string())),
        ]
    );

    // input reaches the engine, host keys do not
    bridge.host.key(62, KeyPhase::Down);
    bridge.host.key(24, KeyPhase::Down);
    assert_eq!(sink.calls().last(), Some(&SinkCall::Key(62, 1)));

    // the engine finishes; the listener hears it and input stops
    registry::active().unwrap().on_finish();
    bridge.dispatcher.drain();
    assert_eq!(recorder.events().last(), Some(&Event::Finished));
    let before = sink.calls().len();
    bridge.host.send_native_key_press(62);
    assert_eq!(sink.calls().len(), before);

    bridge.teardown();
    assert!(!registry::is_active());
    assert!(!bridge.host.is_video_playing());
}

#[test]
fn paused_fill_waits_for_resume() {
    let dir = game_dir();
    let sink = Arc::new(RecordingSink::new());
    let platform = Platform::headless(dir.path(), dir.path().join("private"), sink);
    let mut config = BridgeConfig::new(dir.path().join("demo").to_string_lossy().to_string());
    config.audio.pause_poll_interval_ms = 10;
    let bridge = BridgeBuilder::from_config(config).build(platform).unwrap();

    let services = Arc::clone(&bridge.services);
    assert_eq!(services.init_audio(22050, 1, 0, 1024), 4096);
    bridge.host.on_pause();

    let (tx, rx) = mpsc::channel();
    let engine = thread::spawn(move || {
        let result = services.fill_buffer();
        tx.send(result).unwrap();
    });

    // still parked after many poll intervals
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    bridge.host.on_resume();
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 1);
    engine.join().unwrap();
}

#[test]
fn teardown_releases_paused_fill() {
    let dir = game_dir();
    let platform = Platform::headless(
        dir.path(),
        dir.path().join("private"),
        Arc::new(RecordingSink::new()),
    );
    let mut config = BridgeConfig::new(dir.path().join("demo").to_string_lossy().to_string());
    config.audio.pause_poll_interval_ms = 10;
    let bridge = BridgeBuilder::from_config(config).build(platform).unwrap();

    let services = Arc::clone(&bridge.services);
    assert_eq!(services.init_audio(44100, 2, 1, 512), 4096);
    bridge.host.on_pause();

    let (tx, rx) = mpsc::channel();
    let engine = thread::spawn(move || {
        tx.send(services.fill_buffer()).unwrap();
    });
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    // the parked fill does not hold the audio state
    assert_eq!(bridge.services.with_buffer(|b| b.len()), Some(4096));

    let (done_tx, done_rx) = mpsc::channel();
    let host = thread::spawn(move || {
        bridge.teardown();
        done_tx.send(()).unwrap();
        bridge
    });
    done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), -1);
    engine.join().unwrap();

    let bridge = host.join().unwrap();
    assert!(bridge.services.buffer_raw().is_none());
}

#[test]
fn video_playback_leaves_host_responsive() {
    let dir = game_dir();
    let platform = Platform::headless(
        dir.path(),
        dir.path().join("private"),
        Arc::new(RecordingSink::new()),
    );
    let mut bridge = BridgeBuilder::new(dir.path().join("demo").to_string_lossy().to_string())
        .build(platform)
        .unwrap();
    let recorder = Recorder::default();
    let stop_video = recorder.hold_videos();
    bridge.host.set_listener(Arc::new(recorder.clone()));

    let services = Arc::clone(&bridge.services);
    let engine = thread::spawn(move || services.play_video("movie/op.mpg", true, false));
    recorder.wait_for(&Event::Video("op.mpg".to_string()));
    assert!(bridge.host.is_video_playing());

    // main context keeps delivering and can swap the listener mid-video
    bridge.services.receive_message(2, true);
    assert_eq!(bridge.dispatcher.drain(), 1);
    assert!(bridge.host.clear_listener().is_some());
    bridge.host.set_listener(Arc::new(recorder.clone()));

    stop_video.send(()).unwrap();
    engine.join().unwrap();
    assert!(!bridge.host.is_video_playing());
    assert_eq!(
        recorder.events(),
        vec![Event::Video("op.mpg".to_string()), Event::Skip(true)]
    );
}

#[test]
fn messages_posted_before_finish_are_delivered() {
    let dir = game_dir();
    let platform = Platform::headless(
        dir.path(),
        dir.path().join("private"),
        Arc::new(RecordingSink::new()),
    );
    let mut bridge = BridgeBuilder::new(dir.path().join("demo").to_string_lossy().to_string())
        .build(platform)
        .unwrap();
    let recorder = Recorder::default();
    bridge.host.set_listener(Arc::new(recorder.clone()));

    // the host does not drain until the engine is already done
    bridge.services.receive_message(1, true);
    bridge.services.receive_message(4, false);
    bridge.services.on_finish();
    bridge.services.receive_message(2, true);
    bridge.dispatcher.drain();

    assert_eq!(
        recorder.events(),
        vec![
            Event::Auto(true),
            Event::User(UserMessage::CorruptSaveFile),
            Event::Finished,
        ]
    );
}

#[test]
fn teardown_silences_listener() {
    let dir = game_dir();
    let platform = Platform::headless(
        dir.path(),
        dir.path().join("private"),
        Arc::new(RecordingSink::new()),
    );
    let mut bridge = BridgeBuilder::new(dir.path().join("demo").to_string_lossy().to_string())
        .build(platform)
        .unwrap();
    let recorder = Recorder::default();
    bridge.host.set_listener(Arc::new(recorder.clone()));

    bridge.services.receive_message(3, true);
    bridge.host.release();
    bridge.services.receive_message(3, false);
    bridge.services.on_finish();
    bridge.dispatcher.drain();

    assert!(recorder.events().is_empty());
    assert_eq!(bridge.services.init_audio(44100, 2, 1, 0), 4096);
    bridge.host.on_resume();
    bridge.teardown();
    assert_eq!(bridge.services.fill_buffer(), -1);
}
