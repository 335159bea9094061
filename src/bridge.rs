//! Bridge assembly: the host view, the engine-side services and the builder
//! wiring them together.
//!
//! ```text
//!             host main context                      engine thread
//!  HostView ──InputRelay──> EngineSink        EngineServices (native boundary)
//!     │ pause/resume ──AudioLifecycle──────>  AudioBridge
//!     │                                       FileResolver + DescriptorProvisioner
//!  Dispatcher <──────────RelaySender────────  receive_message / receive_exception
//!     └─> BridgeEventListener                 on_finish
//! ```
//!
//! The two halves share only the exit flag, the listener slot, the
//! video-playing flag and the audio lifecycle handle.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::audio::{AudioBridge, AudioDeviceFactory, AudioLifecycle, StubDeviceFactory};
use crate::config::BridgeConfig;
use crate::engine_sink::EngineSink;
use crate::error::{log_audio_error, AudioError, BridgeError};
use crate::registry;
use crate::relay::{
    relay, BridgeEventListener, Dispatcher, ExitFlag, InputRelay, KeyPhase, KeyRouting,
    ListenerSlot, NativeScriptError, PointerAction, RelaySender,
};
use crate::storage::{
    DescriptorProvisioner, DirectoryTreeProvider, DocumentProvider, FileResolver, GameRoot,
    HostCapabilities, OpenMode, INVALID_FD,
};
use crate::surface::{EngineLaunch, SurfaceAdapter};

/// Host services a bridge is built on
pub struct Platform {
    pub capabilities: HostCapabilities,
    pub provider: Arc<dyn DocumentProvider>,
    pub audio: Arc<dyn AudioDeviceFactory>,
    pub engine: Arc<dyn EngineSink>,
}

impl Platform {
    /// Desktop/test platform: tree documents served from `tree_dir`, audio
    /// captured by a stub device
    pub fn headless(
        tree_dir: impl Into<PathBuf>,
        private_storage: impl Into<PathBuf>,
        engine: Arc<dyn EngineSink>,
    ) -> Self {
        Self {
            capabilities: HostCapabilities::desktop(private_storage),
            provider: Arc::new(DirectoryTreeProvider::new(tree_dir)),
            audio: Arc::new(StubDeviceFactory::new()),
            engine,
        }
    }

    /// Swap the stub device for the default host output device
    #[cfg(feature = "desktop_audio")]
    pub fn with_desktop_audio(mut self) -> Self {
        self.audio = Arc::new(crate::audio::engine_cpal::CpalDeviceFactory::new());
        self
    }

    /// Android platform: ContentResolver documents, Oboe audio
    #[cfg(target_os = "android")]
    pub fn android(engine: Arc<dyn EngineSink>) -> Result<Self, BridgeError> {
        use crate::error::StorageError;

        let capabilities = crate::android::host_capabilities()
            .map_err(|e| StorageError::Structural {
                reason: format!("cannot query host capabilities: {}", e),
            })?;
        let provider = crate::storage::android::ContentResolverProvider::from_app_context()?;
        Ok(Self {
            capabilities,
            provider: Arc::new(provider),
            audio: Arc::new(crate::audio::engine_oboe::OboeDeviceFactory::new()),
            engine,
        })
    }
}

/// Main-thread side of a bridge
pub struct HostView {
    input: InputRelay,
    engine: Arc<dyn EngineSink>,
    audio: AudioLifecycle,
    listener: ListenerSlot,
    exit: ExitFlag,
    video_playing: Arc<AtomicBool>,
}

impl HostView {
    /// Host went to background; settings are saved even while exiting
    pub fn on_pause(&self) {
        self.input.activity();
        self.engine.save_settings();
        if !self.exit.is_set() {
            self.audio.pause();
        }
        debug!("host paused");
    }

    pub fn on_resume(&self) {
        if !self.exit.is_set() {
            self.audio.resume();
        }
        self.input.activity();
        debug!("host resumed");
    }

    /// Ask the engine to finish; later input and control messages are dropped
    pub fn exit_app(&self) {
        self.exit.set();
        info!("exit requested");
        self.engine.done();
    }

    pub fn is_exiting(&self) -> bool {
        self.exit.is_set()
    }

    pub fn set_listener(&self, listener: Arc<dyn BridgeEventListener>) {
        self.listener.set(listener);
    }

    pub fn clear_listener(&self) -> Option<Arc<dyn BridgeEventListener>> {
        self.listener.clear()
    }

    /// Teardown: no new event reaches the host after this returns
    pub fn release(&self) {
        self.exit.set();
        if self.listener.clear().is_some() {
            debug!("listener released");
        }
    }

    pub fn key(&self, code: i32, phase: KeyPhase) -> KeyRouting {
        self.input.key(code, phase)
    }

    pub fn send_native_key_press(&self, code: i32) -> KeyRouting {
        self.input.key_press(code)
    }

    pub fn pointer(&self, x: i32, y: i32, action: PointerAction) -> bool {
        self.input.pointer(x, y, action)
    }

    /// Dialog font size, `0` once exiting
    pub fn game_font_size(&self) -> i32 {
        if self.exit.is_set() {
            return 0;
        }
        self.engine.dialog_font_size()
    }

    pub fn set_font_scaling(&self, scale: f64) {
        if self.exit.is_set() {
            return;
        }
        self.engine.set_font_scale(scale);
    }

    pub fn game_width(&self) -> i32 {
        self.engine.content_size().0
    }

    pub fn game_height(&self) -> i32 {
        self.engine.content_size().1
    }

    pub fn is_video_playing(&self) -> bool {
        self.video_playing.load(Ordering::SeqCst)
    }
}

/// Engine-facing half: every call the engine makes across the native
/// boundary lands here
///
/// Boundary methods never fail: errors are logged and mapped to the
/// engine's failure values.
pub struct EngineServices {
    audio: Mutex<AudioBridge>,
    resolver: FileResolver,
    provisioner: DescriptorProvisioner,
    relay: RelaySender,
    listener: ListenerSlot,
    exit: ExitFlag,
    video_playing: Arc<AtomicBool>,
}

impl EngineServices {
    fn audio(&self) -> MutexGuard<'_, AudioBridge> {
        match self.audio.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn resolver(&self) -> &FileResolver {
        &self.resolver
    }

    pub fn provisioner(&self) -> &DescriptorProvisioner {
        &self.provisioner
    }

    /// `initAudio`: effective buffer size in bytes, `-1` on failure
    pub fn init_audio(&self, rate: i32, channels: i32, encoding: i32, min_buffer_size: i32) -> i32 {
        match self.audio().initialize(rate, channels, encoding, min_buffer_size) {
            Ok(size) => i32::try_from(size).unwrap_or(i32::MAX),
            Err(e) => {
                log_audio_error(&e, "initAudio");
                -1
            }
        }
    }

    /// `fillBuffer`: blocks while paused; `1` once written, `-1` on failure
    pub fn fill_buffer(&self) -> i32 {
        match self.fill_unlocked() {
            Ok(()) => 1,
            Err(e) => {
                log_audio_error(&e, "fillBuffer");
                -1
            }
        }
    }

    /// `fill_request` with the pause wait outside the audio lock, so
    /// teardown and buffer access are never queued behind a parked fill
    fn fill_unlocked(&self) -> Result<(), AudioError> {
        loop {
            let (lifecycle, poll_interval) = {
                let mut audio = self.audio();
                if audio.try_fill()? {
                    return Ok(());
                }
                (audio.lifecycle(), audio.poll_interval())
            };
            lifecycle.wait_while_paused(poll_interval)?;
        }
    }

    /// `getBuffer`: run `f` against the engine's PCM buffer
    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let mut audio = self.audio();
        match audio.buffer_mut() {
            Ok(buffer) => Some(f(buffer)),
            Err(e) => {
                log_audio_error(&e, "getBuffer");
                None
            }
        }
    }

    /// Raw view of the PCM buffer for the C boundary
    ///
    /// The pointer stays valid until `deinit_audio`: the buffer is allocated
    /// once per session and never reallocated.
    pub fn buffer_raw(&self) -> Option<(*mut u8, usize)> {
        self.with_buffer(|buffer| (buffer.as_mut_ptr(), buffer.len()))
    }

    /// `deinitAudio`
    pub fn deinit_audio(&self) -> i32 {
        self.audio().teardown();
        1
    }

    /// `initAudioThread`: raise the calling thread's priority once
    pub fn init_audio_thread(&self) -> i32 {
        self.audio().init_audio_thread();
        1
    }

    /// `getFD`: descriptor or `-1`; ownership passes to the caller
    pub fn get_fd(&self, path: &str, mode: i32) -> i32 {
        match self.resolver.resolve(path) {
            Some(locator) => self.provisioner.open(&locator, OpenMode::from_engine(mode)),
            None => INVALID_FD,
        }
    }

    /// `getStat`: last modification in milliseconds since the epoch, `-1`
    /// when missing
    pub fn get_stat(&self, path: &str) -> i64 {
        match self.resolver.resolve(path) {
            Some(locator) => self.provisioner.stat(&locator),
            None => -1,
        }
    }

    /// `mkdir`: `0` on success, `-1` otherwise
    pub fn mkdir(&self, path: &str) -> i32 {
        match self.resolver.resolve(path) {
            Some(locator) => self.provisioner.mkdir(&locator),
            None => -1,
        }
    }

    /// `playVideo`: hand the video to the host listener and wait for it
    pub fn play_video(&self, path: &str, click_to_skip: bool, should_loop: bool) {
        if self.exit.is_set() || !self.listener.is_set() {
            debug!(path, "video request ignored");
            return;
        }
        let Some(locator) = self.resolver.resolve(path) else {
            warn!(path, "video path did not resolve");
            return;
        };
        if !self.provisioner.exists(&locator) {
            warn!(path, locator = %locator, "video not found");
            return;
        }

        self.video_playing.store(true, Ordering::SeqCst);
        info!(locator = %locator, click_to_skip, should_loop, "playing video");
        self.listener
            .with(|listener| listener.video_requested(&locator, click_to_skip, should_loop));
        self.video_playing.store(false, Ordering::SeqCst);
    }

    /// `receiveException`: engine-reported script fault
    pub fn receive_exception(&self, message: &str, current_line: Option<&str>, backtrace: &str) {
        self.relay.post_native_error(NativeScriptError {
            message: message.to_string(),
            current_line: current_line.map(str::to_string),
            backtrace: backtrace.to_string(),
        });
    }

    /// `receiveMessage`: mode toggle or user message
    pub fn receive_message(&self, mode: i32, flag: bool) {
        self.relay.post_control(mode, flag);
    }

    /// `onFinish`: the engine ran to completion
    pub fn on_finish(&self) {
        self.exit.set();
        info!("engine finished");
        self.relay.post_game_finished();
    }
}

/// Builds a [`Bridge`] from construction-time options
#[derive(Debug, Clone)]
pub struct BridgeBuilder {
    config: BridgeConfig,
}

impl BridgeBuilder {
    pub fn new(game_root: impl Into<String>) -> Self {
        Self::from_config(BridgeConfig::new(game_root))
    }

    pub fn from_config(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn font_path(mut self, path: impl Into<String>) -> Self {
        self.config = self.config.font_path(path);
        self
    }

    pub fn screenshot_path(mut self, path: impl Into<String>) -> Self {
        self.config = self.config.screenshot_path(path);
        self
    }

    pub fn use_hq_audio(mut self) -> Self {
        self.config = self.config.use_hq_audio();
        self
    }

    pub fn use_render_outline(mut self) -> Self {
        self.config = self.config.use_render_outline();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config = self.config.language(language);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Derive the grant, open the game once and wire every component
    ///
    /// # Errors
    /// `BridgeError::Storage` when the game root cannot be turned into a
    /// grant, including a content-scheme root on a host without persisted
    /// tree permissions.
    pub fn build(self, platform: Platform) -> Result<Bridge, BridgeError> {
        let Platform {
            capabilities,
            provider,
            audio,
            engine,
        } = platform;

        let game = GameRoot::parse(&self.config.game_root, &capabilities)?;
        let use_host_io = game.grant.is_tree();
        let game_dir = game.engine_directory();

        // open-only init so the content size is known before the first layout
        engine.init(game_dir.as_deref(), &self.config.engine_flags(use_host_io, true));

        let exit = ExitFlag::new();
        let listener = ListenerSlot::new();
        let video_playing = Arc::new(AtomicBool::new(false));
        let (sender, dispatcher) = relay(listener.clone(), exit.clone());
        let audio = AudioBridge::with_poll_interval(audio, self.config.audio.pause_poll_interval());

        let host = HostView {
            input: InputRelay::new(Arc::clone(&engine), exit.clone()),
            engine: Arc::clone(&engine),
            audio: audio.lifecycle(),
            listener: listener.clone(),
            exit: exit.clone(),
            video_playing: Arc::clone(&video_playing),
        };

        let surface = SurfaceAdapter::new(
            engine,
            exit.clone(),
            EngineLaunch {
                game_dir: game_dir.clone(),
                flags: self.config.engine_flags(use_host_io, false),
            },
        );

        info!(
            game_root = %self.config.game_root,
            host_io = use_host_io,
            game_dir = ?game_dir,
            "bridge built"
        );

        let services = EngineServices {
            audio: Mutex::new(audio),
            resolver: FileResolver::new(game),
            provisioner: DescriptorProvisioner::new(provider, capabilities),
            relay: sender,
            listener,
            exit,
            video_playing,
        };

        Ok(Bridge {
            host,
            services: Arc::new(services),
            dispatcher,
            surface,
        })
    }
}

/// One fully wired bridge
pub struct Bridge {
    pub host: HostView,
    pub services: Arc<EngineServices>,
    pub dispatcher: Dispatcher,
    pub surface: SurfaceAdapter,
}

impl Bridge {
    /// Make these services the target of the native boundary
    pub fn activate(&self) -> Result<(), BridgeError> {
        registry::install(Arc::clone(&self.services))
    }

    /// Exit flag first, then listener, registry entry and audio
    ///
    /// The device is stopped through the lifecycle handle before the session
    /// is closed, which releases a `fill_buffer` parked on a pause.
    pub fn teardown(&self) {
        self.host.release();
        registry::release(&self.services);
        self.host.audio.stop();
        self.services.deinit_audio();
        info!("bridge torn down");
    }
}
