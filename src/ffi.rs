//! C ABI between the engine and the bridge.
//!
//! `ons_bridge_*` exports are the calls the engine makes into the bridge.
//! Each resolves the active bridge through [`crate::registry`] and returns
//! the engine's failure value when none is registered. [`EngineVTable`] is
//! the other direction: function pointers the engine hands over so the
//! bridge can call into it.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::ptr;

use tracing::warn;

use crate::bridge::EngineServices;
use crate::engine_sink::EngineSink;
use crate::registry;

fn with_active<R>(call: &str, fallback: R, f: impl FnOnce(&EngineServices) -> R) -> R {
    match registry::active() {
        Ok(services) => f(&services),
        Err(e) => {
            warn!(call, error = %e, "native call without an active bridge");
            fallback
        }
    }
}

/// Borrow a C string; `None` for null or non-UTF-8 input
///
/// # Safety
/// `s` must be null or point to a NUL-terminated string that outlives the
/// returned borrow.
unsafe fn c_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

#[no_mangle]
pub extern "C" fn ons_bridge_init_audio(
    rate: c_int,
    channels: c_int,
    encoding: c_int,
    min_buffer_size: c_int,
) -> c_int {
    with_active("initAudio", -1, |s| {
        s.init_audio(rate, channels, encoding, min_buffer_size)
    })
}

#[no_mangle]
pub extern "C" fn ons_bridge_fill_buffer() -> c_int {
    with_active("fillBuffer", -1, |s| s.fill_buffer())
}

/// PCM buffer of the current audio session, null before `initAudio`
///
/// # Safety
/// `len` must be null or valid for a write. The buffer stays valid until
/// `ons_bridge_deinit_audio`.
#[no_mangle]
pub unsafe extern "C" fn ons_bridge_get_buffer(len: *mut usize) -> *mut u8 {
    let (data, size) = with_active("getBuffer", None, |s| s.buffer_raw()).unwrap_or((ptr::null_mut(), 0));
    if !len.is_null() {
        *len = size;
    }
    data
}

#[no_mangle]
pub extern "C" fn ons_bridge_deinit_audio() -> c_int {
    with_active("deinitAudio", -1, |s| s.deinit_audio())
}

#[no_mangle]
pub extern "C" fn ons_bridge_init_audio_thread() -> c_int {
    with_active("initAudioThread", -1, |s| s.init_audio_thread())
}

/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ons_bridge_get_fd(path: *const c_char, mode: c_int) -> c_int {
    let Some(path) = c_str(path) else {
        return -1;
    };
    with_active("getFD", -1, |s| s.get_fd(path, mode))
}

/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ons_bridge_get_stat(path: *const c_char) -> i64 {
    let Some(path) = c_str(path) else {
        return -1;
    };
    with_active("getStat", -1, |s| s.get_stat(path))
}

/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ons_bridge_mkdir(path: *const c_char) -> c_int {
    let Some(path) = c_str(path) else {
        return -1;
    };
    with_active("mkdir", -1, |s| s.mkdir(path))
}

/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ons_bridge_play_video(path: *const c_char, click_to_skip: bool, should_loop: bool) {
    if let Some(path) = c_str(path) {
        with_active("playVideo", (), |s| s.play_video(path, click_to_skip, should_loop));
    }
}

/// # Safety
/// Every argument must be null or a valid NUL-terminated string;
/// `current_line` may be null.
#[no_mangle]
pub unsafe extern "C" fn ons_bridge_receive_exception(
    message: *const c_char,
    current_line: *const c_char,
    backtrace: *const c_char,
) {
    let message = c_str(message).unwrap_or("<invalid message>");
    let current_line = c_str(current_line);
    let backtrace = c_str(backtrace).unwrap_or("");
    with_active("receiveException", (), |s| {
        s.receive_exception(message, current_line, backtrace)
    });
}

#[no_mangle]
pub extern "C" fn ons_bridge_receive_message(mode: c_int, flag: bool) {
    with_active("receiveMessage", (), |s| s.receive_message(mode, flag));
}

#[no_mangle]
pub extern "C" fn ons_bridge_on_finish() {
    with_active("onFinish", (), |s| s.on_finish());
}

/// Entry points of the engine, filled in by the engine at startup
#[repr(C)]
#[derive(Clone, Copy)]
pub struct EngineVTable {
    pub user_data: *mut c_void,
    pub key: extern "C" fn(*mut c_void, c_int, c_int),
    pub pointer: extern "C" fn(*mut c_void, c_int, c_int, c_int),
    pub resize: extern "C" fn(*mut c_void, c_int, c_int),
    /// `game_dir` may be null; `argv` holds `argc` flags
    pub init: extern "C" fn(*mut c_void, *const c_char, *const *const c_char, c_int),
    pub done: extern "C" fn(*mut c_void),
    pub save_settings: extern "C" fn(*mut c_void),
    pub content_width: extern "C" fn(*mut c_void) -> c_int,
    pub content_height: extern "C" fn(*mut c_void) -> c_int,
    pub set_font_scale: extern "C" fn(*mut c_void, f64),
    pub dialog_font_size: extern "C" fn(*mut c_void) -> c_int,
}

// SAFETY: the engine's entry points are callable from any thread and
// `user_data` is only ever passed back to them.
unsafe impl Send for EngineVTable {}
unsafe impl Sync for EngineVTable {}

impl EngineSink for EngineVTable {
    fn key(&self, code: i32, phase: i32) {
        (self.key)(self.user_data, code, phase);
    }

    fn pointer(&self, x: i32, y: i32, action: i32) {
        (self.pointer)(self.user_data, x, y, action);
    }

    fn resize(&self, width: i32, height: i32) {
        (self.resize)(self.user_data, width, height);
    }

    fn init(&self, game_dir: Option<&str>, flags: &[String]) {
        let game_dir = game_dir.and_then(|dir| CString::new(dir).ok());
        let flags: Vec<CString> = flags
            .iter()
            .filter_map(|flag| CString::new(flag.as_str()).ok())
            .collect();
        let argv: Vec<*const c_char> = flags.iter().map(|flag| flag.as_ptr()).collect();
        (self.init)(
            self.user_data,
            game_dir.as_ref().map_or(ptr::null(), |dir| dir.as_ptr()),
            argv.as_ptr(),
            argv.len() as c_int,
        );
    }

    fn done(&self) {
        (self.done)(self.user_data);
    }

    fn save_settings(&self) {
        (self.save_settings)(self.user_data);
    }

    fn content_size(&self) -> (i32, i32) {
        (
            (self.content_width)(self.user_data),
            (self.content_height)(self.user_data),
        )
    }

    fn set_font_scale(&self, scale: f64) {
        (self.set_font_scale)(self.user_data, scale);
    }

    fn dialog_font_size(&self) -> i32 {
        (self.dialog_font_size)(self.user_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeBuilder, Platform};
    use crate::engine_sink::RecordingSink;
    use crate::registry::TEST_GUARD;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_calls_without_bridge_fail() {
        let _guard = TEST_GUARD.lock().unwrap_or_else(|e| e.into_inner());
        let path = CString::new("0.txt").unwrap();
        assert_eq!(ons_bridge_init_audio(44100, 2, 1, 2048), -1);
        assert_eq!(ons_bridge_fill_buffer(), -1);
        assert_eq!(unsafe { ons_bridge_get_stat(path.as_ptr()) }, -1);
        assert_eq!(unsafe { ons_bridge_get_fd(path.as_ptr(), 0) }, -1);
        let mut len = 7usize;
        assert!(unsafe { ons_bridge_get_buffer(&mut len) }.is_null());
        assert_eq!(len, 0);
        ons_bridge_on_finish();
    }

    #[test]
    fn test_exports_reach_active_bridge() {
        let _guard = TEST_GUARD.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0.txt"), b"script").unwrap();
        let platform = Platform::headless(
            dir.path(),
            dir.path().join("private"),
            Arc::new(RecordingSink::new()),
        );
        let bridge = BridgeBuilder::new(dir.path().to_string_lossy().to_string())
            .build(platform)
            .unwrap();
        bridge.activate().unwrap();

        let script = CString::new("0.txt").unwrap();
        let missing = CString::new("missing.txt").unwrap();
        assert!(unsafe { ons_bridge_get_stat(script.as_ptr()) } > 0);
        assert_eq!(unsafe { ons_bridge_get_stat(missing.as_ptr()) }, -1);
        assert_eq!(unsafe { ons_bridge_get_stat(ptr::null()) }, -1);

        assert_eq!(ons_bridge_init_audio(44100, 2, 1, 2048), 4096);
        let mut len = 0usize;
        let data = unsafe { ons_bridge_get_buffer(&mut len) };
        assert!(!data.is_null());
        assert_eq!(len, 4096);
        assert_eq!(ons_bridge_fill_buffer(), 1);

        bridge.teardown();
        assert_eq!(ons_bridge_deinit_audio(), -1);
    }

    struct Engine {
        calls: Mutex<Vec<String>>,
    }

    extern "C" fn key(data: *mut c_void, code: c_int, phase: c_int) {
        let engine = unsafe { &*(data as *const Engine) };
        engine.calls.lock().unwrap().push(format!("key {} {}", code, phase));
    }
    extern "C" fn pointer(_: *mut c_void, _: c_int, _: c_int, _: c_int) {}
    extern "C" fn resize(data: *mut c_void, w: c_int, h: c_int) {
        let engine = unsafe { &*(data as *const Engine) };
        engine.calls.lock().unwrap().push(format!("resize {}x{}", w, h));
    }
    extern "C" fn init(data: *mut c_void, dir: *const c_char, argv: *const *const c_char, argc: c_int) {
        let engine = unsafe { &*(data as *const Engine) };
        let dir = unsafe { c_str(dir) }.unwrap_or("<none>").to_string();
        let args: Vec<String> = (0..argc as usize)
            .map(|i| unsafe { c_str(*argv.add(i)) }.unwrap_or("").to_string())
            .collect();
        engine.calls.lock().unwrap().push(format!("init {} {}", dir, args.join(" ")));
    }
    extern "C" fn nothing(_: *mut c_void) {}
    extern "C" fn width(_: *mut c_void) -> c_int {
        640
    }
    extern "C" fn height(_: *mut c_void) -> c_int {
        480
    }
    extern "C" fn font_scale(_: *mut c_void, _: f64) {}
    extern "C" fn font_size(_: *mut c_void) -> c_int {
        18
    }

    #[test]
    fn test_vtable_forwards_into_engine() {
        let engine = Engine {
            calls: Mutex::new(Vec::new()),
        };
        let vtable = EngineVTable {
            user_data: &engine as *const Engine as *mut c_void,
            key,
            pointer,
            resize,
            init,
            done: nothing,
            save_settings: nothing,
            content_width: width,
            content_height: height,
            set_font_scale: font_scale,
            dialog_font_size: font_size,
        };

        vtable.key(66, 1);
        vtable.resize(1440, 1080);
        vtable.init(None, &["--language".to_string(), "en".to_string()]);
        vtable.init(Some("/games/demo"), &[]);
        assert_eq!(vtable.content_size(), (640, 480));
        assert_eq!(vtable.dialog_font_size(), 18);
        assert_eq!(
            *engine.calls.lock().unwrap(),
            vec![
                "key 66 1".to_string(),
                "resize 1440x1080".to_string(),
                "init <none> --language en".to_string(),
                "init /games/demo ".to_string(),
            ]
        );
    }
}
