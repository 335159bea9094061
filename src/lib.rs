// ONScripter Host Bridge - platform services for an embedded VN engine
// Audio output, sandboxed storage, control relay and surface scaling

// Module declarations
pub mod audio;
pub mod bridge;
pub mod config;
pub mod engine_sink;
pub mod error;
pub mod ffi;
pub mod registry;
pub mod relay;
pub mod storage;
pub mod surface;

#[cfg(target_os = "android")]
pub mod android;

// Re-exports for convenience
pub use bridge::{Bridge, BridgeBuilder, EngineServices, HostView, Platform};
pub use config::{AudioConfig, BridgeConfig};
pub use engine_sink::EngineSink;
pub use relay::{BridgeEventListener, Dispatcher, NativeScriptError, UserMessage};
pub use surface::{compute_viewport, SurfaceAdapter, SurfaceCallbacks};

/// Android log tag of every bridge message
pub const LOG_TAG: &str = "ONScripterBridge";

/// Install the process-wide log sink; later calls are no-ops
pub fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "android")] {
            use tracing_subscriber::layer::SubscriberExt;
            use tracing_subscriber::util::SubscriberInitExt;

            match tracing_android::layer(LOG_TAG) {
                Ok(layer) => {
                    let _ = tracing_subscriber::registry().with(layer).try_init();
                }
                Err(e) => eprintln!("{}: cannot open logcat: {}", LOG_TAG, e),
            }
        } else {
            let _ = tracing_subscriber::fmt()
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

/// JNI_OnLoad is called when the native library is loaded by Android
/// This function initializes logging and caches the JavaVM for the
/// content provider and oboe-rs
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(vm: jni::JavaVM, _reserved: *mut std::ffi::c_void) -> jni::sys::jint {
    init_logging();

    log::info!("JNI_OnLoad called - caching JavaVM");
    android::register_vm(vm);

    // Return JNI version
    jni::sys::JNI_VERSION_1_6
}

/// Called by the host view with its application context before the bridge
/// is built; Oboe and the ContentResolver provider need it
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn Java_com_onscripter_ONScripterView_nativeRegisterContext(
    mut env: jni::JNIEnv,
    _class: jni::objects::JClass,
    context: jni::objects::JObject,
) {
    match android::register_context(&mut env, &context) {
        Ok(()) => log::info!("Android context initialized successfully"),
        Err(e) => {
            log::error!("Failed to register Android context: {}", e);
            android::clear_exception(&mut env);
        }
    }
}
