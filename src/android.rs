// Android JNI glue shared by the content provider and the audio backend

use jni::objects::{GlobalRef, JObject, JString, JValue};
use jni::{JNIEnv, JavaVM};
use once_cell::sync::OnceCell;

use crate::storage::HostCapabilities;

/// `android.os.Process.THREAD_PRIORITY_URGENT_AUDIO`
pub const THREAD_PRIORITY_URGENT_AUDIO: i32 = -19;

static JAVA_VM: OnceCell<JavaVM> = OnceCell::new();
static APP_CONTEXT: OnceCell<GlobalRef> = OnceCell::new();

/// Cache the VM handed to `JNI_OnLoad`.
pub fn register_vm(vm: JavaVM) {
    if JAVA_VM.set(vm).is_err() {
        log::debug!("JavaVM already registered");
    }
}

/// Publish the application context to `ndk-context` (used by Oboe) and to
/// the JNI-backed providers. Only the first call has an effect.
pub fn register_context(env: &mut JNIEnv, context: &JObject) -> jni::errors::Result<()> {
    if APP_CONTEXT.get().is_some() {
        return Ok(());
    }
    let vm = env.get_java_vm()?;
    let global = env.new_global_ref(context)?;
    // SAFETY: both pointers stay valid for the process lifetime: the VM is
    // never unloaded and `global` is kept in APP_CONTEXT below.
    unsafe {
        ndk_context::initialize_android_context(
            vm.get_java_vm_pointer().cast(),
            global.as_obj().as_raw().cast(),
        );
    }
    let _ = APP_CONTEXT.set(global);
    let _ = JAVA_VM.set(vm);
    Ok(())
}

/// Whether the host registered its application context yet.
pub fn context_registered() -> bool {
    APP_CONTEXT.get().is_some()
}

/// Process-wide JavaVM cached by `JNI_OnLoad`.
pub fn java_vm() -> jni::errors::Result<&'static JavaVM> {
    JAVA_VM.get().ok_or(jni::errors::Error::NullPtr("JavaVM not registered"))
}

/// Attach the calling thread (once) and hand back its environment.
pub fn attach() -> jni::errors::Result<JNIEnv<'static>> {
    java_vm()?.attach_current_thread_permanently()
}

/// Global reference to the application `Context`.
pub fn app_context() -> jni::errors::Result<&'static GlobalRef> {
    APP_CONTEXT
        .get()
        .ok_or(jni::errors::Error::NullPtr("application context not registered"))
}

/// Clear a pending Java exception so later JNI calls on this thread work.
pub fn clear_exception(env: &mut JNIEnv) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
}

pub fn sdk_level(env: &mut JNIEnv) -> jni::errors::Result<i32> {
    env.get_static_field("android/os/Build$VERSION", "SDK_INT", "I")?
        .i()
}

/// `Context.getFilesDir().getAbsolutePath()`
pub fn files_dir(env: &mut JNIEnv) -> jni::errors::Result<String> {
    let context = app_context()?;
    let dir = env
        .call_method(context.as_obj(), "getFilesDir", "()Ljava/io/File;", &[])?
        .l()?;
    let path: JString = env
        .call_method(&dir, "getAbsolutePath", "()Ljava/lang/String;", &[])?
        .l()?
        .into();
    let path: String = env.get_string(&path)?.into();
    Ok(path)
}

/// Storage capabilities of the running device.
pub fn host_capabilities() -> jni::errors::Result<HostCapabilities> {
    let mut env = attach()?;
    let result = sdk_level(&mut env).and_then(|sdk| {
        let dir = files_dir(&mut env)?;
        Ok(HostCapabilities::for_sdk_level(sdk.max(0) as u32, dir))
    });
    if result.is_err() {
        clear_exception(&mut env);
    }
    result
}

/// `android.os.Process.setThreadPriority(priority)` for the calling thread.
pub fn set_thread_priority(priority: i32) -> jni::errors::Result<()> {
    let mut env = attach()?;
    let result = env
        .call_static_method(
            "android/os/Process",
            "setThreadPriority",
            "(I)V",
            &[JValue::Int(priority)],
        )
        .map(|_| ());
    if result.is_err() {
        clear_exception(&mut env);
    }
    result
}

/// `AudioTrack.getMinBufferSize(rate, channelConfig, encoding)` in bytes
pub fn min_track_buffer_size(rate: i32, stereo: bool, pcm16: bool) -> jni::errors::Result<i32> {
    // AudioFormat.CHANNEL_OUT_MONO / CHANNEL_OUT_STEREO
    let channel_config = if stereo { 12 } else { 4 };
    // AudioFormat.ENCODING_PCM_16BIT / ENCODING_PCM_8BIT
    let encoding = if pcm16 { 2 } else { 3 };
    let mut env = attach()?;
    let result = env
        .call_static_method(
            "android/media/AudioTrack",
            "getMinBufferSize",
            "(III)I",
            &[
                JValue::Int(rate),
                JValue::Int(channel_config),
                JValue::Int(encoding),
            ],
        )
        .and_then(|value| value.i());
    if result.is_err() {
        clear_exception(&mut env);
    }
    result
}
