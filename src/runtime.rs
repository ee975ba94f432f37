//! Process-wide state: one-time FFmpeg initialization and the optional
//! platform runtime that hardware decoders need (the JVM on Android).

use std::ffi::c_void;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::decode::EngineError;

static FFMPEG: OnceCell<Result<(), String>> = OnceCell::new();

/// Opaque platform runtime reference handed in by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeToken(usize);

impl RuntimeToken {
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        (!ptr.is_null()).then_some(Self(ptr as usize))
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

static PLATFORM_RUNTIME: Mutex<Option<RuntimeToken>> = parking_lot::const_mutex(None);

/// Initialize FFmpeg once per process. Later calls return the first outcome.
pub fn init() -> Result<(), EngineError> {
    FFMPEG
        .get_or_init(|| {
            let result = ffmpeg_next::init().map_err(|e| e.to_string());
            match &result {
                Ok(()) => log::info!("ffmpeg initialized"),
                Err(e) => log::error!("ffmpeg init failed: {}", e),
            }
            result
        })
        .clone()
        .map_err(|reason| EngineError::OpenInput {
            path: Default::default(),
            reason,
        })
}

#[cfg(target_os = "android")]
mod jni {
    use std::ffi::{c_int, c_void};

    extern "C" {
        // libavcodec/jni.h
        pub fn av_jni_set_java_vm(vm: *mut c_void, log_ctx: *mut c_void) -> c_int;
    }
}

/// Hand the JavaVM to FFmpeg's MediaCodec wrapper codecs.
/// FFmpeg keeps the first VM it is given for the life of the process.
#[cfg(target_os = "android")]
fn forward_to_ffmpeg(token: RuntimeToken) -> Result<(), i32> {
    // SAFETY: the host hands in its JavaVM pointer, which outlives the process-wide registration
    let ret = unsafe { jni::av_jni_set_java_vm(token.as_ptr(), std::ptr::null_mut()) };
    if ret < 0 {
        Err(ret)
    } else {
        Ok(())
    }
}

#[cfg(not(target_os = "android"))]
fn forward_to_ffmpeg(_token: RuntimeToken) -> Result<(), i32> {
    Ok(())
}

/// Register the platform runtime and pass it on to FFmpeg. Returns `false`
/// when one is already registered or FFmpeg refuses it; the first
/// registration wins until [`teardown_platform_runtime`].
pub fn register_platform_runtime(token: RuntimeToken) -> bool {
    register_with(token, forward_to_ffmpeg)
}

fn register_with(token: RuntimeToken, forward: impl FnOnce(RuntimeToken) -> Result<(), i32>) -> bool {
    let mut slot = PLATFORM_RUNTIME.lock();
    if slot.is_some() {
        log::debug!("platform runtime already registered");
        return false;
    }
    if let Err(code) = forward(token) {
        log::error!("ffmpeg rejected the platform runtime: error {}", code);
        return false;
    }
    *slot = Some(token);
    log::info!("platform runtime registered");
    true
}

/// Forget the registered platform runtime. Hardware decoders are not
/// attempted again until a runtime is registered.
pub fn teardown_platform_runtime() {
    if PLATFORM_RUNTIME.lock().take().is_some() {
        log::info!("platform runtime released");
    }
}

pub fn platform_runtime() -> Option<RuntimeToken> {
    *PLATFORM_RUNTIME.lock()
}

/// Whether hardware decoders can be opened. Android hardware decoders
/// need the JVM; other platforms need nothing.
pub fn hardware_runtime_ready() -> bool {
    !cfg!(target_os = "android") || platform_runtime().is_some()
}
