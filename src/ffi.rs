//! JNI entry points for `com.google.sample.echo.MainActivity`.
//!
//! `createSLEngine` hands Java an owned engine as an opaque `jlong`; every
//! other call receives that handle back. A handle of 0 means "no engine" and
//! is ignored. `deleteSLEngine` consumes the handle.

use jni::objects::JClass;
use jni::sys::{jboolean, jint, jlong, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;

use crate::engine::EchoEngine;
use crate::error::{log_echo_error, EchoError};

fn into_handle(engine: EchoEngine) -> jlong {
    Box::into_raw(Box::new(engine)) as jlong
}

/// # Safety
/// `handle` must be 0 or a value returned by `createSLEngine` that has not
/// yet been passed to `deleteSLEngine`, and Java must not call into the same
/// handle from two threads at once.
unsafe fn engine_mut<'a>(handle: jlong) -> Option<&'a mut EchoEngine> {
    (handle as *mut EchoEngine).as_mut()
}

fn as_jboolean(result: Result<(), EchoError>, context: &str) -> jboolean {
    match result {
        Ok(()) => JNI_TRUE,
        Err(err) => {
            log_echo_error(&err, context);
            JNI_FALSE
        }
    }
}

fn log_failure(result: Result<(), EchoError>, context: &str) {
    if let Err(err) = result {
        log_echo_error(&err, context);
    }
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_createSLEngine(
    _env: JNIEnv,
    _class: JClass,
    sample_rate: jint,
    frames_per_buffer: jint,
) -> jlong {
    let mut engine = EchoEngine::with_platform_defaults();
    match engine.create_engine(sample_rate, frames_per_buffer) {
        Ok(()) => into_handle(engine),
        Err(err) => {
            log_echo_error(&err, "createSLEngine");
            0
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_deleteSLEngine(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if handle == 0 {
        return;
    }
    // SAFETY: the handle came from `createSLEngine` and Java gives it up here.
    let mut engine = unsafe { Box::from_raw(handle as *mut EchoEngine) };
    // Dropping the box releases any streams left behind.
    log_failure(engine.delete_engine(), "deleteSLEngine");
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_createSLBufferQueueAudioPlayer(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jboolean {
    // SAFETY: see `engine_mut`.
    match unsafe { engine_mut(handle) } {
        Some(engine) => as_jboolean(engine.create_player(), "createSLBufferQueueAudioPlayer"),
        None => JNI_FALSE,
    }
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_deleteSLBufferQueueAudioPlayer(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    // SAFETY: see `engine_mut`.
    if let Some(engine) = unsafe { engine_mut(handle) } {
        log_failure(engine.delete_player(), "deleteSLBufferQueueAudioPlayer");
    }
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_createAudioRecorder(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jboolean {
    // SAFETY: see `engine_mut`.
    match unsafe { engine_mut(handle) } {
        Some(engine) => as_jboolean(engine.create_recorder(), "createAudioRecorder"),
        None => JNI_FALSE,
    }
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_deleteAudioRecorder(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    // SAFETY: see `engine_mut`.
    if let Some(engine) = unsafe { engine_mut(handle) } {
        log_failure(engine.delete_recorder(), "deleteAudioRecorder");
    }
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_startPlay(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    // SAFETY: see `engine_mut`.
    if let Some(engine) = unsafe { engine_mut(handle) } {
        log_failure(engine.start_echo(), "startPlay");
    }
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_stopPlay(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    // SAFETY: see `engine_mut`.
    if let Some(engine) = unsafe { engine_mut(handle) } {
        log_failure(engine.stop_echo(), "stopPlay");
    }
}

#[no_mangle]
pub extern "system" fn Java_com_google_sample_echo_MainActivity_setRecordPermission(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
    granted: jboolean,
) {
    // SAFETY: see `engine_mut`.
    if let Some(engine) = unsafe { engine_mut(handle) } {
        engine.set_capture_permission(granted != JNI_FALSE);
    }
}
