// Audio Echo Core - Rust Audio Engine
// Low-latency full-duplex echo: microphone in, speaker out, lock-free hand-off

// Module declarations
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
#[cfg(target_os = "android")]
mod ffi;
pub mod telemetry;

// Re-exports for convenience
pub use config::EchoConfig;
pub use engine::{EchoEngine, EngineState};
pub use error::EchoError;

/// Install the global tracing subscriber (Android logcat, tag `AudioEcho`).
///
/// `log` records are bridged into it. Calling this more than once is harmless.
#[cfg(target_os = "android")]
pub fn init_logging(level: tracing::Level) {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    match tracing_android::layer("AudioEcho") {
        Ok(layer) => {
            let _ = tracing_subscriber::registry()
                .with(LevelFilter::from_level(level))
                .with(layer)
                .try_init();
        }
        Err(err) => eprintln!("AudioEcho: logcat unavailable: {}", err),
    }
}

/// Install the global tracing subscriber (stderr formatter).
///
/// `log` records are bridged into it. Calling this more than once is harmless.
#[cfg(not(target_os = "android"))]
pub fn init_logging(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// JNI_OnLoad is called when the native library is loaded by Android
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    _vm: jni::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    init_logging(EchoConfig::load().logging.level_filter());

    log::info!("JNI_OnLoad called - audio echo library loaded");

    // Return JNI version
    jni::sys::JNI_VERSION_1_6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(tracing::Level::DEBUG);
        init_logging(tracing::Level::INFO);
        log::info!("logging initialized");
    }
}
