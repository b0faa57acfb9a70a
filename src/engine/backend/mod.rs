//! Backend abstractions over the platform audio API.
//!
//! The platform owns the real-time threads. A backend only opens streams and
//! registers the engine's callbacks with them; it never runs audio threads of
//! its own on behalf of the engine.

use std::time::Instant;

use crate::audio::callback::{CaptureCallback, RenderCallback};
use crate::audio::format::AudioFormat;
use crate::error::EchoError;

/// Trait implemented by platform-specific audio backends.
///
/// `open_capture` / `open_render` open a device at the requested format and
/// hand it the callback, but must not start it.
pub trait AudioBackend: Send + Sync {
    /// Short backend name for logs and stats
    fn name(&self) -> &'static str;

    /// Verify the platform audio context can be opened.
    fn open_context(&self) -> Result<(), EchoError>;

    fn open_capture(
        &self,
        format: &AudioFormat,
        callback: CaptureCallback,
    ) -> Result<Box<dyn DeviceStream>, EchoError>;

    fn open_render(
        &self,
        format: &AudioFormat,
        callback: RenderCallback,
    ) -> Result<Box<dyn DeviceStream>, EchoError>;
}

/// An opened platform stream. Dropping it releases the device.
pub trait DeviceStream {
    /// Ask the platform to begin invoking the registered callback.
    fn start(&mut self) -> Result<(), EchoError>;

    /// Ask the platform to stop invoking the callback.
    ///
    /// Returns once the platform has acknowledged the request.
    fn stop(&mut self) -> Result<(), EchoError>;
}

/// Trait representing a monotonic time source used for telemetry timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "android")] {
        mod oboe;
        pub use self::oboe::OboeBackend;

        /// Backend used when no backend is injected
        pub type PlatformBackend = OboeBackend;
    } else {
        mod cpal;
        pub use self::cpal::{probe_default_devices, CpalBackend, DeviceInfo, DeviceReport};

        /// Backend used when no backend is injected
        pub type PlatformBackend = CpalBackend;
    }
}

mod simulated;
pub use simulated::{FailPoint, SimulatedBackend};
