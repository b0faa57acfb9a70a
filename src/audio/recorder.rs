//! Recorder - capture side of the echo path

use std::sync::Arc;

use serde::Serialize;

use super::callback::{CallbackGate, CaptureCallback};
use super::format::AudioFormat;
use super::ring_buffer::RingBuffer;
use super::stream::GatedStream;
use crate::engine::backend::AudioBackend;
use crate::error::EchoError;

/// Whether the host granted microphone access.
///
/// The permission flow itself belongs to the host application; the engine
/// only records the outcome it is told about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePermission {
    #[default]
    Granted,
    Denied,
}

impl From<bool> for CapturePermission {
    fn from(granted: bool) -> Self {
        if granted {
            CapturePermission::Granted
        } else {
            CapturePermission::Denied
        }
    }
}

/// Capture stream feeding the ring buffer.
pub struct Recorder {
    stream: GatedStream,
    format: AudioFormat,
}

impl Recorder {
    /// Open the capture device and register the capture callback.
    ///
    /// The stream is left stopped.
    ///
    /// # Errors
    /// - `PermissionDenied` when capture permission was not granted
    /// - `UnsupportedFormat` when the ring layout does not match `format`
    /// - any error from the backend's `open_capture`
    pub fn create(
        backend: &dyn AudioBackend,
        format: &AudioFormat,
        ring: Arc<RingBuffer>,
        permission: CapturePermission,
    ) -> Result<Self, EchoError> {
        if permission == CapturePermission::Denied {
            return Err(EchoError::PermissionDenied);
        }
        if ring.channels() != format.channels() {
            return Err(EchoError::UnsupportedFormat {
                reason: format!(
                    "ring buffer has {} channels, format has {}",
                    ring.channels(),
                    format.channels()
                ),
            });
        }

        let gate = Arc::new(CallbackGate::new());
        let callback = CaptureCallback::new(ring, Arc::clone(&gate));
        let stream = backend.open_capture(format, callback)?;

        log::info!(
            "[Recorder] Created on {} backend ({} Hz, {} frames/buffer)",
            backend.name(),
            format.sample_rate(),
            format.frames_per_buffer()
        );
        Ok(Self {
            stream: GatedStream::new(stream, gate, "Recorder"),
            format: *format,
        })
    }

    pub fn start(&mut self) -> Result<(), EchoError> {
        self.stream.start()
    }

    /// Stop capturing; returns once no capture callback is running.
    /// Stopping a stopped recorder is a no-op.
    pub fn stop(&mut self) -> Result<(), EchoError> {
        self.stream.stop()
    }

    /// Stop if needed and release the capture device.
    pub fn destroy(mut self) -> Result<(), EchoError> {
        let result = self.stream.stop();
        log::info!("[Recorder] Destroyed");
        result
    }

    pub fn is_started(&self) -> bool {
        self.stream.is_started()
    }

    pub fn gate(&self) -> Arc<CallbackGate> {
        Arc::clone(self.stream.gate())
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }
}
