//! Player - render side of the echo path

use std::sync::Arc;

use super::callback::{CallbackGate, RenderCallback};
use super::format::AudioFormat;
use super::ring_buffer::RingBuffer;
use super::stream::GatedStream;
use crate::engine::backend::AudioBackend;
use crate::error::EchoError;

/// Render stream draining the ring buffer.
///
/// Whenever the ring runs dry the device receives silence, so the render
/// stream never starves.
pub struct Player {
    stream: GatedStream,
    format: AudioFormat,
}

impl Player {
    /// Open the render device and register the render callback, stopped.
    pub fn create(
        backend: &dyn AudioBackend,
        format: &AudioFormat,
        ring: Arc<RingBuffer>,
    ) -> Result<Self, EchoError> {
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
        let callback = RenderCallback::new(ring, Arc::clone(&gate));
        let stream = backend.open_render(format, callback)?;

        log::info!(
            "[Player] Created on {} backend ({} Hz, {} frames/buffer)",
            backend.name(),
            format.sample_rate(),
            format.frames_per_buffer()
        );
        Ok(Self {
            stream: GatedStream::new(stream, gate, "Player"),
            format: *format,
        })
    }

    pub fn start(&mut self) -> Result<(), EchoError> {
        self.stream.start()
    }

    /// Idempotent; returns once no render callback is running.
    pub fn stop(&mut self) -> Result<(), EchoError> {
        self.stream.stop()
    }

    pub fn destroy(mut self) -> Result<(), EchoError> {
        let result = self.stream.stop();
        log::info!("[Player] Destroyed");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::SimulatedBackend;

    #[test]
    fn test_renders_silence_when_ring_is_empty() {
        let backend = SimulatedBackend::new();
        let format = AudioFormat::from_native(48000, 4, 1).unwrap();
        let ring = Arc::new(RingBuffer::new(16, 1).unwrap());
        let mut player = Player::create(&backend, &format, Arc::clone(&ring)).unwrap();
        player.start().unwrap();

        let mut out = [9i16; 4];
        assert!(backend.render(&mut out));
        assert_eq!(out, [0; 4]);
        assert_eq!(ring.stats().underrun_frames, 4);

        ring.write(&[3, 4]);
        assert!(backend.render(&mut out));
        assert_eq!(out, [3, 4, 0, 0]);
        assert_eq!(player.gate().frames(), 8);
    }

    #[test]
    fn test_destroy_releases_device() {
        let backend = SimulatedBackend::new();
        let format = AudioFormat::from_native(48000, 4, 1).unwrap();
        let ring = Arc::new(RingBuffer::new(16, 1).unwrap());
        let mut player = Player::create(&backend, &format, ring).unwrap();
        player.start().unwrap();
        assert!(backend.is_render_started());

        player.destroy().unwrap();
        assert!(!backend.is_render_started());
        assert_eq!(backend.live_streams(), 0);
    }
}
