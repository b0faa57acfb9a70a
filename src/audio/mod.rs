// Audio module - format, lock-free ring buffer, real-time callbacks and the
// Recorder/Player stream pair

pub mod callback;
pub mod format;
pub mod player;
pub mod recorder;
pub mod ring_buffer;
mod stream;

// Re-export commonly used types for convenience
pub use callback::{CallbackGate, CaptureCallback, RenderCallback};
pub use format::{AudioFormat, Sample, SampleFormat};
pub use player::Player;
pub use recorder::{CapturePermission, Recorder};
pub use ring_buffer::{RingBuffer, RingStats};
