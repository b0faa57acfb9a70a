//! Engine statistics snapshots.
//!
//! Counters are maintained with relaxed atomics by the real-time callbacks
//! and the ring buffer; a snapshot is assembled on the controlling thread and
//! is only approximately consistent across fields.

use serde::Serialize;

use crate::audio::{AudioFormat, CallbackGate, RingStats};
use crate::engine::EngineState;

/// Counters for one callback stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub invocations: u64,
    pub frames: u64,
    pub running: bool,
}

impl StreamStats {
    pub fn from_gate(gate: &CallbackGate) -> Self {
        Self {
            invocations: gate.invocations(),
            frames: gate.frames(),
            running: gate.is_running(),
        }
    }
}

/// Snapshot of an engine for CLI output and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct EchoStats {
    pub state: EngineState,
    pub backend: &'static str,
    pub format: Option<AudioFormat>,
    pub ring: RingStats,
    pub capture: StreamStats,
    pub render: StreamStats,
}

impl EchoStats {
    /// Echo round trip bounded by the ring depth, in milliseconds
    pub fn max_latency_ms(&self) -> Option<f64> {
        let format = self.format?;
        Some(self.ring.capacity_frames as f64 * 1000.0 / format.sample_rate() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_stats_reflect_gate() {
        let gate = CallbackGate::new();
        gate.open();
        drop(gate.enter());
        let stats = StreamStats::from_gate(&gate);
        assert_eq!(stats.invocations, 1);
        assert!(stats.running);
    }

    #[test]
    fn test_max_latency_from_ring_depth() {
        let stats = EchoStats {
            state: EngineState::Created,
            backend: "simulated",
            format: Some(AudioFormat::from_native(48000, 192, 1).unwrap()),
            ring: RingStats {
                capacity_frames: 1536,
                ..RingStats::default()
            },
            capture: StreamStats::default(),
            render: StreamStats::default(),
        };
        assert_eq!(stats.max_latency_ms(), Some(32.0));
    }
}
