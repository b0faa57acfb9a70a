//! Real-time capture and render callbacks
//!
//! The platform owns the audio threads and invokes these callbacks once per
//! buffer period. Each callback struct carries everything it needs by `Arc`,
//! so a backend only has to move it into its stream.
//!
//! # Real-Time Safety
//! Inside `on_capture` / `on_render`:
//! - No heap allocations
//! - No locks, no logging, no I/O
//! - No error propagation: malformed buffers set a fault flag instead
//!
//! # Architecture
//! ```text
//! Recorder::create()
//!   └─> CaptureCallback::new(ring, gate)
//!       └─> AudioBackend::open_capture()
//!           └─> CaptureCallback::on_capture() [capture thread]
//!               └─> RingBuffer::write()
//!
//! Player::create()
//!   └─> RenderCallback::new(ring, gate)
//!       └─> AudioBackend::open_render()
//!           └─> RenderCallback::on_render() [render thread]
//!               └─> RingBuffer::read() (silence on underrun)
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::format::Sample;
use super::ring_buffer::RingBuffer;

/// Running flag plus in-flight tracking for one stream's callback.
///
/// The controlling thread opens and closes the gate; the audio thread enters
/// it on every invocation. `close_and_wait` returns only once no invocation
/// is inside the gate and none can enter again.
#[derive(Debug, Default)]
pub struct CallbackGate {
    running: AtomicBool,
    in_flight: AtomicUsize,
    invocations: AtomicU64,
    frames: AtomicU64,
    fault: AtomicBool,
}

/// Proof that a callback is inside the gate; leaving drops the in-flight count
pub struct GatePass<'a> {
    gate: &'a CallbackGate,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CallbackGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow callbacks to run
    pub fn open(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Stop admitting callbacks without waiting
    pub fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Enter from the audio thread; `None` when the gate is closed.
    #[inline]
    pub fn enter(&self) -> Option<GatePass<'_>> {
        // SeqCst on both sides: either `close` sees this increment or this
        // load sees the cleared flag.
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if !self.running.load(Ordering::SeqCst) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        self.invocations.fetch_add(1, Ordering::Relaxed);
        Some(GatePass { gate: self })
    }

    /// Close the gate and block the controlling thread until quiescent.
    pub fn close_and_wait(&self) {
        self.close();
        let mut spins = 0u32;
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            // An in-flight callback finishes within one buffer period.
            if spins < 64 {
                std::hint::spin_loop();
                spins += 1;
            } else {
                thread::sleep(Duration::from_micros(100));
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Callback invocations admitted through the gate
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Frames moved by admitted invocations
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    #[inline]
    fn add_frames(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Flag a stream fault; safe to call from any thread, including the
    /// platform's error callback.
    #[inline]
    pub fn report_fault(&self) {
        self.fault.store(true, Ordering::Relaxed);
    }

    /// Read and clear the fault flag
    pub fn take_fault(&self) -> bool {
        self.fault.swap(false, Ordering::Relaxed)
    }
}

/// Capture side: device buffer in, ring buffer out.
pub struct CaptureCallback {
    ring: Arc<RingBuffer>,
    gate: Arc<CallbackGate>,
    channels: usize,
}

impl CaptureCallback {
    pub fn new(ring: Arc<RingBuffer>, gate: Arc<CallbackGate>) -> Self {
        let channels = ring.channels() as usize;
        Self {
            ring,
            gate,
            channels,
        }
    }

    /// Gate shared with the owning recorder
    pub fn gate(&self) -> Arc<CallbackGate> {
        Arc::clone(&self.gate)
    }

    /// Handle one filled capture buffer of interleaved samples.
    #[inline]
    pub fn on_capture(&mut self, data: &[Sample]) {
        // Real-time audio callback - NO ALLOCATIONS, LOCKS, OR BLOCKING!
        let Some(_pass) = self.gate.enter() else {
            return;
        };

        if data.len() % self.channels != 0 {
            self.gate.report_fault();
        }
        let written = self.ring.write(data);
        self.gate.add_frames(written);
    }
}

/// Render side: ring buffer in, device buffer out.
pub struct RenderCallback {
    ring: Arc<RingBuffer>,
    gate: Arc<CallbackGate>,
    channels: usize,
}

impl RenderCallback {
    pub fn new(ring: Arc<RingBuffer>, gate: Arc<CallbackGate>) -> Self {
        let channels = ring.channels() as usize;
        Self {
            ring,
            gate,
            channels,
        }
    }

    pub fn gate(&self) -> Arc<CallbackGate> {
        Arc::clone(&self.gate)
    }

    /// Fill one render buffer of interleaved samples.
    ///
    /// The buffer is always fully written: captured frames first, silence
    /// for the rest, or all silence when the gate is closed.
    #[inline]
    pub fn on_render(&mut self, out: &mut [Sample]) {
        // Real-time audio callback - NO ALLOCATIONS, LOCKS, OR BLOCKING!
        let Some(_pass) = self.gate.enter() else {
            out.fill(0);
            return;
        };

        if out.len() % self.channels != 0 {
            self.gate.report_fault();
        }
        self.ring.read(out);
        self.gate.add_frames(out.len() / self.channels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(frames: usize, channels: u16) -> (Arc<RingBuffer>, Arc<CallbackGate>, Arc<CallbackGate>) {
        (
            Arc::new(RingBuffer::new(frames, channels).unwrap()),
            Arc::new(CallbackGate::new()),
            Arc::new(CallbackGate::new()),
        )
    }

    #[test]
    fn test_closed_gate_renders_silence_and_skips_capture() {
        let (ring, capture_gate, render_gate) = shared(16, 1);
        let mut capture = CaptureCallback::new(Arc::clone(&ring), Arc::clone(&capture_gate));
        let mut render = RenderCallback::new(Arc::clone(&ring), Arc::clone(&render_gate));

        capture.on_capture(&[1, 2, 3]);
        assert_eq!(ring.available(), 0);

        let mut out = [7i16; 4];
        render.on_render(&mut out);
        assert_eq!(out, [0; 4]);
        assert_eq!(capture_gate.invocations(), 0);
        assert_eq!(render_gate.invocations(), 0);
    }

    #[test]
    fn test_open_gates_pass_audio_through() {
        let (ring, capture_gate, render_gate) = shared(16, 1);
        let mut capture = CaptureCallback::new(Arc::clone(&ring), Arc::clone(&capture_gate));
        let mut render = RenderCallback::new(Arc::clone(&ring), Arc::clone(&render_gate));
        capture_gate.open();
        render_gate.open();

        capture.on_capture(&[10, 20, 30]);
        let mut out = [0i16; 4];
        render.on_render(&mut out);

        assert_eq!(out, [10, 20, 30, 0]);
        assert_eq!(capture_gate.frames(), 3);
        assert_eq!(render_gate.frames(), 4);
        assert_eq!(capture_gate.invocations(), 1);
        assert_eq!(render_gate.invocations(), 1);
    }

    #[test]
    fn test_misaligned_buffer_raises_fault() {
        let (ring, capture_gate, _) = shared(16, 2);
        let mut capture = CaptureCallback::new(Arc::clone(&ring), Arc::clone(&capture_gate));
        capture_gate.open();

        capture.on_capture(&[1, 2, 3]);
        assert_eq!(ring.available(), 1);
        assert!(capture_gate.take_fault());
        assert!(!capture_gate.take_fault());
    }

    #[test]
    fn test_close_and_wait_blocks_until_pass_released() {
        let gate = Arc::new(CallbackGate::new());
        gate.open();

        let pass_holder = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let _pass = gate.enter().expect("gate open");
                thread::sleep(Duration::from_millis(20));
            })
        };

        while gate.in_flight() == 0 {
            std::hint::spin_loop();
        }
        gate.close_and_wait();
        assert_eq!(gate.in_flight(), 0);
        assert!(gate.enter().is_none());
        pass_holder.join().unwrap();
    }
}
