//! Simulated audio backend for deterministic tests and dry runs.
//!
//! Streams opened here do no real I/O. Whoever holds the backend plays the
//! part of the platform audio threads by calling [`SimulatedBackend::capture`]
//! and [`SimulatedBackend::render`], from any thread. Failures can be
//! scheduled at each lifecycle step to exercise rollback paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::audio::callback::{CaptureCallback, RenderCallback};
use crate::audio::format::{AudioFormat, Sample};
use crate::error::EchoError;

use super::{AudioBackend, DeviceStream};

/// Lifecycle step at which a scheduled failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Context,
    OpenCapture,
    OpenRender,
    StartCapture,
    StartRender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Capture,
    Render,
}

struct Slot<C> {
    id: u64,
    callback: C,
    started: bool,
}

#[derive(Default)]
struct Shared {
    capture: Mutex<Option<Slot<CaptureCallback>>>,
    render: Mutex<Option<Slot<RenderCallback>>>,
    failures: Mutex<HashMap<FailPoint, EchoError>>,
    live_streams: AtomicUsize,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn take_failure(&self, point: FailPoint) -> Result<(), EchoError> {
        match lock(&self.failures).remove(&point) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn set_started(&self, direction: Direction, id: u64, started: bool) {
        match direction {
            Direction::Capture => {
                if let Some(slot) = lock(&self.capture).as_mut().filter(|slot| slot.id == id) {
                    slot.started = started;
                }
            }
            Direction::Render => {
                if let Some(slot) = lock(&self.render).as_mut().filter(|slot| slot.id == id) {
                    slot.started = started;
                }
            }
        }
    }
}

/// Manually clocked stand-in for a platform audio API.
///
/// Cloning yields another handle to the same simulated devices.
#[derive(Clone)]
pub struct SimulatedBackend {
    shared: Arc<Shared>,
    max_channels: u16,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            max_channels: 2,
        }
    }

    /// Reject formats with more than `max_channels` channels
    pub fn with_max_channels(mut self, max_channels: u16) -> Self {
        self.max_channels = max_channels;
        self
    }

    /// Make the next operation at `point` fail with `err` (one-shot).
    pub fn fail_next(&self, point: FailPoint, err: EchoError) {
        lock(&self.shared.failures).insert(point, err);
    }

    /// Deliver one filled capture buffer, as the capture thread would.
    ///
    /// Returns `false` when no started capture stream exists.
    pub fn capture(&self, data: &[Sample]) -> bool {
        let mut guard = lock(&self.shared.capture);
        match guard.as_mut() {
            Some(slot) if slot.started => {
                slot.callback.on_capture(data);
                true
            }
            _ => false,
        }
    }

    /// Request one render buffer, as the render thread would.
    ///
    /// Without a started render stream `out` is silenced and `false` is
    /// returned.
    pub fn render(&self, out: &mut [Sample]) -> bool {
        let mut guard = lock(&self.shared.render);
        match guard.as_mut() {
            Some(slot) if slot.started => {
                slot.callback.on_render(out);
                true
            }
            _ => {
                out.fill(0);
                false
            }
        }
    }

    /// Streams opened and not yet released
    pub fn live_streams(&self) -> usize {
        self.shared.live_streams.load(Ordering::SeqCst)
    }

    pub fn is_capture_started(&self) -> bool {
        lock(&self.shared.capture)
            .as_ref()
            .is_some_and(|slot| slot.started)
    }

    pub fn is_render_started(&self) -> bool {
        lock(&self.shared.render)
            .as_ref()
            .is_some_and(|slot| slot.started)
    }

    fn check_format(&self, format: &AudioFormat) -> Result<(), EchoError> {
        if format.channels() > self.max_channels {
            return Err(EchoError::UnsupportedFormat {
                reason: format!(
                    "simulated device supports at most {} channels (got {})",
                    self.max_channels,
                    format.channels()
                ),
            });
        }
        Ok(())
    }

    fn register(&self, direction: Direction) -> SimulatedStream {
        self.shared.live_streams.fetch_add(1, Ordering::SeqCst);
        SimulatedStream {
            shared: Arc::clone(&self.shared),
            direction,
            id: self.shared.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn open_context(&self) -> Result<(), EchoError> {
        self.shared.take_failure(FailPoint::Context)
    }

    fn open_capture(
        &self,
        format: &AudioFormat,
        callback: CaptureCallback,
    ) -> Result<Box<dyn DeviceStream>, EchoError> {
        self.shared.take_failure(FailPoint::OpenCapture)?;
        self.check_format(format)?;

        let mut slot = lock(&self.shared.capture);
        if slot.is_some() {
            return Err(EchoError::DeviceUnavailable {
                reason: "simulated capture device is busy".to_string(),
            });
        }
        let stream = self.register(Direction::Capture);
        *slot = Some(Slot {
            id: stream.id,
            callback,
            started: false,
        });
        Ok(Box::new(stream))
    }

    fn open_render(
        &self,
        format: &AudioFormat,
        callback: RenderCallback,
    ) -> Result<Box<dyn DeviceStream>, EchoError> {
        self.shared.take_failure(FailPoint::OpenRender)?;
        self.check_format(format)?;

        let mut slot = lock(&self.shared.render);
        if slot.is_some() {
            return Err(EchoError::DeviceUnavailable {
                reason: "simulated render device is busy".to_string(),
            });
        }
        let stream = self.register(Direction::Render);
        *slot = Some(Slot {
            id: stream.id,
            callback,
            started: false,
        });
        Ok(Box::new(stream))
    }
}

struct SimulatedStream {
    shared: Arc<Shared>,
    direction: Direction,
    id: u64,
}

impl DeviceStream for SimulatedStream {
    fn start(&mut self) -> Result<(), EchoError> {
        let point = match self.direction {
            Direction::Capture => FailPoint::StartCapture,
            Direction::Render => FailPoint::StartRender,
        };
        self.shared.take_failure(point)?;
        self.shared.set_started(self.direction, self.id, true);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EchoError> {
        // Taking the slot lock waits out any callback currently running.
        self.shared.set_started(self.direction, self.id, false);
        Ok(())
    }
}

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        match self.direction {
            Direction::Capture => {
                let mut slot = lock(&self.shared.capture);
                if slot.as_ref().is_some_and(|slot| slot.id == self.id) {
                    *slot = None;
                }
            }
            Direction::Render => {
                let mut slot = lock(&self.shared.render);
                if slot.as_ref().is_some_and(|slot| slot.id == self.id) {
                    *slot = None;
                }
            }
        }
        self.shared.live_streams.fetch_sub(1, Ordering::SeqCst);
    }
}
