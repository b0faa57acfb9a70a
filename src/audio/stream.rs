//! Platform stream paired with the gate its callback runs behind.

use std::sync::Arc;

use super::callback::CallbackGate;
use crate::engine::backend::DeviceStream;
use crate::error::EchoError;

/// Start/stop sequencing shared by [`Recorder`](super::Recorder) and
/// [`Player`](super::Player).
///
/// The gate opens before the platform starts the stream and closes before the
/// platform is asked to stop, so a callback that races either request sees a
/// consistent running flag.
pub(crate) struct GatedStream {
    stream: Box<dyn DeviceStream>,
    gate: Arc<CallbackGate>,
    started: bool,
    label: &'static str,
}

impl GatedStream {
    pub(crate) fn new(stream: Box<dyn DeviceStream>, gate: Arc<CallbackGate>, label: &'static str) -> Self {
        Self {
            stream,
            gate,
            started: false,
            label,
        }
    }

    pub(crate) fn start(&mut self) -> Result<(), EchoError> {
        if self.started {
            return Ok(());
        }

        self.gate.open();
        if let Err(err) = self.stream.start() {
            self.gate.close_and_wait();
            return Err(err);
        }
        self.started = true;
        log::debug!("[{}] started", self.label);
        Ok(())
    }

    /// Stop the platform stream and wait until no callback is in flight.
    ///
    /// The stream is considered stopped even when the platform reports an
    /// error; the error is still returned.
    pub(crate) fn stop(&mut self) -> Result<(), EchoError> {
        if !self.started {
            self.gate.close_and_wait();
            return Ok(());
        }

        self.gate.close();
        let result = self.stream.stop();
        self.gate.close_and_wait();
        self.started = false;

        match &result {
            Ok(()) => log::debug!("[{}] stopped", self.label),
            Err(err) => log::warn!("[{}] platform stop failed: {}", self.label, err),
        }
        result
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn gate(&self) -> &Arc<CallbackGate> {
        &self.gate
    }
}

impl Drop for GatedStream {
    fn drop(&mut self) {
        if self.started {
            let _ = self.stop();
        }
        // Any callback still scheduled by the platform finds the gate closed.
        self.gate.close_and_wait();
    }
}
