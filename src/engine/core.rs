//! EchoEngine: lifecycle orchestration for the full-duplex echo path.
//!
//! The engine owns the audio format, the shared ring buffer and the
//! Recorder/Player pair, and walks them through a strict state machine.
//! Every operation runs on the controlling thread; audio moves only inside
//! the platform callbacks once `start_echo` succeeds.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::audio::{
    AudioFormat, CallbackGate, CapturePermission, Player, Recorder, RingBuffer, RingStats,
};
use crate::config::EchoConfig;
use crate::engine::backend::{AudioBackend, PlatformBackend, SystemTimeSource, TimeSource};
use crate::error::{log_echo_error, EchoError};
use crate::telemetry::{EchoStats, StreamStats};

/// Lifecycle state of an [`EchoEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Uninitialized,
    Created,
    PlayerReady,
    /// Recorder and Player both exist, neither started
    DuplexReady,
    Recording,
    /// Terminal
    Destroyed,
}

impl EngineState {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Uninitialized => "Uninitialized",
            EngineState::Created => "Created",
            EngineState::PlayerReady => "PlayerReady",
            EngineState::DuplexReady => "DuplexReady",
            EngineState::Recording => "Recording",
            EngineState::Destroyed => "Destroyed",
        }
    }
}

/// Telemetry event emitted by the engine.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub timestamp_ms: u64,
    pub kind: TelemetryEventKind,
    pub detail: Option<String>,
}

/// Lifecycle transitions and warnings reported on the telemetry channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TelemetryEventKind {
    EngineCreated {
        sample_rate: u32,
        frames_per_buffer: u32,
        ring_capacity_frames: u64,
    },
    PlayerCreated,
    RecorderCreated,
    EchoStarted,
    /// Ring counters of the session that just ended
    EchoStopped { ring: RingStats },
    RecorderDeleted,
    PlayerDeleted,
    EngineDeleted,
    Warning,
}

/// Owned echo engine. One instance drives one Recorder/Player pair.
pub struct EchoEngine {
    config: EchoConfig,
    backend: Arc<dyn AudioBackend>,
    state: EngineState,
    permission: CapturePermission,
    format: Option<AudioFormat>,
    ring: Option<Arc<RingBuffer>>,
    player: Option<Player>,
    recorder: Option<Recorder>,
    // Gates outlive their streams so counters stay readable after stop.
    capture_gate: Option<Arc<CallbackGate>>,
    render_gate: Option<Arc<CallbackGate>>,
    telemetry_tx: broadcast::Sender<TelemetryEvent>,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl EchoEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, config: EchoConfig) -> Self {
        let (telemetry_tx, _) = broadcast::channel(64);
        let time_source: Arc<dyn TimeSource> = Arc::new(SystemTimeSource::default());
        let start_instant = time_source.now();

        Self {
            config,
            backend,
            state: EngineState::Uninitialized,
            permission: CapturePermission::default(),
            format: None,
            ring: None,
            player: None,
            recorder: None,
            capture_gate: None,
            render_gate: None,
            telemetry_tx,
            time_source,
            start_instant,
        }
    }

    /// Engine on the platform backend with the platform's configuration.
    pub fn with_platform_defaults() -> Self {
        Self::new(Arc::new(PlatformBackend::new()), EchoConfig::load())
    }

    /// Replace the clock used for telemetry timestamps.
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.start_instant = time_source.now();
        self.time_source = time_source;
        self
    }

    fn publish_event(
        tx: &broadcast::Sender<TelemetryEvent>,
        time_source: &Arc<dyn TimeSource>,
        start_instant: Instant,
        kind: TelemetryEventKind,
        detail: Option<String>,
    ) {
        let timestamp_ms = time_source
            .now()
            .saturating_duration_since(start_instant)
            .as_millis() as u64;
        let _ = tx.send(TelemetryEvent {
            timestamp_ms,
            kind,
            detail,
        });
    }

    fn emit_event(&self, kind: TelemetryEventKind, detail: Option<String>) {
        Self::publish_event(
            &self.telemetry_tx,
            &self.time_source,
            self.start_instant,
            kind,
            detail,
        );
    }

    fn invalid(&self, operation: &'static str) -> EchoError {
        EchoError::InvalidState {
            operation,
            state: self.state.as_str(),
        }
    }

    fn fail(&self, err: EchoError, context: &str) -> EchoError {
        log_echo_error(&err, context);
        self.emit_event(TelemetryEventKind::Warning, Some(format!("{}: {}", context, err)));
        err
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Fix the audio format and allocate the ring buffer.
    ///
    /// `sample_rate` and `frames_per_buffer` are the platform's native values
    /// and must be positive. On failure the engine stays `Uninitialized`.
    pub fn create_engine(&mut self, sample_rate: i32, frames_per_buffer: i32) -> Result<(), EchoError> {
        if self.state != EngineState::Uninitialized {
            return Err(self.invalid("create_engine"));
        }

        let format = AudioFormat::from_native(
            sample_rate,
            frames_per_buffer,
            self.config.audio.channel_count,
        )
        .map_err(|e| self.fail(e, "create_engine"))?;
        self.backend
            .open_context()
            .map_err(|e| self.fail(e, "create_engine"))?;

        let capacity = format.frames_per_buffer() as usize
            * self.config.audio.ring_buffer_periods as usize;
        let ring = RingBuffer::new(capacity, format.channels())
            .map_err(|e| self.fail(e, "create_engine"))?;

        tracing::info!(
            backend = self.backend.name(),
            sample_rate = format.sample_rate(),
            frames_per_buffer = format.frames_per_buffer(),
            channels = format.channels(),
            ring_capacity_frames = capacity,
            "echo engine created"
        );

        self.format = Some(format);
        self.ring = Some(Arc::new(ring));
        self.state = EngineState::Created;
        self.emit_event(
            TelemetryEventKind::EngineCreated {
                sample_rate: format.sample_rate(),
                frames_per_buffer: format.frames_per_buffer(),
                ring_capacity_frames: capacity as u64,
            },
            None,
        );
        Ok(())
    }

    /// Open the render stream. On failure the engine stays `Created`.
    pub fn create_player(&mut self) -> Result<(), EchoError> {
        if self.state != EngineState::Created {
            return Err(self.invalid("create_player"));
        }
        let (format, ring) = self.session_parts("create_player")?;

        let player = Player::create(self.backend.as_ref(), &format, ring)
            .map_err(|e| self.fail(e, "create_player"))?;

        self.render_gate = Some(player.gate());
        self.capture_gate = None;
        self.player = Some(player);
        self.state = EngineState::PlayerReady;
        self.emit_event(TelemetryEventKind::PlayerCreated, None);
        Ok(())
    }

    /// Open the capture stream.
    ///
    /// Capture permission must already be granted. On failure the Player is
    /// torn down as well and the engine returns to `Created`.
    pub fn create_recorder(&mut self) -> Result<(), EchoError> {
        if self.state != EngineState::PlayerReady {
            return Err(self.invalid("create_recorder"));
        }
        let (format, ring) = self.session_parts("create_recorder")?;

        match Recorder::create(self.backend.as_ref(), &format, ring, self.permission) {
            Ok(recorder) => {
                self.capture_gate = Some(recorder.gate());
                self.recorder = Some(recorder);
                self.state = EngineState::DuplexReady;
                self.emit_event(TelemetryEventKind::RecorderCreated, None);
                Ok(())
            }
            Err(err) => {
                self.teardown_pair();
                self.state = EngineState::Created;
                Err(self.fail(err, "create_recorder"))
            }
        }
    }

    /// Start the Player, then the Recorder.
    ///
    /// Any failure tears down both streams and returns the engine to
    /// `Created`.
    pub fn start_echo(&mut self) -> Result<(), EchoError> {
        if self.state != EngineState::DuplexReady {
            return Err(self.invalid("start_echo"));
        }

        let started = match (self.player.as_mut(), self.recorder.as_mut()) {
            (Some(player), Some(recorder)) => player.start().and_then(|()| recorder.start()),
            _ => Err(EchoError::InvalidState {
                operation: "start_echo",
                state: "DuplexReady without a stream pair",
            }),
        };

        if let Err(err) = started {
            self.teardown_pair();
            self.state = EngineState::Created;
            return Err(self.fail(err, "start_echo"));
        }

        self.state = EngineState::Recording;
        tracing::info!("echo started");
        self.emit_event(TelemetryEventKind::EchoStarted, None);
        Ok(())
    }

    /// Stop the Recorder, then the Player, and release both.
    ///
    /// Returns once neither callback can run again. A no-op unless
    /// `Recording`. A platform stop failure is reported after the teardown
    /// has completed; the engine is `Created` either way.
    pub fn stop_echo(&mut self) -> Result<(), EchoError> {
        match self.state {
            EngineState::Recording => {}
            EngineState::Created | EngineState::PlayerReady | EngineState::DuplexReady => {
                return Ok(())
            }
            EngineState::Uninitialized | EngineState::Destroyed => {
                return Err(self.invalid("stop_echo"))
            }
        }

        let mut result = Ok(());
        if let Some(recorder) = self.recorder.as_mut() {
            result = result.and(recorder.stop());
        }
        if let Some(player) = self.player.as_mut() {
            result = result.and(player.stop());
        }
        let ring = self.teardown_pair();
        self.state = EngineState::Created;

        tracing::info!(
            overrun_frames = ring.overrun_frames,
            underrun_frames = ring.underrun_frames,
            "echo stopped"
        );
        self.emit_event(TelemetryEventKind::EchoStopped { ring }, None);
        result.map_err(|e| self.fail(e, "stop_echo"))
    }

    /// Release the Recorder, keeping the Player.
    pub fn delete_recorder(&mut self) -> Result<(), EchoError> {
        match self.state {
            EngineState::DuplexReady => {
                if let Some(recorder) = self.recorder.take() {
                    if let Err(err) = recorder.destroy() {
                        log_echo_error(&err, "delete_recorder");
                    }
                }
                self.state = EngineState::PlayerReady;
                self.emit_event(TelemetryEventKind::RecorderDeleted, None);
                Ok(())
            }
            EngineState::Created | EngineState::PlayerReady => Ok(()),
            _ => Err(self.invalid("delete_recorder")),
        }
    }

    /// Release the Player, and the Recorder with it if one exists.
    pub fn delete_player(&mut self) -> Result<(), EchoError> {
        match self.state {
            EngineState::PlayerReady | EngineState::DuplexReady => {
                self.teardown_pair();
                self.state = EngineState::Created;
                self.emit_event(TelemetryEventKind::PlayerDeleted, None);
                Ok(())
            }
            EngineState::Created => Ok(()),
            _ => Err(self.invalid("delete_player")),
        }
    }

    /// Release the ring buffer and format. Terminal.
    pub fn delete_engine(&mut self) -> Result<(), EchoError> {
        if self.state != EngineState::Created {
            return Err(self.invalid("delete_engine"));
        }

        self.ring = None;
        self.format = None;
        self.state = EngineState::Destroyed;
        tracing::info!("echo engine deleted");
        self.emit_event(TelemetryEventKind::EngineDeleted, None);
        Ok(())
    }

    /// Destroy whichever streams exist (Recorder first) and reset the ring.
    ///
    /// Returns the ring counters as they were before the reset.
    fn teardown_pair(&mut self) -> RingStats {
        if let Some(recorder) = self.recorder.take() {
            if let Err(err) = recorder.destroy() {
                log_echo_error(&err, "teardown recorder");
            }
        }
        if let Some(player) = self.player.take() {
            if let Err(err) = player.destroy() {
                log_echo_error(&err, "teardown player");
            }
        }
        self.reset_ring()
    }

    fn reset_ring(&mut self) -> RingStats {
        let Some(ring) = self.ring.as_mut() else {
            return RingStats::default();
        };
        let stats = ring.stats();

        match Arc::get_mut(ring) {
            Some(exclusive) => exclusive.reset(),
            None => {
                // A platform thread still holds the old callback; leave it
                // the old buffer and start clean.
                log::warn!("[EchoEngine] Ring buffer still shared after teardown, reallocating");
                match RingBuffer::new(ring.capacity(), ring.channels()) {
                    Ok(fresh) => *ring = Arc::new(fresh),
                    Err(err) => log_echo_error(&err, "reset_ring"),
                }
            }
        }
        stats
    }

    fn session_parts(&self, operation: &'static str) -> Result<(AudioFormat, Arc<RingBuffer>), EchoError> {
        match (self.format, self.ring.as_ref()) {
            (Some(format), Some(ring)) => Ok((format, Arc::clone(ring))),
            _ => Err(self.invalid(operation)),
        }
    }

    // ========================================================================
    // OBSERVABILITY
    // ========================================================================

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn format(&self) -> Option<&AudioFormat> {
        self.format.as_ref()
    }

    /// Record the host's capture permission decision.
    ///
    /// Only consulted by the next `create_recorder`.
    pub fn set_capture_permission(&mut self, granted: bool) {
        self.permission = CapturePermission::from(granted);
        log::info!("[EchoEngine] Capture permission: {:?}", self.permission);
    }

    pub fn capture_permission(&self) -> CapturePermission {
        self.permission
    }

    pub fn stats(&self) -> EchoStats {
        EchoStats {
            state: self.state,
            backend: self.backend.name(),
            format: self.format,
            ring: self
                .ring
                .as_ref()
                .map(|ring| ring.stats())
                .unwrap_or_default(),
            capture: self
                .capture_gate
                .as_deref()
                .map(StreamStats::from_gate)
                .unwrap_or_default(),
            render: self
                .render_gate
                .as_deref()
                .map(StreamStats::from_gate)
                .unwrap_or_default(),
        }
    }

    /// Read and clear the fault flag of both streams.
    ///
    /// True when either callback saw a malformed buffer or the platform
    /// reported a stream error since the last call.
    pub fn take_fault(&self) -> bool {
        let capture = self
            .capture_gate
            .as_ref()
            .is_some_and(|gate| gate.take_fault());
        let render = self
            .render_gate
            .as_ref()
            .is_some_and(|gate| gate.take_fault());
        capture || render
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry_tx.subscribe()
    }
}

impl Drop for EchoEngine {
    fn drop(&mut self) {
        if self.state == EngineState::Recording {
            log::warn!("[EchoEngine] Dropped while recording, stopping echo");
            if let Err(err) = self.stop_echo() {
                log_echo_error(&err, "drop");
            }
        }
    }
}
