//! Engine module housing the echo lifecycle.
//!
//! This module exposes trait-based platform backends (`backend`) and the
//! `EchoEngine` state machine (`core`) shared by the JNI boundary and the CLI.

pub mod backend;
pub mod core;

#[cfg(target_os = "android")]
pub use backend::OboeBackend;
#[cfg(not(target_os = "android"))]
pub use backend::CpalBackend;
pub use backend::{
    AudioBackend, DeviceStream, FailPoint, PlatformBackend, SimulatedBackend, SystemTimeSource,
    TimeSource,
};
pub use core::{EchoEngine, EngineState, TelemetryEvent, TelemetryEventKind};
