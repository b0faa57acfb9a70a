//! Desktop backend built on cpal.
//!
//! Streams are opened on the host's default input and output devices as
//! signed 16-bit streams. cpal owns the callback threads; the engine's
//! callbacks are moved into them unchanged.

use ::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ::cpal::{
    BufferSize, BuildStreamError, Device, SampleRate, StreamConfig, SupportedBufferSize,
    SupportedStreamConfig,
};
use serde::Serialize;

use crate::audio::callback::{CaptureCallback, RenderCallback};
use crate::audio::format::{AudioFormat, Sample};
use crate::error::EchoError;

use super::{AudioBackend, DeviceStream};

/// Default device snapshot for one direction
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Supported callback size range in frames, when the host reports one
    pub buffer_frames: Option<(u32, u32)>,
}

/// Default input and output devices of the host
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub host: String,
    pub input: Option<DeviceInfo>,
    pub output: Option<DeviceInfo>,
}

/// Describe the default host's default devices.
pub fn probe_default_devices() -> DeviceReport {
    let host = ::cpal::default_host();
    let describe = |device: Device, config: Result<SupportedStreamConfig, String>| {
        let config = config.ok()?;
        Some(DeviceInfo {
            name: device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            buffer_frames: match config.buffer_size() {
                SupportedBufferSize::Range { min, max } => Some((*min, *max)),
                SupportedBufferSize::Unknown => None,
            },
        })
    };

    let input = host.default_input_device().and_then(|device| {
        let config = device.default_input_config().map_err(|e| e.to_string());
        describe(device, config)
    });
    let output = host.default_output_device().and_then(|device| {
        let config = device.default_output_config().map_err(|e| e.to_string());
        describe(device, config)
    });

    DeviceReport {
        host: host.id().name().to_string(),
        input,
        output,
    }
}

/// Platform backend for desktop hosts.
#[derive(Debug, Default)]
pub struct CpalBackend {
    _unit: (),
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn stream_config(format: &AudioFormat, supported: &SupportedBufferSize) -> StreamConfig {
    let frames = format.frames_per_buffer();
    let buffer_size = match supported {
        SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames) => {
            BufferSize::Fixed(frames)
        }
        _ => {
            log::warn!(
                "[CpalBackend] {} frames per buffer not supported by device, using host default",
                frames
            );
            BufferSize::Default
        }
    };

    StreamConfig {
        channels: format.channels(),
        sample_rate: SampleRate(format.sample_rate()),
        buffer_size,
    }
}

fn map_build_error(err: BuildStreamError) -> EchoError {
    match err {
        BuildStreamError::StreamConfigNotSupported | BuildStreamError::InvalidArgument => {
            EchoError::UnsupportedFormat {
                reason: err.to_string(),
            }
        }
        _ => EchoError::DeviceUnavailable {
            reason: err.to_string(),
        },
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open_context(&self) -> Result<(), EchoError> {
        let host = ::cpal::default_host();
        if host.default_output_device().is_none() && host.default_input_device().is_none() {
            return Err(EchoError::DeviceUnavailable {
                reason: format!("host {} has no audio devices", host.id().name()),
            });
        }
        Ok(())
    }

    fn open_capture(
        &self,
        format: &AudioFormat,
        mut callback: CaptureCallback,
    ) -> Result<Box<dyn DeviceStream>, EchoError> {
        let host = ::cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| EchoError::DeviceUnavailable {
                reason: "No default input device found".to_string(),
            })?;
        let default = device
            .default_input_config()
            .map_err(|e| EchoError::DeviceUnavailable {
                reason: format!("Failed to get default input config: {}", e),
            })?;
        let config = stream_config(format, default.buffer_size());

        let gate = callback.gate();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[Sample], _: &::cpal::InputCallbackInfo| callback.on_capture(data),
                move |_err| gate.report_fault(),
                None,
            )
            .map_err(map_build_error)?;

        log::info!(
            "[CpalBackend] Capture stream opened on {:?} ({:?})",
            device.name().ok(),
            config
        );
        Ok(Box::new(CpalStream { stream }))
    }

    fn open_render(
        &self,
        format: &AudioFormat,
        mut callback: RenderCallback,
    ) -> Result<Box<dyn DeviceStream>, EchoError> {
        let host = ::cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EchoError::DeviceUnavailable {
                reason: "No default output device found".to_string(),
            })?;
        let default = device
            .default_output_config()
            .map_err(|e| EchoError::DeviceUnavailable {
                reason: format!("Failed to get default output config: {}", e),
            })?;
        let config = stream_config(format, default.buffer_size());

        let gate = callback.gate();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [Sample], _: &::cpal::OutputCallbackInfo| {
                    callback.on_render(data)
                },
                move |_err| gate.report_fault(),
                None,
            )
            .map_err(map_build_error)?;

        log::info!(
            "[CpalBackend] Render stream opened on {:?} ({:?})",
            device.name().ok(),
            config
        );
        Ok(Box::new(CpalStream { stream }))
    }
}

struct CpalStream {
    stream: ::cpal::Stream,
}

impl DeviceStream for CpalStream {
    fn start(&mut self) -> Result<(), EchoError> {
        self.stream.play().map_err(|e| EchoError::StreamFailure {
            reason: format!("Failed to start stream: {}", e),
        })
    }

    fn stop(&mut self) -> Result<(), EchoError> {
        self.stream.pause().map_err(|e| EchoError::StreamFailure {
            reason: format!("Failed to pause stream: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_buffer_size_when_in_range() {
        let format = AudioFormat::from_native(48000, 192, 1).unwrap();
        let config = stream_config(&format, &SupportedBufferSize::Range { min: 64, max: 4096 });
        assert_eq!(config.buffer_size, BufferSize::Fixed(192));
        assert_eq!(config.sample_rate, SampleRate(48000));
        assert_eq!(config.channels, 1);
    }

    #[test]
    fn test_default_buffer_size_when_out_of_range_or_unknown() {
        let format = AudioFormat::from_native(48000, 32, 2).unwrap();
        let config = stream_config(&format, &SupportedBufferSize::Range { min: 64, max: 4096 });
        assert_eq!(config.buffer_size, BufferSize::Default);
        let config = stream_config(&format, &SupportedBufferSize::Unknown);
        assert_eq!(config.buffer_size, BufferSize::Default);
    }

    #[test]
    fn test_build_error_mapping() {
        assert!(matches!(
            map_build_error(BuildStreamError::StreamConfigNotSupported),
            EchoError::UnsupportedFormat { .. }
        ));
        assert!(matches!(
            map_build_error(BuildStreamError::DeviceNotAvailable),
            EchoError::DeviceUnavailable { .. }
        ));
    }
}
