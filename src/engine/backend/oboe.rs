//! Android backend built on oboe (AAudio, falling back to OpenSL ES).
//!
//! Both directions open as low-latency exclusive mono `i16` streams at the
//! engine's native rate and buffer size, each driven by its own oboe
//! callback thread.

use ::oboe::{
    AudioInputCallback, AudioInputStreamSafe, AudioOutputCallback, AudioOutputStreamSafe,
    AudioStream, AudioStreamBuilder, DataCallbackResult, Input, Mono, Output,
    PerformanceMode, SharingMode,
};

use crate::audio::callback::{CaptureCallback, RenderCallback};
use crate::audio::format::AudioFormat;
use crate::error::EchoError;

use super::{AudioBackend, DeviceStream};

/// Platform backend for Android.
#[derive(Debug, Default)]
pub struct OboeBackend {
    _unit: (),
}

impl OboeBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn map_oboe_error(err: ::oboe::Error, direction: &str) -> EchoError {
    match err {
        ::oboe::Error::InvalidFormat
        | ::oboe::Error::InvalidRate
        | ::oboe::Error::IllegalArgument
        | ::oboe::Error::OutOfRange => EchoError::UnsupportedFormat {
            reason: format!("{} stream: {:?}", direction, err),
        },
        ::oboe::Error::NoMemory => EchoError::AllocationFailure {
            reason: format!("{} stream: {:?}", direction, err),
        },
        _ => EchoError::DeviceUnavailable {
            reason: format!("{} stream: {:?}", direction, err),
        },
    }
}

fn check_mono(format: &AudioFormat) -> Result<(), EchoError> {
    if format.channels() != 1 {
        return Err(EchoError::UnsupportedFormat {
            reason: format!(
                "oboe backend opens mono streams only (got {} channels)",
                format.channels()
            ),
        });
    }
    Ok(())
}

/// Adapts the engine's capture callback to oboe's input callback trait
struct OboeCapture {
    inner: CaptureCallback,
}

impl AudioInputCallback for OboeCapture {
    type FrameType = (i16, Mono);

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioInputStreamSafe,
        audio_data: &[i16],
    ) -> DataCallbackResult {
        self.inner.on_capture(audio_data);
        DataCallbackResult::Continue
    }

    fn on_error_before_close(
        &mut self,
        _stream: &mut dyn AudioInputStreamSafe,
        _error: ::oboe::Error,
    ) {
        self.inner.gate().report_fault();
    }
}

/// Adapts the engine's render callback to oboe's output callback trait
struct OboeRender {
    inner: RenderCallback,
}

impl AudioOutputCallback for OboeRender {
    type FrameType = (i16, Mono);

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioOutputStreamSafe,
        audio_data: &mut [i16],
    ) -> DataCallbackResult {
        self.inner.on_render(audio_data);
        DataCallbackResult::Continue
    }

    fn on_error_before_close(
        &mut self,
        _stream: &mut dyn AudioOutputStreamSafe,
        _error: ::oboe::Error,
    ) {
        self.inner.gate().report_fault();
    }
}

impl AudioBackend for OboeBackend {
    fn name(&self) -> &'static str {
        "oboe"
    }

    fn open_context(&self) -> Result<(), EchoError> {
        // Oboe has no engine object; streams talk to the audio service directly.
        Ok(())
    }

    fn open_capture(
        &self,
        format: &AudioFormat,
        callback: CaptureCallback,
    ) -> Result<Box<dyn DeviceStream>, EchoError> {
        check_mono(format)?;

        let stream = AudioStreamBuilder::default()
            .set_performance_mode(PerformanceMode::LowLatency)
            .set_sharing_mode(SharingMode::Exclusive)
            .set_direction::<Input>()
            .set_sample_rate(format.sample_rate() as i32)
            .set_frames_per_callback(format.frames_per_buffer() as i32)
            .set_channel_count::<Mono>()
            .set_format::<i16>()
            .set_callback(OboeCapture { inner: callback })
            .open_stream()
            .map_err(|e| map_oboe_error(e, "Input"))?;

        log::info!("[OboeBackend] Capture stream opened at {:?}", format);
        Ok(Box::new(OboeStream {
            stream,
            direction: "Input",
        }))
    }

    fn open_render(
        &self,
        format: &AudioFormat,
        callback: RenderCallback,
    ) -> Result<Box<dyn DeviceStream>, EchoError> {
        check_mono(format)?;

        let stream = AudioStreamBuilder::default()
            .set_performance_mode(PerformanceMode::LowLatency)
            .set_sharing_mode(SharingMode::Exclusive)
            .set_direction::<Output>()
            .set_sample_rate(format.sample_rate() as i32)
            .set_frames_per_callback(format.frames_per_buffer() as i32)
            .set_channel_count::<Mono>()
            .set_format::<i16>()
            .set_callback(OboeRender { inner: callback })
            .open_stream()
            .map_err(|e| map_oboe_error(e, "Output"))?;

        log::info!("[OboeBackend] Render stream opened at {:?}", format);
        Ok(Box::new(OboeStream {
            stream,
            direction: "Output",
        }))
    }
}

struct OboeStream<S> {
    stream: S,
    direction: &'static str,
}

impl<S: AudioStream> DeviceStream for OboeStream<S> {
    fn start(&mut self) -> Result<(), EchoError> {
        self.stream.start().map_err(|e| EchoError::StreamFailure {
            reason: format!("Failed to start {} stream: {:?}", self.direction, e),
        })
    }

    fn stop(&mut self) -> Result<(), EchoError> {
        self.stream.stop().map_err(|e| EchoError::StreamFailure {
            reason: format!("Failed to stop {} stream: {:?}", self.direction, e),
        })
    }
}

