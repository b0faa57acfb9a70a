//! AudioFormat - immutable description of the echo path's PCM layout

use std::time::Duration;

use serde::Serialize;

use crate::error::EchoError;

/// One PCM sample as exchanged with the devices
pub type Sample = i16;

/// Sample representation shared by capture and render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// Signed 16-bit integer PCM
    I16,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::I16 => std::mem::size_of::<i16>(),
        }
    }
}

/// Immutable audio format derived once at engine creation.
///
/// Every buffer exchanged between the recorder, the player and the ring
/// buffer holds a whole number of frames of this format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    sample_rate: u32,
    frames_per_buffer: u32,
    channels: u16,
    sample_format: SampleFormat,
}

impl AudioFormat {
    /// Build a format from the platform-reported native values.
    ///
    /// The rate and buffer size arrive as signed integers straight from the
    /// platform query and are only checked for positivity.
    pub fn from_native(
        sample_rate: i32,
        frames_per_buffer: i32,
        channels: u16,
    ) -> Result<Self, EchoError> {
        if sample_rate <= 0 {
            return Err(EchoError::UnsupportedFormat {
                reason: format!("sample rate must be positive (got {})", sample_rate),
            });
        }
        if frames_per_buffer <= 0 {
            return Err(EchoError::UnsupportedFormat {
                reason: format!(
                    "frames per buffer must be positive (got {})",
                    frames_per_buffer
                ),
            });
        }
        if channels == 0 {
            return Err(EchoError::UnsupportedFormat {
                reason: "channel count must be at least 1".to_string(),
            });
        }

        Ok(Self {
            sample_rate: sample_rate as u32,
            frames_per_buffer: frames_per_buffer as u32,
            channels,
            sample_format: SampleFormat::I16,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames_per_buffer(&self) -> u32 {
        self.frames_per_buffer
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// Frame size in bytes (channel count × sample width)
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }

    /// Interleaved samples in one buffer period
    pub fn samples_per_buffer(&self) -> usize {
        self.frames_per_buffer as usize * self.channels as usize
    }

    /// Real-time deadline of each callback
    pub fn buffer_period(&self) -> Duration {
        Duration::from_nanos(self.frames_per_buffer as u64 * 1_000_000_000 / self.sample_rate as u64)
    }

    /// Whole frames contained in `samples` interleaved samples
    pub fn frames_in(&self, samples: usize) -> usize {
        samples / self.channels as usize
    }

    /// Whether `samples` interleaved samples form a whole number of frames
    pub fn is_frame_aligned(&self, samples: usize) -> bool {
        samples % self.channels as usize == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_format_derivations() {
        let format = AudioFormat::from_native(48000, 192, 1).unwrap();
        assert_eq!(format.sample_rate(), 48000);
        assert_eq!(format.frames_per_buffer(), 192);
        assert_eq!(format.bytes_per_frame(), 2);
        assert_eq!(format.samples_per_buffer(), 192);
        assert_eq!(format.buffer_period(), Duration::from_millis(4));
    }

    #[test]
    fn test_stereo_frame_math() {
        let format = AudioFormat::from_native(44100, 256, 2).unwrap();
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.samples_per_buffer(), 512);
        assert_eq!(format.frames_in(513), 256);
        assert!(format.is_frame_aligned(512));
        assert!(!format.is_frame_aligned(513));
    }

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(matches!(
            AudioFormat::from_native(0, 192, 1),
            Err(EchoError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            AudioFormat::from_native(-48000, 192, 1),
            Err(EchoError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            AudioFormat::from_native(48000, 0, 1),
            Err(EchoError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            AudioFormat::from_native(48000, 192, 0),
            Err(EchoError::UnsupportedFormat { .. })
        ));
    }
}
