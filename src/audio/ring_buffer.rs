//! Lock-free single-producer single-consumer frame ring buffer
//!
//! Hands captured frames from the capture callback (producer) to the render
//! callback (consumer) without locks, allocation or blocking.
//!
//! - `write_index` is stored only by the producer, `read_index` only by the
//!   consumer. Each side loads the other's index and nothing more.
//! - Overflow drops the oldest frames: the producer keeps writing and the
//!   consumer skips its own read index past anything that was overwritten.
//! - Underflow fills the remainder of the render buffer with silence.
//!
//! Slots are `AtomicI16`, so a consumer that races an overwrite reads stale
//! or new samples but never undefined memory. Frames that may have been
//! overwritten during a copy are detected after the fact and discarded.

use std::sync::atomic::{fence, AtomicI16, AtomicU64, Ordering};

use serde::Serialize;

use super::format::Sample;
use crate::error::EchoError;

/// Cache line aligned wrapper so the two indices never share a line
#[repr(align(64))]
struct CacheLine<T>(T);

/// Point-in-time view of ring buffer occupancy and loss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RingStats {
    pub capacity_frames: u64,
    pub available_frames: u64,
    /// Writes that found the buffer full (producer side)
    pub overrun_events: u64,
    /// Oldest frames discarded because the producer lapped the consumer
    pub overrun_frames: u64,
    /// Render frames filled with silence
    pub underrun_frames: u64,
}

/// Fixed-capacity SPSC queue of interleaved PCM frames.
pub struct RingBuffer {
    /// One spare frame slot beyond `capacity`, so the frame the producer is
    /// currently writing never aliases a frame the consumer may still read.
    slots: Box<[AtomicI16]>,
    channels: usize,
    capacity: u64,
    write_index: CacheLine<AtomicU64>,
    read_index: CacheLine<AtomicU64>,
    overrun_events: CacheLine<AtomicU64>,
    overrun_frames: AtomicU64,
    underrun_frames: AtomicU64,
}

impl RingBuffer {
    /// Allocate a ring buffer holding `capacity_frames` frames of `channels`
    /// interleaved samples. This is the only allocation the buffer makes.
    pub fn new(capacity_frames: usize, channels: u16) -> Result<Self, EchoError> {
        if capacity_frames == 0 || channels == 0 {
            return Err(EchoError::AllocationFailure {
                reason: format!(
                    "ring buffer needs a non-zero size (frames={}, channels={})",
                    capacity_frames, channels
                ),
            });
        }

        let channels = channels as usize;
        let len = capacity_frames
            .checked_add(1)
            .and_then(|frames| frames.checked_mul(channels))
            .ok_or_else(|| EchoError::AllocationFailure {
                reason: format!("ring buffer of {} frames overflows", capacity_frames),
            })?;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(len)
            .map_err(|err| EchoError::AllocationFailure {
                reason: format!("ring buffer of {} samples: {}", len, err),
            })?;
        slots.extend((0..len).map(|_| AtomicI16::new(0)));

        Ok(Self {
            slots: slots.into_boxed_slice(),
            channels,
            capacity: capacity_frames as u64,
            write_index: CacheLine(AtomicU64::new(0)),
            read_index: CacheLine(AtomicU64::new(0)),
            overrun_events: CacheLine(AtomicU64::new(0)),
            overrun_frames: AtomicU64::new(0),
            underrun_frames: AtomicU64::new(0),
        })
    }

    #[inline]
    fn slot_base(&self, frame_index: u64) -> usize {
        (frame_index % (self.capacity + 1)) as usize * self.channels
    }

    /// Append the whole frames of `samples` (producer only).
    ///
    /// Never blocks: when the consumer is behind, the oldest unread frames
    /// are overwritten. A trailing partial frame is ignored.
    ///
    /// Returns the number of frames written.
    #[inline]
    pub fn write(&self, samples: &[Sample]) -> usize {
        let frames = samples.len() / self.channels;
        if frames == 0 {
            return 0;
        }

        let mut write = self.write_index.0.load(Ordering::Relaxed);
        let read = self.read_index.0.load(Ordering::Acquire);
        if write + frames as u64 - read > self.capacity {
            self.overrun_events.0.fetch_add(1, Ordering::Relaxed);
        }

        for frame in samples.chunks_exact(self.channels) {
            // Pairs with the consumer's acquire fence: a reader that sees any
            // sample of this frame also sees the published `write`.
            fence(Ordering::Release);
            let base = self.slot_base(write);
            for (slot, &sample) in self.slots[base..base + self.channels].iter().zip(frame) {
                slot.store(sample, Ordering::Relaxed);
            }
            write += 1;
            self.write_index.0.store(write, Ordering::Release);
        }

        frames
    }

    /// Fill `out` with the oldest available frames (consumer only).
    ///
    /// Whatever cannot be filled with captured data is set to silence.
    ///
    /// Returns the number of frames of captured data at the front of `out`.
    #[inline]
    pub fn read(&self, out: &mut [Sample]) -> usize {
        let channels = self.channels;
        let wanted = out.len() / channels;

        let write = self.write_index.0.load(Ordering::Acquire);
        let mut read = self.read_index.0.load(Ordering::Relaxed);

        let floor = write.saturating_sub(self.capacity);
        if read < floor {
            self.overrun_frames
                .fetch_add(floor - read, Ordering::Relaxed);
            read = floor;
        }

        let count = (write - read).min(wanted as u64) as usize;
        for (i, dst) in out.chunks_exact_mut(channels).take(count).enumerate() {
            let base = self.slot_base(read + i as u64);
            for (sample, slot) in dst.iter_mut().zip(&self.slots[base..base + channels]) {
                *sample = slot.load(Ordering::Relaxed);
            }
        }

        // Frames at or below `latest - capacity - 1` may have been overwritten
        // while they were being copied.
        fence(Ordering::Acquire);
        let latest = self.write_index.0.load(Ordering::Relaxed);
        let clean_from = latest.saturating_sub(self.capacity);
        let torn = (clean_from.saturating_sub(read) as usize).min(count);
        if torn > 0 {
            out.copy_within(torn * channels..count * channels, 0);
            self.overrun_frames
                .fetch_add(torn as u64, Ordering::Relaxed);
        }

        let filled = count - torn;
        out[filled * channels..].fill(0);
        if filled < wanted {
            self.underrun_frames
                .fetch_add((wanted - filled) as u64, Ordering::Relaxed);
        }

        self.read_index
            .0
            .store(read + count as u64, Ordering::Release);
        filled
    }

    /// Frames currently readable, never more than `capacity`
    pub fn available(&self) -> usize {
        let write = self.write_index.0.load(Ordering::Acquire);
        let read = self.read_index.0.load(Ordering::Acquire);
        write.saturating_sub(read).min(self.capacity) as usize
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }

    /// Total frames ever written
    pub fn write_index(&self) -> u64 {
        self.write_index.0.load(Ordering::Acquire)
    }

    /// Index of the oldest frame still readable
    ///
    /// Accounts for frames the producer has already overwritten but the
    /// consumer has not yet skipped.
    pub fn read_index(&self) -> u64 {
        let write = self.write_index.0.load(Ordering::Acquire);
        let read = self.read_index.0.load(Ordering::Acquire);
        read.max(write.saturating_sub(self.capacity))
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            capacity_frames: self.capacity,
            available_frames: self.available() as u64,
            overrun_events: self.overrun_events.0.load(Ordering::Relaxed),
            overrun_frames: self.overrun_frames.load(Ordering::Relaxed),
            underrun_frames: self.underrun_frames.load(Ordering::Relaxed),
        }
    }

    /// Discard all frames and counters.
    ///
    /// Requires exclusive access, so it can only run while no callback holds
    /// the buffer.
    pub fn reset(&mut self) {
        *self.write_index.0.get_mut() = 0;
        *self.read_index.0.get_mut() = 0;
        *self.overrun_events.0.get_mut() = 0;
        *self.overrun_frames.get_mut() = 0;
        *self.underrun_frames.get_mut() = 0;
        for slot in self.slots.iter_mut() {
            *slot.get_mut() = 0;
        }
    }
}
