// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;

/// Errors raised when building a sample buffer from raw PCM.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("sample contains no audio")]
    Empty,

    #[error("sample has no channels")]
    NoChannels,

    #[error("{len} interleaved samples do not divide into {channels} channels")]
    Misaligned { len: usize, channels: u16 },

    #[error("planar channel {channel} has {len} frames, expected {expected}")]
    PlanarLengthMismatch {
        channel: usize,
        len: usize,
        expected: usize,
    },

    #[error("sample contains non-finite values")]
    NonFinite,
}

/// Immutable PCM held in memory, mixed down to one channel.
///
/// Multi-channel input is averaged across channels when the buffer is built, which
/// keeps the render path to a single lookup per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    frames: Vec<f32>,
    channel_count: u16,
    sample_rate: Option<u32>,
}

impl SampleBuffer {
    /// Builds a buffer from interleaved samples.
    pub fn from_interleaved(samples: &[f32], channel_count: u16) -> Result<Self, SampleError> {
        if channel_count == 0 {
            return Err(SampleError::NoChannels);
        }
        let channels = channel_count as usize;
        if samples.is_empty() {
            return Err(SampleError::Empty);
        }
        if samples.len() % channels != 0 {
            return Err(SampleError::Misaligned {
                len: samples.len(),
                channels: channel_count,
            });
        }
        if samples.iter().any(|sample| !sample.is_finite()) {
            return Err(SampleError::NonFinite);
        }

        let scale = 1.0 / channels as f32;
        let frames = samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect();

        Ok(SampleBuffer {
            frames,
            channel_count,
            sample_rate: None,
        })
    }

    /// Builds a buffer from one slice per channel.
    pub fn from_planar<C: AsRef<[f32]>>(channels: &[C]) -> Result<Self, SampleError> {
        let first = channels.first().ok_or(SampleError::NoChannels)?;
        let expected = first.as_ref().len();
        if expected == 0 {
            return Err(SampleError::Empty);
        }
        for (channel, data) in channels.iter().enumerate() {
            let data = data.as_ref();
            if data.len() != expected {
                return Err(SampleError::PlanarLengthMismatch {
                    channel,
                    len: data.len(),
                    expected,
                });
            }
            if data.iter().any(|sample| !sample.is_finite()) {
                return Err(SampleError::NonFinite);
            }
        }

        let scale = 1.0 / channels.len() as f32;
        let frames = (0..expected)
            .map(|frame| {
                channels
                    .iter()
                    .map(|data| data.as_ref()[frame])
                    .sum::<f32>()
                    * scale
            })
            .collect();

        Ok(SampleBuffer {
            frames,
            channel_count: channels.len() as u16,
            sample_rate: None,
        })
    }

    /// Records the sample rate the audio was captured at.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Channel count of the source audio.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// The mixed-down value of a frame.
    #[inline]
    pub fn frame(&self, index: usize) -> Option<f32> {
        self.frames.get(index).copied()
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.frames.len() * std::mem::size_of::<f32>()
    }
}

/// A single-cursor sample player. Retriggering restarts playback from the top.
#[derive(Debug, Default)]
pub struct OneShot {
    buffer: Option<Arc<SampleBuffer>>,
    cursor: usize,
    gain: f32,
    active: bool,
}

impl OneShot {
    pub fn new() -> OneShot {
        OneShot::default()
    }

    /// True if a sample is loaded in this slot.
    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The playback position in frames.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Swaps in a new buffer and returns the previous one. The slot goes idle until
    /// the next trigger.
    pub fn replace(&mut self, buffer: Option<Arc<SampleBuffer>>) -> Option<Arc<SampleBuffer>> {
        self.cursor = 0;
        self.active = false;
        std::mem::replace(&mut self.buffer, buffer)
    }

    /// Starts playback from the first frame. Returns false if nothing is loaded.
    pub fn trigger(&mut self, gain: f32) -> bool {
        if self.buffer.is_none() {
            return false;
        }
        self.gain = gain;
        self.cursor = 0;
        self.active = true;
        true
    }

    /// Stops playback.
    pub fn silence(&mut self) {
        self.active = false;
        self.cursor = 0;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if !self.active {
            return 0.0;
        }
        let Some(buffer) = self.buffer.as_ref() else {
            self.active = false;
            return 0.0;
        };

        match buffer.frame(self.cursor) {
            Some(sample) => {
                self.cursor += 1;
                sample * self.gain
            }
            None => {
                self.active = false;
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Arc<SampleBuffer> {
        let samples: Vec<f32> = (0..len).map(|i| (i + 1) as f32 / 10.0).collect();
        Arc::new(SampleBuffer::from_interleaved(&samples, 1).unwrap())
    }

    #[test]
    fn test_interleaved_stereo_is_averaged() {
        let buffer = SampleBuffer::from_interleaved(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame(0), Some(0.5));
        assert_eq!(buffer.frame(1), Some(0.5));
        assert_eq!(buffer.frame(2), Some(0.0));
        assert_eq!(buffer.frame(3), None);
    }

    #[test]
    fn test_planar_stereo_is_averaged() {
        let buffer = SampleBuffer::from_planar(&[vec![1.0, 0.5], vec![0.0, 0.5]]).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.frame(0), Some(0.5));
        assert_eq!(buffer.frame(1), Some(0.5));
    }

    #[test]
    fn test_invalid_buffers_rejected() {
        assert_eq!(
            SampleBuffer::from_interleaved(&[], 1),
            Err(SampleError::Empty)
        );
        assert_eq!(
            SampleBuffer::from_interleaved(&[0.1], 0),
            Err(SampleError::NoChannels)
        );
        assert_eq!(
            SampleBuffer::from_interleaved(&[0.1, 0.2, 0.3], 2),
            Err(SampleError::Misaligned {
                len: 3,
                channels: 2
            })
        );
        assert_eq!(
            SampleBuffer::from_interleaved(&[0.1, f32::NAN], 1),
            Err(SampleError::NonFinite)
        );

        let no_channels: [Vec<f32>; 0] = [];
        assert_eq!(
            SampleBuffer::from_planar(&no_channels),
            Err(SampleError::NoChannels)
        );
        assert_eq!(
            SampleBuffer::from_planar(&[vec![0.1, 0.2], vec![0.1]]),
            Err(SampleError::PlanarLengthMismatch {
                channel: 1,
                len: 1,
                expected: 2
            })
        );
    }

    #[test]
    fn test_one_shot_plays_to_end() {
        let mut voice = OneShot::new();
        voice.replace(Some(ramp(3)));
        assert!(voice.trigger(2.0));

        let played: Vec<f32> = (0..5).map(|_| voice.next_sample()).collect();
        assert_eq!(played, vec![0.2, 0.4, 0.6, 0.0, 0.0]);
        assert!(!voice.is_active());
    }

    #[test]
    fn test_retrigger_restarts_from_zero() {
        let mut voice = OneShot::new();
        voice.replace(Some(ramp(10)));
        voice.trigger(1.0);
        for _ in 0..4 {
            voice.next_sample();
        }
        assert_eq!(voice.cursor(), 4);

        voice.trigger(1.0);
        assert_eq!(voice.cursor(), 0);
        assert_eq!(voice.next_sample(), 0.1);
    }

    #[test]
    fn test_trigger_without_sample() {
        let mut voice = OneShot::new();
        assert!(!voice.trigger(1.0));
        assert!(!voice.is_active());
        assert_eq!(voice.next_sample(), 0.0);
    }

    #[test]
    fn test_replace_returns_old_buffer_and_idles() {
        let mut voice = OneShot::new();
        let first = ramp(4);
        assert!(voice.replace(Some(first.clone())).is_none());
        voice.trigger(1.0);
        voice.next_sample();

        let old = voice.replace(Some(ramp(2))).expect("previous buffer");
        assert!(Arc::ptr_eq(&old, &first));
        assert!(!voice.is_active());
        assert_eq!(voice.cursor(), 0);
        assert_eq!(voice.next_sample(), 0.0);
    }
}
