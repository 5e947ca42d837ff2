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
use serde::Deserialize;

use super::ConfigError;

/// Sample rate used when neither the config nor a device picks one.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// How to choose the cpal stream buffer size. Smaller buffers mean lower latency
/// but less headroom for callback jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamBufferSize {
    /// Use the backend's default.
    #[default]
    Default,
    /// Use the smallest size the device supports.
    Min,
    /// Use a fixed size in frames.
    Fixed(u32),
}

/// The audio section of a session file.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// Output sample rate. Live playback falls back to the device default.
    sample_rate: Option<u32>,

    /// "default", "min" or a frame count.
    buffer_size: Option<String>,
}

impl Audio {
    pub fn new(sample_rate: Option<u32>) -> Audio {
        Audio {
            sample_rate,
            buffer_size: None,
        }
    }

    /// The configured sample rate, if any.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate.filter(|rate| *rate > 0)
    }

    /// The configured sample rate, or [`DEFAULT_SAMPLE_RATE`].
    pub fn sample_rate_or_default(&self) -> u32 {
        self.sample_rate().unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the stream buffer size choice.
    pub fn buffer_size(&self) -> Result<StreamBufferSize, ConfigError> {
        match self.buffer_size.as_deref().map(str::trim) {
            None | Some("default") => Ok(StreamBufferSize::Default),
            Some("min") => Ok(StreamBufferSize::Min),
            Some(frames) => match frames.parse::<u32>() {
                Ok(frames) if frames > 0 => Ok(StreamBufferSize::Fixed(frames)),
                _ => Err(ConfigError::BufferSize(frames.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Audio {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let audio = parse("{}");
        assert_eq!(audio.sample_rate(), None);
        assert_eq!(audio.sample_rate_or_default(), DEFAULT_SAMPLE_RATE);
        assert_eq!(audio.buffer_size().unwrap(), StreamBufferSize::Default);
    }

    #[test]
    fn test_buffer_sizes() {
        let audio = parse("buffer_size: min");
        assert_eq!(audio.buffer_size().unwrap(), StreamBufferSize::Min);

        let audio = parse("buffer_size: 256");
        assert_eq!(audio.buffer_size().unwrap(), StreamBufferSize::Fixed(256));

        let audio = parse("buffer_size: lots");
        assert!(matches!(
            audio.buffer_size(),
            Err(ConfigError::BufferSize(value)) if value == "lots"
        ));

        let audio = parse("buffer_size: 0");
        assert!(audio.buffer_size().is_err());
    }

    #[test]
    fn test_sample_rate() {
        let audio = parse("sample_rate: 44100");
        assert_eq!(audio.sample_rate(), Some(44_100));

        let audio = parse("sample_rate: 0");
        assert_eq!(audio.sample_rate(), None);
    }
}
