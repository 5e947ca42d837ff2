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
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

use crate::voice::{SampleBuffer, SampleError};

/// Channels kept from a decoded file. Anything past the first two is dropped.
pub const MAX_CHANNELS: usize = 2;

/// Errors from loading a sample file. A failed load never replaces a loaded voice.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    #[error("{} has no audio track", path.display())]
    NoTrack { path: PathBuf },

    #[error("{} is not a usable sample: {source}", path.display())]
    Sample {
        path: PathBuf,
        #[source]
        source: SampleError,
    },
}

/// Decodes an entire audio file into a sample buffer.
///
/// The file's sample rate is recorded on the buffer but the audio is not converted;
/// a mismatch with `target_sample_rate` only logs a warning.
pub fn load_file(path: &Path, target_sample_rate: u32) -> Result<SampleBuffer, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decode_error = |source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_error)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::NoTrack {
            path: path.to_path_buf(),
        })?;
    let track_id = track.id;
    let file_sample_rate = track.codec_params.sample_rate;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_error)?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channels = track
        .codec_params
        .channels
        .map(|channels| channels.count())
        .unwrap_or(0);
    let mut decode_buffer: Option<DecodeBuffer<f32>> = None;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            // Some readers report the end of the stream as a decode error.
            Err(SymphoniaError::DecodeError(_)) if !samples.is_empty() => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(decode_error(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(path = ?path, error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(decode_error(e)),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let frames = decoded.capacity() as u64;
        if decode_buffer
            .as_ref()
            .map_or(true, |buffer| (buffer.capacity() as u64) < frames * channels as u64)
        {
            decode_buffer = Some(DecodeBuffer::new(frames, spec));
        }
        if let Some(buffer) = decode_buffer.as_mut() {
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }
    }

    let (samples, kept) = keep_leading_channels(samples, channels);
    let buffer = SampleBuffer::from_interleaved(&samples, kept as u16).map_err(|source| {
        LoadError::Sample {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let buffer = match file_sample_rate {
        Some(sample_rate) => {
            if sample_rate != target_sample_rate {
                warn!(
                    path = ?path,
                    file_rate = sample_rate,
                    output_rate = target_sample_rate,
                    "Sample rate differs from output, sample will play at the wrong pitch"
                );
            }
            buffer.with_sample_rate(sample_rate)
        }
        None => buffer,
    };

    if channels > MAX_CHANNELS {
        info!(path = ?path, channels, "Dropped channels beyond the first two");
    }
    Ok(buffer)
}

/// Drops every channel past [`MAX_CHANNELS`] from interleaved samples. Returns the
/// samples and the remaining channel count.
fn keep_leading_channels(samples: Vec<f32>, channels: usize) -> (Vec<f32>, usize) {
    if channels <= MAX_CHANNELS {
        return (samples, channels);
    }
    let kept = samples
        .chunks_exact(channels)
        .flat_map(|frame| frame[..MAX_CHANNELS].iter().copied())
        .collect();
    (kept, MAX_CHANNELS)
}

/// Loads sample files and caches them by path, so one file used by several layers
/// or roles is decoded once and shared.
#[derive(Debug)]
pub struct SampleLoader {
    cache: HashMap<PathBuf, Arc<SampleBuffer>>,
    target_sample_rate: u32,
}

impl SampleLoader {
    pub fn new(target_sample_rate: u32) -> SampleLoader {
        SampleLoader {
            cache: HashMap::new(),
            target_sample_rate,
        }
    }

    /// Loads a sample, returning the cached copy if the path was loaded before.
    pub fn load(&mut self, path: &Path) -> Result<Arc<SampleBuffer>, LoadError> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        let sample = Arc::new(load_file(path, self.target_sample_rate)?);
        info!(
            path = ?path,
            channels = sample.channel_count(),
            frames = sample.len(),
            memory_kb = sample.memory_size() / 1024,
            "Sample loaded"
        );
        self.cache.insert(path.to_path_buf(), sample.clone());
        Ok(sample)
    }

    /// Memory used by every cached sample, in bytes.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|sample| sample.memory_size()).sum()
    }
}
