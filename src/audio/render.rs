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
use std::path::Path;

use tracing::info;

use crate::audio::mixer::Mixer;
use crate::clock::ClockSnapshot;

/// Frames rendered per mixer call.
const BLOCK_FRAMES: usize = 512;

/// Channels written by offline rendering.
pub const RENDER_CHANNELS: u16 = 2;

/// Errors from rendering to a file.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unable to write wav: {0}")]
    Wav(#[from] hound::Error),
}

/// The number of frames in `bars` host bars, rounded to the nearest frame.
pub fn bars_to_frames(clock: &ClockSnapshot, bars: u32) -> u64 {
    (clock.samples_per_bar() * f64::from(bars)).round() as u64
}

/// Renders `frames` frames from the mixer into a stereo 32-bit float WAV file, in the
/// same block sizes a live stream would use. Returns the number of frames written.
pub fn render_to_wav(mixer: &mut Mixer, path: &Path, frames: u64) -> Result<u64, RenderError> {
    let spec = hound::WavSpec {
        channels: RENDER_CHANNELS,
        sample_rate: mixer.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;

    let channels = RENDER_CHANNELS as usize;
    let mut block = vec![0.0f32; BLOCK_FRAMES * channels];
    let mut peak = 0.0f32;
    let mut remaining = frames;
    while remaining > 0 {
        let count = remaining.min(BLOCK_FRAMES as u64) as usize;
        let block = &mut block[..count * channels];
        mixer.render(block, channels);
        for sample in block.iter() {
            peak = peak.max(sample.abs());
            writer.write_sample(*sample)?;
        }
        remaining -= count as u64;
    }
    writer.finalize()?;

    info!(
        path = ?path,
        frames,
        seconds = frames as f64 / f64::from(mixer.sample_rate()),
        peak,
        "Rendered"
    );
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineSettings};
    use crate::layer::LayerSettings;
    use crate::rhythm::Role;

    #[test]
    fn test_bars_to_frames() {
        let clock = crate::clock::Clock::new(48_000, 120.0, 4).snapshot();
        assert_eq!(bars_to_frames(&clock, 0), 0);
        assert_eq!(bars_to_frames(&clock, 2), 192_000);

        let clock = crate::clock::Clock::new(44_100, 130.0, 3).snapshot();
        assert_eq!(bars_to_frames(&clock, 1), 61_062);
    }

    #[test]
    fn test_render_three_against_four() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let (engine, mut mixer) = Engine::new(EngineSettings {
            metronome: false,
            layers: vec![LayerSettings {
                down: Some(0),
                ..LayerSettings::default()
            }],
            ..EngineSettings::default()
        });
        let layer = engine.layers().remove(0);
        for role in Role::ALL {
            layer
                .load_pcm(role, &[1.0], 1)
                .unwrap();
        }
        engine.play().unwrap();

        let frames = bars_to_frames(&engine.clock().snapshot(), 1);
        assert_eq!(render_to_wav(&mut mixer, &path, frames).unwrap(), 96_000);

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 48_000);
        let samples: Vec<f32> = reader.samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(samples.len(), 96_000 * 2);

        let onsets: Vec<usize> = samples
            .chunks_exact(2)
            .enumerate()
            .filter(|(_, frame)| frame[0] != 0.0)
            .map(|(index, frame)| {
                assert_eq!(frame[0], frame[1]);
                index
            })
            .collect();
        assert_eq!(onsets, vec![0, 32_000, 64_000]);
        assert_eq!(samples[0], 1.2);
    }
}
