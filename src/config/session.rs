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
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::audio::Audio;
use super::layer::Layer;
use super::ConfigError;
use crate::clock::{DEFAULT_HOST_BEATS_PER_BAR, DEFAULT_TEMPO};
use crate::engine::{EngineSettings, MAX_LAYERS};

/// A YAML representation of a session: the global clock plus the layers.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Session {
    /// Beats per minute. Clamped into [1, 1000].
    tempo: Option<f64>,

    /// Beats in the host bar. Clamped into [1, 64].
    host_beats_per_bar: Option<u32>,

    /// Whether the reference metronome sounds (default: true).
    metronome: Option<bool>,

    #[serde(default)]
    audio: Audio,

    #[serde(default)]
    layers: Vec<Layer>,

    /// Directory relative sample paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Session {
    pub fn tempo(&self) -> f64 {
        self.tempo.unwrap_or(DEFAULT_TEMPO)
    }

    pub fn host_beats_per_bar(&self) -> u32 {
        self.host_beats_per_bar
            .unwrap_or(DEFAULT_HOST_BEATS_PER_BAR)
    }

    pub fn metronome(&self) -> bool {
        self.metronome.unwrap_or(true)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub(super) fn with_base_dir(mut self, base_dir: PathBuf) -> Session {
        self.base_dir = base_dir;
        self
    }

    /// Checks the parts of a session that can't be clamped into range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layers.len() > MAX_LAYERS {
            return Err(ConfigError::TooManyLayers {
                count: self.layers.len(),
                max: MAX_LAYERS,
            });
        }
        self.audio.buffer_size()?;
        Ok(())
    }

    /// Engine settings for rendering at `sample_rate`.
    pub fn engine_settings(&self, sample_rate: u32) -> EngineSettings {
        EngineSettings {
            sample_rate,
            tempo: self.tempo(),
            host_beats_per_bar: self.host_beats_per_bar(),
            metronome: self.metronome(),
            layers: self
                .layers
                .iter()
                .enumerate()
                .map(|(index, layer)| layer.to_settings(index == 0, &self.base_dir))
                .collect(),
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "tempo {} bpm, {} beats per bar, metronome {}",
            self.tempo(),
            self.host_beats_per_bar(),
            if self.metronome() { "on" } else { "off" }
        )?;
        let settings = self.engine_settings(self.audio.sample_rate_or_default());
        for (index, layer) in settings.layers.iter().enumerate() {
            write!(
                f,
                "  layer {}: {} sides, {}",
                index + 1,
                layer.sides,
                layer.mode
            )?;
            if let Some(down) = layer.down {
                write!(f, ", down on {}", down)?;
            }
            if let Some(up) = layer.up {
                write!(f, ", up on {}", up)?;
            }
            if layer.mute_unaccented {
                write!(f, ", unaccented muted")?;
            }
            for (role, path) in &layer.samples {
                write!(f, ", {} sample {}", role, path.display())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;
    use crate::rhythm::{Role, TimingMode};

    fn parse(yaml: &str) -> Session {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_empty_session() {
        let session = parse("{}");
        assert_eq!(session.tempo(), DEFAULT_TEMPO);
        assert_eq!(session.host_beats_per_bar(), DEFAULT_HOST_BEATS_PER_BAR);
        assert!(session.metronome());
        assert!(session.layers().is_empty());
        assert!(session.validate().is_ok());

        let settings = session.engine_settings(44_100);
        assert_eq!(settings.sample_rate, 44_100);
        assert!(settings.layers.is_empty());
    }

    #[test]
    fn test_session() {
        let session = parse(
            r#"
            tempo: 96
            host_beats_per_bar: 3
            metronome: false
            audio:
              sample_rate: 44100
            layers:
              - sides: 4
                down: 0
              - mode: polymeter
                mute_unaccented: true
                samples:
                  unaccented: tick.wav
            "#,
        )
        .with_base_dir(PathBuf::from("/sessions"));

        assert_eq!(session.tempo(), 96.0);
        assert_eq!(session.host_beats_per_bar(), 3);
        assert!(!session.metronome());
        assert_eq!(session.audio().sample_rate(), Some(44_100));

        let settings = session.engine_settings(44_100);
        assert_eq!(settings.layers.len(), 2);
        assert_eq!(settings.layers[0].sides, 4);
        assert_eq!(settings.layers[0].down, Some(0));
        assert_eq!(settings.layers[1].sides, 5);
        assert_eq!(settings.layers[1].mode, TimingMode::Polymeter);
        assert_eq!(
            settings.layers[1].samples,
            vec![(Role::Unaccented, PathBuf::from("/sessions/tick.wav"))]
        );

        let description = session.to_string();
        assert!(description.contains("tempo 96 bpm, 3 beats per bar, metronome off"));
        assert!(description.contains("layer 2: 5 sides, polymeter, unaccented muted"));
    }

    #[test]
    fn test_too_many_layers() {
        let layers = "layers:\n".to_string() + &"  - sides: 3\n".repeat(MAX_LAYERS + 1);
        let session = parse(&layers);
        assert!(matches!(
            session.validate(),
            Err(ConfigError::TooManyLayers { count, .. }) if count == MAX_LAYERS + 1
        ));
    }
}
