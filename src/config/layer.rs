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
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::layer::LayerSettings;
use crate::rhythm::{Role, TimingMode};
use crate::voice::Tone;

/// Overrides for one role's fallback click.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ToneOverride {
    frequency: Option<f64>,
    gain: Option<f32>,
}

impl ToneOverride {
    fn apply(&self, tone: Tone) -> Tone {
        Tone::new(
            self.frequency.unwrap_or(tone.frequency),
            self.gain.unwrap_or(tone.gain),
        )
    }
}

/// A per-role table, used for both tones and sample files.
#[derive(Deserialize, Clone, Debug)]
pub struct PerRole<T> {
    down: Option<T>,
    up: Option<T>,
    unaccented: Option<T>,
}

impl<T> Default for PerRole<T> {
    fn default() -> Self {
        PerRole {
            down: None,
            up: None,
            unaccented: None,
        }
    }
}

impl<T> PerRole<T> {
    pub fn get(&self, role: Role) -> Option<&T> {
        match role {
            Role::Down => self.down.as_ref(),
            Role::Up => self.up.as_ref(),
            Role::Unaccented => self.unaccented.as_ref(),
        }
    }
}

/// A YAML representation of a layer.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Layer {
    /// Steps in the layer's cycle. Clamped into [1, 64].
    sides: Option<usize>,

    /// "polyrhythm" or "polymeter".
    mode: Option<TimingMode>,

    /// Step index of the down accent.
    down: Option<usize>,

    /// Step index of the up accent.
    up: Option<usize>,

    /// Silences unaccented steps.
    mute_unaccented: Option<bool>,

    #[serde(default)]
    tones: PerRole<ToneOverride>,

    /// Sample files, relative to the session file.
    #[serde(default)]
    samples: PerRole<PathBuf>,
}

impl Layer {
    pub fn sides(&self) -> Option<usize> {
        self.sides
    }

    pub fn mode(&self) -> TimingMode {
        self.mode.unwrap_or_default()
    }

    pub fn mute_unaccented(&self) -> bool {
        self.mute_unaccented.unwrap_or(false)
    }

    /// Builds layer settings. The first layer of a session starts from the default
    /// layer; later ones start from the added-layer defaults.
    pub fn to_settings(&self, first: bool, base_dir: &Path) -> LayerSettings {
        let defaults = if first {
            LayerSettings::default()
        } else {
            LayerSettings::added()
        };

        let tones = Role::ALL.map(|role| {
            let tone = defaults.tone(role);
            match self.tones.get(role) {
                Some(tone_override) => tone_override.apply(tone),
                None => tone,
            }
        });
        let samples = Role::ALL
            .into_iter()
            .filter_map(|role| {
                self.samples.get(role).map(|path| {
                    let path = if path.is_absolute() {
                        path.clone()
                    } else {
                        base_dir.join(path)
                    };
                    (role, path)
                })
            })
            .collect();

        LayerSettings {
            sides: self.sides.unwrap_or(defaults.sides),
            mode: self.mode(),
            down: self.down,
            up: self.up,
            mute_unaccented: self.mute_unaccented(),
            tones,
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Layer {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_full_layer() {
        let layer = parse(
            r#"
            sides: 7
            mode: polymeter
            down: 0
            up: 4
            mute_unaccented: true
            tones:
              down:
                frequency: 330.0
              unaccented:
                gain: 0.25
            samples:
              up: clicks/up.wav
              down: /abs/down.wav
            "#,
        );

        let settings = layer.to_settings(true, Path::new("/session"));
        assert_eq!(settings.sides, 7);
        assert_eq!(settings.mode, TimingMode::Polymeter);
        assert_eq!(settings.down, Some(0));
        assert_eq!(settings.up, Some(4));
        assert!(settings.mute_unaccented);
        assert_eq!(settings.tone(Role::Down), Tone::new(330.0, 1.2));
        assert_eq!(settings.tone(Role::Up), Tone::default_for(Role::Up));
        assert_eq!(settings.tone(Role::Unaccented), Tone::new(1200.0, 0.25));
        assert_eq!(
            settings.samples,
            vec![
                (Role::Down, PathBuf::from("/abs/down.wav")),
                (Role::Up, PathBuf::from("/session/clicks/up.wav")),
            ]
        );
    }

    #[test]
    fn test_defaults_for_first_and_added_layers() {
        let layer = parse("{}");

        let first = layer.to_settings(true, Path::new("."));
        assert_eq!(first.sides, 3);
        assert_eq!(first.mode, TimingMode::Polyrhythm);
        assert_eq!(first.tone(Role::Down), Tone::new(220.0, 1.2));
        assert_eq!(first.tone(Role::Up), Tone::new(440.0, 1.0));
        assert!(first.samples.is_empty());

        let added = layer.to_settings(false, Path::new("."));
        assert_eq!(added.sides, 5);
        assert_eq!(added.tone(Role::Down), Tone::new(220.0, 1.2));
        assert_eq!(added.tone(Role::Up), Tone::new(440.0, 1.0));
    }
}
