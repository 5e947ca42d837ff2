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
//! A real-time polyrhythm and polymeter click generator.
//!
//! An [`Engine`] holds the control side of a set of rhythmic layers and a reference
//! metronome, all driven by one shared [`clock::Clock`]. The matching
//! [`audio::Mixer`] renders them sample-accurately, either inside a live cpal
//! callback or offline into a WAV file.

pub mod audio;
pub mod clock;
pub mod config;
pub mod engine;
pub mod layer;
pub mod metronome;
pub mod rhythm;
pub mod samples;
pub mod voice;

pub use audio::Mixer;
pub use engine::{Engine, EngineError, EngineSettings};
pub use layer::{LayerError, LayerHandle, LayerId, LayerSettings};
pub use rhythm::{Role, TimingMode};
