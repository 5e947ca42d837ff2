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

//! Rhythmic layers.
//!
//! A layer is split in two halves that share a block of atomics:
//! - [`LayerHandle`] lives on control threads and writes configuration.
//! - [`LayerSource`] lives on the render thread and produces audio.
//!
//! Scalar settings are plain atomic stores that the render side picks up at the top
//! of its next block. Sample buffers travel over a bounded channel and the buffers
//! they replace travel back the same way, so nothing is freed on the render thread.

mod controls;
mod handle;
mod source;

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::clock::Clock;
use crate::rhythm::{clamp_sides, Role, TimingMode};
use crate::samples::LoadError;
use crate::voice::{SampleError, Tone};

use self::controls::LayerShared;
pub use handle::LayerHandle;
pub use source::{LayerSource, MixSource};

/// How many sample swaps may be in flight per layer.
const SAMPLE_QUEUE_DEPTH: usize = 8;

/// Global counter for layer IDs.
static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// A stable identifier for a layer. IDs are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub(crate) fn next() -> LayerId {
        LayerId(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// Errors surfaced by layer configuration calls. The layer keeps its previous state
/// whenever one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("invalid sample: {0}")]
    Sample(#[from] SampleError),

    #[error("unable to load sample: {0}")]
    Load(#[from] LoadError),

    #[error("too many sample changes pending for {0}")]
    Busy(LayerId),

    #[error("{0} has been removed")]
    Detached(LayerId),
}

/// Initial configuration for a layer.
#[derive(Debug, Clone)]
pub struct LayerSettings {
    pub sides: usize,
    pub mode: TimingMode,
    pub down: Option<usize>,
    pub up: Option<usize>,
    pub mute_unaccented: bool,
    pub tones: [Tone; 3],
    /// Sample files to load per role after the layer is created.
    pub samples: Vec<(Role, PathBuf)>,
}

impl LayerSettings {
    /// Settings for a layer added next to existing ones.
    pub fn added() -> LayerSettings {
        LayerSettings {
            sides: 5,
            ..LayerSettings::default()
        }
    }

    pub fn tone(&self, role: Role) -> Tone {
        self.tones[role.slot()]
    }
}

impl Default for LayerSettings {
    fn default() -> Self {
        LayerSettings {
            sides: 3,
            mode: TimingMode::Polyrhythm,
            down: None,
            up: None,
            mute_unaccented: false,
            tones: Role::ALL.map(Tone::default_for),
            samples: Vec::new(),
        }
    }
}

/// Creates both halves of a layer. The layer starts stopped. Sample files listed in
/// the settings are not loaded here; see [`LayerHandle::load_sample_file`].
pub fn create(
    id: LayerId,
    clock: Arc<Clock>,
    settings: &LayerSettings,
) -> (LayerHandle, LayerSource) {
    let sides = clamp_sides(settings.sides);
    let shared = Arc::new(LayerShared::new(sides, settings));
    let (samples_tx, samples_rx) = crossbeam_channel::bounded(SAMPLE_QUEUE_DEPTH);
    let (garbage_tx, garbage_rx) = crossbeam_channel::bounded(SAMPLE_QUEUE_DEPTH);

    let handle = LayerHandle::new(id, shared.clone(), clock.clone(), samples_tx, garbage_rx);
    handle.set_accent(Role::Down, settings.down);
    handle.set_accent(Role::Up, settings.up);

    let source = LayerSource::new(id, shared, clock, samples_rx, garbage_tx);
    (handle, source)
}
