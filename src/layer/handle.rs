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
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use super::controls::LayerShared;
use super::{LayerError, LayerId};
use crate::clock::Clock;
use crate::rhythm::{self, clamp_sides, Role, TimingMode};
use crate::samples;
use crate::voice::{SampleBuffer, Tone};

/// A sample swap for the render thread. `None` unloads the role's sample.
pub(super) type SampleSwap = (Role, Option<Arc<SampleBuffer>>);

/// Control-side view of a layer. Cheap to clone and safe to use from any thread
/// other than the render thread.
#[derive(Clone)]
pub struct LayerHandle {
    id: LayerId,
    shared: Arc<LayerShared>,
    clock: Arc<Clock>,
    samples_tx: Sender<SampleSwap>,
    garbage_rx: Receiver<Arc<SampleBuffer>>,
}

impl LayerHandle {
    pub(super) fn new(
        id: LayerId,
        shared: Arc<LayerShared>,
        clock: Arc<Clock>,
        samples_tx: Sender<SampleSwap>,
        garbage_rx: Receiver<Arc<SampleBuffer>>,
    ) -> LayerHandle {
        LayerHandle {
            id,
            shared,
            clock,
            samples_tx,
            garbage_rx,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn sides(&self) -> usize {
        self.shared.sides()
    }

    pub fn mode(&self) -> TimingMode {
        self.shared.mode()
    }

    /// The step index of an accent role. Always `None` for [`Role::Unaccented`].
    pub fn accent(&self, role: Role) -> Option<usize> {
        self.shared.accent_index(role)
    }

    pub fn mute_unaccented(&self) -> bool {
        self.shared.mute_unaccented()
    }

    pub fn tone(&self, role: Role) -> Tone {
        self.shared.tone(role)
    }

    /// Switches between polyrhythm and polymeter timing. The transport keeps running.
    pub fn set_mode(&self, mode: TimingMode) {
        debug!(layer = %self.id, mode = %mode, "Setting timing mode");
        self.shared.set_mode(mode);
    }

    /// Changes the number of steps, clamped to [1, 64]. Accents move to the step
    /// nearest their original phase.
    pub fn set_sides(&self, sides: usize) {
        let sides = clamp_sides(sides);
        let mut accents = self.shared.accents().lock();
        if sides == self.shared.sides() {
            return;
        }

        for (accent, role) in accents.iter_mut().zip([Role::Down, Role::Up]) {
            accent.resize(sides);
            self.shared.store_accent_index(role, accent.index());
        }
        self.shared.set_sides(sides);
        debug!(
            layer = %self.id,
            sides,
            down = ?accents[0].index(),
            up = ?accents[1].index(),
            "Set side count"
        );
    }

    /// Places an accent on a step. An index outside the current cycle clears the
    /// accent. Setting [`Role::Unaccented`] does nothing.
    pub fn set_accent(&self, role: Role, index: Option<usize>) {
        let slot = match role {
            Role::Down => 0,
            Role::Up => 1,
            Role::Unaccented => return,
        };

        let mut accents = self.shared.accents().lock();
        let sides = self.shared.sides();
        accents[slot].set(index, sides);
        if index.is_some() && accents[slot].index().is_none() {
            warn!(layer = %self.id, role = %role, ?index, sides, "Accent out of range, disabled");
        }
        self.shared.store_accent_index(role, accents[slot].index());
    }

    /// Silences unaccented steps without changing the schedule.
    pub fn set_mute_unaccented(&self, mute: bool) {
        self.shared.set_mute_unaccented(mute);
    }

    /// Sets the fallback click tone for a role. Takes effect from the next trigger.
    pub fn set_tone(&self, role: Role, tone: Tone) {
        self.shared.set_tone(role, tone);
    }

    /// Resets the transport and starts playing.
    pub fn play(&self) {
        self.shared.request_seek(0);
        self.shared.set_playing(true);
    }

    /// Stops playing and resets the transport.
    pub fn stop(&self) {
        self.shared.set_playing(false);
        self.shared.request_seek(0);
    }

    /// Resets the transport without changing the play state.
    pub fn reset(&self) {
        self.shared.request_seek(0);
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    /// Moves the transport. The step schedule is realigned to the new position.
    pub fn set_transport_position(&self, position: u64) {
        self.shared.request_seek(position);
    }

    /// The transport position as of the last rendered block.
    pub fn transport_position(&self) -> u64 {
        self.shared.position()
    }

    /// Progress through the host bar, in [0, 1), as of the last rendered block.
    pub fn bar_phase01(&self) -> f64 {
        rhythm::phase01(self.shared.position(), &self.clock.snapshot())
    }

    /// True once the layer has been removed from the mixer.
    pub fn is_detached(&self) -> bool {
        self.shared.is_detached()
    }

    /// Hands a sample to the render thread for a role.
    pub fn load_sample(&self, role: Role, buffer: SampleBuffer) -> Result<(), LayerError> {
        self.swap_sample(role, Some(Arc::new(buffer)))
    }

    /// Hands an already shared sample to the render thread, e.g. one from a
    /// [`samples::SampleLoader`] cache.
    pub fn load_shared(&self, role: Role, buffer: Arc<SampleBuffer>) -> Result<(), LayerError> {
        self.swap_sample(role, Some(buffer))
    }

    /// Builds a sample from interleaved PCM and loads it. Invalid PCM leaves the
    /// current voice in place.
    pub fn load_pcm(&self, role: Role, samples: &[f32], channels: u16) -> Result<(), LayerError> {
        let buffer = SampleBuffer::from_interleaved(samples, channels)?;
        self.load_sample(role, buffer)
    }

    /// Decodes an audio file and loads it. A file that can't be decoded leaves the
    /// current voice in place.
    pub fn load_sample_file(&self, role: Role, path: &Path) -> Result<(), LayerError> {
        let buffer = samples::load_file(path, self.clock.sample_rate())?;
        info!(
            layer = %self.id,
            role = %role,
            path = ?path,
            frames = buffer.len(),
            "Loaded sample"
        );
        self.load_sample(role, buffer)
    }

    /// Removes the sample for a role, returning it to the click fallback.
    pub fn clear_sample(&self, role: Role) -> Result<(), LayerError> {
        self.swap_sample(role, None)
    }

    fn swap_sample(&self, role: Role, buffer: Option<Arc<SampleBuffer>>) -> Result<(), LayerError> {
        if self.shared.is_detached() {
            return Err(LayerError::Detached(self.id));
        }

        // Releasing retired buffers before every send keeps the return channel from
        // ever filling up.
        self.collect_garbage();
        match self.samples_tx.try_send((role, buffer)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LayerError::Busy(self.id)),
            Err(TrySendError::Disconnected(_)) => Err(LayerError::Detached(self.id)),
        }
    }

    /// Drops sample buffers the render thread has finished with. Returns how many
    /// were released.
    pub fn collect_garbage(&self) -> usize {
        self.garbage_rx.try_iter().count()
    }
}

impl std::fmt::Debug for LayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerHandle")
            .field("id", &self.id)
            .field("sides", &self.sides())
            .field("mode", &self.mode())
            .field("playing", &self.is_playing())
            .finish()
    }
}
