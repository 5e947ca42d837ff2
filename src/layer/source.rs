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

use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::controls::LayerShared;
use super::handle::SampleSwap;
use super::LayerId;
use crate::clock::{Clock, ClockSnapshot};
use crate::rhythm::{LayerTransport, Role, StepScheduler};
use crate::voice::{SampleBuffer, Tone, VoiceBank};

/// Something the mixer can render into an interleaved output block.
pub trait MixSource: Send {
    /// Adds this source's next `output.len() / channels` frames onto `output`.
    /// Must not block or allocate.
    fn mix_into(&mut self, output: &mut [f32], channels: usize);
}

/// Render-side half of a layer. Owned by whichever thread runs the mixer.
pub struct LayerSource {
    id: LayerId,
    shared: Arc<LayerShared>,
    clock: Arc<Clock>,
    snapshot: ClockSnapshot,
    scheduler: StepScheduler,
    transport: LayerTransport,
    voices: VoiceBank,
    tones: [Tone; 3],
    mute_unaccented: bool,
    playing: bool,
    seen_epoch: u64,
    samples_rx: Receiver<SampleSwap>,
    garbage_tx: Sender<Arc<SampleBuffer>>,
    /// A replaced buffer with no handle left to take it back. Held until the source
    /// itself is dropped, which happens off the render thread.
    orphan: Option<Arc<SampleBuffer>>,
}

impl LayerSource {
    pub(super) fn new(
        id: LayerId,
        shared: Arc<LayerShared>,
        clock: Arc<Clock>,
        samples_rx: Receiver<SampleSwap>,
        garbage_tx: Sender<Arc<SampleBuffer>>,
    ) -> LayerSource {
        let snapshot = clock.snapshot();
        let mut scheduler = StepScheduler::new(shared.mode(), shared.sides(), &snapshot);
        scheduler.set_accents(
            shared.accent_index(Role::Down),
            shared.accent_index(Role::Up),
        );

        LayerSource {
            id,
            scheduler,
            transport: LayerTransport::new(),
            voices: VoiceBank::new(snapshot.sample_rate),
            tones: Role::ALL.map(|role| shared.tone(role)),
            mute_unaccented: shared.mute_unaccented(),
            playing: shared.is_playing(),
            seen_epoch: shared.seek_epoch(),
            snapshot,
            shared,
            clock,
            samples_rx,
            garbage_tx,
            orphan: None,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn transport_position(&self) -> u64 {
        self.transport.position()
    }

    /// Whether the layer has been asked to play. The render side picks a change up
    /// on its next frame.
    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    pub fn scheduler(&self) -> &StepScheduler {
        &self.scheduler
    }

    pub fn voices(&self) -> &VoiceBank {
        &self.voices
    }

    /// Lines this layer up with another layer's transport. Used when a layer joins a
    /// mixer that is already running.
    pub fn sync_with(&mut self, position: u64, playing: bool) {
        self.sync();
        self.seen_epoch = self.shared.seek_epoch();
        self.transport.set_position(position);
        self.scheduler.sync_to_position(position);
        self.voices.silence();
        self.playing = playing;
        self.shared.set_playing(playing);
        self.shared.publish_position(position);
    }

    /// Rewinds to position 0 and starts or stops. The mixer calls this on every
    /// source between two blocks so a global start lands on the same frame
    /// everywhere.
    pub fn restart(&mut self, playing: bool) {
        self.seen_epoch = self.shared.seek_epoch();
        self.transport.reset();
        self.scheduler.reset();
        self.voices.silence();
        self.playing = playing;
        self.shared.set_playing(playing);
        self.shared.publish_position(0);
    }

    /// Marks the layer as removed. Its handle refuses further sample loads.
    pub fn detach(&self) {
        self.shared.detach();
    }

    /// Picks up control-side changes. Runs once at the top of every block.
    fn sync(&mut self) {
        let snapshot = self.clock.snapshot();
        let sides = self.shared.sides();
        let mode = self.shared.mode();
        if sides != self.scheduler.sides() {
            self.scheduler.set_sides(sides, &snapshot);
        }
        if mode != self.scheduler.mode() {
            self.scheduler.set_mode(mode, &snapshot);
        }
        if snapshot != self.snapshot {
            self.scheduler.recalc_step(&snapshot);
            self.snapshot = snapshot;
        }
        self.scheduler.set_accents(
            self.shared.accent_index(Role::Down),
            self.shared.accent_index(Role::Up),
        );

        for role in Role::ALL {
            self.tones[role.slot()] = self.shared.tone(role);
        }
        self.mute_unaccented = self.shared.mute_unaccented();

        // Only take a new sample when there is room to hand back the old one.
        while self.orphan.is_none() && !self.garbage_tx.is_full() {
            let Ok((role, buffer)) = self.samples_rx.try_recv() else {
                break;
            };
            if let Some(old) = self.voices.install(role, buffer) {
                if let Err(TrySendError::Disconnected(old)) = self.garbage_tx.try_send(old) {
                    self.orphan = Some(old);
                }
            }
        }

        self.apply_seek();
    }

    /// Applies a pending reset or seek, if there is one.
    fn apply_seek(&mut self) {
        let epoch = self.shared.seek_epoch();
        if epoch == self.seen_epoch {
            return;
        }
        self.seen_epoch = epoch;

        let position = self.shared.seek_target();
        self.transport.set_position(position);
        self.scheduler.sync_to_position(position);
        self.voices.silence();
    }

    #[inline]
    fn render_frame(&mut self) -> f32 {
        if let Some(event) = self.scheduler.tick() {
            if !(self.mute_unaccented && event.role == Role::Unaccented) {
                self.voices
                    .trigger(event.role, self.tones[event.role.slot()]);
            }
        }
        let sample = self.voices.next_sample();
        self.transport.advance();
        sample
    }
}

impl MixSource for LayerSource {
    fn mix_into(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        self.sync();
        let targets = channels.min(2);
        for frame in output.chunks_exact_mut(channels) {
            let playing = self.shared.is_playing();
            if playing != self.playing {
                self.playing = playing;
                self.apply_seek();
            }
            if !self.playing {
                continue;
            }

            let sample = self.render_frame();
            for out in &mut frame[..targets] {
                *out += sample;
            }
        }
        self.shared.publish_position(self.transport.position());
    }
}

impl std::fmt::Debug for LayerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerSource")
            .field("id", &self.id)
            .field("position", &self.transport.position())
            .field("step", &self.scheduler.step_index())
            .field("playing", &self.playing)
            .finish()
    }
}
