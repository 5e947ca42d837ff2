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
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::LayerSettings;
use crate::rhythm::{Accent, Role, TimingMode};
use crate::voice::Tone;

/// A tone stored as two atomics. A reader may see a new frequency with an old gain
/// for one block, which is harmless.
#[derive(Debug)]
pub(super) struct ToneCell {
    frequency: AtomicU64,
    gain: AtomicU32,
}

impl ToneCell {
    fn new(tone: Tone) -> ToneCell {
        ToneCell {
            frequency: AtomicU64::new(tone.frequency.to_bits()),
            gain: AtomicU32::new(tone.gain.to_bits()),
        }
    }

    pub(super) fn store(&self, tone: Tone) {
        self.frequency
            .store(tone.frequency.to_bits(), Ordering::Relaxed);
        self.gain.store(tone.gain.to_bits(), Ordering::Relaxed);
    }

    pub(super) fn load(&self) -> Tone {
        Tone::new(
            f64::from_bits(self.frequency.load(Ordering::Relaxed)),
            f32::from_bits(self.gain.load(Ordering::Relaxed)),
        )
    }
}

/// Encodes an optional step index for an atomic. -1 means unset.
fn encode_index(index: Option<usize>) -> i64 {
    index.map_or(-1, |index| index as i64)
}

fn decode_index(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

/// State shared between a layer's handle and its source.
#[derive(Debug)]
pub(super) struct LayerShared {
    sides: AtomicUsize,
    mode: AtomicU8,
    down_index: AtomicI64,
    up_index: AtomicI64,
    mute_unaccented: AtomicBool,
    playing: AtomicBool,
    /// Bumped for every reset or seek request. The source applies `seek_target`
    /// whenever it sees a new value.
    seek_epoch: AtomicU64,
    seek_target: AtomicU64,
    /// Transport position published by the source after every block.
    position: AtomicU64,
    /// Set once the source has been removed from the mixer.
    detached: AtomicBool,
    tones: [ToneCell; 3],
    /// Accent indices plus their retained phases. Only touched by control threads.
    accents: Mutex<[Accent; 2]>,
}

impl LayerShared {
    pub(super) fn new(sides: usize, settings: &LayerSettings) -> LayerShared {
        LayerShared {
            sides: AtomicUsize::new(sides),
            mode: AtomicU8::new(settings.mode.as_u8()),
            down_index: AtomicI64::new(-1),
            up_index: AtomicI64::new(-1),
            mute_unaccented: AtomicBool::new(settings.mute_unaccented),
            playing: AtomicBool::new(false),
            seek_epoch: AtomicU64::new(0),
            seek_target: AtomicU64::new(0),
            position: AtomicU64::new(0),
            detached: AtomicBool::new(false),
            tones: Role::ALL.map(|role| ToneCell::new(settings.tone(role))),
            accents: Mutex::new([Accent::NONE; 2]),
        }
    }

    pub(super) fn sides(&self) -> usize {
        self.sides.load(Ordering::Relaxed)
    }

    pub(super) fn set_sides(&self, sides: usize) {
        self.sides.store(sides, Ordering::Relaxed);
    }

    pub(super) fn mode(&self) -> TimingMode {
        TimingMode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    pub(super) fn set_mode(&self, mode: TimingMode) {
        self.mode.store(mode.as_u8(), Ordering::Relaxed);
    }

    pub(super) fn accent_index(&self, role: Role) -> Option<usize> {
        match role {
            Role::Down => decode_index(self.down_index.load(Ordering::Relaxed)),
            Role::Up => decode_index(self.up_index.load(Ordering::Relaxed)),
            Role::Unaccented => None,
        }
    }

    pub(super) fn store_accent_index(&self, role: Role, index: Option<usize>) {
        match role {
            Role::Down => self
                .down_index
                .store(encode_index(index), Ordering::Relaxed),
            Role::Up => self.up_index.store(encode_index(index), Ordering::Relaxed),
            Role::Unaccented => {}
        }
    }

    pub(super) fn accents(&self) -> &Mutex<[Accent; 2]> {
        &self.accents
    }

    pub(super) fn mute_unaccented(&self) -> bool {
        self.mute_unaccented.load(Ordering::Relaxed)
    }

    pub(super) fn set_mute_unaccented(&self, mute: bool) {
        self.mute_unaccented.store(mute, Ordering::Relaxed);
    }

    pub(super) fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub(super) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    /// Asks the source to move its transport to `position`. Zero is a full reset.
    pub(super) fn request_seek(&self, position: u64) {
        self.seek_target.store(position, Ordering::Relaxed);
        self.seek_epoch.fetch_add(1, Ordering::Release);
    }

    pub(super) fn seek_epoch(&self) -> u64 {
        self.seek_epoch.load(Ordering::Acquire)
    }

    pub(super) fn seek_target(&self) -> u64 {
        self.seek_target.load(Ordering::Relaxed)
    }

    pub(super) fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    pub(super) fn publish_position(&self, position: u64) {
        self.position.store(position, Ordering::Relaxed);
    }

    pub(super) fn tone(&self, role: Role) -> Tone {
        self.tones[role.slot()].load()
    }

    pub(super) fn set_tone(&self, role: Role, tone: Tone) {
        self.tones[role.slot()].store(tone);
    }

    pub(super) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Relaxed)
    }

    pub(super) fn detach(&self) {
        self.detached.store(true, Ordering::Relaxed);
    }
}
