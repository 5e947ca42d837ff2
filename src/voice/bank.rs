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

use super::{ClickSynth, OneShot, SampleBuffer};
use crate::rhythm::Role;

/// Frequency and gain used when a role sounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f64,
    pub gain: f32,
}

impl Tone {
    pub const fn new(frequency: f64, gain: f32) -> Tone {
        Tone { frequency, gain }
    }

    /// The default tone for a role.
    pub fn default_for(role: Role) -> Tone {
        match role {
            Role::Down => Tone::new(220.0, 1.2),
            Role::Up => Tone::new(440.0, 1.0),
            Role::Unaccented => Tone::new(1200.0, 0.7),
        }
    }
}

/// The three voice slots of a layer plus the fallback click.
#[derive(Debug)]
pub struct VoiceBank {
    slots: [OneShot; 3],
    click: ClickSynth,
}

impl VoiceBank {
    pub fn new(sample_rate: u32) -> VoiceBank {
        VoiceBank {
            slots: [OneShot::new(), OneShot::new(), OneShot::new()],
            click: ClickSynth::new(sample_rate),
        }
    }

    /// Sounds a role: the slot's sample if one is loaded, otherwise the click at the
    /// role's tone. Never both.
    pub fn trigger(&mut self, role: Role, tone: Tone) {
        if !self.slots[role.slot()].trigger(tone.gain) {
            self.click.trigger(tone.frequency, tone.gain);
        }
    }

    /// Installs a sample for a role and hands back the one it replaces.
    pub fn install(
        &mut self,
        role: Role,
        buffer: Option<Arc<SampleBuffer>>,
    ) -> Option<Arc<SampleBuffer>> {
        self.slots[role.slot()].replace(buffer)
    }

    pub fn is_loaded(&self, role: Role) -> bool {
        self.slots[role.slot()].is_loaded()
    }

    pub fn slot(&self, role: Role) -> &OneShot {
        &self.slots[role.slot()]
    }

    pub fn click(&self) -> &ClickSynth {
        &self.click
    }

    /// Cuts every voice.
    pub fn silence(&mut self) {
        self.slots.iter_mut().for_each(OneShot::silence);
        self.click.silence();
    }

    /// The sum of all voices for the next frame. No limiting is applied.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let samples: f32 = self.slots.iter_mut().map(OneShot::next_sample).sum();
        samples + self.click.next_sample()
    }
}
