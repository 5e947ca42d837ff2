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

//! The shared musical clock.
//!
//! Every layer and the metronome query the same clock for tempo and host bar length
//! instead of keeping their own copies. Writes come from the control thread; the
//! render thread takes a [`ClockSnapshot`] at the top of each block.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Lowest accepted tempo in beats per minute.
pub const MIN_TEMPO: f64 = 1.0;

/// Highest accepted tempo in beats per minute.
pub const MAX_TEMPO: f64 = 1000.0;

/// Default tempo in beats per minute.
pub const DEFAULT_TEMPO: f64 = 120.0;

/// Default number of beats in the host bar.
pub const DEFAULT_HOST_BEATS_PER_BAR: u32 = 4;

/// Upper bound for the host bar and for layer side counts.
pub const MAX_BEATS: u32 = 64;

/// Shared tempo and bar state.
#[derive(Debug)]
pub struct Clock {
    sample_rate: u32,
    tempo_bits: AtomicU64,
    host_beats_per_bar: AtomicU32,
}

impl Clock {
    /// Creates a new clock. Out of range values are clamped.
    pub fn new(sample_rate: u32, tempo: f64, host_beats_per_bar: u32) -> Clock {
        let clock = Clock {
            sample_rate: sample_rate.max(1),
            tempo_bits: AtomicU64::new(DEFAULT_TEMPO.to_bits()),
            host_beats_per_bar: AtomicU32::new(DEFAULT_HOST_BEATS_PER_BAR),
        };
        clock.set_tempo(tempo);
        clock.set_host_beats_per_bar(host_beats_per_bar);
        clock
    }

    /// The output sample rate. Fixed for the lifetime of the clock.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Sets the tempo. Non-finite values are ignored, everything else is clamped
    /// into [`MIN_TEMPO`, `MAX_TEMPO`].
    pub fn set_tempo(&self, bpm: f64) {
        if !bpm.is_finite() {
            return;
        }
        self.tempo_bits
            .store(bpm.clamp(MIN_TEMPO, MAX_TEMPO).to_bits(), Ordering::Relaxed);
    }

    /// The current tempo in beats per minute.
    pub fn tempo(&self) -> f64 {
        f64::from_bits(self.tempo_bits.load(Ordering::Relaxed))
    }

    /// Sets the number of beats in the host bar, clamped into [1, 64].
    pub fn set_host_beats_per_bar(&self, beats: u32) {
        self.host_beats_per_bar
            .store(beats.clamp(1, MAX_BEATS), Ordering::Relaxed);
    }

    /// The number of beats in the host bar.
    pub fn host_beats_per_bar(&self) -> u32 {
        self.host_beats_per_bar.load(Ordering::Relaxed)
    }

    /// Reads the clock state in one go.
    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            sample_rate: self.sample_rate,
            tempo: self.tempo(),
            host_beats_per_bar: self.host_beats_per_bar(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::new(48_000, DEFAULT_TEMPO, DEFAULT_HOST_BEATS_PER_BAR)
    }
}

/// A consistent copy of the clock used for one block of rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSnapshot {
    pub sample_rate: u32,
    pub tempo: f64,
    pub host_beats_per_bar: u32,
}

impl ClockSnapshot {
    /// Samples in one beat. Never below one sample.
    pub fn samples_per_beat(&self) -> f64 {
        let tempo = self.tempo.max(MIN_TEMPO);
        (f64::from(self.sample_rate) * 60.0 / tempo).max(1.0)
    }

    /// Samples in one host bar. Never below one sample.
    pub fn samples_per_bar(&self) -> f64 {
        (self.samples_per_beat() * f64::from(self.host_beats_per_bar.max(1))).max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_lengths() {
        let clock = Clock::new(48_000, 120.0, 4);
        let snapshot = clock.snapshot();
        assert_eq!(snapshot.samples_per_beat(), 24_000.0);
        assert_eq!(snapshot.samples_per_bar(), 96_000.0);
    }

    #[test]
    fn test_tempo_clamping() {
        let clock = Clock::default();

        clock.set_tempo(0.0);
        assert_eq!(clock.tempo(), MIN_TEMPO);

        clock.set_tempo(-50.0);
        assert_eq!(clock.tempo(), MIN_TEMPO);

        clock.set_tempo(5000.0);
        assert_eq!(clock.tempo(), MAX_TEMPO);

        clock.set_tempo(90.0);
        clock.set_tempo(f64::NAN);
        assert_eq!(clock.tempo(), 90.0);
        clock.set_tempo(f64::INFINITY);
        assert_eq!(clock.tempo(), 90.0);
    }

    #[test]
    fn test_host_beats_clamping() {
        let clock = Clock::default();
        clock.set_host_beats_per_bar(0);
        assert_eq!(clock.host_beats_per_bar(), 1);
        clock.set_host_beats_per_bar(100);
        assert_eq!(clock.host_beats_per_bar(), MAX_BEATS);
    }

    #[test]
    fn test_degenerate_lengths_are_guarded() {
        let snapshot = ClockSnapshot {
            sample_rate: 1,
            tempo: MAX_TEMPO,
            host_beats_per_bar: 0,
        };
        assert_eq!(snapshot.samples_per_beat(), 1.0);
        assert_eq!(snapshot.samples_per_bar(), 1.0);

        let snapshot = ClockSnapshot {
            sample_rate: 48_000,
            tempo: 0.0,
            host_beats_per_bar: 4,
        };
        assert!(snapshot.samples_per_beat().is_finite());
    }
}
