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
use std::f64::consts::TAU;

/// Per-sample envelope multiplier.
pub const DECAY: f64 = 0.995;

/// Envelope level below which the click is considered finished.
pub const ENVELOPE_FLOOR: f64 = 1.0e-4;

/// Highest gain a single hit may use.
pub const MAX_GAIN: f32 = 4.0;

/// A tiny exponentially decaying sine oscillator.
#[derive(Debug, Clone)]
pub struct ClickSynth {
    sample_rate: f64,
    phase: f64,
    increment: f64,
    envelope: f64,
    gain: f32,
}

impl ClickSynth {
    pub fn new(sample_rate: u32) -> ClickSynth {
        ClickSynth {
            sample_rate: f64::from(sample_rate.max(1)),
            phase: 0.0,
            increment: 0.0,
            envelope: 0.0,
            gain: 1.0,
        }
    }

    /// Starts a new click. The frequency and gain hold until the click has decayed
    /// or is retriggered.
    pub fn trigger(&mut self, frequency: f64, gain: f32) {
        let frequency = if frequency.is_finite() {
            frequency.clamp(0.0, self.sample_rate / 2.0)
        } else {
            0.0
        };
        self.increment = TAU * frequency / self.sample_rate;
        self.gain = if gain.is_finite() {
            gain.clamp(0.0, MAX_GAIN)
        } else {
            0.0
        };
        self.envelope = 1.0;
    }

    /// Stops the click immediately.
    pub fn silence(&mut self) {
        self.envelope = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.envelope > 0.0
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.envelope == 0.0 {
            return 0.0;
        }

        let sample = (self.phase.sin() * self.envelope) as f32 * self.gain;

        self.phase += self.increment;
        if self.phase >= TAU {
            self.phase -= TAU;
        }

        self.envelope *= DECAY;
        if self.envelope < ENVELOPE_FLOOR {
            self.envelope = 0.0;
        }

        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_until_triggered() {
        let mut click = ClickSynth::new(48_000);
        assert!(!click.is_active());
        assert!((0..100).all(|_| click.next_sample() == 0.0));
    }

    #[test]
    fn test_decays_to_exact_zero() {
        let mut click = ClickSynth::new(48_000);
        click.trigger(1000.0, 1.0);
        assert!(click.is_active());

        // 0.995^n drops below 1e-4 after ln(1e-4)/ln(0.995) ~= 1838 samples.
        let samples: Vec<f32> = (0..1900).map(|_| click.next_sample()).collect();
        assert!(samples.iter().any(|sample| sample.abs() > 0.1));
        assert!(!click.is_active());
        assert_eq!(click.next_sample(), 0.0);
    }

    #[test]
    fn test_bounded_by_gain() {
        let mut click = ClickSynth::new(48_000);
        click.trigger(440.0, 0.5);
        for _ in 0..2000 {
            assert!(click.next_sample().abs() <= 0.5);
        }
    }

    #[test]
    fn test_gain_is_clamped() {
        let mut click = ClickSynth::new(48_000);
        click.trigger(1000.0, 100.0);
        for _ in 0..2000 {
            assert!(click.next_sample().abs() <= MAX_GAIN);
        }
    }

    #[test]
    fn test_phase_stays_bounded() {
        let mut click = ClickSynth::new(8_000);
        for _ in 0..100 {
            click.trigger(3_999.0, 1.0);
            for _ in 0..2000 {
                click.next_sample();
                assert!(click.phase >= 0.0 && click.phase < TAU);
            }
        }
    }

    #[test]
    fn test_retrigger_restarts_envelope() {
        let mut click = ClickSynth::new(48_000);
        click.trigger(1000.0, 1.0);
        for _ in 0..1000 {
            click.next_sample();
        }
        assert!(click.envelope < 0.01);

        click.trigger(1000.0, 1.0);
        assert_eq!(click.envelope, 1.0);
    }
}
