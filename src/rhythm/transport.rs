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
use crate::clock::ClockSnapshot;

/// A monotonically increasing sample counter for one layer.
#[derive(Debug, Default, Clone)]
pub struct LayerTransport {
    position: u64,
}

impl LayerTransport {
    pub fn new() -> LayerTransport {
        LayerTransport::default()
    }

    /// Samples rendered since the last reset.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Moves the transport to an explicit position.
    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    #[inline]
    pub fn advance(&mut self) {
        self.position += 1;
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Progress through the current host bar, in [0, 1).
    ///
    /// This is always measured against the host bar, whatever the layer's own
    /// timing mode, so every layer can be drawn on the same time axis.
    pub fn phase01(&self, clock: &ClockSnapshot) -> f64 {
        phase01(self.position, clock)
    }
}

/// Progress of `position` through the host bar described by `clock`, in [0, 1).
pub fn phase01(position: u64, clock: &ClockSnapshot) -> f64 {
    let samples_per_bar = clock.samples_per_bar();
    let phase = (position as f64 % samples_per_bar) / samples_per_bar;
    if phase.is_finite() && phase < 1.0 {
        phase.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;

    #[test]
    fn test_phase_through_bar() {
        let clock = Clock::new(48_000, 120.0, 4).snapshot();
        let mut transport = LayerTransport::new();
        assert_eq!(transport.phase01(&clock), 0.0);

        transport.set_position(24_000);
        assert_eq!(transport.phase01(&clock), 0.25);

        transport.set_position(96_000 + 48_000);
        assert_eq!(transport.phase01(&clock), 0.5);

        transport.set_position(96_000 * 7);
        assert_eq!(transport.phase01(&clock), 0.0);
    }

    #[test]
    fn test_phase_in_range() {
        let clock = Clock::new(44_100, 137.0, 3).snapshot();
        let mut transport = LayerTransport::new();
        for _ in 0..200_000 {
            let phase = transport.phase01(&clock);
            assert!((0.0..1.0).contains(&phase));
            transport.advance();
        }
        assert_eq!(transport.position(), 200_000);
    }

    #[test]
    fn test_reset() {
        let mut transport = LayerTransport::new();
        transport.set_position(1234);
        transport.reset();
        assert_eq!(transport.position(), 0);
    }
}
