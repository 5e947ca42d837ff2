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

//! Rhythmic timing: step scheduling, accents and per-layer transport.

mod accent;
mod scheduler;
mod transport;

use std::{fmt, str::FromStr};

use serde::Deserialize;

pub use accent::{remap_index, Accent};
pub use scheduler::{StepEvent, StepScheduler};
pub use transport::{phase01, LayerTransport};

/// Lowest number of steps a layer can have.
pub const MIN_SIDES: usize = 1;

/// Highest number of steps a layer can have.
pub const MAX_SIDES: usize = crate::clock::MAX_BEATS as usize;

/// Clamps a requested side count into the supported range.
pub fn clamp_sides(sides: usize) -> usize {
    sides.clamp(MIN_SIDES, MAX_SIDES)
}

/// How a layer's steps relate to the host bar.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingMode {
    /// All steps are spread evenly across one host bar.
    #[default]
    Polyrhythm,
    /// One step per host beat, cycling through the layer's own meter.
    Polymeter,
}

impl TimingMode {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            TimingMode::Polyrhythm => 0,
            TimingMode::Polymeter => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> TimingMode {
        match value {
            1 => TimingMode::Polymeter,
            _ => TimingMode::Polyrhythm,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimingMode::Polyrhythm => "polyrhythm",
            TimingMode::Polymeter => "polymeter",
        }
    }
}

impl FromStr for TimingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "polyrhythm" | "Polyrhythm" => Ok(TimingMode::Polyrhythm),
            "polymeter" | "Polymeter" => Ok(TimingMode::Polymeter),
            _ => Err(format!("unsupported timing mode: {}", s)),
        }
    }
}

impl fmt::Display for TimingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The sound role of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The down accent.
    Down,
    /// The up accent.
    Up,
    /// Every step that is not an accent.
    Unaccented,
}

impl Role {
    /// All roles, in slot order.
    pub const ALL: [Role; 3] = [Role::Down, Role::Up, Role::Unaccented];

    /// Index of the role's voice slot.
    pub fn slot(self) -> usize {
        match self {
            Role::Down => 0,
            Role::Up => 1,
            Role::Unaccented => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Down => "down",
            Role::Up => "up",
            Role::Unaccented => "unaccented",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_mode_from_str() {
        assert_eq!(
            TimingMode::from_str("polyrhythm").unwrap(),
            TimingMode::Polyrhythm
        );
        assert_eq!(
            TimingMode::from_str("Polymeter").unwrap(),
            TimingMode::Polymeter
        );
        assert!(TimingMode::from_str("swing").is_err());
    }

    #[test]
    fn test_timing_mode_u8_round_trip() {
        for mode in [TimingMode::Polyrhythm, TimingMode::Polymeter] {
            assert_eq!(TimingMode::from_u8(mode.as_u8()), mode);
        }
    }

    #[test]
    fn test_clamp_sides() {
        assert_eq!(clamp_sides(0), 1);
        assert_eq!(clamp_sides(7), 7);
        assert_eq!(clamp_sides(1000), 64);
    }
}
