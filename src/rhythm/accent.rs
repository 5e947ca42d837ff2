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

/// Maps a retained accent phase onto a layer with `sides` steps.
///
/// The result is always a valid step index: a phase that rounds up to `sides` wraps to 0.
pub fn remap_index(phase01: f64, sides: usize) -> usize {
    let sides = sides.max(1);
    let phase01 = if phase01.is_finite() {
        phase01.clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((phase01 * sides as f64).round() as usize) % sides
}

/// An accent position on a layer.
///
/// The phase is kept alongside the index so that the accent survives side count
/// changes: resizing snaps to the step nearest to the original phase rather than
/// to whatever the old index happens to mean on the new polygon.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Accent {
    index: Option<usize>,
    phase01: Option<f64>,
}

impl Accent {
    /// An accent that is not set.
    pub const NONE: Accent = Accent {
        index: None,
        phase01: None,
    };

    /// Places the accent on `index` of a layer with `sides` steps. An index that is
    /// out of range disables the accent.
    pub fn set(&mut self, index: Option<usize>, sides: usize) {
        *self = match index {
            Some(index) if index < sides => Accent {
                index: Some(index),
                phase01: Some(index as f64 / sides as f64),
            },
            _ => Accent::NONE,
        };
    }

    /// Recomputes the index for a new side count from the retained phase.
    pub fn resize(&mut self, sides: usize) {
        self.index = self.phase01.map(|phase01| remap_index(phase01, sides));
    }

    /// The current step index, if the accent is set.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The retained phase, if the accent is set.
    pub fn phase01(&self) -> Option<f64> {
        self.phase01
    }
}
