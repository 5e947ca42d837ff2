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

//! Sample-accurate step scheduling.

use super::{clamp_sides, Role, TimingMode};
use crate::clock::ClockSnapshot;

/// A step that fired on the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent {
    /// The step index within the layer's cycle.
    pub step: usize,
    /// Which voice owns the step.
    pub role: Role,
}

/// Counts down frames until the next step of a layer and classifies each step.
///
/// The period is kept fractional and the countdown carries its remainder from one
/// step to the next, so step `k` always lands within one frame of `k * period`
/// no matter how long the layer runs.
#[derive(Debug, Clone)]
pub struct StepScheduler {
    mode: TimingMode,
    sides: usize,
    down: Option<usize>,
    up: Option<usize>,
    step_samples: f64,
    countdown: f64,
    step_index: Option<usize>,
}

impl StepScheduler {
    /// Creates a scheduler that fires its first step on the first frame.
    pub fn new(mode: TimingMode, sides: usize, clock: &ClockSnapshot) -> StepScheduler {
        let mut scheduler = StepScheduler {
            mode,
            sides: clamp_sides(sides),
            down: None,
            up: None,
            step_samples: 1.0,
            countdown: 1.0,
            step_index: None,
        };
        scheduler.recalc_step(clock);
        scheduler
    }

    pub fn mode(&self) -> TimingMode {
        self.mode
    }

    pub fn sides(&self) -> usize {
        self.sides
    }

    /// The current step, or `None` before the first step has fired.
    pub fn step_index(&self) -> Option<usize> {
        self.step_index
    }

    /// The exact step period in samples. Never below one.
    pub fn step_period(&self) -> f64 {
        self.step_samples
    }

    /// The step period rounded to the nearest whole sample. Never zero.
    pub fn step_samples(&self) -> u64 {
        (self.step_samples.round() as u64).max(1)
    }

    /// Frames left until the next step fires.
    pub fn countdown(&self) -> f64 {
        self.countdown
    }

    /// Switches timing mode. The step index and countdown carry over; only the
    /// period changes.
    pub fn set_mode(&mut self, mode: TimingMode, clock: &ClockSnapshot) {
        self.mode = mode;
        self.recalc_step(clock);
    }

    /// Changes the number of steps. Accents that no longer fit are disabled.
    pub fn set_sides(&mut self, sides: usize, clock: &ClockSnapshot) {
        self.sides = clamp_sides(sides);
        self.down = self.down.filter(|index| *index < self.sides);
        self.up = self.up.filter(|index| *index < self.sides);
        self.step_index = self.step_index.map(|index| index % self.sides);
        self.recalc_step(clock);
    }

    /// Sets both accent positions. Indices outside the cycle are treated as unset.
    pub fn set_accents(&mut self, down: Option<usize>, up: Option<usize>) {
        self.down = down.filter(|index| *index < self.sides);
        self.up = up.filter(|index| *index < self.sides);
    }

    pub fn down_index(&self) -> Option<usize> {
        self.down
    }

    pub fn up_index(&self) -> Option<usize> {
        self.up
    }

    /// Recomputes the step period from the clock. A countdown longer than the new
    /// period is pulled in so that shrinking the period never stalls the layer.
    pub fn recalc_step(&mut self, clock: &ClockSnapshot) {
        let period = match self.mode {
            TimingMode::Polyrhythm => clock.samples_per_bar() / self.sides as f64,
            TimingMode::Polymeter => clock.samples_per_beat(),
        };
        self.step_samples = if period.is_finite() {
            period.max(1.0)
        } else {
            1.0
        };

        if self.countdown <= 0.0 || self.countdown > self.step_samples {
            self.countdown = self.step_samples;
        }
    }

    /// Forgets the current step. The next frame fires step 0.
    pub fn reset(&mut self) {
        self.step_index = None;
        self.countdown = 1.0;
    }

    /// Aligns the scheduler with a transport that is already at `position`, as if it
    /// had been running on the current period since position 0.
    pub fn sync_to_position(&mut self, position: u64) {
        if position == 0 {
            self.reset();
            return;
        }

        let position = position as f64;
        let next = (position / self.step_samples).ceil();
        self.countdown = (next * self.step_samples - position + 1.0).max(1.0);
        self.step_index = if next < 1.0 {
            None
        } else {
            Some(((next as u64 - 1) % self.sides as u64) as usize)
        };
    }

    /// Advances by one frame. Returns the step that fires on this frame, if any.
    #[inline]
    pub fn tick(&mut self) -> Option<StepEvent> {
        self.countdown -= 1.0;
        if self.countdown > 0.0 {
            return None;
        }

        self.countdown += self.step_samples;
        let step = self.step_index.map_or(0, |index| (index + 1) % self.sides);
        self.step_index = Some(step);
        Some(StepEvent {
            step,
            role: self.classify(step),
        })
    }

    /// The role of a step. The down accent wins when both accents share a step.
    pub fn classify(&self, step: usize) -> Role {
        if self.down == Some(step) {
            Role::Down
        } else if self.up == Some(step) {
            Role::Up
        } else {
            Role::Unaccented
        }
    }
}
