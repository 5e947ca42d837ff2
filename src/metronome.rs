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
//! The global reference metronome.
//!
//! A fixed four beat click that follows the shared tempo but keeps its own transport
//! and play state. Beat one uses the down tone, every other beat the up tone.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::clock::{Clock, ClockSnapshot};
use crate::layer::MixSource;
use crate::rhythm::{self, LayerTransport, Role, StepScheduler, TimingMode};
use crate::voice::{ClickSynth, Tone};

/// Beats in the metronome's bar. Independent of the host bar length.
pub const BEATS_PER_BAR: usize = 4;

/// Tone of the first beat.
pub const DOWN_TONE: Tone = Tone::new(1000.0, 1.0);

/// Tone of the remaining beats.
pub const UP_TONE: Tone = Tone::new(1500.0, 0.9);

#[derive(Debug)]
struct MetronomeShared {
    enabled: AtomicBool,
    playing: AtomicBool,
    reset_epoch: AtomicU64,
    position: AtomicU64,
}

/// Control-side view of the metronome.
#[derive(Debug, Clone)]
pub struct MetronomeHandle {
    shared: Arc<MetronomeShared>,
    clock: Arc<Clock>,
}

impl MetronomeHandle {
    /// Turns the metronome on or off. Turning it on restarts it from beat one.
    pub fn set_enabled(&self, enabled: bool) {
        debug!(enabled, "Setting metronome");
        self.shared.enabled.store(enabled, Ordering::Relaxed);
        if enabled {
            self.play();
        } else {
            self.stop();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
    }

    /// Restarts from beat one. Does nothing while the metronome is disabled.
    pub fn play(&self) {
        if !self.is_enabled() {
            return;
        }
        self.shared.reset_epoch.fetch_add(1, Ordering::Release);
        self.shared.playing.store(true, Ordering::Release);
    }

    /// Stops and rewinds to beat one.
    pub fn stop(&self) {
        self.shared.playing.store(false, Ordering::Release);
        self.shared.reset_epoch.fetch_add(1, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    pub fn transport_position(&self) -> u64 {
        self.shared.position.load(Ordering::Relaxed)
    }

    /// Progress through the host bar, in [0, 1), as of the last rendered block.
    pub fn bar_phase01(&self) -> f64 {
        rhythm::phase01(self.transport_position(), &self.clock.snapshot())
    }
}

/// Render-side half of the metronome.
#[derive(Debug)]
pub struct MetronomeSource {
    shared: Arc<MetronomeShared>,
    clock: Arc<Clock>,
    snapshot: ClockSnapshot,
    scheduler: StepScheduler,
    transport: LayerTransport,
    click: ClickSynth,
    playing: bool,
    seen_epoch: u64,
}

impl MetronomeSource {
    pub fn transport_position(&self) -> u64 {
        self.transport.position()
    }

    pub fn step_index(&self) -> Option<usize> {
        self.scheduler.step_index()
    }

    /// Rewinds to beat one and starts or stops. Starting does nothing while the
    /// metronome is disabled.
    pub fn restart(&mut self, playing: bool) {
        let playing = playing && self.shared.enabled.load(Ordering::Relaxed);
        self.seen_epoch = self.shared.reset_epoch.load(Ordering::Acquire);
        self.transport.reset();
        self.scheduler.reset();
        self.click.silence();
        self.playing = playing;
        self.shared.playing.store(playing, Ordering::Release);
        self.shared.position.store(0, Ordering::Relaxed);
    }

    fn sync(&mut self) {
        let snapshot = self.clock.snapshot();
        if snapshot != self.snapshot {
            self.scheduler.recalc_step(&snapshot);
            self.snapshot = snapshot;
        }
        self.apply_reset();
    }

    fn apply_reset(&mut self) {
        let epoch = self.shared.reset_epoch.load(Ordering::Acquire);
        if epoch == self.seen_epoch {
            return;
        }
        self.seen_epoch = epoch;
        self.transport.reset();
        self.scheduler.reset();
        self.click.silence();
    }
}

impl MixSource for MetronomeSource {
    fn mix_into(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        self.sync();
        let targets = channels.min(2);
        for frame in output.chunks_exact_mut(channels) {
            let playing = self.shared.playing.load(Ordering::Relaxed);
            if playing != self.playing {
                self.playing = playing;
                self.apply_reset();
            }
            if !self.playing {
                continue;
            }

            if let Some(event) = self.scheduler.tick() {
                let tone = match event.role {
                    Role::Down => DOWN_TONE,
                    _ => UP_TONE,
                };
                self.click.trigger(tone.frequency, tone.gain);
            }
            let sample = self.click.next_sample();
            for out in &mut frame[..targets] {
                *out += sample;
            }
            self.transport.advance();
        }
        self.shared
            .position
            .store(self.transport.position(), Ordering::Relaxed);
    }
}

/// Creates both halves of the metronome. It starts enabled but stopped.
pub fn create(clock: Arc<Clock>) -> (MetronomeHandle, MetronomeSource) {
    let shared = Arc::new(MetronomeShared {
        enabled: AtomicBool::new(true),
        playing: AtomicBool::new(false),
        reset_epoch: AtomicU64::new(0),
        position: AtomicU64::new(0),
    });

    let snapshot = clock.snapshot();
    let mut scheduler = StepScheduler::new(TimingMode::Polymeter, BEATS_PER_BAR, &snapshot);
    scheduler.set_accents(Some(0), None);

    let source = MetronomeSource {
        shared: shared.clone(),
        clock: clock.clone(),
        snapshot,
        scheduler,
        transport: LayerTransport::new(),
        click: ClickSynth::new(snapshot.sample_rate),
        playing: false,
        seen_epoch: 0,
    };
    (MetronomeHandle { shared, clock }, source)
}
