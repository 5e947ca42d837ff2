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
// Sums every layer and the metronome into the output block. This is the only code
// that runs on the audio thread.
use crossbeam_channel::{Receiver, Sender};

use crate::layer::{LayerId, LayerSource, MixSource};
use crate::metronome::MetronomeSource;

/// Changes applied by the mixer between blocks.
pub(crate) enum MixerCommand {
    Add(Box<LayerSource>),
    Remove(LayerId),
    /// Starts or stops every layer and the metronome from position 0, all on the
    /// first frame of the same block.
    Transport(bool),
}

/// The render half of an engine.
pub struct Mixer {
    /// Live layers. The first one is the reference that new layers line up with.
    layers: Vec<Box<LayerSource>>,
    metronome: MetronomeSource,
    commands: Receiver<MixerCommand>,
    /// Removed layers on their way back to the control thread to be dropped there.
    retired: Sender<Box<LayerSource>>,
    capacity: usize,
    sample_rate: u32,
}

impl Mixer {
    pub(crate) fn new(
        capacity: usize,
        sample_rate: u32,
        mut layers: Vec<Box<LayerSource>>,
        metronome: MetronomeSource,
        commands: Receiver<MixerCommand>,
        retired: Sender<Box<LayerSource>>,
    ) -> Mixer {
        layers.reserve(capacity.saturating_sub(layers.len()));
        Mixer {
            layers,
            metronome,
            commands,
            retired,
            capacity,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.layers.iter().map(|layer| layer.id())
    }

    /// Overwrites `output` with the next block of interleaved audio. Pending
    /// commands are applied first, so they take effect on the block's first frame.
    /// Sources are summed with no gain staging or limiting.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        output.fill(0.0);
        self.apply_commands();
        if channels == 0 {
            return;
        }

        for layer in self.layers.iter_mut() {
            layer.mix_into(output, channels);
        }
        self.metronome.mix_into(output, channels);
    }

    /// Applies pending commands in order. Nothing is freed here: removed and
    /// rejected layers go back over the retire channel, and commands wait while it
    /// is full.
    fn apply_commands(&mut self) {
        while !self.retired.is_full() {
            let Ok(command) = self.commands.try_recv() else {
                return;
            };

            match command {
                MixerCommand::Add(mut layer) => {
                    if self.layers.len() >= self.capacity {
                        layer.detach();
                        let _ = self.retired.try_send(layer);
                        continue;
                    }
                    if let Some(reference) = self.layers.first() {
                        layer.sync_with(reference.transport_position(), reference.is_playing());
                    }
                    self.layers.push(layer);
                }
                MixerCommand::Remove(id) => {
                    let Some(index) = self.layers.iter().position(|layer| layer.id() == id)
                    else {
                        continue;
                    };
                    let layer = self.layers.remove(index);
                    layer.detach();
                    let _ = self.retired.try_send(layer);
                }
                MixerCommand::Transport(playing) => {
                    for layer in self.layers.iter_mut() {
                        layer.restart(playing);
                    }
                    self.metronome.restart(playing);
                }
            }
        }
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("sample_rate", &self.sample_rate)
            .field("layers", &self.layers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::Clock;
    use crate::layer::{self, LayerSettings};
    use crate::metronome;
    use crate::rhythm::Role;
    use crate::voice::SampleBuffer;

    struct Fixture {
        mixer: Mixer,
        commands: Sender<MixerCommand>,
        retired: Receiver<Box<LayerSource>>,
        clock: Arc<Clock>,
        metronome: metronome::MetronomeHandle,
    }

    fn fixture(capacity: usize) -> Fixture {
        let clock = Arc::new(Clock::new(48_000, 120.0, 4));
        let (metronome, metronome_source) = metronome::create(clock.clone());
        metronome.set_enabled(false);
        let (commands, commands_rx) = crossbeam_channel::bounded(8);
        let (retired_tx, retired) = crossbeam_channel::bounded(2);
        Fixture {
            mixer: Mixer::new(
                capacity,
                48_000,
                Vec::new(),
                metronome_source,
                commands_rx,
                retired_tx,
            ),
            commands,
            retired,
            clock,
            metronome,
        }
    }

    fn add(fixture: &Fixture, settings: &LayerSettings) -> layer::LayerHandle {
        let (handle, source) = layer::create(LayerId::next(), fixture.clock.clone(), settings);
        for role in Role::ALL {
            handle
                .load_sample(role, SampleBuffer::from_interleaved(&[1.0], 1).unwrap())
                .unwrap();
        }
        handle.set_tone(Role::Unaccented, crate::voice::Tone::new(1200.0, 0.5));
        fixture
            .commands
            .try_send(MixerCommand::Add(Box::new(source)))
            .unwrap();
        handle
    }

    #[test]
    fn test_render_clears_output() {
        let mut fixture = fixture(4);
        let mut output = vec![1.0; 64];
        fixture.mixer.render(&mut output, 2);
        assert!(output.iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn test_layers_are_summed() {
        let mut fixture = fixture(4);
        let first = add(&fixture, &LayerSettings::default());
        let second = add(&fixture, &LayerSettings::default());
        let mut output = vec![0.0; 32];
        fixture.mixer.render(&mut output, 2);
        assert_eq!(fixture.mixer.layer_count(), 2);

        first.play();
        second.play();
        fixture.mixer.render(&mut output, 2);
        assert_eq!(&output[..4], &[1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_new_layer_joins_reference_position() {
        let mut fixture = fixture(4);
        let first = add(&fixture, &LayerSettings::default());
        let mut output = vec![0.0; 1_024];
        fixture.mixer.render(&mut output, 1);
        first.play();
        for _ in 0..10 {
            fixture.mixer.render(&mut output, 1);
        }
        assert_eq!(first.transport_position(), 10_240);

        let second = add(&fixture, &LayerSettings::added());
        fixture.mixer.render(&mut output, 1);
        assert!(second.is_playing());
        assert_eq!(second.transport_position(), 11_264);

        fixture.mixer.render(&mut output, 1);
        assert_eq!(second.transport_position(), first.transport_position());
    }

    #[test]
    fn test_removed_layer_is_retired() {
        let mut fixture = fixture(4);
        let first = add(&fixture, &LayerSettings::default());
        let second = add(&fixture, &LayerSettings::default());
        let mut output = vec![0.0; 64];
        fixture.mixer.render(&mut output, 1);

        fixture
            .commands
            .try_send(MixerCommand::Remove(second.id()))
            .unwrap();
        fixture.mixer.render(&mut output, 1);
        assert_eq!(fixture.mixer.layer_ids().collect::<Vec<_>>(), vec![first.id()]);
        assert!(second.is_detached());

        let retired = fixture.retired.try_recv().unwrap();
        assert_eq!(retired.id(), second.id());

        second.play();
        fixture.mixer.render(&mut output, 1);
        assert_eq!(second.transport_position(), 0);
    }

    #[test]
    fn test_add_beyond_capacity_is_rejected() {
        let mut fixture = fixture(1);
        add(&fixture, &LayerSettings::default());
        let extra = add(&fixture, &LayerSettings::default());
        let mut output = vec![0.0; 64];
        fixture.mixer.render(&mut output, 1);
        assert_eq!(fixture.mixer.layer_count(), 1);
        assert!(extra.is_detached());
        assert_eq!(fixture.retired.try_recv().unwrap().id(), extra.id());
    }

    #[test]
    fn test_commands_wait_for_retire_space() {
        let mut fixture = fixture(4);
        let handles: Vec<_> = (0..4)
            .map(|_| add(&fixture, &LayerSettings::default()))
            .collect();
        let mut output = vec![0.0; 64];
        fixture.mixer.render(&mut output, 1);

        for handle in &handles[1..] {
            fixture
                .commands
                .try_send(MixerCommand::Remove(handle.id()))
                .unwrap();
        }
        fixture.mixer.render(&mut output, 1);
        assert_eq!(fixture.mixer.layer_count(), 2);

        fixture.retired.try_iter().for_each(drop);
        fixture.mixer.render(&mut output, 1);
        assert_eq!(fixture.mixer.layer_count(), 1);
    }

    #[test]
    fn test_transport_starts_all_sources_together() {
        let mut fixture = fixture(4);
        fixture.metronome.set_enabled(true);
        fixture.metronome.stop();
        let first = add(&fixture, &LayerSettings::default());
        let second = add(&fixture, &LayerSettings::added());
        let mut output = vec![0.0; 256];
        fixture.mixer.render(&mut output, 1);
        assert!(!first.is_playing());

        // A layer already running is pulled back to 0 with the rest.
        second.play();
        fixture.mixer.render(&mut output, 1);
        assert_eq!(second.transport_position(), 256);

        fixture
            .commands
            .try_send(MixerCommand::Transport(true))
            .unwrap();
        for _ in 0..4 {
            fixture.mixer.render(&mut output, 1);
        }
        assert!(first.is_playing());
        assert!(fixture.metronome.is_playing());
        assert_eq!(first.transport_position(), 1_024);
        assert_eq!(second.transport_position(), 1_024);
        assert_eq!(fixture.metronome.transport_position(), 1_024);

        fixture
            .commands
            .try_send(MixerCommand::Transport(false))
            .unwrap();
        fixture.mixer.render(&mut output, 1);
        assert!(output.iter().all(|sample| *sample == 0.0));
        assert!(!first.is_playing());
        assert!(!fixture.metronome.is_playing());
        assert_eq!(first.transport_position(), 0);
        assert_eq!(second.transport_position(), 0);
        assert_eq!(fixture.metronome.transport_position(), 0);
    }

    #[test]
    fn test_transport_skips_disabled_metronome() {
        let mut fixture = fixture(4);
        add(&fixture, &LayerSettings::default());
        fixture
            .commands
            .try_send(MixerCommand::Transport(true))
            .unwrap();
        let mut output = vec![0.0; 64];
        fixture.mixer.render(&mut output, 1);
        assert!(!fixture.metronome.is_playing());
        assert_eq!(fixture.metronome.transport_position(), 0);
    }

    #[test]
    fn test_metronome_is_mixed() {
        let mut fixture = fixture(4);
        fixture.metronome.set_enabled(true);
        let mut output = vec![0.0; 256];
        fixture.mixer.render(&mut output, 1);
        assert!(output.iter().any(|sample| *sample != 0.0));
    }
}
