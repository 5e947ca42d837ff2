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
//! The control-side façade over the layer set, the shared clock and the metronome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::audio::mixer::{Mixer, MixerCommand};
use crate::clock::{Clock, DEFAULT_HOST_BEATS_PER_BAR, DEFAULT_TEMPO};
use crate::layer::{self, LayerHandle, LayerId, LayerSettings, LayerSource};
use crate::metronome::{self, MetronomeHandle};
use crate::rhythm::TimingMode;
use crate::samples::SampleLoader;

/// Most layers an engine will run at once.
pub const MAX_LAYERS: usize = 32;

/// Errors from changing the layer set.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no more than {0} layers can run at once")]
    TooManyLayers(usize),

    #[error("too many layer changes pending, try again shortly")]
    Busy,

    #[error("the mixer has shut down")]
    MixerClosed,
}

/// Everything needed to build an engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub sample_rate: u32,
    pub tempo: f64,
    pub host_beats_per_bar: u32,
    pub metronome: bool,
    /// Layers to start with. An empty list gets one default layer.
    pub layers: Vec<LayerSettings>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            sample_rate: 48_000,
            tempo: DEFAULT_TEMPO,
            host_beats_per_bar: DEFAULT_HOST_BEATS_PER_BAR,
            metronome: true,
            layers: vec![LayerSettings::default()],
        }
    }
}

/// Owns the control side of every layer. The matching [`Mixer`] goes to whichever
/// thread renders audio.
pub struct Engine {
    clock: Arc<Clock>,
    layers: Mutex<Vec<LayerHandle>>,
    metronome: MetronomeHandle,
    commands: Sender<MixerCommand>,
    retired: Receiver<Box<LayerSource>>,
    loader: Mutex<SampleLoader>,
    playing: AtomicBool,
}

impl Engine {
    /// Builds an engine and its mixer. Layers past [`MAX_LAYERS`] are skipped with a
    /// warning.
    pub fn new(settings: EngineSettings) -> (Engine, Mixer) {
        let clock = Arc::new(Clock::new(
            settings.sample_rate,
            settings.tempo,
            settings.host_beats_per_bar,
        ));
        let (metronome, metronome_source) = metronome::create(clock.clone());
        metronome.set_enabled(settings.metronome);
        metronome.stop();

        let mut layer_settings = settings.layers;
        if layer_settings.is_empty() {
            layer_settings.push(LayerSettings::default());
        }
        if layer_settings.len() > MAX_LAYERS {
            warn!(
                requested = layer_settings.len(),
                max = MAX_LAYERS,
                "Too many layers, skipping the rest"
            );
            layer_settings.truncate(MAX_LAYERS);
        }

        let mut handles = Vec::with_capacity(MAX_LAYERS);
        let mut sources = Vec::with_capacity(MAX_LAYERS);
        for settings in &layer_settings {
            let (handle, source) = layer::create(LayerId::next(), clock.clone(), settings);
            handles.push(handle);
            sources.push(Box::new(source));
        }

        let (commands, commands_rx) = crossbeam_channel::bounded(MAX_LAYERS);
        let (retired_tx, retired) = crossbeam_channel::bounded(MAX_LAYERS);
        let mixer = Mixer::new(
            MAX_LAYERS,
            clock.sample_rate(),
            sources,
            metronome_source,
            commands_rx,
            retired_tx,
        );

        let engine = Engine {
            loader: Mutex::new(SampleLoader::new(clock.sample_rate())),
            clock,
            layers: Mutex::new(handles),
            metronome,
            commands,
            retired,
            playing: AtomicBool::new(false),
        };
        for (handle, settings) in engine.layers().iter().zip(&layer_settings) {
            engine.load_samples(handle, settings);
        }

        info!(
            sample_rate = engine.clock.sample_rate(),
            tempo = engine.clock.tempo(),
            host_beats_per_bar = engine.clock.host_beats_per_bar(),
            layers = layer_settings.len(),
            "Engine ready"
        );
        (engine, mixer)
    }

    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    /// Adds a layer. It joins the mixer at the start of the next block, lined up with
    /// the transport and play state of the first layer.
    pub fn add_layer(&self, settings: &LayerSettings) -> Result<LayerId, EngineError> {
        self.collect_garbage();

        let mut layers = self.layers.lock();
        if layers.len() >= MAX_LAYERS {
            return Err(EngineError::TooManyLayers(MAX_LAYERS));
        }

        let id = LayerId::next();
        let (handle, source) = layer::create(id, self.clock.clone(), settings);
        self.load_samples(&handle, settings);

        self.send(MixerCommand::Add(Box::new(source)))?;

        info!(
            layer = %id,
            sides = handle.sides(),
            mode = %handle.mode(),
            "Added layer"
        );
        layers.push(handle);
        Ok(id)
    }

    fn send(&self, command: MixerCommand) -> Result<(), EngineError> {
        self.commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::Busy,
            TrySendError::Disconnected(_) => EngineError::MixerClosed,
        })
    }

    fn load_samples(&self, handle: &LayerHandle, settings: &LayerSettings) {
        let mut loader = self.loader.lock();
        for (role, path) in &settings.samples {
            let result = loader
                .load(path)
                .map_err(layer::LayerError::from)
                .and_then(|sample| handle.load_shared(*role, sample));
            if let Err(e) = result {
                warn!(
                    layer = %handle.id(),
                    role = %role,
                    path = ?path,
                    error = %e,
                    "Unable to load sample, keeping the click"
                );
            }
        }
    }

    /// Removes a layer. Returns false, and changes nothing, for an unknown id or the
    /// last remaining layer.
    pub fn remove_layer(&self, id: LayerId) -> bool {
        self.collect_garbage();

        let mut layers = self.layers.lock();
        if layers.len() <= 1 {
            debug!(layer = %id, "Not removing the last layer");
            return false;
        }
        let Some(index) = layers.iter().position(|layer| layer.id() == id) else {
            return false;
        };

        if let Err(e) = self.commands.try_send(MixerCommand::Remove(id)) {
            warn!(layer = %id, error = %e, "Unable to remove layer");
            return false;
        }
        layers.remove(index);
        info!(layer = %id, "Removed layer");
        true
    }

    pub fn layer(&self, id: LayerId) -> Option<LayerHandle> {
        self.layers
            .lock()
            .iter()
            .find(|layer| layer.id() == id)
            .cloned()
    }

    /// Layer ids in the order the layers were added.
    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.lock().iter().map(LayerHandle::id).collect()
    }

    pub fn layers(&self) -> Vec<LayerHandle> {
        self.layers.lock().clone()
    }

    pub fn metronome(&self) -> &MetronomeHandle {
        &self.metronome
    }

    pub fn set_tempo(&self, bpm: f64) {
        self.clock.set_tempo(bpm);
        debug!(tempo = self.clock.tempo(), "Set tempo");
    }

    pub fn set_host_beats_per_bar(&self, beats: u32) {
        self.clock.set_host_beats_per_bar(beats);
        debug!(beats = self.clock.host_beats_per_bar(), "Set host bar");
    }

    /// Sets the timing mode of every layer.
    pub fn set_mode(&self, mode: TimingMode) {
        for layer in self.layers.lock().iter() {
            layer.set_mode(mode);
        }
    }

    /// Mutes or unmutes unaccented steps on every layer.
    pub fn set_mute_unaccented(&self, mute: bool) {
        for layer in self.layers.lock().iter() {
            layer.set_mute_unaccented(mute);
        }
    }

    /// Restarts every layer, and the metronome if it is enabled, from position 0.
    /// Everything starts on the first frame of the mixer's next block.
    pub fn play(&self) -> Result<(), EngineError> {
        self.send(MixerCommand::Transport(true))?;
        self.playing.store(true, Ordering::Relaxed);
        info!("Playing");
        Ok(())
    }

    /// Stops and rewinds every layer and the metronome at the mixer's next block.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.send(MixerCommand::Transport(false))?;
        self.playing.store(false, Ordering::Relaxed);
        info!("Stopped");
        Ok(())
    }

    /// Whether the engine was last told to play. Individual layers may have been
    /// started or stopped through their handles since.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Drops resources the render thread has let go of: replaced sample buffers and
    /// removed layers. Returns how many were dropped.
    pub fn collect_garbage(&self) -> usize {
        let retired = self.retired.try_iter().count();
        let samples: usize = self
            .layers
            .lock()
            .iter()
            .map(LayerHandle::collect_garbage)
            .sum();
        retired + samples
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("clock", &self.clock)
            .field("layers", &*self.layers.lock())
            .finish()
    }
}
