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
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, warn};

use crate::audio::mixer::Mixer;
use crate::config::{self, StreamBufferSize};

/// Frames rendered per pass when the device wants integer samples.
const SCRATCH_FRAMES: usize = 1024;

/// Errors from opening or running the output stream.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("no default output device")]
    NoDevice,

    #[error("unable to query the output device: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unable to build the output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("unable to start the output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("the output thread exited before the stream started")]
    ThreadExited,
}

/// The host's default output device with the stream configuration we'll use.
pub struct OutputDevice {
    device: cpal::Device,
    name: String,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
}

impl OutputDevice {
    /// Opens the default output device. The sample rate and buffer size come from the
    /// audio config where set, otherwise from the device.
    pub fn open_default(audio: &config::Audio) -> Result<OutputDevice, OutputError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(OutputError::NoDevice)?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();

        let mut stream_config = supported.config();
        if let Some(sample_rate) = audio.sample_rate() {
            stream_config.sample_rate = sample_rate;
        }
        stream_config.buffer_size = match audio.buffer_size()? {
            StreamBufferSize::Default => cpal::BufferSize::Default,
            StreamBufferSize::Fixed(frames) => cpal::BufferSize::Fixed(frames),
            StreamBufferSize::Min => match supported.buffer_size() {
                cpal::SupportedBufferSize::Range { min, .. } => cpal::BufferSize::Fixed(*min),
                cpal::SupportedBufferSize::Unknown => {
                    warn!(device = name, "Device does not report buffer sizes, using default");
                    cpal::BufferSize::Default
                }
            },
        };

        info!(
            device = name,
            host = host.id().name(),
            channels = stream_config.channels,
            sample_rate = stream_config.sample_rate,
            format = %sample_format,
            "Opened output device"
        );
        Ok(OutputDevice {
            device,
            name,
            config: stream_config,
            sample_format,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Starts the stream on its own thread, with the mixer rendering inside the
    /// callback. Audio runs until the returned [`Output`] is dropped.
    pub fn start(self, mixer: Mixer) -> Result<Output, OutputError> {
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        // Streams are not Send on every platform, so the stream is built and dropped
        // on the thread that owns it.
        let thread = thread::spawn(move || {
            let stream = match self.build_stream(mixer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = started_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = started_tx.send(Err(OutputError::from(e)));
                return;
            }
            info!(device = self.name, "Output stream started");
            let _ = started_tx.send(Ok(()));

            wait_for_shutdown(&shutdown_rx);
            drop(stream);
            info!(device = self.name, "Output stream stopped");
        });

        match started_rx.recv() {
            Ok(Ok(())) => Ok(Output {
                shutdown: Some(shutdown_tx),
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(OutputError::ThreadExited)
            }
        }
    }

    fn build_stream(&self, mixer: Mixer) -> Result<cpal::Stream, OutputError> {
        let channels = self.config.channels as usize;
        match self.sample_format {
            cpal::SampleFormat::F32 => {
                let mut callback = create_f32_callback(mixer, channels);
                Ok(self.device.build_output_stream(
                    &self.config,
                    move |data: &mut [f32], info: &cpal::OutputCallbackInfo| callback(data, info),
                    |err| error!("CPAL output stream error: {}", err),
                    None,
                )?)
            }
            cpal::SampleFormat::I16 => self.build_converting_stream::<i16>(mixer, channels),
            cpal::SampleFormat::I32 => self.build_converting_stream::<i32>(mixer, channels),
            cpal::SampleFormat::U16 => self.build_converting_stream::<u16>(mixer, channels),
            format => Err(OutputError::UnsupportedFormat(format)),
        }
    }

    fn build_converting_stream<T>(
        &self,
        mixer: Mixer,
        channels: usize,
    ) -> Result<cpal::Stream, OutputError>
    where
        T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
    {
        let mut callback = create_converting_callback::<T>(mixer, channels);
        Ok(self.device.build_output_stream(
            &self.config,
            move |data: &mut [T], info: &cpal::OutputCallbackInfo| callback(data, info),
            |err| error!("CPAL output stream error: {}", err),
            None,
        )?)
    }
}

fn wait_for_shutdown(shutdown: &Receiver<()>) {
    // Either an explicit message or the sender being dropped ends the wait.
    let _ = shutdown.recv();
}

/// f32 callback: the mixer renders straight into the device buffer.
fn create_f32_callback(
    mut mixer: Mixer,
    channels: usize,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        mixer.render(data, channels);
    }
}

/// Integer callback: render into a preallocated scratch buffer and convert.
fn create_converting_callback<T>(
    mut mixer: Mixer,
    channels: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES * channels.max(1)];
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        render_converting(&mut mixer, &mut scratch, data, channels);
    }
}

/// Renders `data` in scratch-sized passes. The scratch length must be a multiple of
/// the channel count.
fn render_converting<T>(mixer: &mut Mixer, scratch: &mut [f32], data: &mut [T], channels: usize)
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    for chunk in data.chunks_mut(scratch.len()) {
        let rendered = &mut scratch[..chunk.len()];
        mixer.render(rendered, channels);
        for (dst, &src) in chunk.iter_mut().zip(rendered.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

/// A running output stream. Dropping it stops audio.
pub struct Output {
    shutdown: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for Output {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineSettings};

    fn playing_mixer() -> (Engine, Mixer) {
        let (engine, mixer) = Engine::new(EngineSettings::default());
        engine.play().unwrap();
        (engine, mixer)
    }

    #[test]
    fn test_converting_render_matches_f32() {
        let (_reference, mut reference_mixer) = playing_mixer();
        let (_converted, mut converted_mixer) = playing_mixer();

        // Longer than the scratch buffer so the data is rendered in several passes.
        let frames = SCRATCH_FRAMES * 2 + 100;
        let mut expected = vec![0.0f32; frames * 2];
        reference_mixer.render(&mut expected, 2);

        let mut scratch = vec![0.0f32; SCRATCH_FRAMES * 2];
        let mut actual = vec![0.0f64; frames * 2];
        render_converting(&mut converted_mixer, &mut scratch, &mut actual, 2);

        assert!(expected.iter().any(|sample| *sample != 0.0));
        for (expected, actual) in expected.iter().zip(actual.iter()) {
            assert_eq!(f64::from(*expected), *actual);
        }
    }

    #[test]
    fn test_converting_to_integers() {
        let (_engine, mut mixer) = playing_mixer();
        let mut scratch = vec![0.0f32; 64];
        let mut data = vec![0i16; 4_096];
        render_converting(&mut mixer, &mut scratch, &mut data, 2);
        assert!(data.iter().any(|sample| *sample != 0));
    }
}
