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
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, span, Level};

use super::mixer::Mixer;
use super::{AudioError, DecodedBuffer, OneShotVoice, OutputGraph, Reverb};

/// Changes to the mix, on their way to the output callback.
enum Command {
    Start { voice: OneShotVoice, at: f64 },
    Reverb(Reverb),
}

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal output devices.
    pub fn list() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(err = e.to_string(), host = host_id.name(), "Unable to open host");
                    continue;
                }
            };
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let max_channels = match device.supported_output_configs() {
                    Ok(configs) => configs.map(|config| config.channels()).max().unwrap_or(0),
                    Err(_) => continue,
                };

                if max_channels > 0 {
                    devices.push(Device {
                        name: device_name(&device),
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the named device, or the default output device of the default host.
    pub fn get(name: Option<&str>) -> Result<Device, AudioError> {
        match name {
            Some(name) => Device::list()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
            None => {
                let host = cpal::default_host();
                let device = host
                    .default_output_device()
                    .ok_or(AudioError::NoDefaultDevice)?;
                let max_channels = device
                    .default_output_config()
                    .map_err(|e| AudioError::Device(e.to_string()))?
                    .channels();
                Ok(Device {
                    name: device_name(&device),
                    max_channels,
                    host_id: host.id(),
                    device,
                })
            }
        }
    }

    /// Opens the device's default output stream with a mixer behind a master gain.
    pub fn open(self, gain: f32) -> Result<Output, AudioError> {
        let supported = self
            .device
            .default_output_config()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let sample_rate: u32 = config.sample_rate;
        let num_channels = config.channels;
        let mixer = Mixer::new(num_channels, sample_rate, gain);

        let (command_tx, command_rx) = crossbeam_channel::unbounded::<Command>();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);
        let frames = Arc::new(AtomicU64::new(0));

        let device = self.device;
        let name = self.name.clone();
        let callback_frames = frames.clone();

        // cpal streams are not Send, so the stream lives and dies on its own thread.
        let output_thread = thread::spawn(move || {
            let span = span!(Level::INFO, "output stream", device = name);
            let _enter = span.enter();

            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(
                    &device,
                    &config,
                    mixer,
                    command_rx,
                    callback_frames,
                ),
                cpal::SampleFormat::I16 => build_stream::<i16>(
                    &device,
                    &config,
                    mixer,
                    command_rx,
                    callback_frames,
                ),
                cpal::SampleFormat::U16 => build_stream::<u16>(
                    &device,
                    &config,
                    mixer,
                    command_rx,
                    callback_frames,
                ),
                other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
            };

            let stream = match stream.and_then(|stream| {
                stream
                    .play()
                    .map_err(|e| AudioError::Device(e.to_string()))?;
                Ok(stream)
            }) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            info!("CPAL output stream started successfully");
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until the output is dropped.
            let _ = shutdown_rx.recv();
            drop(stream);
            info!("CPAL output stream stopped");
        });

        ready_rx.recv().map_err(|_| AudioError::Closed)??;

        Ok(Output {
            name: self.name,
            sample_rate,
            num_channels,
            frames,
            command_tx,
            shutdown_tx,
            output_thread: Some(output_thread),
        })
    }
}

/// Builds an output stream that applies pending commands and mixes in the callback.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
    command_rx: Receiver<Command>,
    frames: Arc<AtomicU64>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                while let Ok(command) = command_rx.try_recv() {
                    match command {
                        Command::Start { voice, at } => mixer.add_voice(voice, at),
                        Command::Reverb(reverb) => {
                            mixer.set_reverb(Some(reverb));
                        }
                    }
                }

                scratch.resize(data.len(), 0.0);
                mixer.process_into(&mut scratch);
                for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = T::from_sample(src);
                }
                frames.store(mixer.frames_rendered(), Ordering::Release);
            },
            |err| error!("CPAL output stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::Device(e.to_string()))
}

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> String {
    device
        .name()
        .unwrap_or_else(|_| "unreadable device name".to_string())
}

/// An open cpal output stream acting as the output graph.
pub struct Output {
    name: String,
    sample_rate: u32,
    num_channels: u16,
    /// Frames rendered by the callback; the output clock.
    frames: Arc<AtomicU64>,
    command_tx: Sender<Command>,
    shutdown_tx: Sender<()>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl OutputGraph for Output {
    fn current_time(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn start(&self, voice: OneShotVoice, at: f64) -> Result<(), AudioError> {
        self.command_tx
            .send(Command::Start { voice, at })
            .map_err(|_| AudioError::Closed)
    }

    fn set_reverb(&self, impulse: Arc<DecodedBuffer>) -> Result<(), AudioError> {
        // Convolvers are planned here so the callback only swaps them in.
        let reverb = Reverb::new(&impulse, self.num_channels, self.sample_rate)?;
        info!(
            device = self.name,
            frames = reverb.frames(),
            channels = reverb.num_channels(),
            "Installing reverb"
        );
        self.command_tx
            .send(Command::Reverb(reverb))
            .map_err(|_| AudioError::Closed)
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}Hz)", self.name, self.sample_rate)
    }
}
