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

//! The shared output graph: a clock, a reverb, a master gain node and one-shot voices.

use std::sync::Arc;

use crate::config;

mod buffer;
pub mod cpal;
pub mod mixer;
pub mod mock;
mod reverb;

pub use buffer::DecodedBuffer;
pub use reverb::Reverb;

/// Errors raised by the output graph.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no output device found with name {0}")]
    DeviceNotFound(String),

    #[error("no default output device")]
    NoDefaultDevice,

    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(String),

    #[error("unusable reverb impulse: {0}")]
    InvalidImpulse(String),

    #[error("output graph is closed")]
    Closed,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A buffer bound to a playback rate, ready to be started on the graph.
#[derive(Clone, Debug)]
pub struct OneShotVoice {
    buffer: Arc<DecodedBuffer>,
    rate: f64,
}

impl OneShotVoice {
    /// Creates a voice that plays `buffer` at `rate` times its natural speed.
    pub fn new(buffer: Arc<DecodedBuffer>, rate: f64) -> OneShotVoice {
        OneShotVoice { buffer, rate }
    }

    /// Returns the buffer played by this voice.
    pub fn buffer(&self) -> &Arc<DecodedBuffer> {
        &self.buffer
    }

    /// Returns the playback-speed multiplier.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

/// The output graph every voice is connected to.
///
/// Times are seconds on the graph's own clock, which doubles as the transport time base.
pub trait OutputGraph: Send + Sync + 'static {
    /// Current position of the output clock in seconds.
    fn current_time(&self) -> f64;

    /// Connects the voice to the master destination and starts it at `at` seconds.
    /// A start time in the past starts the voice immediately.
    fn start(&self, voice: OneShotVoice, at: f64) -> Result<(), AudioError>;

    /// Routes every voice through a convolution reverb built from `impulse` before the master
    /// gain. Replaces any previous reverb.
    fn set_reverb(&self, impulse: Arc<DecodedBuffer>) -> Result<(), AudioError>;
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::Device>, AudioError> {
    cpal::Device::list()
}

/// Opens the output graph described by the audio configuration.
pub fn open_output(config: &config::Audio) -> Result<Arc<dyn OutputGraph>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Output::wall_clock(device)));
    }

    let name = match device {
        config::DEFAULT_DEVICE => None,
        name => Some(name),
    };
    Ok(Arc::new(cpal::Device::get(name)?.open(config.gain())?))
}
