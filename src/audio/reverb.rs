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
use std::fmt;

use fft_convolver::FFTConvolver;

use super::{AudioError, DecodedBuffer};

/// Partition size of the convolvers. Any callback size works, this only trades CPU for memory.
const BLOCK_SIZE: usize = 256;

/// Convolution reverb applied to the whole mix before the master gain.
///
/// The output is fully wet. Each output channel is convolved with the impulse channel of the same
/// index, wrapping around so a mono impulse feeds every channel.
pub struct Reverb {
    /// One convolver per output channel.
    convolvers: Vec<FFTConvolver<f32>>,
    /// Dry input of one channel.
    dry: Vec<f32>,
    /// Wet output of one channel.
    wet: Vec<f32>,
    /// Impulse length in output frames.
    frames: usize,
}

impl Reverb {
    /// Prepares a reverb for an output with `num_channels` channels at `sample_rate`.
    ///
    /// The impulse is resampled to the output rate and scaled to unit energy, so swapping impulses
    /// keeps the loudness roughly constant.
    pub fn new(
        impulse: &DecodedBuffer,
        num_channels: u16,
        sample_rate: u32,
    ) -> Result<Reverb, AudioError> {
        if impulse.frames() == 0 || impulse.sample_rate() == 0 || sample_rate == 0 {
            return Err(AudioError::InvalidImpulse("impulse is empty".to_string()));
        }

        let step = impulse.sample_rate() as f64 / sample_rate as f64;
        let frames = ((impulse.frames() as f64 / step).ceil() as usize).max(1);
        let channels: Vec<Vec<f32>> = (0..num_channels.max(1) as usize)
            .map(|channel| {
                (0..frames)
                    .map(|frame| impulse.interpolated(frame as f64 * step, channel))
                    .collect()
            })
            .collect();

        let energy = channels
            .iter()
            .map(|ir| ir.iter().map(|s| s * s).sum::<f32>())
            .fold(0.0, f32::max);
        if !energy.is_finite() || energy <= 0.0 {
            return Err(AudioError::InvalidImpulse("impulse is silent".to_string()));
        }
        let scale = energy.sqrt().recip();

        let convolvers = channels
            .into_iter()
            .map(|mut ir| {
                ir.iter_mut().for_each(|s| *s *= scale);
                let mut convolver = FFTConvolver::<f32>::default();
                convolver
                    .init(BLOCK_SIZE, &ir)
                    .map_err(|e| AudioError::InvalidImpulse(format!("{:?}", e)))?;
                Ok(convolver)
            })
            .collect::<Result<Vec<_>, AudioError>>()?;

        Ok(Reverb {
            convolvers,
            dry: Vec::with_capacity(BLOCK_SIZE),
            wet: Vec::with_capacity(BLOCK_SIZE),
            frames,
        })
    }

    /// Returns the number of output channels this reverb was prepared for.
    pub fn num_channels(&self) -> usize {
        self.convolvers.len()
    }

    /// Returns the impulse length in output frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Replaces the interleaved `block` with its reverberated signal.
    pub fn process(&mut self, block: &mut [f32]) {
        let channels = self.convolvers.len();
        let frames = block.len() / channels;
        self.dry.resize(frames, 0.0);
        self.wet.resize(frames, 0.0);

        for (channel, convolver) in self.convolvers.iter_mut().enumerate() {
            for (frame, dry) in self.dry.iter_mut().enumerate() {
                *dry = block[frame * channels + channel];
            }
            if convolver.process(&self.dry, &mut self.wet).is_err() {
                self.wet.fill(0.0);
            }
            for (frame, wet) in self.wet.iter().enumerate() {
                block[frame * channels + channel] = *wet;
            }
        }
    }
}

impl fmt::Debug for Reverb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reverb")
            .field("channels", &self.convolvers.len())
            .field("frames", &self.frames)
            .finish()
    }
}
