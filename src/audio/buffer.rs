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
use std::time::Duration;

/// Fully decoded audio held in memory, shared between every voice that plays it.
pub struct DecodedBuffer {
    /// Interleaved f32 samples.
    samples: Vec<f32>,
    /// Number of channels in the buffer.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Creates a buffer from interleaved samples.
    pub fn new(samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> DecodedBuffer {
        DecodedBuffer {
            samples,
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channel_count as usize
    }

    /// Returns the natural playback duration.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }

    /// Reads a channel at a fractional frame position using linear interpolation.
    /// Channels beyond the buffer's own wrap around, so mono feeds every output channel.
    pub fn interpolated(&self, position: f64, channel: usize) -> f32 {
        let frames = self.frames();
        if frames == 0 || position < 0.0 {
            return 0.0;
        }

        let index = position.floor() as usize;
        if index >= frames {
            return 0.0;
        }
        let channels = self.channel_count as usize;
        let channel = channel % channels;
        let frac = (position - index as f64) as f32;

        let s0 = self.samples[index * channels + channel];
        let s1 = self
            .samples
            .get((index + 1) * channels + channel)
            .copied()
            .unwrap_or(s0);

        s0 + (s1 - s0) * frac
    }
}

impl fmt::Debug for DecodedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedBuffer")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frames_and_duration() {
        let buffer = DecodedBuffer::new(vec![0.0; 44100 * 2], 2, 44100);
        assert_eq!(44100, buffer.frames());
        assert_eq!(Duration::from_secs(1), buffer.duration());
        assert_eq!(44100 * 2 * 4, buffer.memory_size());
    }

    #[test]
    fn test_interpolated() {
        // Stereo: left ramps up, right ramps down.
        let buffer = DecodedBuffer::new(vec![0.0, 1.0, 1.0, 0.0, 2.0, -1.0], 2, 48000);
        assert_eq!(0.0, buffer.interpolated(0.0, 0));
        assert_eq!(0.5, buffer.interpolated(0.5, 0));
        assert_eq!(0.5, buffer.interpolated(0.5, 1));
        assert_eq!(1.5, buffer.interpolated(1.5, 0));
        // Last frame holds its value, past the end is silent.
        assert_eq!(2.0, buffer.interpolated(2.5, 0));
        assert_eq!(0.0, buffer.interpolated(3.0, 0));
    }

    #[test]
    fn test_mono_feeds_all_channels() {
        let buffer = DecodedBuffer::new(vec![0.25, 0.75], 1, 48000);
        assert_eq!(0.25, buffer.interpolated(0.0, 0));
        assert_eq!(0.25, buffer.interpolated(0.0, 1));
        assert_eq!(0.75, buffer.interpolated(1.0, 3));
    }
}
