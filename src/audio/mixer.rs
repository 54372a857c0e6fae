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

//! Sums scheduled one-shot voices on the output clock.
//! Shared by the device stream and the mock output.

use std::sync::Arc;

use tracing::debug;

use super::{DecodedBuffer, OneShotVoice, Reverb};

/// A voice waiting for, or in the middle of, playback.
struct ActiveVoice {
    buffer: Arc<DecodedBuffer>,
    /// Read position in buffer frames.
    position: f64,
    /// Buffer frames advanced per output frame.
    increment: f64,
    /// Output frame at which the voice becomes audible.
    start_frame: u64,
}

/// Sums one-shot voices through a master gain into interleaved output.
pub struct Mixer {
    /// Active voices, including ones scheduled in the future.
    voices: Vec<ActiveVoice>,
    /// Number of output channels.
    num_channels: u16,
    /// Output sample rate.
    sample_rate: u32,
    /// Convolution applied to the summed signal ahead of the gain.
    reverb: Option<Reverb>,
    /// Master gain applied to the summed signal.
    gain: f32,
    /// Frames rendered since the mixer was created; this is the output clock.
    frame: u64,
}

impl Mixer {
    /// Creates a new mixer.
    pub fn new(num_channels: u16, sample_rate: u32, gain: f32) -> Mixer {
        Mixer {
            voices: Vec::new(),
            num_channels: num_channels.max(1),
            sample_rate,
            reverb: None,
            gain,
            frame: 0,
        }
    }

    /// Returns the number of output channels.
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Returns the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frame
    }

    /// Returns the number of voices playing or waiting to play.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Installs the reverb, returning the one it replaces.
    pub fn set_reverb(&mut self, reverb: Option<Reverb>) -> Option<Reverb> {
        std::mem::replace(&mut self.reverb, reverb)
    }

    /// Schedules a voice to start at `at` seconds on the output clock.
    pub fn add_voice(&mut self, voice: OneShotVoice, at: f64) {
        let start_frame = (at.max(0.0) * self.sample_rate as f64).round() as u64;
        // The buffer's own rate is folded into the increment so it needs no transcoding.
        let increment =
            voice.rate() * voice.buffer().sample_rate() as f64 / self.sample_rate.max(1) as f64;
        if !increment.is_finite() || increment <= 0.0 {
            debug!(rate = voice.rate(), "Dropping voice that would never advance");
            return;
        }

        self.voices.push(ActiveVoice {
            buffer: voice.buffer().clone(),
            position: 0.0,
            increment,
            start_frame,
        });
    }

    /// Mixes the next `output.len() / num_channels` frames into `output`, overwriting it.
    pub fn process_into(&mut self, output: &mut [f32]) {
        output.fill(0.0);

        let channels = self.num_channels as usize;
        let block_start = self.frame;
        let frames = output.len() / channels;

        for voice in self.voices.iter_mut() {
            for (offset, frame) in output.chunks_exact_mut(channels).enumerate() {
                if block_start + (offset as u64) < voice.start_frame {
                    continue;
                }
                for (channel, sample) in frame.iter_mut().enumerate() {
                    *sample += voice.buffer.interpolated(voice.position, channel);
                }
                voice.position += voice.increment;
            }
        }

        if let Some(reverb) = self.reverb.as_mut() {
            reverb.process(output);
        }

        if self.gain != 1.0 {
            output.iter_mut().for_each(|sample| *sample *= self.gain);
        }

        self.voices
            .retain(|voice| voice.position < voice.buffer.frames() as f64);
        self.frame += frames as u64;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ramp(frames: usize) -> Arc<DecodedBuffer> {
        Arc::new(DecodedBuffer::new(
            (0..frames).map(|i| i as f32).collect(),
            1,
            48000,
        ))
    }

    #[test]
    fn test_unity_rate_copies_buffer() {
        let mut mixer = Mixer::new(1, 48000, 1.0);
        mixer.add_voice(OneShotVoice::new(ramp(4), 1.0), 0.0);

        let mut output = vec![0.0; 6];
        mixer.process_into(&mut output);
        assert_eq!(vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0], output);
        assert_eq!(0, mixer.active_voices());
        assert_eq!(6, mixer.frames_rendered());
    }

    #[test]
    fn test_rate_scales_increment() {
        let mut mixer = Mixer::new(1, 48000, 1.0);
        mixer.add_voice(OneShotVoice::new(ramp(8), 2.0), 0.0);

        let mut output = vec![0.0; 4];
        mixer.process_into(&mut output);
        assert_eq!(vec![0.0, 2.0, 4.0, 6.0], output);
    }

    #[test]
    fn test_buffer_rate_folded_into_increment() {
        // A 24kHz buffer on a 48kHz output advances half a frame per output frame.
        let buffer = Arc::new(DecodedBuffer::new(vec![0.0, 1.0, 2.0], 1, 24000));
        let mut mixer = Mixer::new(1, 48000, 1.0);
        mixer.add_voice(OneShotVoice::new(buffer, 1.0), 0.0);

        let mut output = vec![0.0; 4];
        mixer.process_into(&mut output);
        assert_eq!(vec![0.0, 0.5, 1.0, 1.5], output);
    }

    #[test]
    fn test_start_time_delays_voice() {
        let mut mixer = Mixer::new(2, 4, 0.5);
        // Starts at frame 2 of a 4Hz clock.
        mixer.add_voice(OneShotVoice::new(ramp(2), 1.0), 0.5);

        let mut output = vec![0.0; 8];
        mixer.process_into(&mut output);
        assert_eq!(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.5], output);
        assert_eq!(0, mixer.active_voices());
    }

    #[test]
    fn test_past_start_plays_immediately() {
        let mut mixer = Mixer::new(1, 4, 1.0);
        let mut output = vec![0.0; 4];
        mixer.process_into(&mut output);

        mixer.add_voice(OneShotVoice::new(ramp(2), 1.0), 0.25);
        mixer.process_into(&mut output);
        assert_eq!(vec![0.0, 1.0, 0.0, 0.0], output);
    }

    #[test]
    fn test_degenerate_rates_are_dropped() {
        let mut mixer = Mixer::new(1, 48000, 1.0);
        mixer.add_voice(OneShotVoice::new(ramp(4), 0.0), 0.0);
        mixer.add_voice(OneShotVoice::new(ramp(4), f64::INFINITY), 0.0);
        mixer.add_voice(OneShotVoice::new(ramp(4), f64::NAN), 0.0);
        assert_eq!(0, mixer.active_voices());
    }

    #[test]
    fn test_reverb_feeds_gain() -> Result<(), crate::audio::AudioError> {
        let impulse = DecodedBuffer::new(vec![0.0, 1.0], 1, 48000);
        let mut mixer = Mixer::new(1, 48000, 0.5);
        assert!(mixer
            .set_reverb(Some(Reverb::new(&impulse, 1, 48000)?))
            .is_none());
        mixer.add_voice(OneShotVoice::new(ramp(4), 1.0), 0.0);

        let mut output = vec![0.0; 3];
        mixer.process_into(&mut output);
        let mut tail = vec![0.0; 3];
        mixer.process_into(&mut tail);

        // Delayed one frame by the impulse, then halved by the gain.
        let expected = [0.0, 0.0, 0.5, 1.0, 1.5, 0.0];
        for (expected, actual) in expected.iter().zip(output.iter().chain(tail.iter())) {
            assert!((expected - actual).abs() < 1e-4, "{} != {}", expected, actual);
        }
        assert!(mixer.set_reverb(None).is_some());
        Ok(())
    }
}
