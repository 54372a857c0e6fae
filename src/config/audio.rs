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
use std::time::Duration;

use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// The device name that selects the host's default output device.
pub const DEFAULT_DEVICE: &str = "default";

const DEFAULT_GAIN: f32 = 0.5;
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Audio {
    /// The audio device.
    #[serde(default = "default_device")]
    device: String,

    /// Master gain on the shared destination (default: 0.5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gain: Option<f32>,

    /// How often the loop scheduler checks for due firings (default: 10ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tick_interval: Option<String>,

    /// Impulse response for the convolution reverb, relative to the samples path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reverb: Option<String>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            gain: None,
            tick_interval: None,
            reverb: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Replaces the device name.
    pub fn set_device(&mut self, device: &str) {
        self.device = device.to_string();
    }

    /// Returns the master gain.
    pub fn gain(&self) -> f32 {
        self.gain.unwrap_or(DEFAULT_GAIN)
    }

    /// Returns the reverb impulse file, if the mix should be reverberated.
    pub fn reverb(&self) -> Option<&str> {
        self.reverb.as_deref()
    }

    /// Returns the scheduler tick interval.
    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        let Some(value) = &self.tick_interval else {
            return Ok(DEFAULT_TICK_INTERVAL);
        };

        let interval: Duration = DurationString::from_string(value.clone())
            .map_err(|e| ConfigError::InvalidTickInterval {
                value: value.clone(),
                reason: e.to_string(),
            })?
            .into();
        if interval.is_zero() {
            return Err(ConfigError::InvalidTickInterval {
                value: value.clone(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(interval)
    }

    /// Checks the gain range and the tick interval syntax.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gain = self.gain();
        if !(0.0..=1.0).contains(&gain) {
            return Err(ConfigError::InvalidGain(gain));
        }
        self.tick_interval()?;
        Ok(())
    }
}

impl Default for Audio {
    fn default() -> Self {
        Audio::new(DEFAULT_DEVICE)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let audio = Audio::default();
        assert_eq!(DEFAULT_DEVICE, audio.device());
        assert_eq!(0.5, audio.gain());
        assert_eq!(Duration::from_millis(10), audio.tick_interval().unwrap());
        assert_eq!(None, audio.reverb());
        assert!(audio.validate().is_ok());
    }

    #[test]
    fn test_tick_interval() {
        let mut audio = Audio::new("mock-device");
        audio.tick_interval = Some("25ms".to_string());
        assert_eq!(Duration::from_millis(25), audio.tick_interval().unwrap());

        audio.tick_interval = Some("whenever".to_string());
        assert!(matches!(
            audio.tick_interval(),
            Err(ConfigError::InvalidTickInterval { .. })
        ));

        audio.tick_interval = Some("0s".to_string());
        assert!(audio.validate().is_err());
    }

    #[test]
    fn test_gain_range() {
        let mut audio = Audio::default();
        audio.gain = Some(1.0);
        assert!(audio.validate().is_ok());
        audio.gain = Some(1.5);
        assert!(matches!(audio.validate(), Err(ConfigError::InvalidGain(_))));
        audio.gain = Some(-0.1);
        assert!(audio.validate().is_err());
    }
}
