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
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::audio::Audio;
use super::error::ConfigError;
use super::instrument::Instrument;
use super::loops::LoopConfig;
use crate::samples::SampleBank;
use crate::scheduler::Loop;

const DEFAULT_SAMPLES_PATH: &str = "Samples";

/// The built-in ensemble: one piano bank and seven drifting loops.
pub const DEFAULT_ENSEMBLE: &str = r#"
samples_path: "Samples"
audio:
  reverb: "AirportTerminal.wav"
instruments:
  - name: "Grand Piano"
    samples:
      - { name: "A", octave: 4, file: "Grand Piano/piano-f-a4.wav" }
      - { name: "A", octave: 5, file: "Grand Piano/piano-f-a5.wav" }
      - { name: "A", octave: 6, file: "Grand Piano/piano-f-a6.wav" }
      - { name: "C", octave: 4, file: "Grand Piano/piano-f-c4.wav" }
      - { name: "C", octave: 5, file: "Grand Piano/piano-f-c5.wav" }
      - { name: "C", octave: 6, file: "Grand Piano/piano-f-c6.wav" }
      - { name: "D#", octave: 4, file: "Grand Piano/piano-f-d♯4.wav" }
      - { name: "D#", octave: 5, file: "Grand Piano/piano-f-d♯5.wav" }
      - { name: "D#", octave: 6, file: "Grand Piano/piano-f-d♯6.wav" }
      - { name: "F#", octave: 4, file: "Grand Piano/piano-f-f♯4.wav" }
      - { name: "F#", octave: 5, file: "Grand Piano/piano-f-f♯5.wav" }
      - { name: "F#", octave: 6, file: "Grand Piano/piano-f-f♯6.wav" }
loops:
  - { instrument: "Grand Piano", note: { name: "F", octave: 4 }, duration: 19.7, delay: 4.0 }
  - { instrument: "Grand Piano", note: { name: "Ab", octave: 4 }, duration: 17.8, delay: 8.1 }
  - { instrument: "Grand Piano", note: { name: "C", octave: 5 }, duration: 21.3, delay: 5.6 }
  - { instrument: "Grand Piano", note: { name: "Db", octave: 5 }, duration: 18.5, delay: 12.6 }
  - { instrument: "Grand Piano", note: { name: "Eb", octave: 5 }, duration: 20.0, delay: 9.2 }
  - { instrument: "Grand Piano", note: { name: "F", octave: 5 }, duration: 20.0, delay: 14.1 }
  - { instrument: "Grand Piano", note: { name: "Ab", octave: 5 }, duration: 17.7, delay: 3.1 }
"#;

/// A YAML representation of a whole ensemble: sample banks, loops and audio output.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Ensemble {
    /// Base directory for relative sample files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    samples_path: Option<String>,

    /// The audio output configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio: Option<Audio>,

    /// The instruments and their sample banks.
    instruments: Vec<Instrument>,

    /// The loops to play.
    loops: Vec<LoopConfig>,

    /// The directory the ensemble was loaded from, if any.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Ensemble {
    /// Parse an ensemble from a YAML file and validate it.
    pub fn deserialize(path: &Path) -> Result<Ensemble, ConfigError> {
        let mut ensemble = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .build()?
            .try_deserialize::<Ensemble>()?;
        ensemble.base_dir = path.parent().map(Path::to_path_buf);
        ensemble.validate()?;

        info!(
            path = ?path,
            instruments = ensemble.instruments.len(),
            loops = ensemble.loops.len(),
            "Loaded ensemble"
        );
        Ok(ensemble)
    }

    /// Parse an ensemble from a YAML string and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Ensemble, ConfigError> {
        let ensemble = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Ensemble>()?;
        ensemble.validate()?;
        Ok(ensemble)
    }

    /// The built-in ensemble.
    pub fn default_ensemble() -> Result<Ensemble, ConfigError> {
        Ensemble::from_yaml(DEFAULT_ENSEMBLE)
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    /// Replaces the audio configuration.
    pub fn set_audio(&mut self, audio: Audio) {
        self.audio = Some(audio);
    }

    /// Returns the sample directory. Relative paths resolve against the ensemble file's directory.
    pub fn samples_path(&self) -> PathBuf {
        let samples_path = PathBuf::from(
            self.samples_path
                .as_deref()
                .unwrap_or(DEFAULT_SAMPLES_PATH),
        );
        match &self.base_dir {
            Some(base_dir) if samples_path.is_relative() => base_dir.join(samples_path),
            _ => samples_path,
        }
    }

    /// Builds the sample bank. Fails on empty or duplicate instruments.
    pub fn sample_bank(&self) -> Result<SampleBank, ConfigError> {
        let mut instruments = HashMap::new();
        for instrument in &self.instruments {
            let samples = instrument.to_samples();
            if samples.is_empty() {
                return Err(ConfigError::EmptyBank(instrument.name().to_string()));
            }
            if instruments
                .insert(instrument.name().to_string(), samples)
                .is_some()
            {
                return Err(ConfigError::DuplicateInstrument(
                    instrument.name().to_string(),
                ));
            }
        }
        Ok(SampleBank::new(instruments))
    }

    /// Builds the scheduler loops. Fails on unknown instruments or invalid timing.
    pub fn loops(&self) -> Result<Vec<Loop>, ConfigError> {
        let known: HashSet<&str> = self
            .instruments
            .iter()
            .map(|instrument| instrument.name())
            .collect();

        self.loops
            .iter()
            .enumerate()
            .map(|(index, config)| {
                if !known.contains(config.instrument()) {
                    return Err(ConfigError::UnknownInstrument {
                        index,
                        instrument: config.instrument().to_string(),
                    });
                }
                config.to_loop(index)
            })
            .collect()
    }

    /// Runs every startup check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audio().validate()?;
        self.sample_bank()?;
        self.loops()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::fs;

    use super::*;
    use crate::note::{Note, NoteName};

    #[test]
    fn test_default_ensemble() -> Result<(), Box<dyn Error>> {
        let ensemble = Ensemble::default_ensemble()?;
        assert_eq!(Some("AirportTerminal.wav"), ensemble.audio().reverb());
        assert_eq!("default", ensemble.audio().device());

        let bank = ensemble.sample_bank()?;
        let samples = bank.samples("Grand Piano").unwrap();
        assert_eq!(12, samples.len());
        assert_eq!(Note::new(NoteName::A, 4), *samples[0].note());
        assert_eq!("Grand Piano/piano-f-d♯4.wav", samples[6].file());

        let loops = ensemble.loops()?;
        let expected = [
            (Note::new(NoteName::F, 4), 19.7, 4.0),
            (Note::new(NoteName::AFlat, 4), 17.8, 8.1),
            (Note::new(NoteName::C, 5), 21.3, 5.6),
            (Note::new(NoteName::DFlat, 5), 18.5, 12.6),
            (Note::new(NoteName::EFlat, 5), 20.0, 9.2),
            (Note::new(NoteName::F, 5), 20.0, 14.1),
            (Note::new(NoteName::AFlat, 5), 17.7, 3.1),
        ];
        assert_eq!(expected.len(), loops.len());
        for (l, (note, duration, delay)) in loops.iter().zip(expected) {
            assert_eq!("Grand Piano", l.instrument);
            assert_eq!(note, l.note);
            assert_eq!(duration, l.duration);
            assert_eq!(delay, l.delay);
        }

        assert_eq!(PathBuf::from("Samples"), ensemble.samples_path());
        assert_eq!("default", ensemble.audio().device());
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("ensemble.yaml");
        fs::write(
            &path,
            r#"
samples_path: "sounds"
audio:
  device: "mock-output"
  gain: 0.8
  tick_interval: "5ms"
  reverb: "halls/chapel.wav"
instruments:
  - name: "Cello"
    samples:
      - { name: "C", octave: 3, file: "cello-c3.wav" }
      - { name: "G", octave: 3, file: "cello-g3.wav" }
loops:
  - { instrument: "Cello", note: { name: "Bb", octave: 2 }, duration: 12.5, delay: 2 }
"#,
        )?;

        let ensemble = Ensemble::deserialize(&path)?;
        assert_eq!(tempdir.path().join("sounds"), ensemble.samples_path());
        assert_eq!("mock-output", ensemble.audio().device());
        assert_eq!(0.8, ensemble.audio().gain());
        assert_eq!(Some("halls/chapel.wav"), ensemble.audio().reverb());

        let loops = ensemble.loops()?;
        assert_eq!(1, loops.len());
        assert_eq!(Note::new(NoteName::BFlat, 2), loops[0].note);
        assert_eq!(2.0, loops[0].delay);
        Ok(())
    }

    #[test]
    fn test_unknown_instrument() {
        let result = Ensemble::from_yaml(
            r#"
instruments:
  - name: "Grand Piano"
    samples:
      - { name: "C", octave: 4, file: "c4.wav" }
loops:
  - { instrument: "Harp", note: { name: "C", octave: 4 }, duration: 10, delay: 0 }
"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::UnknownInstrument { index: 0, .. })
        ));
    }

    #[test]
    fn test_empty_and_duplicate_banks() {
        let empty = Ensemble::from_yaml(
            r#"
instruments:
  - name: "Silence"
    samples: []
loops: []
"#,
        );
        assert!(matches!(empty, Err(ConfigError::EmptyBank(_))));

        let duplicate = Ensemble::from_yaml(
            r#"
instruments:
  - name: "Piano"
    samples:
      - { name: "C", octave: 4, file: "c4.wav" }
  - name: "Piano"
    samples:
      - { name: "C", octave: 5, file: "c5.wav" }
loops: []
"#,
        );
        assert!(matches!(
            duplicate,
            Err(ConfigError::DuplicateInstrument(_))
        ));
    }

    #[test]
    fn test_invalid_timing() {
        let ensemble = |duration: &str, delay: &str| {
            Ensemble::from_yaml(&format!(
                r#"
instruments:
  - name: "Piano"
    samples:
      - {{ name: "C", octave: 4, file: "c4.wav" }}
loops:
  - {{ instrument: "Piano", note: {{ name: "C", octave: 4 }}, duration: {}, delay: {} }}
"#,
                duration, delay
            ))
        };

        assert!(ensemble("10", "4").is_ok());
        assert!(matches!(
            ensemble("0", "4"),
            Err(ConfigError::InvalidDuration { .. })
        ));
        assert!(matches!(
            ensemble("-3", "4"),
            Err(ConfigError::InvalidDuration { .. })
        ));
        assert!(matches!(
            ensemble("10", "-1"),
            Err(ConfigError::InvalidDelay { .. })
        ));
    }

    #[test]
    fn test_invalid_note() {
        let result = Ensemble::from_yaml(
            r#"
instruments:
  - name: "Piano"
    samples:
      - { name: "H", octave: 4, file: "h4.wav" }
loops: []
"#,
        );
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_default_round_trips_through_yaml() -> Result<(), Box<dyn Error>> {
        let ensemble = Ensemble::default_ensemble()?;
        let yaml = serde_yml::to_string(&ensemble)?;
        let reparsed = Ensemble::from_yaml(&yaml)?;
        assert_eq!(ensemble.loops()?, reparsed.loops()?);
        assert_eq!(ensemble.instruments, reparsed.instruments);
        Ok(())
    }
}
