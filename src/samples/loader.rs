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

//! Sample retrieval and decoding.
//!
//! Samples are decoded entirely into memory so every voice can share the same buffer.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info, warn};

use crate::audio::DecodedBuffer;

/// Error types for sample retrieval and decoding.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Audio file error in {path}: {source}")]
    Decode {
        path: PathBuf,
        source: SymphoniaError,
    },

    #[error("No audio track found in {0}")]
    NoAudioTrack(PathBuf),

    #[error("Sample rate not specified in {0}")]
    UnknownSampleRate(PathBuf),

    #[error("Sample retrieval task failed: {0}")]
    Task(String),

    #[error("Sample retrieval failed: {0}")]
    Other(String),
}

/// The future returned by a fetcher.
pub type FetchFuture = BoxFuture<'static, Result<Arc<DecodedBuffer>, SampleError>>;

/// Retrieves and decodes audio assets by reference.
pub trait SampleFetcher: Send + Sync + 'static {
    /// Starts retrieving and decoding `file`.
    fn fetch(&self, file: &str) -> FetchFuture;
}

/// Fetches samples from the filesystem, relative to a base path.
pub struct FileFetcher {
    base_path: PathBuf,
}

impl FileFetcher {
    /// Creates a fetcher that resolves relative asset references against `base_path`.
    pub fn new(base_path: &Path) -> FileFetcher {
        FileFetcher {
            base_path: base_path.to_path_buf(),
        }
    }

    /// Resolves an asset reference to a path on disk.
    pub fn resolve(&self, file: &str) -> PathBuf {
        if Path::new(file).is_absolute() {
            PathBuf::from(file)
        } else {
            self.base_path.join(file)
        }
    }
}

impl SampleFetcher for FileFetcher {
    fn fetch(&self, file: &str) -> FetchFuture {
        let path = self.resolve(file);
        async move {
            match tokio::task::spawn_blocking(move || decode_file(&path)).await {
                Ok(result) => result.map(Arc::new),
                Err(e) => Err(SampleError::Task(e.to_string())),
            }
        }
        .boxed()
    }
}

/// Decodes a whole audio file (WAV, FLAC, MP3 and anything else symphonia supports).
pub fn decode_file(path: &Path) -> Result<DecodedBuffer, SampleError> {
    info!(path = ?path, "Loading sample into memory");
    let started = Instant::now();

    let io_error = |source| SampleError::Io {
        path: path.to_path_buf(),
        source,
    };
    let decode_error = |source| SampleError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_error)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint to help the format registry guess the format
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_error)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SampleError::NoAudioTrack(path.to_path_buf()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_error)?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => return Err(decode_error(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(decode_error(e)),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count() as u16);

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let sample_rate = sample_rate.ok_or_else(|| SampleError::UnknownSampleRate(path.to_path_buf()))?;
    let buffer = DecodedBuffer::new(samples, channels.unwrap_or(1), sample_rate);

    info!(
        path = ?path,
        channels = buffer.channel_count(),
        sample_rate = buffer.sample_rate(),
        duration_ms = buffer.duration().as_millis(),
        memory_kb = buffer.memory_size() / 1024,
        "Sample loaded"
    );
    debug!(path = ?path, elapsed_ms = started.elapsed().as_millis(), "Decode finished");

    Ok(buffer)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_decode_wav() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("tone.wav");
        write_wav(path.clone(), vec![vec![0.5_f32; 4410], vec![-0.5_f32; 4410]], 44100)?;

        let buffer = decode_file(&path)?;
        assert_eq!(2, buffer.channel_count());
        assert_eq!(44100, buffer.sample_rate());
        assert_eq!(4410, buffer.frames());
        assert!((buffer.interpolated(10.0, 0) - 0.5).abs() < 1e-6);
        assert!((buffer.interpolated(10.0, 1) + 0.5).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_decode_missing_file() {
        let result = decode_file(Path::new("/definitely/not/here.wav"));
        assert!(matches!(result, Err(SampleError::Io { .. })));
    }

    #[tokio::test]
    async fn test_file_fetcher_resolves_relative() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        std::fs::create_dir(tempdir.path().join("Grand Piano"))?;
        write_wav(
            tempdir.path().join("Grand Piano").join("c4.wav"),
            vec![vec![0.25_f32; 100]],
            48000,
        )?;

        let fetcher = FileFetcher::new(tempdir.path());
        let buffer = fetcher.fetch("Grand Piano/c4.wav").await?;
        assert_eq!(100, buffer.frames());
        assert_eq!(48000, buffer.sample_rate());

        let missing = fetcher.fetch("Grand Piano/c5.wav").await;
        assert!(missing.is_err());
        Ok(())
    }
}
