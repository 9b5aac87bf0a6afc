//! Audio primitive interface
//!
//! The playback clock never touches an audio device directly. It drives an
//! [`AudioPrimitive`], which owns decoding, seeking and output.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rodio::{Decoder, Source};

use crate::lecture::AudioSource;

/// Errors reported by audio primitives
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AudioError {
    #[error("audio file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to decode audio: {0}")]
    Decode(String),
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("seek failed: {0}")]
    Seek(String),
    #[error("no audio loaded")]
    NotLoaded,
}

/// A single playable clip with a seekable time source
///
/// Positions are in seconds from the start of the loaded clip.
pub trait AudioPrimitive: Send {
    /// Load `source`, replacing any current clip. The clip starts paused at 0.
    ///
    /// Returns the clip length in seconds.
    fn load(&mut self, source: &AudioSource) -> Result<f64, AudioError>;

    fn play(&mut self) -> Result<(), AudioError>;

    fn pause(&mut self);

    /// Move the play head to `position`
    fn seek(&mut self, position: f64) -> Result<(), AudioError>;

    /// Current play head position
    fn position(&self) -> f64;

    /// True once the clip has played to its end
    fn is_finished(&self) -> bool;

    /// Stop playback and unload the clip
    fn stop(&mut self);
}

impl<T: AudioPrimitive + ?Sized> AudioPrimitive for Box<T> {
    fn load(&mut self, source: &AudioSource) -> Result<f64, AudioError> {
        (**self).load(source)
    }

    fn play(&mut self) -> Result<(), AudioError> {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn seek(&mut self, position: f64) -> Result<(), AudioError> {
        (**self).seek(position)
    }

    fn position(&self) -> f64 {
        (**self).position()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

pub(crate) fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, AudioError> {
    let file = File::open(path).map_err(|_| AudioError::NotFound(path.to_path_buf()))?;
    Decoder::new(BufReader::new(file)).map_err(|e| AudioError::Decode(e.to_string()))
}

/// Measure the length of an audio file in seconds
///
/// Uses the container's declared length when present, otherwise decodes the
/// whole clip and counts samples.
pub fn measure_duration(path: &Path) -> Result<f64, AudioError> {
    let decoder = open_decoder(path)?;
    if let Some(duration) = decoder.total_duration() {
        return Ok(duration.as_secs_f64());
    }

    let rate = decoder.sample_rate() as f64;
    let channels = decoder.channels() as f64;
    if rate == 0.0 || channels == 0.0 {
        return Err(AudioError::Decode(format!(
            "{} has no sample format",
            path.display()
        )));
    }
    let samples = decoder.count() as f64;
    Ok(samples / (rate * channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Write a 16-bit mono PCM WAV of `seconds` silence
    fn write_silence(path: &Path, seconds: f64) {
        let rate: u32 = 8000;
        let samples = (seconds * rate as f64) as u32;
        let data_len = samples * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(44 + data_len as usize, 0);
        File::create(path).unwrap().write_all(&bytes).unwrap();
    }

    #[test]
    fn test_measure_duration_of_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audio_slide_1.wav");
        write_silence(&path, 1.5);
        let duration = measure_duration(&path).unwrap();
        assert!((duration - 1.5).abs() < 0.01, "got {}", duration);
    }

    #[test]
    fn test_measure_missing_file() {
        let path = Path::new("/nonexistent/audio_slide_9.wav");
        assert_eq!(
            measure_duration(path),
            Err(AudioError::NotFound(path.to_path_buf()))
        );
    }

    #[test]
    fn test_measure_garbage_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(matches!(measure_duration(&path), Err(AudioError::Decode(_))));
    }
}
