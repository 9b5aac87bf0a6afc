//! Core types for lecture timelines

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing cue boundaries
pub const BOUNDARY_EPSILON: f64 = 1e-3;

/// Error type for timeline construction and lookup
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// Narration duration was zero, negative or not finite
    #[error("invalid narration duration: {0}s")]
    InvalidDuration(f64),
    /// Slide index outside `[1, count]`
    #[error("slide {index} not found (lecture has {count} slides)")]
    SlideNotFound { index: usize, count: usize },
    /// A timeline file or manifest did not satisfy the cue invariants
    #[error("malformed timeline: {0}")]
    Malformed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for timeline operations
pub type TimelineResult<T> = Result<T, TimelineError>;

/// A timed subtitle fragment, in seconds relative to the slide start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Cue {
    /// Create a new cue
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Length of the cue in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Check if `time` falls within `[start, end)`
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

/// Handle to the narration audio of one slide
///
/// The player never looks inside it; it is handed to the audio primitive as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioSource {
    path: PathBuf,
}

impl AudioSource {
    /// Audio stored in a file on disk
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying resource
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Default file name of a slide's narration clip
pub fn slide_audio_name(index: usize) -> String {
    format!("audio_slide_{}.wav", index)
}

/// One narrated slide with its cue sequence
#[derive(Debug, Clone)]
pub struct Slide {
    index: usize,
    audio: AudioSource,
    duration: f64,
    transcript: String,
    cues: Vec<Cue>,
}

impl Slide {
    pub(crate) fn new(
        index: usize,
        audio: AudioSource,
        duration: f64,
        transcript: String,
        cues: Vec<Cue>,
    ) -> Self {
        Self {
            index,
            audio,
            duration,
            transcript,
            cues,
        }
    }

    /// 1-based slide number
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn audio(&self) -> &AudioSource {
        &self.audio
    }

    /// Narration length in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Cues sorted by start time, covering `[0, duration]`
    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }
}

/// Check that `cues` cover `[0, duration]` without gaps or overlaps
pub fn check_coverage(cues: &[Cue], duration: f64) -> Result<(), String> {
    let first = cues.first().ok_or_else(|| "no cues".to_string())?;
    if first.start.abs() > BOUNDARY_EPSILON {
        return Err(format!("first cue starts at {}", first.start));
    }
    for pair in cues.windows(2) {
        if (pair[0].end - pair[1].start).abs() > BOUNDARY_EPSILON {
            return Err(format!(
                "gap or overlap between {} and {}",
                pair[0].end, pair[1].start
            ));
        }
    }
    if let Some(cue) = cues.iter().find(|c| c.end <= c.start) {
        return Err(format!("empty cue at {}", cue.start));
    }
    let last = cues.last().map(|c| c.end).unwrap_or(0.0);
    if (last - duration).abs() > BOUNDARY_EPSILON {
        return Err(format!("last cue ends at {}, expected {}", last, duration));
    }
    Ok(())
}
