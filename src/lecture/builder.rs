//! Subtitle cue timing
//!
//! Partitions a slide's narration into contiguous cues. Each segment gets a
//! share of the narration proportional to its word count; rounding error is
//! absorbed by the final cue, whose end is pinned to the narration length.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::text::{merge_short_fragments, split_sentences, word_count};
use super::types::{Cue, TimelineError, TimelineResult};

/// Fragments with fewer words than this are merged into a neighbour
pub const DEFAULT_MIN_SEGMENT_WORDS: usize = 2;

/// Shortest cue the builder produces when the narration is long enough
pub const DEFAULT_MIN_CUE_SECONDS: f64 = 0.3;

const FLOOR_EPSILON: f64 = 1e-9;

/// How narration time is shared between segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueWeighting {
    /// Proportional to word count
    #[default]
    Words,
    /// Equal share per segment
    Sentences,
}

/// Tunables for the timeline builder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuilderOptions {
    pub min_segment_words: usize,
    pub min_cue_seconds: f64,
    pub weighting: CueWeighting,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            min_segment_words: DEFAULT_MIN_SEGMENT_WORDS,
            min_cue_seconds: DEFAULT_MIN_CUE_SECONDS,
            weighting: CueWeighting::Words,
        }
    }
}

/// Timing of one spoken word, as reported by a narration engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordTiming {
    pub start: f64,
    pub end: f64,
}

impl WordTiming {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Builds cue sequences from transcripts
#[derive(Debug, Clone, Default)]
pub struct TimelineBuilder {
    options: BuilderOptions,
}

impl TimelineBuilder {
    pub fn new(options: BuilderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Sentence-like segments of `transcript`, after merging short fragments
    pub fn segments(&self, transcript: &str) -> Vec<String> {
        merge_short_fragments(split_sentences(transcript), self.options.min_segment_words)
    }

    /// Build the cues for one slide
    ///
    /// # Errors
    /// `InvalidDuration` when `duration` is not a positive finite number.
    pub fn build(&self, transcript: &str, duration: f64) -> TimelineResult<Vec<Cue>> {
        validate_duration(duration)?;

        let segments = self.segments(transcript);
        if segments.is_empty() {
            return Ok(vec![Cue::new(0.0, duration, "")]);
        }

        let weights: Vec<f64> = match self.options.weighting {
            CueWeighting::Words => segments.iter().map(|s| word_count(s) as f64).collect(),
            CueWeighting::Sentences => vec![1.0; segments.len()],
        };
        let lengths = allocate(duration, &weights, self.options.min_cue_seconds);
        Ok(accumulate(segments, &lengths, duration))
    }

    /// Build cues using per-word timestamps as ground truth
    ///
    /// Each cue starts where its first word starts. Falls back to
    /// [`TimelineBuilder::build`] when the timings do not line up with the
    /// transcript's words.
    pub fn build_aligned(
        &self,
        transcript: &str,
        duration: f64,
        words: &[WordTiming],
    ) -> TimelineResult<Vec<Cue>> {
        validate_duration(duration)?;

        let segments = self.segments(transcript);
        let counts: Vec<usize> = segments.iter().map(|s| word_count(s)).collect();
        let total: usize = counts.iter().sum();

        if segments.len() < 2 || total != words.len() || counts.contains(&0) {
            debug!(
                segments = segments.len(),
                words = words.len(),
                total,
                "word timings do not match transcript, using proportional split"
            );
            return self.build(transcript, duration);
        }

        let mut boundaries = Vec::with_capacity(segments.len() + 1);
        boundaries.push(0.0);
        let mut first_word = 0;
        for count in &counts[..counts.len() - 1] {
            first_word += count;
            boundaries.push(words[first_word].start);
        }
        boundaries.push(duration);

        let usable = boundaries
            .windows(2)
            .all(|pair| pair[0].is_finite() && pair[1].is_finite() && pair[1] > pair[0]);
        if !usable {
            debug!("word timings are not monotonic, using proportional split");
            return self.build(transcript, duration);
        }

        Ok(segments
            .into_iter()
            .zip(boundaries.windows(2))
            .map(|(text, pair)| Cue::new(pair[0], pair[1], text))
            .collect())
    }
}

/// Build cues with the default options
pub fn build(transcript: &str, duration: f64) -> TimelineResult<Vec<Cue>> {
    TimelineBuilder::default().build(transcript, duration)
}

fn validate_duration(duration: f64) -> TimelineResult<()> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(TimelineError::InvalidDuration(duration));
    }
    Ok(())
}

/// Share `duration` between segments by weight, then lift any share below
/// the floor by borrowing from a neighbour (or the largest share).
fn allocate(duration: f64, weights: &[f64], floor: f64) -> Vec<f64> {
    let count = weights.len();
    let total: f64 = weights.iter().sum();
    let mut lengths: Vec<f64> = if total > 0.0 {
        weights.iter().map(|w| duration * w / total).collect()
    } else {
        vec![duration / count as f64; count]
    };

    let floor = floor.max(0.0).min(duration / count as f64);
    for i in 0..count {
        for _ in 0..count {
            if lengths[i] + FLOOR_EPSILON >= floor {
                break;
            }
            let need = floor - lengths[i];
            let Some(donor) = find_donor(&lengths, i, need, floor) else {
                break;
            };
            let take = need.min(lengths[donor] - floor);
            if take <= 0.0 {
                break;
            }
            lengths[donor] -= take;
            lengths[i] += take;
        }
    }
    lengths
}

fn find_donor(lengths: &[f64], index: usize, need: f64, floor: f64) -> Option<usize> {
    let neighbours = [index + 1, index.wrapping_sub(1)];
    neighbours
        .into_iter()
        .filter(|&j| j < lengths.len())
        .find(|&j| lengths[j] - need >= floor)
        .or_else(|| {
            (0..lengths.len())
                .filter(|&j| j != index && lengths[j] > floor)
                .max_by(|&a, &b| lengths[a].total_cmp(&lengths[b]))
        })
}

fn accumulate(segments: Vec<String>, lengths: &[f64], duration: f64) -> Vec<Cue> {
    let last = segments.len() - 1;
    let mut start = 0.0;
    segments
        .into_iter()
        .zip(lengths)
        .enumerate()
        .map(|(i, (text, length))| {
            let end = if i == last { duration } else { start + length };
            let cue = Cue::new(start, end, text);
            start = end;
            cue
        })
        .collect()
}
