//! Lecture timeline store
//!
//! Built once per lecture and shared read-only (`Arc<LectureTimeline>`)
//! between the clock, the subtitle renderer and the player.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use super::builder::TimelineBuilder;
use super::types::{
    check_coverage, slide_audio_name, AudioSource, Cue, Slide, TimelineError, TimelineResult,
};

/// Narration input for one slide
#[derive(Debug, Clone)]
pub struct SlideInput {
    pub transcript: String,
    pub audio: AudioSource,
}

impl SlideInput {
    pub fn new(transcript: impl Into<String>, audio: AudioSource) -> Self {
        Self {
            transcript: transcript.into(),
            audio,
        }
    }
}

/// A slide that could not be built
#[derive(Debug)]
pub struct SlideFailure {
    /// 1-based position of the slide in the input
    pub source_index: usize,
    pub error: TimelineError,
}

/// Result of building a whole lecture
#[derive(Debug)]
pub struct LectureBuild {
    pub timeline: LectureTimeline,
    pub failures: Vec<SlideFailure>,
}

/// Slide and cue data for a whole lecture
#[derive(Debug, Clone, Default)]
pub struct LectureTimeline {
    slides: Vec<Slide>,
}

impl LectureTimeline {
    /// Build a timeline with the default builder options
    ///
    /// `durations[i]` is the measured narration length of `slides[i]`.
    pub fn load(slides: Vec<SlideInput>, durations: &[f64]) -> LectureBuild {
        Self::load_with(&TimelineBuilder::default(), slides, durations)
    }

    /// Build a timeline with a configured builder
    ///
    /// Slides that fail to build are reported and skipped. The remaining
    /// slides keep their source number, so slide `n` is always narrated by
    /// the `n`th input and a skipped slide leaves a gap in the numbering.
    pub fn load_with(
        builder: &TimelineBuilder,
        slides: Vec<SlideInput>,
        durations: &[f64],
    ) -> LectureBuild {
        let mut built = Vec::with_capacity(slides.len());
        let mut failures = Vec::new();

        for (i, input) in slides.into_iter().enumerate() {
            let duration = durations.get(i).copied().unwrap_or(0.0);
            match builder.build(&input.transcript, duration) {
                Ok(cues) => {
                    built.push(Slide::new(i + 1, input.audio, duration, input.transcript, cues));
                }
                Err(error) => {
                    warn!(slide = i + 1, %error, "skipping slide");
                    failures.push(SlideFailure {
                        source_index: i + 1,
                        error,
                    });
                }
            }
        }

        info!(
            slides = built.len(),
            failed = failures.len(),
            "lecture timeline built"
        );
        LectureBuild {
            timeline: Self { slides: built },
            failures,
        }
    }

    /// Rebuild a timeline from a slide → cues map
    ///
    /// Keys are slide numbers starting at 1; numbers of skipped slides may
    /// be missing. Each cue list must cover its slide without gaps. A
    /// slide's duration is the end of its last cue.
    pub fn from_cues(
        cues: BTreeMap<usize, Vec<Cue>>,
        audio_for: impl Fn(usize) -> AudioSource,
    ) -> TimelineResult<Self> {
        let mut slides = Vec::with_capacity(cues.len());
        for (index, slide_cues) in cues {
            if index == 0 {
                return Err(TimelineError::Malformed("slide numbers start at 1".into()));
            }
            let duration = slide_cues.last().map(|c| c.end).unwrap_or(0.0);
            check_coverage(&slide_cues, duration)
                .map_err(|e| TimelineError::Malformed(format!("slide {}: {}", index, e)))?;

            let transcript = slide_cues
                .iter()
                .map(|c| c.text.as_str())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            slides.push(Slide::new(index, audio_for(index), duration, transcript, slide_cues));
        }
        Ok(Self { slides })
    }

    /// Load a timeline file, resolving slide audio inside `audio_dir`
    pub fn open(path: &Path, audio_dir: &Path) -> TimelineResult<Self> {
        let cues = read_cue_file(path)?;
        Self::from_cues(cues, |index| {
            AudioSource::file(audio_dir.join(slide_audio_name(index)))
        })
    }

    /// Look up a slide by its number
    pub fn get_slide(&self, index: usize) -> TimelineResult<&Slide> {
        self.slides
            .binary_search_by_key(&index, Slide::index)
            .map(|i| &self.slides[i])
            .map_err(|_| TimelineError::SlideNotFound {
                index,
                count: self.slides.len(),
            })
    }

    /// Number of the first slide
    pub fn first_slide(&self) -> Option<usize> {
        self.slides.first().map(Slide::index)
    }

    /// Number of the slide played after slide `index`
    pub fn next_slide(&self, index: usize) -> Option<usize> {
        let next = self.slides.partition_point(|s| s.index() <= index);
        self.slides.get(next).map(Slide::index)
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Total narration length of the lecture in seconds
    pub fn total_duration(&self) -> f64 {
        self.slides.iter().map(Slide::duration).sum()
    }

    /// Slide → cues map, the shape of the timeline file
    pub fn cue_map(&self) -> BTreeMap<usize, Vec<Cue>> {
        self.slides
            .iter()
            .map(|s| (s.index(), s.cues().to_vec()))
            .collect()
    }

    pub fn to_json(&self) -> TimelineResult<String> {
        Ok(serde_json::to_string_pretty(&self.cue_map())?)
    }

    /// Write the timeline file
    pub fn save(&self, path: &Path) -> TimelineResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), slides = self.slides.len(), "timeline saved");
        Ok(())
    }

    /// Narration of every slide, used as context for answering questions
    pub fn lecture_context(&self) -> String {
        let mut context = String::from("Lecture content:\n");
        for slide in &self.slides {
            context.push_str(&format!("\nSlide {}: {}\n", slide.index(), slide.transcript()));
        }
        context
    }
}

/// Read a timeline file into a slide → cues map
pub fn read_cue_file(path: &Path) -> TimelineResult<BTreeMap<usize, Vec<Cue>>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
