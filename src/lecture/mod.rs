//! Lecture timelines
//!
//! Turns narrated slides into timed subtitle cues and stores them for
//! playback.

pub mod builder;
pub mod manifest;
pub mod srt;
pub mod text;
pub mod timeline;
pub mod types;

pub use builder::{BuilderOptions, CueWeighting, TimelineBuilder, WordTiming};
pub use manifest::LectureManifest;
pub use timeline::{LectureBuild, LectureTimeline, SlideFailure, SlideInput};
pub use types::{AudioSource, Cue, Slide, TimelineError, TimelineResult};
