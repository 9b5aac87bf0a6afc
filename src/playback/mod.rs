//! Audio playback
//!
//! The clock, the subtitle renderer and the audio primitives they drive.

pub mod clock;
pub mod primitive;
pub mod rodio_backend;
pub mod subtitle;

pub use clock::{ClockError, ClockEvent, PlaybackClock};
pub use primitive::{measure_duration, AudioError, AudioPrimitive};
pub use rodio_backend::RodioAudio;
pub use subtitle::{active_cue, SubtitleRenderer};
