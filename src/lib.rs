// Lectern: narrated lecture playback with Q&A interruptions

pub mod cli;
pub mod config;
pub mod lecture;
pub mod logging;
pub mod playback;
pub mod player;

pub use cli::Cli;
pub use config::Options;
pub use lecture::{Cue, LectureTimeline, Slide};
pub use logging::LogLevel;
pub use player::{Phase, PlaybackState, Player, PlayerCommand, PlayerUpdate};
