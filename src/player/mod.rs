//! Lecture player
//!
//! Slide sequencing, pause-for-question and resume, driven by one event
//! queue.

pub mod answer;
pub mod machine;
pub mod qa;
pub mod runtime;
pub mod synth;
pub mod types;

pub use answer::{AnswerRequest, AnswerService, OllamaAnswerService, ServiceError, ServiceStatus};
pub use machine::{Player, QaServices};
pub use qa::{Answer, QaError, QaOutcome, QaSession, QaSessionManager, SessionStatus};
pub use runtime::{event_channel, tick_interval, PlayerHandle};
pub use synth::{CommandSynthesizer, NarrationSynthesizer, NoSynthesizer, SynthesisError};
pub use types::{Phase, PlaybackState, PlayerCommand, PlayerEvent, PlayerUpdate, Position};
