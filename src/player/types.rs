//! Player state, commands and events

use std::fmt;

use crate::lecture::AudioSource;
use crate::playback::ClockEvent;

use super::qa::QaOutcome;

/// Player lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Playing,
    Paused,
    AwaitingAnswer,
    Finished,
    Error,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Playing => "playing",
            Phase::Paused => "paused",
            Phase::AwaitingAnswer => "awaiting answer",
            Phase::Finished => "finished",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A point in the lecture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub slide: usize,
    pub seconds: f64,
}

impl Position {
    pub fn new(slide: usize, seconds: f64) -> Self {
        Self { slide, seconds }
    }
}

/// Snapshot of the player, published for observers
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackState {
    /// 1-based slide, 0 before the lecture starts
    pub current_slide: usize,
    pub position: f64,
    pub phase: Phase,
}

/// User-issued player commands
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Start,
    GoToSlide(usize),
    RaiseHand,
    AskQuestion(String),
    CancelQuestion,
    Resume,
    Restart,
    Subtitles(bool),
}

impl PlayerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::Start => "start",
            PlayerCommand::GoToSlide(_) => "go to slide",
            PlayerCommand::RaiseHand => "raise hand",
            PlayerCommand::AskQuestion(_) => "ask question",
            PlayerCommand::CancelQuestion => "cancel question",
            PlayerCommand::Resume => "resume",
            PlayerCommand::Restart => "restart",
            PlayerCommand::Subtitles(_) => "subtitles",
        }
    }

    /// Parse a terminal command line such as `goto 3` or `ask why?`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        match word.to_ascii_lowercase().as_str() {
            "start" | "play" => Some(PlayerCommand::Start),
            "goto" | "slide" => rest.parse().ok().map(PlayerCommand::GoToSlide),
            "hand" | "raise" => Some(PlayerCommand::RaiseHand),
            "ask" if !rest.is_empty() => Some(PlayerCommand::AskQuestion(rest.to_string())),
            "cancel" => Some(PlayerCommand::CancelQuestion),
            "resume" | "continue" => Some(PlayerCommand::Resume),
            "restart" => Some(PlayerCommand::Restart),
            "subtitles" | "subs" => match rest.to_ascii_lowercase().as_str() {
                "on" => Some(PlayerCommand::Subtitles(true)),
                "off" => Some(PlayerCommand::Subtitles(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Everything the player thread reacts to, in arrival order
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Command(PlayerCommand),
    Tick,
    Clock(ClockEvent),
    Qa { token: u64, outcome: QaOutcome },
    Shutdown,
}

/// Notifications for the UI
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerUpdate {
    PhaseChanged(Phase),
    SlideChanged { slide: usize },
    Subtitle { slide: usize, cue: usize, text: String },
    /// An answer is ready; `audio` is `None` when it could not be narrated
    Answer {
        question: String,
        text: String,
        audio: Option<AudioSource>,
    },
    /// A command was ignored or a recoverable problem occurred
    Notice(String),
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("start", Some(PlayerCommand::Start))]
    #[case("goto 5", Some(PlayerCommand::GoToSlide(5)))]
    #[case("  GOTO   2 ", Some(PlayerCommand::GoToSlide(2)))]
    #[case("goto five", None)]
    #[case("hand", Some(PlayerCommand::RaiseHand))]
    #[case("ask what is gravity?", Some(PlayerCommand::AskQuestion("what is gravity?".into())))]
    #[case("ask", None)]
    #[case("cancel", Some(PlayerCommand::CancelQuestion))]
    #[case("resume", Some(PlayerCommand::Resume))]
    #[case("restart", Some(PlayerCommand::Restart))]
    #[case("subtitles off", Some(PlayerCommand::Subtitles(false)))]
    #[case("subs ON", Some(PlayerCommand::Subtitles(true)))]
    #[case("subtitles", None)]
    #[case("dance", None)]
    fn test_parse_command(#[case] line: &str, #[case] expected: Option<PlayerCommand>) {
        assert_eq!(PlayerCommand::parse(line), expected);
    }

    #[test]
    fn test_default_state_is_idle() {
        let state = PlaybackState::default();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.current_slide, 0);
        assert_eq!(Phase::AwaitingAnswer.to_string(), "awaiting answer");
    }
}
