//! Player state machine
//!
//! The player owns the playback state, the lecture clock and the Q&A
//! session. It is driven entirely by [`PlayerEvent`]s, handled one at a time
//! on a single thread, and reports to the UI through [`PlayerUpdate`]s.
//!
//! ```text
//! Idle --start--> Playing --raise hand--> Paused --ask--> AwaitingAnswer
//!                   ^  |                    |                   |
//!                   |  +--last slide ends--> Finished           |
//!                   +-------resume / cancel / answer played-----+
//! ```
//!
//! The lecture clock only runs in `Playing`, and leaving a pause always
//! resumes at the exact slide and position captured when the hand went up.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Sender;
use parking_lot::RwLock;
use tracing::{debug, error, info};

use super::answer::AnswerService;
use super::qa::{QaOutcome, QaSessionManager};
use super::synth::NarrationSynthesizer;
use super::types::{PlaybackState, Phase, PlayerCommand, PlayerEvent, PlayerUpdate, Position};
use crate::lecture::{AudioSource, LectureTimeline};
use crate::playback::{AudioError, AudioPrimitive, ClockEvent, PlaybackClock, SubtitleRenderer};

/// External collaborators used to answer questions
#[derive(Clone)]
pub struct QaServices {
    pub answers: Arc<dyn AnswerService>,
    pub synth: Arc<dyn NarrationSynthesizer>,
    pub timeout: Duration,
}

pub struct Player<A: AudioPrimitive> {
    timeline: Arc<LectureTimeline>,
    clock: PlaybackClock<A>,
    answer_audio: A,
    answer_playing: bool,
    renderer: SubtitleRenderer,
    qa: QaSessionManager,
    state: PlaybackState,
    paused_at: Option<Position>,
    updates: Sender<PlayerUpdate>,
    snapshot: Arc<RwLock<PlaybackState>>,
}

impl<A: AudioPrimitive> Player<A> {
    /// Create an idle player
    ///
    /// Clock notifications and Q&A progress are posted to `events`; the owner
    /// feeds them back through [`Player::handle`].
    pub fn new(
        timeline: Arc<LectureTimeline>,
        lecture_audio: A,
        answer_audio: A,
        services: QaServices,
        events: Sender<PlayerEvent>,
        updates: Sender<PlayerUpdate>,
    ) -> Self {
        let mut clock = PlaybackClock::new(lecture_audio, Arc::clone(&timeline));
        let tx = events.clone();
        clock.on_position_change(move |generation, slide, position| {
            let _ = tx.send(PlayerEvent::Clock(ClockEvent::Position {
                generation,
                slide,
                position,
            }));
        });
        let tx = events.clone();
        clock.on_ended(move |generation, slide| {
            let _ = tx.send(PlayerEvent::Clock(ClockEvent::Ended { generation, slide }));
        });

        let qa = QaSessionManager::new(services.answers, services.synth, events, services.timeout);
        Self {
            timeline,
            clock,
            answer_audio,
            answer_playing: false,
            renderer: SubtitleRenderer::new(),
            qa,
            state: PlaybackState::default(),
            paused_at: None,
            updates,
            snapshot: Arc::new(RwLock::new(PlaybackState::default())),
        }
    }

    /// Apply one event
    pub fn handle(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Command(command) => self.handle_command(command),
            PlayerEvent::Tick => self.tick(),
            PlayerEvent::Clock(ClockEvent::Position {
                generation,
                slide,
                position,
            }) => self.on_position(generation, slide, position),
            PlayerEvent::Clock(ClockEvent::Ended { generation, slide }) => {
                self.on_ended(generation, slide)
            }
            PlayerEvent::Qa { token, outcome } => self.on_answer(token, outcome),
            PlayerEvent::Shutdown => self.shutdown(),
        }
        *self.snapshot.write() = self.state;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Shared snapshot of the state, refreshed after every event
    pub fn snapshot(&self) -> Arc<RwLock<PlaybackState>> {
        Arc::clone(&self.snapshot)
    }

    /// Where the lecture will resume, while paused or awaiting an answer
    pub fn paused_at(&self) -> Option<Position> {
        self.paused_at
    }

    pub fn timeline(&self) -> &Arc<LectureTimeline> {
        &self.timeline
    }

    pub fn clock(&self) -> &PlaybackClock<A> {
        &self.clock
    }

    pub fn answer_audio(&self) -> &A {
        &self.answer_audio
    }

    pub fn qa(&self) -> &QaSessionManager {
        &self.qa
    }

    /// Show or hide subtitles
    pub fn set_subtitles(&mut self, enabled: bool) {
        self.renderer.set_enabled(enabled);
        if enabled && self.state.phase == Phase::Playing {
            self.renderer.reset();
            self.render(self.state.current_slide, self.state.position);
        }
    }

    pub fn subtitles_enabled(&self) -> bool {
        self.renderer.is_enabled()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn handle_command(&mut self, command: PlayerCommand) {
        debug!(command = command.name(), phase = %self.state.phase, "command");
        match (self.state.phase, command) {
            (Phase::Idle, PlayerCommand::Start) => self.start(),
            (Phase::Playing, PlayerCommand::GoToSlide(slide)) => self.go_to_slide(slide),
            (Phase::Playing, PlayerCommand::RaiseHand) => self.raise_hand(),
            (Phase::Paused | Phase::AwaitingAnswer, PlayerCommand::AskQuestion(question)) => {
                self.ask(&question)
            }
            (
                Phase::Paused | Phase::AwaitingAnswer,
                PlayerCommand::CancelQuestion | PlayerCommand::Resume,
            ) => self.resume(),
            (_, PlayerCommand::Restart) => self.restart(),
            (_, PlayerCommand::Subtitles(enabled)) => self.set_subtitles(enabled),
            (phase, command) => {
                self.notice(format!("cannot {} while {}", command.name(), phase));
            }
        }
    }

    fn start(&mut self) {
        let Some(first) = self.timeline.first_slide() else {
            self.notice("lecture has no slides".to_string());
            self.set_phase(Phase::Finished);
            return;
        };
        info!(slides = self.timeline.slide_count(), "lecture started");
        self.play_slide(first);
    }

    fn go_to_slide(&mut self, slide: usize) {
        if let Err(e) = self.timeline.get_slide(slide) {
            self.notice(e.to_string());
            return;
        }
        self.clock.pause();
        self.play_slide(slide);
    }

    fn raise_hand(&mut self) {
        let position = self.clock.pause();
        let at = Position::new(self.state.current_slide, position);
        info!(slide = at.slide, position, "hand raised");
        self.paused_at = Some(at);
        self.state.position = position;
        self.set_phase(Phase::Paused);
    }

    fn ask(&mut self, question: &str) {
        let question = question.trim();
        if question.is_empty() {
            self.notice("question is empty".to_string());
            return;
        }
        let Some(at) = self.paused_at else {
            self.fail("no pause position to return to".to_string());
            return;
        };
        match self.qa.ask(question, at) {
            Ok(_) => {
                self.stop_answer_audio();
                self.set_phase(Phase::AwaitingAnswer);
            }
            Err(e) => self.notice(e.to_string()),
        }
    }

    /// Leave a pause at exactly the captured position
    fn resume(&mut self) {
        self.qa.cancel();
        self.stop_answer_audio();
        let Some(at) = self.paused_at.take() else {
            self.fail("no pause position to return to".to_string());
            return;
        };

        match self.clock.resume_at(at.slide, at.seconds) {
            Ok(()) => {
                info!(slide = at.slide, position = at.seconds, "lecture resumed");
                self.state.current_slide = at.slide;
                self.state.position = at.seconds;
                self.set_phase(Phase::Playing);
                self.renderer.reset();
                self.render(at.slide, at.seconds);
            }
            Err(e) => self.fail(format!("cannot resume slide {}: {}", at.slide, e)),
        }
    }

    fn restart(&mut self) {
        self.clock.stop();
        self.stop_answer_audio();
        self.qa.cancel();
        self.paused_at = None;
        self.renderer.reset();
        self.state.current_slide = 0;
        self.state.position = 0.0;
        self.set_phase(Phase::Idle);
    }

    // =========================================================================
    // Clock and Q&A events
    // =========================================================================

    fn tick(&mut self) {
        match self.state.phase {
            Phase::Playing => self.clock.poll(),
            Phase::AwaitingAnswer if self.answer_playing && self.answer_audio.is_finished() => {
                debug!("answer playback finished");
                self.answer_playing = false;
                self.resume();
            }
            _ => {}
        }
    }

    fn on_position(&mut self, generation: u64, slide: usize, position: f64) {
        if self.state.phase != Phase::Playing || generation != self.clock.generation() {
            return;
        }
        self.state.position = position;
        self.render(slide, position);
    }

    fn on_ended(&mut self, generation: u64, slide: usize) {
        if self.state.phase != Phase::Playing || generation != self.clock.generation() {
            debug!(slide, generation, "ignoring stale end of slide");
            return;
        }
        if let Some(next) = self.timeline.next_slide(slide) {
            self.play_slide(next);
        } else {
            self.state.position = self.clock.position();
            self.clock.stop();
            info!("lecture finished");
            self.set_phase(Phase::Finished);
        }
    }

    fn on_answer(&mut self, token: u64, outcome: QaOutcome) {
        if self.state.phase != Phase::AwaitingAnswer {
            debug!(token, "answer arrived outside a question");
            return;
        }
        let question = self
            .qa
            .session()
            .map(|s| s.question.clone())
            .unwrap_or_default();
        let Some(outcome) = self.qa.apply(token, outcome) else {
            return;
        };

        match outcome {
            QaOutcome::TextReady(_) => debug!(token, "answer text ready"),
            QaOutcome::Delivered(answer) => {
                self.emit(PlayerUpdate::Answer {
                    question,
                    text: answer.text,
                    audio: Some(answer.audio.clone()),
                });
                if let Err(e) = self.play_answer(&answer.audio) {
                    self.emit(PlayerUpdate::Error(format!("cannot play answer: {}", e)));
                    self.qa.cancel();
                    self.set_phase(Phase::Paused);
                }
            }
            QaOutcome::Failed(e) => {
                if let Some(text) = e.answer_text() {
                    self.emit(PlayerUpdate::Answer {
                        question,
                        text: text.to_string(),
                        audio: None,
                    });
                }
                let hint = if e.is_retryable() { " (ask again or resume)" } else { "" };
                self.emit(PlayerUpdate::Error(format!("{}{}", e, hint)));
                self.set_phase(Phase::Paused);
            }
        }
    }

    fn shutdown(&mut self) {
        self.clock.stop();
        self.stop_answer_audio();
        self.qa.cancel();
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn play_slide(&mut self, slide: usize) {
        match self.clock.start(slide) {
            Ok(()) => {
                self.state.current_slide = slide;
                self.state.position = 0.0;
                self.set_phase(Phase::Playing);
                self.emit(PlayerUpdate::SlideChanged { slide });
                self.renderer.reset();
                self.render(slide, 0.0);
            }
            Err(e) => self.fail(format!("cannot play slide {}: {}", slide, e)),
        }
    }

    fn play_answer(&mut self, audio: &AudioSource) -> Result<(), AudioError> {
        self.answer_audio.load(audio)?;
        self.answer_audio.play()?;
        self.answer_playing = true;
        Ok(())
    }

    fn stop_answer_audio(&mut self) {
        if self.answer_playing {
            self.answer_audio.stop();
            self.answer_playing = false;
        }
    }

    fn render(&mut self, slide: usize, position: f64) {
        let Ok(entry) = self.timeline.get_slide(slide) else {
            return;
        };
        let changed = self
            .renderer
            .update(slide, entry.cues(), position)
            .map(|(cue, c)| (cue, c.text.clone()));
        if let Some((cue, text)) = changed {
            self.emit(PlayerUpdate::Subtitle { slide, cue, text });
        }
    }

    /// Stop everything and enter `Error`
    fn fail(&mut self, message: String) {
        error!(%message, "player error");
        self.clock.stop();
        self.stop_answer_audio();
        self.qa.cancel();
        self.paused_at = None;
        self.emit(PlayerUpdate::Error(message));
        self.set_phase(Phase::Error);
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.state.phase != phase {
            debug!(from = %self.state.phase, to = %phase, "phase change");
            self.state.phase = phase;
            self.emit(PlayerUpdate::PhaseChanged(phase));
        }
    }

    fn notice(&self, message: String) {
        info!(%message, "notice");
        self.emit(PlayerUpdate::Notice(message));
    }

    fn emit(&self, update: PlayerUpdate) {
        let _ = self.updates.send(update);
    }
}
