//! End-to-end player scenarios driven synchronously through the event queue.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use lectern::lecture::{AudioSource, LectureTimeline, SlideInput};
use lectern::playback::{AudioError, AudioPrimitive};
use lectern::player::{
    AnswerRequest, AnswerService, NarrationSynthesizer, NoSynthesizer, Phase, Player,
    PlayerCommand, PlayerEvent, PlayerUpdate, Position, QaOutcome, QaServices, ServiceError,
    SynthesisError,
};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Debug, Default)]
struct DeckState {
    loaded: Option<AudioSource>,
    loads: usize,
    seeks: Vec<f64>,
    position: f64,
    playing: bool,
    finished: bool,
    fail_load: bool,
}

/// Audio primitive whose play head is moved by the test
#[derive(Clone, Default)]
struct Deck(Arc<Mutex<DeckState>>);

impl Deck {
    fn failing() -> Self {
        let deck = Deck::default();
        deck.0.lock().fail_load = true;
        deck
    }

    fn set_position(&self, position: f64) {
        self.0.lock().position = position;
    }

    fn finish(&self) {
        self.0.lock().finished = true;
    }
}

impl AudioPrimitive for Deck {
    fn load(&mut self, source: &AudioSource) -> Result<f64, AudioError> {
        let mut s = self.0.lock();
        if s.fail_load {
            return Err(AudioError::NotFound(source.path().to_path_buf()));
        }
        s.loaded = Some(source.clone());
        s.loads += 1;
        s.position = 0.0;
        s.playing = false;
        s.finished = false;
        Ok(20.0)
    }

    fn play(&mut self) -> Result<(), AudioError> {
        let mut s = self.0.lock();
        if s.loaded.is_none() {
            return Err(AudioError::NotLoaded);
        }
        s.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.0.lock().playing = false;
    }

    fn seek(&mut self, position: f64) -> Result<(), AudioError> {
        let mut s = self.0.lock();
        s.seeks.push(position);
        s.position = position;
        Ok(())
    }

    fn position(&self) -> f64 {
        self.0.lock().position
    }

    fn is_finished(&self) -> bool {
        let s = self.0.lock();
        s.loaded.is_some() && s.finished
    }

    fn stop(&mut self) {
        let mut s = self.0.lock();
        s.loaded = None;
        s.playing = false;
    }
}

struct Echo;

impl AnswerService for Echo {
    fn answer(&self, request: &AnswerRequest) -> Result<String, ServiceError> {
        Ok(format!(
            "On slide {}: {}",
            request.current_slide.unwrap_or(0),
            request.question
        ))
    }
}

struct Down;

impl AnswerService for Down {
    fn answer(&self, _: &AnswerRequest) -> Result<String, ServiceError> {
        Err(ServiceError::Status(503))
    }
}

/// Answers only once the test releases it
struct Gate(Mutex<Receiver<String>>);

impl AnswerService for Gate {
    fn answer(&self, _: &AnswerRequest) -> Result<String, ServiceError> {
        self.0
            .lock()
            .recv()
            .map_err(|_| ServiceError::Transport("gate closed".into()))
    }
}

struct Speaker;

impl NarrationSynthesizer for Speaker {
    fn synthesize(&self, _: &str) -> Result<AudioSource, SynthesisError> {
        Ok(AudioSource::file("qa_response_1.wav"))
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    player: Player<Deck>,
    lecture: Deck,
    answer: Deck,
    events: Receiver<PlayerEvent>,
    updates: Receiver<PlayerUpdate>,
}

impl Harness {
    fn new(slides: usize, answers: Arc<dyn AnswerService>) -> Self {
        Self::with_lecture(slides, answers, Deck::default())
    }

    fn with_lecture(slides: usize, answers: Arc<dyn AnswerService>, lecture: Deck) -> Self {
        Self::custom(
            &vec![20.0; slides],
            answers,
            Arc::new(Speaker),
            lecture,
            Deck::default(),
        )
    }

    fn custom(
        durations: &[f64],
        answers: Arc<dyn AnswerService>,
        synth: Arc<dyn NarrationSynthesizer>,
        lecture: Deck,
        answer: Deck,
    ) -> Self {
        let inputs = (1..=durations.len())
            .map(|i| {
                SlideInput::new(
                    format!("Slide {} opens with an idea. Then it explains the idea in detail.", i),
                    AudioSource::file(format!("audio_slide_{}.wav", i)),
                )
            })
            .collect();
        let timeline = Arc::new(LectureTimeline::load(inputs, durations).timeline);

        let (events_tx, events) = channel::unbounded();
        let (updates_tx, updates) = channel::unbounded();
        let services = QaServices {
            answers,
            synth,
            timeout: Duration::from_secs(5),
        };
        let player = Player::new(
            timeline,
            lecture.clone(),
            answer.clone(),
            services,
            events_tx,
            updates_tx,
        );
        Self {
            player,
            lecture,
            answer,
            events,
            updates,
        }
    }

    fn command(&mut self, command: PlayerCommand) {
        self.player.handle(PlayerEvent::Command(command));
    }

    /// Tick once, then apply whatever the tick queued
    fn tick(&mut self) {
        self.player.handle(PlayerEvent::Tick);
        while let Ok(event) = self.events.try_recv() {
            self.player.handle(event);
        }
    }

    /// Apply events until a final Q&A outcome has been handled
    fn settle_answer(&mut self) {
        loop {
            let event = self
                .events
                .recv_timeout(Duration::from_secs(5))
                .expect("answer worker went quiet");
            let done = matches!(
                event,
                PlayerEvent::Qa {
                    outcome: QaOutcome::Delivered(_) | QaOutcome::Failed(_),
                    ..
                }
            );
            self.player.handle(event);
            if done {
                return;
            }
        }
    }

    fn phase(&self) -> Phase {
        self.player.state().phase
    }

    fn drain_updates(&self) -> Vec<PlayerUpdate> {
        self.updates.try_iter().collect()
    }
}

fn gate() -> (Arc<dyn AnswerService>, Sender<String>) {
    let (tx, rx) = channel::unbounded();
    (Arc::new(Gate(Mutex::new(rx))), tx)
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_question_round_trip_resumes_at_exact_position() {
    let mut h = Harness::new(5, Arc::new(Echo));
    h.command(PlayerCommand::Start);
    h.command(PlayerCommand::GoToSlide(3));
    h.lecture.set_position(12.3);

    h.command(PlayerCommand::RaiseHand);
    assert_eq!(h.phase(), Phase::Paused);
    assert_eq!(h.player.paused_at(), Some(Position::new(3, 12.3)));
    assert!(!h.lecture.0.lock().playing);

    h.command(PlayerCommand::AskQuestion("What is entropy?".into()));
    assert_eq!(h.phase(), Phase::AwaitingAnswer);
    h.settle_answer();

    assert_eq!(h.phase(), Phase::AwaitingAnswer);
    assert!(h.answer.0.lock().playing);
    let answer = h.drain_updates().into_iter().find_map(|u| match u {
        PlayerUpdate::Answer { question, text, audio } => Some((question, text, audio)),
        _ => None,
    });
    let (question, text, audio) = answer.expect("answer update");
    assert_eq!(question, "What is entropy?");
    assert_eq!(text, "On slide 3: What is entropy?");
    assert_eq!(audio, Some(AudioSource::file("qa_response_1.wav")));

    h.answer.finish();
    h.tick();

    let state = h.player.state();
    assert_eq!(state.phase, Phase::Playing);
    assert_eq!(state.current_slide, 3);
    assert_eq!(state.position, 12.3);
    let lecture = h.lecture.0.lock();
    assert_eq!(lecture.seeks.last(), Some(&12.3));
    assert!(lecture.playing);
    // Resuming the same slide keeps the loaded clip
    assert_eq!(lecture.loads, 2);
    drop(lecture);
    assert_eq!(h.player.paused_at(), None);
    assert!(h.player.qa().session().is_none());
}

#[test]
fn test_go_to_slide_starts_from_zero() {
    let mut h = Harness::new(5, Arc::new(Echo));
    h.command(PlayerCommand::Start);
    h.command(PlayerCommand::GoToSlide(2));
    h.lecture.set_position(7.5);

    h.command(PlayerCommand::GoToSlide(5));
    let state = h.player.state();
    assert_eq!(state.phase, Phase::Playing);
    assert_eq!(state.current_slide, 5);
    assert_eq!(state.position, 0.0);
    assert_eq!(h.lecture.0.lock().seeks.last(), Some(&0.0));
    assert_eq!(
        h.lecture.0.lock().loaded,
        Some(AudioSource::file("audio_slide_5.wav"))
    );
    assert!(h
        .drain_updates()
        .contains(&PlayerUpdate::SlideChanged { slide: 5 }));
}

#[test]
fn test_go_to_missing_slide_is_a_notice() {
    let mut h = Harness::new(3, Arc::new(Echo));
    h.command(PlayerCommand::Start);
    h.drain_updates();

    h.command(PlayerCommand::GoToSlide(9));
    assert_eq!(h.phase(), Phase::Playing);
    assert_eq!(h.player.state().current_slide, 1);
    assert!(h
        .drain_updates()
        .iter()
        .any(|u| matches!(u, PlayerUpdate::Notice(_))));
}

#[test]
fn test_cancel_returns_to_paused_position() {
    let mut h = Harness::new(2, Arc::new(Echo));
    h.command(PlayerCommand::Start);
    h.lecture.set_position(4.5);
    h.command(PlayerCommand::RaiseHand);

    h.command(PlayerCommand::CancelQuestion);
    let state = h.player.state();
    assert_eq!(state.phase, Phase::Playing);
    assert_eq!(state.current_slide, 1);
    assert_eq!(state.position, 4.5);
    assert_eq!(h.lecture.0.lock().seeks.last(), Some(&4.5));
}

#[test]
fn test_second_question_while_pending_is_busy() {
    let (answers, release) = gate();
    let mut h = Harness::new(2, answers);
    h.command(PlayerCommand::Start);
    h.command(PlayerCommand::RaiseHand);
    h.command(PlayerCommand::AskQuestion("first".into()));
    h.drain_updates();

    h.command(PlayerCommand::AskQuestion("second".into()));
    assert_eq!(h.phase(), Phase::AwaitingAnswer);
    assert_eq!(
        h.drain_updates(),
        vec![PlayerUpdate::Notice(
            "a question is already being answered".into()
        )]
    );
    assert_eq!(h.player.qa().session().map(|s| s.question.as_str()), Some("first"));

    release.send("done".into()).unwrap();
    h.settle_answer();
}

#[test]
fn test_answer_after_resume_is_discarded() {
    let (answers, release) = gate();
    let mut h = Harness::new(2, answers);
    h.command(PlayerCommand::Start);
    h.lecture.set_position(2.0);
    h.command(PlayerCommand::RaiseHand);
    h.command(PlayerCommand::AskQuestion("too late?".into()));
    h.command(PlayerCommand::Resume);
    assert_eq!(h.phase(), Phase::Playing);
    h.drain_updates();

    release.send("yes".into()).unwrap();
    h.settle_answer();

    assert_eq!(h.phase(), Phase::Playing);
    assert!(h.answer.0.lock().loaded.is_none());
    assert!(!h
        .drain_updates()
        .iter()
        .any(|u| matches!(u, PlayerUpdate::Answer { .. })));
}

#[test]
fn test_failed_answer_pauses_and_allows_resume() {
    let mut h = Harness::new(2, Arc::new(Down));
    h.command(PlayerCommand::Start);
    h.command(PlayerCommand::GoToSlide(2));
    h.lecture.set_position(6.0);
    h.command(PlayerCommand::RaiseHand);
    h.command(PlayerCommand::AskQuestion("anyone there?".into()));
    h.settle_answer();

    assert_eq!(h.phase(), Phase::Paused);
    let errors: Vec<_> = h
        .drain_updates()
        .into_iter()
        .filter_map(|u| match u {
            PlayerUpdate::Error(message) => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("HTTP 503"));

    h.command(PlayerCommand::Resume);
    assert_eq!(h.player.state().current_slide, 2);
    assert_eq!(h.player.state().position, 6.0);
    assert_eq!(h.phase(), Phase::Playing);
}

#[test]
fn test_slides_advance_until_finished() {
    let mut h = Harness::new(2, Arc::new(Echo));
    h.command(PlayerCommand::Start);

    h.lecture.finish();
    h.tick();
    assert_eq!(h.phase(), Phase::Playing);
    assert_eq!(h.player.state().current_slide, 2);

    h.lecture.set_position(20.0);
    h.lecture.finish();
    h.tick();
    assert_eq!(h.phase(), Phase::Finished);
    assert_eq!(h.player.state().current_slide, 2);
    assert_eq!(h.player.state().position, 20.0);
    assert!(!h.player.clock().is_running());

    // Further ticks change nothing
    h.tick();
    assert_eq!(h.phase(), Phase::Finished);
}

#[test]
fn test_ticks_publish_subtitles() {
    let mut h = Harness::new(1, Arc::new(Echo));
    h.command(PlayerCommand::Start);
    let first = h.drain_updates();
    assert!(first
        .iter()
        .any(|u| matches!(u, PlayerUpdate::Subtitle { slide: 1, cue: 0, .. })));

    h.lecture.set_position(19.5);
    h.tick();
    assert_eq!(h.player.state().position, 19.5);
    let last_cue = h.player.timeline().slides()[0].cues().len() - 1;
    let updates = h.drain_updates();
    if last_cue > 0 {
        assert!(updates.iter().any(
            |u| matches!(u, PlayerUpdate::Subtitle { slide: 1, cue, .. } if *cue == last_cue)
        ));
    }
}

#[test]
fn test_empty_lecture_finishes_immediately() {
    let mut h = Harness::new(0, Arc::new(Echo));
    h.command(PlayerCommand::Start);
    assert_eq!(h.phase(), Phase::Finished);
    assert!(h.lecture.0.lock().loaded.is_none());
}

#[test]
fn test_audio_failure_enters_error() {
    let mut h = Harness::with_lecture(2, Arc::new(Echo), Deck::failing());
    h.command(PlayerCommand::Start);
    assert_eq!(h.phase(), Phase::Error);
    assert!(!h.player.clock().is_running());
    assert!(h
        .drain_updates()
        .iter()
        .any(|u| matches!(u, PlayerUpdate::Error(m) if m.contains("audio_slide_1.wav"))));

    // Only a restart leaves the error phase
    h.command(PlayerCommand::Start);
    assert_eq!(h.phase(), Phase::Error);
    h.command(PlayerCommand::Restart);
    assert_eq!(h.phase(), Phase::Idle);
}

#[test]
fn test_invalid_command_is_a_notice() {
    let mut h = Harness::new(2, Arc::new(Echo));
    h.command(PlayerCommand::Resume);
    assert_eq!(h.phase(), Phase::Idle);
    assert_eq!(
        h.drain_updates(),
        vec![PlayerUpdate::Notice("cannot resume while idle".into())]
    );
}

#[test]
fn test_restart_returns_to_idle() {
    let mut h = Harness::new(3, Arc::new(Echo));
    h.command(PlayerCommand::Start);
    h.command(PlayerCommand::GoToSlide(3));
    h.lecture.set_position(5.0);
    h.command(PlayerCommand::RaiseHand);

    h.command(PlayerCommand::Restart);
    let state = h.player.state();
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.current_slide, 0);
    assert_eq!(state.position, 0.0);
    assert_eq!(h.player.paused_at(), None);
    assert!(h.lecture.0.lock().loaded.is_none());

    h.command(PlayerCommand::Start);
    assert_eq!(h.player.state().current_slide, 1);
}

#[test]
fn test_unnarrated_answer_is_shown_and_stays_paused() {
    let mut h = Harness::custom(
        &[20.0, 20.0],
        Arc::new(Echo),
        Arc::new(NoSynthesizer),
        Deck::default(),
        Deck::default(),
    );
    h.command(PlayerCommand::Start);
    h.command(PlayerCommand::GoToSlide(2));
    h.lecture.set_position(3.0);
    h.command(PlayerCommand::RaiseHand);
    h.command(PlayerCommand::AskQuestion("Why?".into()));
    h.settle_answer();

    assert_eq!(h.phase(), Phase::Paused);
    assert_eq!(h.player.paused_at(), Some(Position::new(2, 3.0)));
    assert!(h.answer.0.lock().loaded.is_none());
    let updates = h.drain_updates();
    assert!(updates.contains(&PlayerUpdate::Answer {
        question: "Why?".into(),
        text: "On slide 2: Why?".into(),
        audio: None,
    }));
    assert!(updates
        .iter()
        .any(|u| matches!(u, PlayerUpdate::Error(m) if m.contains("no speech synthesizer"))));

    h.command(PlayerCommand::Resume);
    let state = h.player.state();
    assert_eq!(state.phase, Phase::Playing);
    assert_eq!((state.current_slide, state.position), (2, 3.0));
}

#[test]
fn test_unplayable_answer_audio_returns_to_pause() {
    let mut h = Harness::custom(
        &[20.0, 20.0],
        Arc::new(Echo),
        Arc::new(Speaker),
        Deck::default(),
        Deck::failing(),
    );
    h.command(PlayerCommand::Start);
    h.lecture.set_position(8.25);
    h.command(PlayerCommand::RaiseHand);
    h.command(PlayerCommand::AskQuestion("Louder?".into()));
    h.settle_answer();

    assert_eq!(h.phase(), Phase::Paused);
    assert!(h.player.qa().session().is_none());
    assert_eq!(h.player.paused_at(), Some(Position::new(1, 8.25)));
    assert!(h.drain_updates().iter().any(
        |u| matches!(u, PlayerUpdate::Error(m) if m.starts_with("cannot play answer") && m.contains("qa_response_1.wav"))
    ));

    h.command(PlayerCommand::Resume);
    let state = h.player.state();
    assert_eq!(state.phase, Phase::Playing);
    assert_eq!((state.current_slide, state.position), (1, 8.25));
    assert_eq!(h.lecture.0.lock().seeks.last(), Some(&8.25));
}

#[test]
fn test_skipped_slide_is_passed_over() {
    let mut h = Harness::custom(
        &[20.0, 0.0, 20.0],
        Arc::new(Echo),
        Arc::new(Speaker),
        Deck::default(),
        Deck::default(),
    );
    h.command(PlayerCommand::Start);
    h.lecture.finish();
    h.tick();

    assert_eq!(h.phase(), Phase::Playing);
    assert_eq!(h.player.state().current_slide, 3);
    assert_eq!(
        h.lecture.0.lock().loaded,
        Some(AudioSource::file("audio_slide_3.wav"))
    );

    h.drain_updates();
    h.command(PlayerCommand::GoToSlide(2));
    assert_eq!(h.player.state().current_slide, 3);
    assert!(h
        .drain_updates()
        .iter()
        .any(|u| matches!(u, PlayerUpdate::Notice(m) if m.contains("slide 2 not found"))));
}

#[test]
fn test_hidden_subtitles_are_not_published() {
    let mut h = Harness::new(1, Arc::new(Echo));
    h.command(PlayerCommand::Subtitles(false));
    assert!(!h.player.subtitles_enabled());
    h.command(PlayerCommand::Start);
    h.lecture.set_position(19.5);
    h.tick();
    assert!(!h
        .drain_updates()
        .iter()
        .any(|u| matches!(u, PlayerUpdate::Subtitle { .. })));

    h.command(PlayerCommand::Subtitles(true));
    assert!(h
        .drain_updates()
        .iter()
        .any(|u| matches!(u, PlayerUpdate::Subtitle { slide: 1, .. })));
}
