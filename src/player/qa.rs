//! Q&A sessions
//!
//! One question may be in flight at a time. Answering runs on a worker
//! thread: the answer service is called with a timeout, then the answer is
//! narrated. Progress comes back to the player as [`PlayerEvent::Qa`] events
//! tagged with the session token. Events whose token no longer matches the
//! live session are stale and are dropped.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use super::answer::{AnswerRequest, AnswerService};
use super::synth::NarrationSynthesizer;
use super::types::{PlayerEvent, Position};
use crate::lecture::AudioSource;

pub const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Waiting for the answer service
    Pending,
    /// Answer text received, narration in progress
    Answering,
    Delivered,
    Failed,
}

#[derive(Debug, Clone)]
pub struct QaSession {
    pub token: u64,
    pub question: String,
    pub status: SessionStatus,
    pub paused_at: Position,
    pub created_at: SystemTime,
}

/// A narrated answer
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub audio: AudioSource,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QaError {
    #[error("a question is already being answered")]
    SessionBusy,
    #[error("no answer after {0:?}")]
    AnswerTimeout(Duration),
    #[error("answer service failed: {0}")]
    AnswerTransport(String),
    #[error("could not narrate the answer: {reason}")]
    SynthesisFailure { text: String, reason: String },
}

impl QaError {
    /// Whether asking again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, QaError::AnswerTimeout(_) | QaError::AnswerTransport(_))
    }

    /// Answer text that was produced before the failure
    pub fn answer_text(&self) -> Option<&str> {
        match self {
            QaError::SynthesisFailure { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Progress reported by a worker
#[derive(Debug, Clone, PartialEq)]
pub enum QaOutcome {
    TextReady(String),
    Delivered(Answer),
    Failed(QaError),
}

/// Owns the live session and spawns answer workers
pub struct QaSessionManager {
    answers: Arc<dyn AnswerService>,
    synth: Arc<dyn NarrationSynthesizer>,
    events: Sender<PlayerEvent>,
    timeout: Duration,
    session: Option<QaSession>,
    next_token: u64,
}

impl QaSessionManager {
    pub fn new(
        answers: Arc<dyn AnswerService>,
        synth: Arc<dyn NarrationSynthesizer>,
        events: Sender<PlayerEvent>,
        timeout: Duration,
    ) -> Self {
        Self {
            answers,
            synth,
            events,
            timeout,
            session: None,
            next_token: 1,
        }
    }

    /// Start answering `question`, returning the session token
    ///
    /// # Errors
    /// `SessionBusy` while another session is pending or answering.
    pub fn ask(&mut self, question: &str, paused_at: Position) -> Result<u64, QaError> {
        if self.is_busy() {
            return Err(QaError::SessionBusy);
        }

        let token = self.next_token;
        self.next_token += 1;
        let request = AnswerRequest {
            question: question.to_string(),
            current_slide: Some(paused_at.slide),
        };
        let worker = Worker {
            token,
            answers: Arc::clone(&self.answers),
            synth: Arc::clone(&self.synth),
            events: self.events.clone(),
            timeout: self.timeout,
        };
        thread::Builder::new()
            .name(format!("qa-{}", token))
            .spawn(move || worker.run(request))
            .map_err(|e| QaError::AnswerTransport(e.to_string()))?;

        info!(token, slide = paused_at.slide, "question asked");
        self.session = Some(QaSession {
            token,
            question: question.to_string(),
            status: SessionStatus::Pending,
            paused_at,
            created_at: SystemTime::now(),
        });
        Ok(token)
    }

    /// Apply a worker outcome to the live session
    ///
    /// Returns `None` when the outcome is stale.
    pub fn apply(&mut self, token: u64, outcome: QaOutcome) -> Option<QaOutcome> {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.token == token)
            .filter(|s| matches!(s.status, SessionStatus::Pending | SessionStatus::Answering))
        else {
            debug!(token, "discarding stale answer");
            return None;
        };

        session.status = match &outcome {
            QaOutcome::TextReady(_) => SessionStatus::Answering,
            QaOutcome::Delivered(_) => SessionStatus::Delivered,
            QaOutcome::Failed(e) => {
                warn!(token, error = %e, "question failed");
                SessionStatus::Failed
            }
        };
        Some(outcome)
    }

    /// Drop the live session; any work still in flight becomes stale
    pub fn cancel(&mut self) -> Option<QaSession> {
        let session = self.session.take();
        if let Some(s) = &session {
            debug!(token = s.token, status = ?s.status, "session closed");
        }
        session
    }

    pub fn session(&self) -> Option<&QaSession> {
        self.session.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| matches!(s.status, SessionStatus::Pending | SessionStatus::Answering))
    }
}

struct Worker {
    token: u64,
    answers: Arc<dyn AnswerService>,
    synth: Arc<dyn NarrationSynthesizer>,
    events: Sender<PlayerEvent>,
    timeout: Duration,
}

impl Worker {
    fn run(self, request: AnswerRequest) {
        let outcome = match self.fetch_answer(request) {
            Ok(text) => {
                self.report(QaOutcome::TextReady(text.clone()));
                match self.synth.synthesize(&text) {
                    Ok(audio) => QaOutcome::Delivered(Answer { text, audio }),
                    Err(e) => QaOutcome::Failed(QaError::SynthesisFailure {
                        text,
                        reason: e.to_string(),
                    }),
                }
            }
            Err(e) => QaOutcome::Failed(e),
        };
        self.report(outcome);
    }

    /// Call the answer service on its own thread so a hung request cannot
    /// outlive the timeout
    fn fetch_answer(&self, request: AnswerRequest) -> Result<String, QaError> {
        let (tx, rx) = channel::bounded(1);
        let answers = Arc::clone(&self.answers);
        thread::Builder::new()
            .name(format!("qa-{}-request", self.token))
            .spawn(move || {
                let _ = tx.send(answers.answer(&request));
            })
            .map_err(|e| QaError::AnswerTransport(e.to_string()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(QaError::AnswerTransport(e.to_string())),
            Err(RecvTimeoutError::Timeout) => Err(QaError::AnswerTimeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(QaError::AnswerTransport("answer request aborted".into()))
            }
        }
    }

    fn report(&self, outcome: QaOutcome) {
        let _ = self.events.send(PlayerEvent::Qa {
            token: self.token,
            outcome,
        });
    }
}
