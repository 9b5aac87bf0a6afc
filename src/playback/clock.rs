//! Playback clock
//!
//! Drives one slide's position from the audio primitive's time source.
//! Listeners registered with [`PlaybackClock::on_position_change`] and
//! [`PlaybackClock::on_ended`] are called from [`PlaybackClock::poll`], which
//! the player invokes on every tick.
//!
//! Every `start`/`resume_at` begins a new run with a fresh generation number.
//! Notifications carry the generation so late ones from an earlier run can
//! be told apart.

use std::sync::Arc;

use tracing::{debug, trace};

use super::primitive::{AudioError, AudioPrimitive};
use crate::lecture::{LectureTimeline, TimelineError};

/// Notification produced while polling
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockEvent {
    Position {
        generation: u64,
        slide: usize,
        position: f64,
    },
    Ended {
        generation: u64,
        slide: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Audio(#[from] AudioError),
}

type PositionListener = Box<dyn FnMut(u64, usize, f64) + Send>;
type EndedListener = Box<dyn FnMut(u64, usize) + Send>;

pub struct PlaybackClock<A: AudioPrimitive> {
    audio: A,
    timeline: Arc<LectureTimeline>,
    slide: Option<usize>,
    duration: f64,
    running: bool,
    ended_fired: bool,
    generation: u64,
    position_listeners: Vec<PositionListener>,
    ended_listeners: Vec<EndedListener>,
}

impl<A: AudioPrimitive> PlaybackClock<A> {
    pub fn new(audio: A, timeline: Arc<LectureTimeline>) -> Self {
        Self {
            audio,
            timeline,
            slide: None,
            duration: 0.0,
            running: false,
            ended_fired: false,
            generation: 0,
            position_listeners: Vec::new(),
            ended_listeners: Vec::new(),
        }
    }

    /// Play `slide` from the beginning
    pub fn start(&mut self, slide: usize) -> Result<(), ClockError> {
        self.resume_at(slide, 0.0)
    }

    /// Pause and return the position, clamped into `[0, duration]`
    pub fn pause(&mut self) -> f64 {
        if self.slide.is_none() {
            return 0.0;
        }
        self.audio.pause();
        self.running = false;
        let position = self.position();
        debug!(slide = ?self.slide, position, "clock paused");
        position
    }

    /// Seek `slide` to exactly `position`, then play
    pub fn resume_at(&mut self, slide: usize, position: f64) -> Result<(), ClockError> {
        let (audio, duration) = {
            let entry = self.timeline.get_slide(slide)?;
            (entry.audio().clone(), entry.duration())
        };

        self.running = false;
        self.generation += 1;
        if self.slide != Some(slide) || self.audio.is_finished() {
            self.slide = None;
            self.audio.load(&audio)?;
        }
        self.slide = Some(slide);
        self.duration = duration;

        let target = position.clamp(0.0, duration);
        self.audio.seek(target)?;
        self.audio.play()?;
        self.running = true;
        self.ended_fired = false;
        debug!(slide, position = target, generation = self.generation, "clock running");
        Ok(())
    }

    /// Stop playback and forget the current slide
    pub fn stop(&mut self) {
        self.audio.stop();
        self.running = false;
        self.slide = None;
        self.generation += 1;
    }

    pub fn on_position_change(&mut self, listener: impl FnMut(u64, usize, f64) + Send + 'static) {
        self.position_listeners.push(Box::new(listener));
    }

    pub fn on_ended(&mut self, listener: impl FnMut(u64, usize) + Send + 'static) {
        self.ended_listeners.push(Box::new(listener));
    }

    /// Report progress to listeners
    ///
    /// Does nothing unless running. The ended listeners fire once per run.
    pub fn poll(&mut self) {
        let Some(slide) = self.slide.filter(|_| self.running) else {
            return;
        };

        if self.audio.is_finished() {
            self.running = false;
            if !self.ended_fired {
                self.ended_fired = true;
                debug!(slide, generation = self.generation, "slide narration ended");
                for listener in &mut self.ended_listeners {
                    listener(self.generation, slide);
                }
            }
            return;
        }

        let position = self.position();
        trace!(slide, position, "clock tick");
        for listener in &mut self.position_listeners {
            listener(self.generation, slide, position);
        }
    }

    /// Current position, clamped into the slide's duration
    pub fn position(&self) -> f64 {
        if self.slide.is_none() {
            return 0.0;
        }
        self.audio.position().clamp(0.0, self.duration)
    }

    pub fn slide(&self) -> Option<usize> {
        self.slide
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }
}
