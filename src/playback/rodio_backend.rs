//! Rodio-based audio primitive
//!
//! Rodio's output stream cannot leave the thread that opened it, so each
//! [`RodioAudio`] owns a dedicated audio thread and talks to it over a
//! command channel. Calls that need an answer carry a reply sender.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use rodio::{OutputStream, Sink, Source};
use tracing::{debug, error, info};

use super::primitive::{open_decoder, AudioError, AudioPrimitive};
use crate::lecture::AudioSource;

// =============================================================================
// Audio Thread
// =============================================================================

/// Command sent to the audio thread
enum AudioCmd {
    Load(PathBuf, Sender<Result<f64, AudioError>>),
    Play(Sender<Result<(), AudioError>>),
    Pause,
    Seek(f64, Sender<Result<(), AudioError>>),
    Status(Sender<Status>),
    Stop,
    Shutdown,
}

#[derive(Debug, Clone, Copy, Default)]
struct Status {
    position: f64,
    finished: bool,
}

fn audio_thread_main(name: String, rx: Receiver<AudioCmd>, ready: Sender<Result<(), AudioError>>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(s) => s,
        Err(e) => {
            error!(player = %name, error = %e, "failed to open audio output");
            let _ = ready.send(Err(AudioError::Output(e.to_string())));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    debug!(player = %name, "audio thread ready");

    let mut sink: Option<Sink> = None;

    for cmd in rx {
        match cmd {
            AudioCmd::Load(path, reply) => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                let result = open_decoder(&path).and_then(|decoder| {
                    let duration = decoder
                        .total_duration()
                        .map(|d| d.as_secs_f64())
                        .unwrap_or(0.0);
                    let new_sink =
                        Sink::try_new(&handle).map_err(|e| AudioError::Output(e.to_string()))?;
                    new_sink.pause();
                    new_sink.append(decoder);
                    sink = Some(new_sink);
                    Ok(duration)
                });
                let _ = reply.send(result);
            }

            AudioCmd::Play(reply) => {
                let result = match &sink {
                    Some(s) => {
                        s.play();
                        Ok(())
                    }
                    None => Err(AudioError::NotLoaded),
                };
                let _ = reply.send(result);
            }

            AudioCmd::Pause => {
                if let Some(s) = &sink {
                    s.pause();
                }
            }

            AudioCmd::Seek(position, reply) => {
                let result = match &sink {
                    Some(s) => s
                        .try_seek(Duration::from_secs_f64(position.max(0.0)))
                        .map_err(|e| AudioError::Seek(e.to_string())),
                    None => Err(AudioError::NotLoaded),
                };
                let _ = reply.send(result);
            }

            AudioCmd::Status(reply) => {
                let status = match &sink {
                    Some(s) => Status {
                        position: s.get_pos().as_secs_f64(),
                        finished: s.empty(),
                    },
                    None => Status::default(),
                };
                let _ = reply.send(status);
            }

            AudioCmd::Stop => {
                if let Some(s) = sink.take() {
                    s.stop();
                }
            }

            AudioCmd::Shutdown => break,
        }
    }

    if let Some(s) = sink.take() {
        s.stop();
    }
    debug!(player = %name, "audio thread exiting");
}

// =============================================================================
// Public API
// =============================================================================

/// Audio primitive backed by the default rodio output device
pub struct RodioAudio {
    tx: Sender<AudioCmd>,
    thread: Option<JoinHandle<()>>,
}

impl RodioAudio {
    /// Open the default output device on a new audio thread named `name`
    pub fn open(name: &str) -> Result<Self, AudioError> {
        let (tx, rx) = channel::unbounded();
        let (ready_tx, ready_rx) = channel::bounded(1);
        let thread_name = name.to_string();
        let thread = thread::Builder::new()
            .name(format!("audio-{}", name))
            .spawn(move || audio_thread_main(thread_name, rx, ready_tx))
            .map_err(|e| AudioError::Output(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(player = name, "audio output opened");
                Ok(Self {
                    tx,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::Output("audio thread exited".into()))
            }
        }
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> AudioCmd) -> Option<T> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.tx.send(make(reply_tx)).ok()?;
        reply_rx.recv().ok()
    }

    fn status(&self) -> Status {
        self.request(AudioCmd::Status).unwrap_or(Status {
            position: 0.0,
            finished: true,
        })
    }
}

fn thread_gone() -> AudioError {
    AudioError::Output("audio thread exited".into())
}

impl AudioPrimitive for RodioAudio {
    fn load(&mut self, source: &AudioSource) -> Result<f64, AudioError> {
        let path = source.path().to_path_buf();
        self.request(|reply| AudioCmd::Load(path, reply))
            .unwrap_or_else(|| Err(thread_gone()))
    }

    fn play(&mut self) -> Result<(), AudioError> {
        self.request(AudioCmd::Play)
            .unwrap_or_else(|| Err(thread_gone()))
    }

    fn pause(&mut self) {
        let _ = self.tx.send(AudioCmd::Pause);
    }

    fn seek(&mut self, position: f64) -> Result<(), AudioError> {
        self.request(|reply| AudioCmd::Seek(position, reply))
            .unwrap_or_else(|| Err(thread_gone()))
    }

    fn position(&self) -> f64 {
        self.status().position
    }

    fn is_finished(&self) -> bool {
        self.status().finished
    }

    fn stop(&mut self) {
        let _ = self.tx.send(AudioCmd::Stop);
    }
}

impl Drop for RodioAudio {
    fn drop(&mut self) {
        let _ = self.tx.send(AudioCmd::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
