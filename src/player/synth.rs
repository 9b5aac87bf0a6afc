//! Narration synthesis for answers
//!
//! Speech synthesis is an external program. [`CommandSynthesizer`] runs it
//! with the answer text and an output path substituted into its arguments.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::lecture::AudioSource;

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("no speech synthesizer configured")]
    Unavailable,
    #[error("failed to run synthesizer: {0}")]
    Spawn(#[from] io::Error),
    #[error("synthesizer exited with {0}")]
    Failed(String),
    #[error("synthesizer produced no audio at {0}")]
    MissingOutput(PathBuf),
    #[error("synthesizer did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Turns text into playable audio
pub trait NarrationSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<AudioSource, SynthesisError>;
}

/// Placeholder replaced by the text to speak
pub const TEXT_PLACEHOLDER: &str = "{text}";
/// Placeholder replaced by the output WAV path
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Longest a synthesizer run may take before it is killed
pub const DEFAULT_SYNTH_TIMEOUT: Duration = Duration::from_secs(60);

const WAIT_POLL: Duration = Duration::from_millis(20);

/// Runs an external text-to-speech command
///
/// `command` is the program followed by its arguments, e.g.
/// `["piper", "--model", "en.onnx", "--output_file", "{output}", "--text", "{text}"]`.
/// Without a `{text}` placeholder the text is written to the program's stdin.
#[derive(Debug)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    output_dir: PathBuf,
    counter: AtomicU64,
    timeout: Duration,
}

impl CommandSynthesizer {
    /// Returns `None` for an empty command
    pub fn new(command: &[String], output_dir: impl Into<PathBuf>) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            output_dir: output_dir.into(),
            counter: AtomicU64::new(0),
            timeout: DEFAULT_SYNTH_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn next_output(&self) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.output_dir.join(format!("qa_response_{}.wav", n))
    }
}

impl NarrationSynthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str) -> Result<AudioSource, SynthesisError> {
        fs::create_dir_all(&self.output_dir)?;
        let output = self.next_output();
        let output_str = output.to_string_lossy();

        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                a.replace(TEXT_PLACEHOLDER, text)
                    .replace(OUTPUT_PLACEHOLDER, &output_str)
            })
            .collect();
        let uses_stdin = !self.args.iter().any(|a| a.contains(TEXT_PLACEHOLDER));

        debug!(program = %self.program, output = %output.display(), "running synthesizer");
        let mut cmd = Command::new(&self.program);
        cmd.args(&args);
        cmd.stdin(if uses_stdin { Stdio::piped() } else { Stdio::null() });
        let mut child = cmd.spawn()?;

        // A program that never reads stdin must not stall the run
        if let Some(mut stdin) = child.stdin.take() {
            let text = text.to_string();
            let writer = thread::Builder::new()
                .name("synth-stdin".into())
                .spawn(move || {
                    if let Err(e) = stdin.write_all(text.as_bytes()) {
                        warn!(error = %e, "synthesizer did not read its input");
                    }
                });
            if let Err(e) = writer {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }
        let status = wait_bounded(&mut child, self.timeout)?;

        if !status.success() {
            return Err(SynthesisError::Failed(status.to_string()));
        }
        if !output.is_file() {
            return Err(SynthesisError::MissingOutput(output));
        }
        info!(output = %output.display(), "answer narrated");
        Ok(AudioSource::file(output))
    }
}

/// Wait for `child`, killing and reaping it once `timeout` has passed
fn wait_bounded(child: &mut Child, timeout: Duration) -> Result<ExitStatus, SynthesisError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() < deadline => thread::sleep(WAIT_POLL),
            Ok(None) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "killing synthesizer");
                let _ = child.kill();
                let _ = child.wait();
                return Err(SynthesisError::TimedOut(timeout));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }
    }
}

/// Synthesizer used when none is configured; answers are shown as text only
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSynthesizer;

impl NarrationSynthesizer for NoSynthesizer {
    fn synthesize(&self, _text: &str) -> Result<AudioSource, SynthesisError> {
        Err(SynthesisError::Unavailable)
    }
}
