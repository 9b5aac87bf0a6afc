//! Application options
//!
//! Options come from defaults, then `config.json`, then the environment
//! (`OLLAMA_URL`, `OLLAMA_MODEL`), then command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::lecture::builder::{DEFAULT_MIN_CUE_SECONDS, DEFAULT_MIN_SEGMENT_WORDS};
use crate::lecture::{BuilderOptions, CueWeighting};
use crate::logging::LogLevel;
use crate::player::answer::{DEFAULT_ANSWER_URL, DEFAULT_MODEL};
use crate::player::runtime::MIN_TICK_RATE;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

const MAX_TIMEOUT_SECS: f64 = 600.0;
const MAX_TICK_RATE: f64 = 240.0;

/// Application options that can be set via config file, environment or CLI
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Options {
    // Commandline-only options
    #[serde(skip)]
    pub log_file: Option<PathBuf>,

    pub log_level: LogLevel,
    pub answer_url: String,
    pub model: String,
    pub answer_timeout_secs: f64,
    pub tick_rate: f64,
    pub min_segment_words: usize,
    pub min_cue_seconds: f64,
    pub weighting: CueWeighting,
    #[serde(alias = "temp_dir")]
    pub audio_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Speech synthesis program and arguments; empty disables narration of answers
    pub synth_command: Vec<String>,
    /// Show subtitles while playing
    pub subtitles: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: LogLevel::Info,
            answer_url: DEFAULT_ANSWER_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            answer_timeout_secs: 30.0,
            tick_rate: MIN_TICK_RATE,
            min_segment_words: DEFAULT_MIN_SEGMENT_WORDS,
            min_cue_seconds: DEFAULT_MIN_CUE_SECONDS,
            weighting: CueWeighting::Words,
            audio_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("output"),
            synth_command: Vec::new(),
            subtitles: true,
        }
    }
}

impl Options {
    pub fn builder_options(&self) -> BuilderOptions {
        BuilderOptions {
            min_segment_words: self.min_segment_words,
            min_cue_seconds: self.min_cue_seconds,
            weighting: self.weighting,
        }
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.answer_timeout_secs)
    }

    /// Default location of the lecture timeline file
    pub fn timeline_path(&self) -> PathBuf {
        self.output_dir.join("lecture_timeline.json")
    }

    /// Default location of the exported subtitles
    pub fn srt_path(&self) -> PathBuf {
        self.output_dir.join("lecture_subtitles.srt")
    }

    /// Apply environment overrides, reading variables through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("OLLAMA_URL").filter(|v| !v.trim().is_empty()) {
            self.answer_url = url;
        }
        if let Some(model) = var("OLLAMA_MODEL").filter(|v| !v.trim().is_empty()) {
            self.model = model;
        }
    }

    /// Check values that may have come from a config file
    pub fn validate(&self) -> Result<()> {
        check_timeout(self.answer_timeout_secs)?;
        check_tick_rate(self.tick_rate)?;
        if !self.min_cue_seconds.is_finite() || self.min_cue_seconds < 0.0 {
            anyhow::bail!("min_cue_seconds must be zero or positive");
        }
        if self.answer_url.trim().is_empty() {
            anyhow::bail!("answer_url must not be empty");
        }
        Ok(())
    }
}

/// Load options from `path`, or from `config.json` when it exists
pub fn load_config(path: Option<&Path>) -> Result<Options> {
    let mut options = match path {
        Some(path) => read_config(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            read_config(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Options::default(),
    };
    options.apply_env(|key| std::env::var(key).ok());
    options.validate()?;
    Ok(options)
}

fn read_config(path: &Path) -> Result<Options> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

fn check_timeout(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 || secs > MAX_TIMEOUT_SECS {
        anyhow::bail!("Answer timeout out of range (0 to {} seconds)", MAX_TIMEOUT_SECS);
    }
    Ok(Duration::from_secs_f64(secs))
}

fn check_tick_rate(rate: f64) -> Result<f64> {
    if !rate.is_finite() || !(MIN_TICK_RATE..=MAX_TICK_RATE).contains(&rate) {
        anyhow::bail!(
            "Tick rate out of range ({} to {} Hz)",
            MIN_TICK_RATE,
            MAX_TICK_RATE
        );
    }
    Ok(rate)
}

/// Parse an answer timeout in seconds
pub fn parse_timeout(s: &str) -> Result<Duration> {
    let secs: f64 = s.trim().parse().context("Invalid timeout value")?;
    check_timeout(secs)
}

/// Parse a tick rate in Hz
pub fn parse_tick_rate(s: &str) -> Result<f64> {
    let rate: f64 = s.trim().parse().context("Invalid tick rate")?;
    check_tick_rate(rate)
}

/// Parse a cue weighting mode
pub fn parse_weighting(s: &str) -> Result<CueWeighting> {
    match s.to_lowercase().as_str() {
        "words" | "word" => Ok(CueWeighting::Words),
        "sentences" | "sentence" | "equal" => Ok(CueWeighting::Sentences),
        _ => anyhow::bail!("Invalid weighting: {}. Valid options: words, sentences", s),
    }
}
