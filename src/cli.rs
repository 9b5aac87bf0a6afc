use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use crate::config::{parse_tick_rate, parse_timeout, parse_weighting, Options};
use crate::logging::LogLevel;

/// Narrated lecture player with raise-your-hand questions
#[derive(Parser, Debug, Default)]
#[command(name = "lectern")]
#[command(version)]
#[command(about = "Play narrated slide lectures with synchronized subtitles and live Q&A", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./config.json when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub logfile: Option<PathBuf>,

    /// Log level (nothing, user, error, warning, info, debug, all)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub loglevel: Option<String>,

    /// Raise the log level by one step (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Answer service URL
    #[arg(long, value_name = "URL", global = true)]
    pub url: Option<String>,

    /// Answer model name
    #[arg(long, value_name = "MODEL", global = true)]
    pub model: Option<String>,

    /// Answer timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<String>,

    /// Player tick rate in Hz (at least 4)
    #[arg(long, value_name = "HZ", global = true)]
    pub tickrate: Option<String>,

    /// Cue weighting (words, sentences)
    #[arg(long, value_name = "MODE", global = true)]
    pub weighting: Option<String>,

    /// Merge sentence fragments shorter than this many words
    #[arg(long, value_name = "WORDS", global = true)]
    pub minwords: Option<usize>,

    /// Directory holding audio_slide_N.wav narration clips
    #[arg(long, value_name = "DIR", global = true)]
    pub audiodir: Option<PathBuf>,

    /// Directory for timelines, subtitles and manifests
    #[arg(long, value_name = "DIR", global = true)]
    pub outdir: Option<PathBuf>,

    /// Speech synthesis command with {text} and {output} placeholders
    #[arg(long, value_name = "COMMAND", global = true)]
    pub tts: Option<String>,

    /// Start with subtitles hidden
    #[arg(long, global = true)]
    pub no_subtitles: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Build a lecture timeline from a manifest and its narration audio
    Build {
        /// Lecture manifest (default: newest *_lecture.json in the output directory)
        manifest: Option<PathBuf>,
        /// Timeline file to write
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Also export SubRip subtitles
        #[arg(long)]
        srt: bool,
    },
    /// Split a SubRip file into per-slide cues using the narration clip lengths
    ImportSrt {
        srt: PathBuf,
        /// Timeline file to write
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Play a lecture in the terminal
    Play {
        /// Timeline file (default: the output directory's lecture_timeline.json)
        timeline: Option<PathBuf>,
        /// Manifest whose narration is given to the answer service
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,
    },
    /// Ask the answer service a single question
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
        /// Slide the question is about
        #[arg(long, value_name = "N")]
        slide: Option<usize>,
        /// Timeline whose narration is given as context
        #[arg(long, value_name = "FILE")]
        timeline: Option<PathBuf>,
        /// Manifest whose narration is given as context (preferred over --timeline)
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,
    },
    /// Check that the answer service is running and the model is installed
    Status,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(ref log_file) = self.logfile {
            opts.log_file = Some(log_file.clone());
        }

        if let Some(ref level) = self.loglevel {
            opts.log_level = Self::parse_log_level(level)?;
        }
        if self.verbose > 0 {
            opts.log_level =
                LogLevel::from_i32(opts.log_level.as_i32() + i32::from(self.verbose));
        }

        if let Some(ref url) = self.url {
            opts.answer_url = url.clone();
        }

        if let Some(ref model) = self.model {
            opts.model = model.clone();
        }

        if let Some(ref timeout) = self.timeout {
            opts.answer_timeout_secs = parse_timeout(timeout)
                .context("Invalid --timeout")?
                .as_secs_f64();
        }

        if let Some(ref rate) = self.tickrate {
            opts.tick_rate = parse_tick_rate(rate).context("Invalid --tickrate")?;
        }

        if let Some(ref weighting) = self.weighting {
            opts.weighting = parse_weighting(weighting)?;
        }

        if let Some(words) = self.minwords {
            opts.min_segment_words = words;
        }

        if let Some(ref dir) = self.audiodir {
            opts.audio_dir = dir.clone();
        }

        if let Some(ref dir) = self.outdir {
            opts.output_dir = dir.clone();
        }

        if let Some(ref tts) = self.tts {
            opts.synth_command = tts.split_whitespace().map(str::to_string).collect();
        }

        if self.no_subtitles {
            opts.subtitles = false;
        }

        Ok(opts)
    }

    fn parse_log_level(s: &str) -> Result<LogLevel> {
        match LogLevel::parse(s) {
            Some(level) => Ok(level),
            None => anyhow::bail!(
                "Invalid log level: {}. Valid options: nothing, user, error, warning, info, debug, all",
                s
            ),
        }
    }
}
