use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use lectern::cli::{Cli, Command};
use lectern::config::{self, Options};
use lectern::lecture::manifest::{self, LectureManifest};
use lectern::lecture::types::slide_audio_name;
use lectern::lecture::{srt, LectureTimeline, TimelineBuilder};
use lectern::logging;
use lectern::playback::{measure_duration, RodioAudio};
use lectern::player::{
    event_channel, AnswerRequest, AnswerService, CommandSynthesizer, NarrationSynthesizer,
    NoSynthesizer, OllamaAnswerService, Player, PlayerCommand, PlayerHandle, PlayerUpdate,
    QaServices,
};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration file, then merge CLI options into it
    let options = config::load_config(cli.config.as_deref())?;
    let options = cli.merge_into_options(options)?;

    logging::init(options.log_level, options.log_file.as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "lectern starting");

    match cli.command.clone().unwrap_or(Command::Play {
        timeline: None,
        manifest: None,
    }) {
        Command::Build {
            manifest,
            out,
            srt,
        } => build(&options, manifest, out, srt),
        Command::ImportSrt { srt, out } => import_srt(&options, &srt, out),
        Command::Play { timeline, manifest } => play(&options, timeline, manifest),
        Command::Ask {
            question,
            slide,
            timeline,
            manifest,
        } => ask(&options, &question.join(" "), slide, timeline, manifest),
        Command::Status => status(&options),
    }
}

// =============================================================================
// Commands
// =============================================================================

fn build(
    options: &Options,
    manifest_path: Option<PathBuf>,
    out: Option<PathBuf>,
    export_srt: bool,
) -> Result<ExitCode> {
    let manifest_path = match manifest_path {
        Some(path) => path,
        None => manifest::find_latest(&options.output_dir).with_context(|| {
            format!(
                "No *_lecture.json manifest found in {}",
                options.output_dir.display()
            )
        })?,
    };
    let manifest = LectureManifest::open(&manifest_path)
        .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;

    let inputs = manifest.slide_inputs(&options.audio_dir);
    let durations: Vec<f64> = inputs
        .iter()
        .map(|input| {
            measure_duration(input.audio.path()).unwrap_or_else(|e| {
                warn!(audio = %input.audio.path().display(), error = %e, "cannot measure narration");
                0.0
            })
        })
        .collect();

    let builder = TimelineBuilder::new(options.builder_options());
    let build = LectureTimeline::load_with(&builder, inputs, &durations);
    for failure in &build.failures {
        eprintln!("slide {} skipped: {}", failure.source_index, failure.error);
    }

    let out = out.unwrap_or_else(|| options.timeline_path());
    build.timeline.save(&out)?;
    println!(
        "Built {} slides ({:.1}s) -> {}",
        build.timeline.slide_count(),
        build.timeline.total_duration(),
        out.display()
    );

    if export_srt {
        let srt_path = options.srt_path();
        fs::write(&srt_path, srt::to_srt(&build.timeline))
            .with_context(|| format!("Failed to write {}", srt_path.display()))?;
        println!("Subtitles -> {}", srt_path.display());
    }

    Ok(if build.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn import_srt(options: &Options, srt_path: &Path, out: Option<PathBuf>) -> Result<ExitCode> {
    let content = fs::read_to_string(srt_path)
        .with_context(|| format!("Failed to read {}", srt_path.display()))?;
    let entries = srt::parse_srt(&content);

    let mut durations = Vec::new();
    loop {
        let audio = options.audio_dir.join(slide_audio_name(durations.len() + 1));
        if !audio.is_file() {
            break;
        }
        durations.push(
            measure_duration(&audio)
                .with_context(|| format!("Failed to measure {}", audio.display()))?,
        );
    }
    if durations.is_empty() {
        anyhow::bail!("No narration clips found in {}", options.audio_dir.display());
    }

    let audio_dir = options.audio_dir.clone();
    let timeline = LectureTimeline::from_cues(srt::partition(&entries, &durations), |index| {
        lectern::lecture::AudioSource::file(audio_dir.join(slide_audio_name(index)))
    })?;
    let out = out.unwrap_or_else(|| options.timeline_path());
    timeline.save(&out)?;
    println!(
        "Imported {} subtitles into {} slides -> {}",
        entries.len(),
        timeline.slide_count(),
        out.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn play(
    options: &Options,
    timeline_path: Option<PathBuf>,
    manifest_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let timeline_path = timeline_path.unwrap_or_else(|| options.timeline_path());
    let timeline = Arc::new(
        LectureTimeline::open(&timeline_path, &options.audio_dir)
            .with_context(|| format!("Failed to load timeline {}", timeline_path.display()))?,
    );
    let context = lecture_context(&timeline, manifest_path.as_deref())?;

    let services = QaServices {
        answers: Arc::new(answer_service(options)?.with_context(context)),
        synth: synthesizer(options),
        timeout: options.answer_timeout(),
    };
    let lecture_audio = RodioAudio::open("lecture")?;
    let answer_audio = RodioAudio::open("answer")?;

    let (events_tx, events_rx) = event_channel();
    let (updates_tx, updates_rx) = crossbeam::channel::unbounded();
    let mut player = Player::new(
        Arc::clone(&timeline),
        lecture_audio,
        answer_audio,
        services,
        events_tx.clone(),
        updates_tx,
    );
    player.set_subtitles(options.subtitles);
    let mut handle = PlayerHandle::spawn(player, events_tx, events_rx, options.tick_rate)?;

    let printer = thread::Builder::new()
        .name("updates".into())
        .spawn(move || {
            for update in updates_rx {
                print_update(&update);
            }
        })?;

    println!(
        "{} slides loaded. Commands: start, goto N, hand, ask <question>, cancel, resume, restart, subtitles on|off, quit",
        timeline.slide_count()
    );
    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit" | "q") {
            break;
        }
        match PlayerCommand::parse(line) {
            Some(command) => {
                if !handle.send(command) {
                    break;
                }
            }
            None => println!("Unknown command: {}", line),
        }
    }

    handle.shutdown();
    drop(handle);
    let _ = printer.join();
    Ok(ExitCode::SUCCESS)
}

fn ask(
    options: &Options,
    question: &str,
    slide: Option<usize>,
    timeline_path: Option<PathBuf>,
    manifest_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let mut service = answer_service(options)?;
    if let Some(path) = manifest_path {
        service = service.with_context(manifest_context(&path)?);
    } else if let Some(path) = timeline_path {
        let timeline = LectureTimeline::open(&path, &options.audio_dir)
            .with_context(|| format!("Failed to load timeline {}", path.display()))?;
        service = service.with_context(timeline.lecture_context());
    }

    let answer = service.answer(&AnswerRequest {
        question: question.to_string(),
        current_slide: slide,
    })?;
    println!("{}", answer);

    match synthesizer(options).synthesize(&answer) {
        Ok(audio) => println!("Audio: {}", audio.path().display()),
        Err(e) => info!(error = %e, "answer not narrated"),
    }
    Ok(ExitCode::SUCCESS)
}

fn status(options: &Options) -> Result<ExitCode> {
    let status = answer_service(options)?.status();
    println!("{}", status.message);
    if status.running && !status.models.is_empty() {
        println!("Installed models: {}", status.models.join(", "));
    }
    Ok(if status.running && status.model_available {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn answer_service(options: &Options) -> Result<OllamaAnswerService> {
    OllamaAnswerService::new(&options.answer_url, &options.model, options.answer_timeout())
        .context("Failed to create answer service client")
}

fn synthesizer(options: &Options) -> Arc<dyn NarrationSynthesizer> {
    match CommandSynthesizer::new(&options.synth_command, &options.audio_dir) {
        Some(synth) => Arc::new(synth),
        None => Arc::new(NoSynthesizer),
    }
}

/// Narration given to the answer service, from the manifest when one is given
fn lecture_context(timeline: &LectureTimeline, manifest_path: Option<&Path>) -> Result<String> {
    match manifest_path {
        Some(path) => manifest_context(path),
        None => Ok(timeline.lecture_context()),
    }
}

fn manifest_context(path: &Path) -> Result<String> {
    let manifest = LectureManifest::open(path)
        .with_context(|| format!("Failed to load manifest {}", path.display()))?;
    let mut context = String::from("Lecture content:\n");
    for (i, slide) in manifest.slides.iter().enumerate() {
        context.push_str(&format!("\nSlide {}: {}\n", i + 1, slide.narration()));
    }
    Ok(context)
}

fn print_update(update: &PlayerUpdate) {
    let mut out = io::stdout().lock();
    let _ = match update {
        PlayerUpdate::PhaseChanged(phase) => writeln!(out, "[{}]", phase),
        PlayerUpdate::SlideChanged { slide } => writeln!(out, "--- slide {} ---", slide),
        PlayerUpdate::Subtitle { text, .. } if !text.is_empty() => writeln!(out, "  {}", text),
        PlayerUpdate::Subtitle { .. } => Ok(()),
        PlayerUpdate::Answer { question, text, audio } => {
            let spoken = if audio.is_some() { "" } else { " (text only)" };
            writeln!(out, "Q: {}\nA: {}{}", question, text, spoken)
        }
        PlayerUpdate::Notice(message) => writeln!(out, "! {}", message),
        PlayerUpdate::Error(message) => writeln!(out, "error: {}", message),
    };
}
