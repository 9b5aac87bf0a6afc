//! SubRip subtitle import and export
//!
//! A lecture exports as a single SubRip file whose timestamps run across all
//! slides. Importing goes the other way: cues are assigned to slides by the
//! slide durations and made slide-relative.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::timeline::LectureTimeline;
use super::types::{Cue, BOUNDARY_EPSILON};

static TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d+):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})",
    )
    .unwrap()
});

/// One SubRip block, times in seconds from the start of the lecture
#[derive(Debug, Clone, PartialEq)]
pub struct SrtEntry {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Format seconds as `HH:MM:SS,mmm`
pub fn format_timestamp(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let (hours, rest) = (millis / 3_600_000, millis % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (secs, ms) = (rest / 1000, rest % 1000);
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, ms)
}

fn timestamp(caps: &regex::Captures<'_>, first: usize) -> Option<f64> {
    let field = |i: usize| caps.get(first + i)?.as_str().parse::<u64>().ok();
    let millis = field(0)? * 3_600_000 + field(1)? * 60_000 + field(2)? * 1000 + field(3)?;
    Some(millis as f64 / 1000.0)
}

/// Render the whole lecture as SubRip, offsetting each slide by the
/// narration length of the slides before it
pub fn to_srt(timeline: &LectureTimeline) -> String {
    let mut out = String::new();
    let mut offset = 0.0;
    let mut counter = 1;
    for slide in timeline.slides() {
        for cue in slide.cues().iter().filter(|c| !c.text.is_empty()) {
            let _ = write!(
                out,
                "{}\n{} --> {}\n{}\n\n",
                counter,
                format_timestamp(offset + cue.start),
                format_timestamp(offset + cue.end),
                cue.text
            );
            counter += 1;
        }
        offset += slide.duration();
    }
    out
}

/// Parse SubRip content, skipping blocks without a valid timing line
pub fn parse_srt(content: &str) -> Vec<SrtEntry> {
    let content = content.replace("\r\n", "\n");
    let mut entries = Vec::new();

    for block in content.split("\n\n") {
        let lines: Vec<&str> = block.lines().map(str::trim).collect();
        let Some(pos) = lines.iter().position(|l| TIMING.is_match(l)) else {
            if !block.trim().is_empty() {
                warn!(block = block.trim(), "skipping subtitle block without timing");
            }
            continue;
        };
        let Some(caps) = TIMING.captures(lines[pos]) else {
            continue;
        };
        let (Some(start), Some(end)) = (timestamp(&caps, 1), timestamp(&caps, 5)) else {
            continue;
        };
        let text = lines[pos + 1..]
            .iter()
            .filter(|l| !l.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        entries.push(SrtEntry { start, end, text });
    }
    entries
}

/// Assign entries to slides by cumulative slide durations
///
/// An entry belongs to the slide whose `[start, end)` contains its start.
/// Each slide's cues are closed up so they cover the slide without gaps:
/// a cue runs until the next one starts, and the last one until the slide
/// ends. Slides without entries get a single silent cue.
pub fn partition(entries: &[SrtEntry], durations: &[f64]) -> BTreeMap<usize, Vec<Cue>> {
    let mut sorted: Vec<&SrtEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut slides = BTreeMap::new();
    let mut offset = 0.0;
    let mut next = 0;
    for (i, &duration) in durations.iter().enumerate() {
        let end = offset + duration;
        let mut starts = Vec::new();
        while next < sorted.len() && sorted[next].start < end {
            let entry = sorted[next];
            starts.push((entry.start - offset, entry.text.clone()));
            next += 1;
        }
        slides.insert(i + 1, close_gaps(starts, duration));
        offset = end;
    }

    if next < sorted.len() {
        warn!(
            dropped = sorted.len() - next,
            "subtitle entries past the end of the lecture"
        );
    }
    slides
}

fn close_gaps(starts: Vec<(f64, String)>, duration: f64) -> Vec<Cue> {
    let mut cues: Vec<Cue> = Vec::with_capacity(starts.len());
    for (start, text) in starts {
        let start = start.max(0.0);
        match cues.last_mut() {
            Some(last) if start - last.start < BOUNDARY_EPSILON => {
                if !text.is_empty() {
                    last.text.push(' ');
                    last.text.push_str(&text);
                }
            }
            _ => cues.push(Cue::new(start, duration, text)),
        }
    }

    let Some(first) = cues.first_mut() else {
        return vec![Cue::new(0.0, duration, "")];
    };
    first.start = 0.0;
    for i in 1..cues.len() {
        cues[i - 1].end = cues[i].start;
    }
    cues
}
