//! Lecture manifests
//!
//! A manifest (`*_lecture.json`) lists the slides of a lecture with their
//! narration text and optional slide image.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::text::clean_for_narration;
use super::timeline::SlideInput;
use super::types::{slide_audio_name, AudioSource, TimelineResult};

/// File name suffix of lecture manifests
pub const MANIFEST_SUFFIX: &str = "_lecture.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestSlide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl ManifestSlide {
    /// Cleaned narration, falling back to the slide text
    pub fn narration(&self) -> String {
        let raw = self
            .narration_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.slide_text.as_deref())
            .unwrap_or("");
        clean_for_narration(raw)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LectureManifest {
    #[serde(default)]
    pub slides: Vec<ManifestSlide>,
}

impl LectureManifest {
    pub fn from_json(content: &str) -> TimelineResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn open(path: &Path) -> TimelineResult<Self> {
        let manifest = Self::from_json(&fs::read_to_string(path)?)?;
        debug!(path = %path.display(), slides = manifest.slides.len(), "manifest loaded");
        Ok(manifest)
    }

    /// Narration inputs, with slide `n` narrated by `audio_slide_{n}.wav`
    /// inside `audio_dir`
    pub fn slide_inputs(&self, audio_dir: &Path) -> Vec<SlideInput> {
        self.slides
            .iter()
            .enumerate()
            .map(|(i, slide)| {
                SlideInput::new(
                    slide.narration(),
                    AudioSource::file(audio_dir.join(slide_audio_name(i + 1))),
                )
            })
            .collect()
    }
}

/// Most recently modified manifest in `dir`
pub fn find_latest(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(MANIFEST_SUFFIX))
        })
        .filter_map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, e.path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "slides": [
            {"narration_text": "Welcome to\nthe course", "image_path": "slide_1.png"},
            {"slide_text": "Dr. Who"},
            {"narration_text": "   ", "slide_text": "Fallback text."}
        ]
    }"#;

    #[test]
    fn test_manifest_narration_is_cleaned() {
        let manifest = LectureManifest::from_json(SAMPLE).unwrap();
        assert_eq!(manifest.slides.len(), 3);
        assert_eq!(manifest.slides[0].narration(), "Welcome to the course.");
        assert_eq!(manifest.slides[0].image_path.as_deref(), Some("slide_1.png"));
        assert_eq!(manifest.slides[1].narration(), "Doctor Who.");
        assert_eq!(manifest.slides[2].narration(), "Fallback text.");
    }

    #[test]
    fn test_slide_inputs_map_audio() {
        let manifest = LectureManifest::from_json(SAMPLE).unwrap();
        let inputs = manifest.slide_inputs(Path::new("temp"));
        assert_eq!(
            inputs[1].audio,
            AudioSource::file(Path::new("temp").join("audio_slide_2.wav"))
        );
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = LectureManifest::from_json("{}").unwrap();
        assert!(manifest.slides.is_empty());
        assert_eq!(ManifestSlide::default().narration(), "");
    }

    #[test]
    fn test_find_latest_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();
        assert_eq!(find_latest(dir.path()), None);

        fs::write(dir.path().join("physics_lecture.json"), SAMPLE).unwrap();
        assert_eq!(
            find_latest(dir.path()),
            Some(dir.path().join("physics_lecture.json"))
        );
    }
}
