//! Subtitle display
//!
//! Maps a playback position onto the slide's cue list and tells the UI when
//! the visible subtitle changes.

use crate::lecture::Cue;

/// Find the cue active at `position`
///
/// Cues are sorted by start time. Positions at or past the last cue's end
/// map to the last cue; positions before the first cue map to the first.
pub fn active_cue(cues: &[Cue], position: f64) -> Option<(usize, &Cue)> {
    let last = cues.len().checked_sub(1)?;
    if position >= cues[last].end {
        return Some((last, &cues[last]));
    }
    let index = cues
        .partition_point(|c| c.start <= position)
        .saturating_sub(1);
    Some((index, &cues[index]))
}

/// Tracks the displayed cue so the UI re-renders only on change
#[derive(Debug)]
pub struct SubtitleRenderer {
    /// (slide, cue index) currently shown
    current: Option<(usize, usize)>,
    /// Whether subtitles are enabled
    enabled: bool,
}

impl Default for SubtitleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SubtitleRenderer {
    pub fn new() -> Self {
        Self {
            current: None,
            enabled: true,
        }
    }

    /// Update for `position` on `slide`
    ///
    /// Returns the cue to show when it differs from the one already shown.
    pub fn update<'a>(&mut self, slide: usize, cues: &'a [Cue], position: f64) -> Option<(usize, &'a Cue)> {
        if !self.enabled {
            return None;
        }
        let (index, cue) = active_cue(cues, position)?;
        if self.current == Some((slide, index)) {
            return None;
        }
        self.current = Some((slide, index));
        Some((index, cue))
    }

    /// (slide, cue index) currently shown
    pub fn current(&self) -> Option<(usize, usize)> {
        self.current
    }

    /// Forget the shown cue so the next update renders again
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Enable/disable subtitles
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.current = None;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cues() -> Vec<Cue> {
        vec![
            Cue::new(0.0, 2.0, "Intro"),
            Cue::new(2.0, 4.0, "Middle"),
            Cue::new(4.0, 5.0, "End"),
        ]
    }

    #[test]
    fn test_active_cue_lookup() {
        let cues = cues();
        assert_eq!(active_cue(&cues, 0.0).unwrap().0, 0);
        assert_eq!(active_cue(&cues, 1.99).unwrap().0, 0);
        assert_eq!(active_cue(&cues, 2.0).unwrap().0, 1);
        assert_eq!(active_cue(&cues, 4.5).unwrap().1.text, "End");
    }

    #[test]
    fn test_active_cue_at_and_past_end() {
        let cues = cues();
        assert_eq!(active_cue(&cues, 5.0).unwrap().0, 2);
        assert_eq!(active_cue(&cues, 100.0).unwrap().0, 2);
    }

    #[test]
    fn test_active_cue_empty() {
        assert!(active_cue(&[], 1.0).is_none());
    }

    #[test]
    fn test_renderer_reports_changes_only() {
        let cues = cues();
        let mut renderer = SubtitleRenderer::new();
        assert_eq!(renderer.update(1, &cues, 0.5).unwrap().1.text, "Intro");
        assert!(renderer.update(1, &cues, 1.0).is_none());
        assert!(renderer.update(1, &cues, 1.9).is_none());
        assert_eq!(renderer.update(1, &cues, 2.1).unwrap().1.text, "Middle");
        assert_eq!(renderer.current(), Some((1, 1)));
    }

    #[test]
    fn test_renderer_slide_change_rerenders() {
        let cues = cues();
        let mut renderer = SubtitleRenderer::new();
        renderer.update(1, &cues, 0.5);
        assert!(renderer.update(2, &cues, 0.5).is_some());
    }

    #[test]
    fn test_renderer_reset_and_disable() {
        let cues = cues();
        let mut renderer = SubtitleRenderer::new();
        renderer.update(1, &cues, 0.5);
        renderer.reset();
        assert!(renderer.update(1, &cues, 0.5).is_some());

        renderer.set_enabled(false);
        assert!(renderer.update(1, &cues, 3.0).is_none());
        assert!(!renderer.is_enabled());
    }

    proptest! {
        #[test]
        fn prop_active_cue_contains_position(
            lengths in prop::collection::vec(0.01f64..5.0, 1..12),
            fraction in 0.0f64..1.0,
        ) {
            let mut cues = Vec::new();
            let mut start = 0.0;
            for (i, length) in lengths.iter().enumerate() {
                cues.push(Cue::new(start, start + length, format!("cue {}", i)));
                start += length;
            }
            let duration = start;
            let position = duration * fraction;

            let (index, cue) = active_cue(&cues, position).unwrap();
            if position < duration {
                prop_assert!(cue.contains(position));
            } else {
                prop_assert_eq!(index, cues.len() - 1);
            }
            prop_assert_eq!(active_cue(&cues, duration).unwrap().0, cues.len() - 1);
        }
    }
}
