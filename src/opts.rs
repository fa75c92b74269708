use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Options that control how chapter boundaries are searched for.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI is responsible for mapping user input into this type so that:
/// - the library remains reusable outside of a CLI context
/// - other frontends (tests, batch jobs) can construct options programmatically
///
/// Missing fields fall back to [`SearchOpts::default`] when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOpts {
    /// Minimum match score (in `[0, 1]`) required to confirm a boundary.
    pub acceptance_threshold: f64,

    /// Scores at or above this (but below acceptance) mean "the phrase is nearby":
    /// the window is narrowed around the evidence instead of expanded.
    pub plausible_threshold: f64,

    /// Width of the first window probed for a chapter.
    pub default_window_seconds: f64,

    /// Narrowing never shrinks a window below this width.
    pub min_window_seconds: f64,

    /// Hard cap on the width of any sampled window.
    ///
    /// This bounds transcription cost and memory regardless of audiobook length.
    pub max_window_seconds: f64,

    /// Share of a fresh window placed *before* the point it is anchored on.
    ///
    /// Predictions drift late more often than early, so most of the window trails the anchor.
    pub lead_fraction: f64,

    /// Factor applied to the window width when narrowing.
    pub narrow_factor: f64,

    /// Overlap kept between consecutive windows of a sweep, so a phrase straddling the
    /// edge of one window is fully contained in the next.
    pub sweep_overlap_seconds: f64,

    /// Maximum number of sample+transcribe probes for a single chapter.
    pub max_probes_per_chapter: u32,

    /// Weight of the newest observed reading rate when updating the velocity model.
    pub velocity_smoothing: f64,

    /// Fixed offset added to the first chapter's prediction (front matter, credits).
    pub first_chapter_offset_seconds: f64,
}

impl Default for SearchOpts {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.70,
            plausible_threshold: 0.45,
            default_window_seconds: 90.0,
            min_window_seconds: 20.0,
            max_window_seconds: 240.0,
            lead_fraction: 0.25,
            narrow_factor: 0.5,
            sweep_overlap_seconds: 15.0,
            max_probes_per_chapter: 10,
            velocity_smoothing: 0.5,
            first_chapter_offset_seconds: 30.0,
        }
    }
}

impl SearchOpts {
    /// Check the options for internal consistency.
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.acceptance_threshold) || !unit.contains(&self.plausible_threshold) {
            return Err(invalid("thresholds must lie in [0, 1]"));
        }
        if self.plausible_threshold > self.acceptance_threshold {
            return Err(invalid(
                "plausible_threshold must not exceed acceptance_threshold",
            ));
        }
        if !(self.min_window_seconds > 0.0) {
            return Err(invalid("min_window_seconds must be positive"));
        }
        if self.min_window_seconds > self.default_window_seconds
            || self.default_window_seconds > self.max_window_seconds
        {
            return Err(invalid(
                "window sizes must satisfy min <= default <= max",
            ));
        }
        if !(0.0..1.0).contains(&self.lead_fraction) {
            return Err(invalid("lead_fraction must lie in [0, 1)"));
        }
        if !(self.narrow_factor > 0.0 && self.narrow_factor < 1.0) {
            return Err(invalid("narrow_factor must lie in (0, 1)"));
        }
        if !(self.sweep_overlap_seconds >= 0.0 && self.sweep_overlap_seconds < self.max_window_seconds)
        {
            return Err(invalid(
                "sweep_overlap_seconds must be non-negative and below max_window_seconds",
            ));
        }
        if self.max_probes_per_chapter == 0 {
            return Err(invalid("max_probes_per_chapter must be at least 1"));
        }
        if !(self.velocity_smoothing > 0.0 && self.velocity_smoothing <= 1.0) {
            return Err(invalid("velocity_smoothing must lie in (0, 1]"));
        }
        if self.first_chapter_offset_seconds < 0.0 {
            return Err(invalid("first_chapter_offset_seconds must be non-negative"));
        }
        Ok(())
    }
}

/// Options that control how a chapter's search phrase is built from its opening paragraphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseOpts {
    /// Paragraphs shorter than this are treated as headings ("Chapter 1") and skipped.
    pub min_paragraph_chars: usize,

    /// Short opening paragraphs are combined until the phrase reaches this length.
    pub min_phrase_chars: usize,

    /// Phrases are truncated near this length (extended to the next whitespace).
    pub max_phrase_chars: usize,
}

impl Default for PhraseOpts {
    fn default() -> Self {
        Self {
            min_paragraph_chars: 20,
            min_phrase_chars: 50,
            max_phrase_chars: 150,
        }
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidOpts(message.to_owned())
}
