//! Reading-velocity model: predicts where a chapter starts in the audio from its text position.
//!
//! The model is a single reference point plus a rate (audio seconds per narrated word).
//! Every confirmed boundary moves the reference point and blends the observed rate into the
//! running estimate with exponential smoothing, so later predictions follow narration-speed
//! drift without being thrown off by one noisy confirmation.

use serde::Serialize;
use tracing::debug;

use crate::chapter::ChapterCandidate;
use crate::{Error, Result};

/// Snapshot of the velocity model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VelocityState {
    pub reference_text_position: f64,
    pub reference_time: f64,
    /// Audio seconds per unit of text progress.
    pub rate: f64,
}

/// Predicts chapter start times; refined after every confirmed boundary.
#[derive(Debug, Clone)]
pub struct VelocityModel {
    state: VelocityState,
    audio_duration: f64,
    smoothing: f64,
    // Whether `state` holds a confirmed boundary rather than the seeded estimate.
    anchored: bool,
}

impl VelocityModel {
    /// Seed the model from a coarse global estimate (total audio ÷ total text).
    ///
    /// The first chapter is predicted at `first_offset` seconds plus its text position times
    /// that rate.
    pub fn seeded(
        audio_duration: f64,
        total_text: f64,
        first_offset: f64,
        smoothing: f64,
    ) -> Result<Self> {
        if !(audio_duration > 0.0) {
            return Err(Error::msg("audio duration must be positive"));
        }

        let rate = if total_text > 0.0 {
            audio_duration / total_text
        } else {
            0.0
        };

        Ok(Self {
            state: VelocityState {
                reference_text_position: 0.0,
                reference_time: first_offset.clamp(0.0, last_instant(audio_duration)),
                rate,
            },
            audio_duration,
            smoothing,
            anchored: false,
        })
    }

    /// Build a model anchored on a known boundary, with the rate observed between two
    /// known boundaries `(text_position, time)`.
    ///
    /// Used to search a gap between two already-confirmed chapters.
    pub fn between(
        from: (f64, f64),
        to: (f64, f64),
        audio_duration: f64,
        smoothing: f64,
    ) -> Result<Self> {
        if to.1 <= from.1 {
            return Err(Error::OrderingViolation {
                previous: from.1,
                confirmed: to.1,
            });
        }

        let dx = to.0 - from.0;
        let rate = if dx > 0.0 { (to.1 - from.1) / dx } else { 0.0 };

        Ok(Self {
            state: VelocityState {
                reference_text_position: from.0,
                reference_time: from.1,
                rate,
            },
            audio_duration,
            smoothing,
            anchored: true,
        })
    }

    /// Predict the narration start of `chapter`, clamped to `[0, audio_duration)`.
    pub fn predict(&self, chapter: &ChapterCandidate) -> f64 {
        self.predict_at(chapter.text_position)
    }

    pub fn predict_at(&self, text_position: f64) -> f64 {
        let s = &self.state;
        let t = s.reference_time + s.rate * (text_position - s.reference_text_position);
        t.clamp(0.0, last_instant(self.audio_duration))
    }

    /// Fold a confirmed boundary into the model.
    ///
    /// Fails with [`Error::OrderingViolation`] (leaving the model untouched) if the timestamp
    /// is not strictly after the previous confirmed boundary.
    pub fn update(&mut self, chapter: &ChapterCandidate, confirmed: f64) -> Result<()> {
        self.update_at(chapter.text_position, confirmed)
    }

    pub fn update_at(&mut self, text_position: f64, confirmed: f64) -> Result<()> {
        if !confirmed.is_finite() {
            return Err(Error::msg("confirmed timestamp must be finite"));
        }

        if self.anchored {
            let previous = self.state.reference_time;
            if confirmed <= previous {
                return Err(Error::OrderingViolation {
                    previous,
                    confirmed,
                });
            }

            let dx = text_position - self.state.reference_text_position;
            if dx > 0.0 {
                let observed = (confirmed - previous) / dx;
                self.state.rate = self.smoothing * observed + (1.0 - self.smoothing) * self.state.rate;
                debug!(observed, rate = self.state.rate, "velocity updated");
            }
        }

        self.state.reference_text_position = text_position;
        self.state.reference_time = confirmed;
        self.anchored = true;
        Ok(())
    }

    pub fn state(&self) -> &VelocityState {
        &self.state
    }

    pub fn audio_duration(&self) -> f64 {
        self.audio_duration
    }
}

/// Latest representable instant of a half-open `[0, duration)` timeline (millisecond grain).
pub(crate) fn last_instant(duration: f64) -> f64 {
    (duration - 1e-3).max(0.0)
}
