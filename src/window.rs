//! Search windows: half-open time ranges of audio sampled as one probe.

use serde::Serialize;

use crate::{Error, Result};

/// A half-open range `[start, end)` on the audio timeline, in seconds.
///
/// Created fresh for every probe and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchWindow {
    start: f64,
    end: f64,
}

impl SearchWindow {
    /// Create a window, rejecting empty, inverted, negative or non-finite ranges.
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !(start.is_finite() && end.is_finite()) || start < 0.0 || end <= start {
            return Err(Error::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Absolute timestamp at `fraction` of the way through the window.
    pub fn at_fraction(&self, fraction: f64) -> f64 {
        self.start + fraction.clamp(0.0, 1.0) * self.duration()
    }

    /// Whether this window lies entirely within `bounds`.
    pub fn is_within(&self, bounds: &SearchBounds) -> bool {
        self.start >= bounds.start && self.end <= bounds.end
    }
}

/// The region of the audio a chapter search may probe.
///
/// For a full run this is `[0, audio_duration)`; when filling a gap between two known
/// chapters it is the gap itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchBounds {
    start: f64,
    end: f64,
}

impl SearchBounds {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        SearchWindow::new(start, end)?;
        Ok(Self { start, end })
    }

    pub fn whole(audio_duration: f64) -> Result<Self> {
        Self::new(0.0, audio_duration)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Build a window of `width` seconds placed with `lead_fraction` of it before `anchor`.
    pub fn anchored(&self, anchor: f64, width: f64, lead_fraction: f64) -> SearchWindow {
        self.fit(anchor - width * lead_fraction, width)
    }

    /// Build a window of `width` seconds starting at `start`, slid (never resized, unless the
    /// bounds are narrower than `width`) so it lies inside the bounds.
    pub fn fit(&self, start: f64, width: f64) -> SearchWindow {
        if width >= self.duration() {
            return SearchWindow {
                start: self.start,
                end: self.end,
            };
        }

        // `end - width` can round below `start` when the two are nearly equal.
        let latest = (self.end - width).max(self.start);
        let start = start.clamp(self.start, latest);
        SearchWindow {
            start,
            end: (start + width).min(self.end),
        }
    }
}
