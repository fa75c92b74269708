use anyhow::Result;

use crate::window::SearchWindow;

/// Decoded audio for one probe window.
///
/// Samples are mono `f32` at `sample_rate`. Only one of these is alive at a time during a
/// search, which keeps memory bounded by the window cap rather than the book length.
#[derive(Debug, Clone)]
pub struct AudioWindow {
    pub window: SearchWindow,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

/// Capability that materializes one window of the source audio.
///
/// Implementations must not load more than the requested window into memory.
pub trait WindowSampler {
    /// Total duration of the source audio, in seconds.
    fn duration_seconds(&self) -> f64;

    /// Widest window this sampler supports, in seconds.
    fn max_window_seconds(&self) -> f64 {
        f64::INFINITY
    }

    /// Decode the audio inside `window`.
    ///
    /// Callers never request a window outside `[0, duration_seconds())` or wider than
    /// `max_window_seconds()`.
    fn sample(&mut self, window: &SearchWindow) -> Result<AudioWindow>;
}
