use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, ensure};
use tracing::debug;

use crate::audio_pipeline::{AudioPipeline, TARGET_SAMPLE_RATE};
use crate::media::MediaStream;
use crate::sampler::{AudioWindow, WindowSampler};
use crate::window::SearchWindow;

// Resampled output is collected in chunks of this many frames.
const CHUNK_FRAMES: usize = 4096;

/// [`WindowSampler`] over a seekable media file (MP3, M4B/AAC, FLAC, WAV, ...).
///
/// The file is reopened for every window and only the requested range is decoded, so memory
/// stays proportional to the window. Output is mono at [`TARGET_SAMPLE_RATE`].
pub struct MediaSampler {
    path: PathBuf,
    duration: f64,
    max_window_seconds: f64,
}

impl MediaSampler {
    /// Open `path` and read its duration from the container.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = MediaStream::open(&path)?;
        let duration = stream
            .duration_seconds()
            .ok_or_else(|| anyhow!("'{}' does not declare its duration", path.display()))?;
        ensure!(duration > 0.0, "'{}' has no audio", path.display());

        debug!(path = %path.display(), duration, sample_rate = stream.sample_rate(), "opened media");
        Ok(Self {
            path,
            duration,
            max_window_seconds: f64::INFINITY,
        })
    }

    /// Refuse windows wider than `seconds`.
    pub fn with_max_window_seconds(mut self, seconds: f64) -> Self {
        self.max_window_seconds = seconds;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WindowSampler for MediaSampler {
    fn duration_seconds(&self) -> f64 {
        self.duration
    }

    fn max_window_seconds(&self) -> f64 {
        self.max_window_seconds
    }

    fn sample(&mut self, window: &SearchWindow) -> Result<AudioWindow> {
        ensure!(
            window.duration() <= self.max_window_seconds,
            "window of {:.1}s exceeds the {:.1}s cap",
            window.duration(),
            self.max_window_seconds
        );

        let mut stream = MediaStream::open(&self.path)?;
        if window.start() > 0.0 {
            stream.seek(window.start())?;
        }

        let mut pipeline = AudioPipeline::new();
        let capacity = (window.duration() * TARGET_SAMPLE_RATE as f64).ceil() as usize;
        let mut samples = Vec::with_capacity(capacity);

        while let Some((packet, packet_start)) = stream.next_packet()? {
            if packet_start >= window.end() {
                break;
            }

            let mut decoded = None;
            stream.decode_and_then(&packet, |buf| {
                decoded = Some(pipeline.decode_to_mono(&buf)?);
                Ok(())
            })?;
            let Some((mono, rate)) = decoded else {
                continue;
            };

            // Trim on absolute frame indices so consecutive packets tile without gaps.
            let frame = |t: f64| (t * rate as f64).round() as i64;
            let packet_first = frame(packet_start);
            let begin = (frame(window.start()) - packet_first).clamp(0, mono.len() as i64) as usize;
            let end = (frame(window.end()) - packet_first).clamp(0, mono.len() as i64) as usize;
            if begin >= end {
                continue;
            }

            pipeline.push_mono_and_emit(&mono[begin..end], rate, CHUNK_FRAMES, |chunk| {
                samples.extend_from_slice(chunk);
                Ok(true)
            })?;
        }

        pipeline.finalize(CHUNK_FRAMES, |chunk| {
            samples.extend_from_slice(chunk);
            Ok(true)
        })?;
        samples.truncate(capacity);

        debug!(
            start = window.start(),
            end = window.end(),
            samples = samples.len(),
            "sampled window"
        );
        Ok(AudioWindow {
            window: *window,
            sample_rate: TARGET_SAMPLE_RATE,
            samples,
        })
    }
}
