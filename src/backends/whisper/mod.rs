use std::path::Path;

use anyhow::{Result, ensure};
use tracing::debug;
use whisper_rs::WhisperContext;

use crate::audio_pipeline::TARGET_SAMPLE_RATE;
use crate::sampler::AudioWindow;
use crate::transcriber::Transcriber;

mod ctx;
mod logging;
mod transcript;

/// [`Transcriber`] powered by `whisper-rs` / `whisper.cpp`.
///
/// The model is loaded once; every window gets a fresh decoding state.
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    language: Option<String>,
}

impl WhisperTranscriber {
    /// Load a ggml model from `model_path`.
    pub fn new(model_path: impl AsRef<Path>) -> Result<Self> {
        let ctx = ctx::load_context(model_path.as_ref())?;
        Ok(Self {
            ctx,
            language: None,
        })
    }

    /// Hint the spoken language (`"en"`, `"de"`, ...). Auto-detected when unset.
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&mut self, audio: &AudioWindow) -> Result<String> {
        ensure!(
            audio.sample_rate == TARGET_SAMPLE_RATE,
            "whisper expects {TARGET_SAMPLE_RATE} Hz audio, got {} Hz",
            audio.sample_rate
        );
        if audio.samples.is_empty() {
            return Ok(String::new());
        }

        let text = transcript::transcribe_samples(&self.ctx, self.language.as_deref(), &audio.samples)?;
        debug!(
            start = audio.window.start(),
            end = audio.window.end(),
            chars = text.len(),
            "transcribed window"
        );
        Ok(text)
    }
}
