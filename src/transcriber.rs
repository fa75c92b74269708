use anyhow::Result;

use crate::sampler::AudioWindow;

/// Capability that turns one sampled window into recognized text.
///
/// Treated as a pure but slow function. Output is expected to be noisy (misheard words,
/// dropped punctuation, mangled proper nouns), which is why matching is fuzzy.
pub trait Transcriber {
    fn transcribe(&mut self, audio: &AudioWindow) -> Result<String>;
}
