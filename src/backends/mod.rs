//! Speech-to-text backends implementing [`crate::transcriber::Transcriber`].

/// Whisper (`whisper.cpp`) transcriber.
#[cfg(feature = "whisper")]
pub mod whisper;
