//! `chapterseek` locates chapter boundaries in long-form narrated audio.
//!
//! Rather than transcribing a whole audiobook, it predicts where each chapter starts from
//! the reading pace observed so far, transcribes a small window there, and fuzzy-matches the
//! chapter's opening phrase against it, adjusting the window until the phrase is found.
//!
//! This crate provides:
//! - Chapter candidates built from extracted e-book text
//! - The velocity model and the adaptive per-chapter search
//! - Window sampling over media files (Symphonia) and Whisper transcription (feature `whisper`)
//! - Record encoders (JSON, markdown) and markdown read-back
//!
//! The core search works against the [`WindowSampler`] and [`Transcriber`] traits, so any
//! audio source or speech-to-text engine can be plugged in.

mod error;

pub use error::{Error, Result};

// Configuration.
pub mod opts;

// Search core.
pub mod chapter;
pub mod controller;
pub mod gap_fill;
pub mod matcher;
pub mod velocity;
pub mod window;

// Collaborator contracts.
pub mod sampler;
pub mod transcriber;

// Audio decoding.
pub mod audio_pipeline;
pub mod media;
pub mod media_sampler;

// Speech-to-text backends.
pub mod backends;

// Results and output encoders.
pub mod json_array_encoder;
pub mod markdown;
pub mod markdown_encoder;
pub mod output_type;
pub mod record_encoder;
pub mod report;

// Logging configuration.
#[cfg(feature = "logging")]
pub mod logging;

pub use chapter::{ChapterCandidate, ChapterText, build_candidates};
pub use controller::{BoundarySearch, CancelToken};
pub use matcher::{FuzzyMatcher, MatchResult};
pub use opts::{PhraseOpts, SearchOpts};
pub use report::{ChapterRecord, ChapterReport, ChapterStatus, FailureReason};
pub use sampler::{AudioWindow, WindowSampler};
pub use transcriber::Transcriber;
pub use velocity::VelocityModel;
pub use window::{SearchBounds, SearchWindow};
